//! In-memory text search over simulated records.
//!
//! Records are indexed as [`SearchableDocument`]s and queried through a
//! [`SearchStrategy`]. Several strategies can be kept side by side in a
//! [`SearchEngine`].

mod adapter;
mod fuzzy;
mod hybrid;
mod keyword;
mod substring;


use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sim_core::{SimError, Store};

pub use adapter::RecordAdapter;
pub use fuzzy::{FuzzyConfig, FuzzyStrategy, Scorer};
pub use hybrid::HybridStrategy;
pub use keyword::{KeywordConfig, KeywordStrategy};
pub use substring::SubstringStrategy;

/// Result count used when a search call gives no limit.
pub const DEFAULT_SEARCH_LIMIT: usize = 10;

/// A chunk of text pointing back at the record it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchableDocument {
    /// Unique id of this chunk
    pub chunk_id: String,
    /// Text that queries are matched against
    pub text_content: String,
    /// Values usable in equality filters
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Record returned to callers
    pub original: Value,
    /// Identifies the original across chunks
    pub original_hash: String,
}

impl SearchableDocument {
    pub fn new(chunk_id: impl Into<String>, text_content: impl Into<String>, original: Value) -> Self {
        Self {
            chunk_id: chunk_id.into(),
            text_content: text_content.into(),
            metadata: Map::new(),
            original_hash: hash_value(&original),
            original,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// True when every filter entry equals the metadata value of the same key.
    pub fn matches_metadata(&self, filter: Option<&Map<String, Value>>) -> bool {
        filter.map_or(true, |f| {
            f.iter().all(|(k, v)| self.metadata.get(k) == Some(v))
        })
    }

    /// Takes metadata and original from `other`, keeping the indexed text.
    fn refresh_from(&mut self, other: SearchableDocument) {
        self.metadata = other.metadata;
        self.original = other.original;
        self.original_hash = other.original_hash;
    }
}

/// Stable hash of a JSON value's canonical rendering.
pub fn hash_value(value: &Value) -> String {
    let mut hasher = DefaultHasher::new();
    value.to_string().hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Originals of `docs` in order, one per distinct hash, at most `limit`.
pub fn unique_originals(docs: &[SearchableDocument], limit: Option<usize>) -> Vec<Value> {
    let limit = limit.unwrap_or(usize::MAX);
    let mut seen = HashSet::new();
    docs.iter()
        .filter(|d| seen.insert(d.original_hash.as_str()))
        .take(limit)
        .map(|d| d.original.clone())
        .collect()
}

/// A searchable index over documents.
pub trait SearchStrategy: Send + Sync {
    /// Short name such as `keyword`
    fn name(&self) -> &'static str;

    /// Adds or replaces a document by `chunk_id`.
    ///
    /// When the text is unchanged only metadata and original are updated.
    fn upsert_document(&mut self, document: SearchableDocument);

    fn upsert_documents(&mut self, documents: Vec<SearchableDocument>) {
        for doc in documents {
            self.upsert_document(doc);
        }
    }

    fn delete_document(&mut self, chunk_id: &str);

    fn delete_documents(&mut self, chunk_ids: &[&str]) {
        for id in chunk_ids {
            self.delete_document(id);
        }
    }

    fn clear_index(&mut self);

    /// Number of indexed documents.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ranked matching documents, at most `limit` (default [`DEFAULT_SEARCH_LIMIT`]).
    fn raw_search(
        &self,
        query: &str,
        filter: Option<&Map<String, Value>>,
        limit: Option<usize>,
    ) -> Vec<SearchableDocument>;

    /// Ranked distinct originals, at most `limit`.
    ///
    /// Chunks are deduplicated by original before the limit applies.
    fn search(&self, query: &str, filter: Option<&Map<String, Value>>, limit: Option<usize>) -> Vec<Value> {
        let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        unique_originals(&self.raw_search(query, filter, Some(usize::MAX)), Some(limit))
    }
}

/// What [`DocumentList::upsert`] did with a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Upsert {
    Inserted,
    /// Same id, new text
    Replaced,
    /// Same id and text; only metadata and original were taken
    Unchanged,
}

/// Documents in insertion order with upsert-by-id.
#[derive(Debug, Clone, Default)]
pub(crate) struct DocumentList {
    docs: Vec<SearchableDocument>,
    /// chunk_id -> index into `docs`
    positions: HashMap<String, usize>,
}

impl DocumentList {
    fn upsert(&mut self, document: SearchableDocument) -> Upsert {
        match self.positions.get(&document.chunk_id).copied() {
            Some(pos) => {
                let existing = &mut self.docs[pos];
                if existing.text_content == document.text_content {
                    existing.refresh_from(document);
                    Upsert::Unchanged
                } else {
                    *existing = document;
                    Upsert::Replaced
                }
            }
            None => {
                self.positions.insert(document.chunk_id.clone(), self.docs.len());
                self.docs.push(document);
                Upsert::Inserted
            }
        }
    }

    fn remove(&mut self, chunk_id: &str) -> Option<SearchableDocument> {
        let pos = self.positions.remove(chunk_id)?;
        let removed = self.docs.remove(pos);
        for doc in &self.docs[pos..] {
            if let Some(p) = self.positions.get_mut(&doc.chunk_id) {
                *p -= 1;
            }
        }
        Some(removed)
    }

    fn get(&self, chunk_id: &str) -> Option<&SearchableDocument> {
        self.positions.get(chunk_id).and_then(|&pos| self.docs.get(pos))
    }

    fn clear(&mut self) {
        self.docs.clear();
        self.positions.clear();
    }

    fn len(&self) -> usize {
        self.docs.len()
    }

    fn filtered<'a>(
        &'a self,
        filter: Option<&'a Map<String, Value>>,
    ) -> impl Iterator<Item = &'a SearchableDocument> + 'a {
        self.docs.iter().filter(move |d| d.matches_metadata(filter))
    }
}

/// Strategy names accepted by [`SearchEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Substring,
    Keyword,
    Fuzzy,
    Hybrid,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::Substring,
        StrategyKind::Keyword,
        StrategyKind::Fuzzy,
        StrategyKind::Hybrid,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Substring => "substring",
            StrategyKind::Keyword => "keyword",
            StrategyKind::Fuzzy => "fuzzy",
            StrategyKind::Hybrid => "hybrid",
        }
    }

    /// Strategy instance with default settings.
    pub fn build(self) -> Box<dyn SearchStrategy> {
        match self {
            StrategyKind::Substring => Box::new(SubstringStrategy::default()),
            StrategyKind::Keyword => Box::new(KeywordStrategy::default()),
            StrategyKind::Fuzzy => Box::new(FuzzyStrategy::default()),
            StrategyKind::Hybrid => Box::new(HybridStrategy::default()),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                SimError::InvalidInput(format!(
                    "Unknown search strategy '{}'. Expected one of: substring, keyword, fuzzy, hybrid",
                    s
                ))
            })
    }
}

/// Named strategies sharing the same documents, with a default for queries.
pub struct SearchEngine {
    strategies: HashMap<StrategyKind, Box<dyn SearchStrategy>>,
    default: StrategyKind,
}

impl Default for SearchEngine {
    fn default() -> Self {
        Self::new(StrategyKind::Keyword)
    }
}

impl SearchEngine {
    /// Engine with every strategy, querying `default` unless told otherwise.
    pub fn new(default: StrategyKind) -> Self {
        Self {
            strategies: StrategyKind::ALL.into_iter().map(|k| (k, k.build())).collect(),
            default,
        }
    }

    /// Replaces one strategy instance, e.g. to change its config.
    pub fn with_strategy(mut self, kind: StrategyKind, strategy: Box<dyn SearchStrategy>) -> Self {
        self.strategies.insert(kind, strategy);
        self
    }

    pub fn default_strategy(&self) -> StrategyKind {
        self.default
    }

    pub fn set_default_strategy(&mut self, kind: StrategyKind) {
        self.default = kind;
        tracing::debug!(strategy = kind.as_str(), "default search strategy changed");
    }

    pub fn strategy(&self, kind: StrategyKind) -> Option<&dyn SearchStrategy> {
        self.strategies.get(&kind).map(|s| s.as_ref())
    }

    pub fn upsert_documents(&mut self, documents: Vec<SearchableDocument>) {
        for strategy in self.strategies.values_mut() {
            strategy.upsert_documents(documents.clone());
        }
    }

    pub fn delete_documents(&mut self, chunk_ids: &[&str]) {
        for strategy in self.strategies.values_mut() {
            strategy.delete_documents(chunk_ids);
        }
    }

    pub fn clear(&mut self) {
        for strategy in self.strategies.values_mut() {
            strategy.clear_index();
        }
    }

    /// Rebuilds every index from a store collection.
    pub fn sync_from_store(&mut self, adapter: &RecordAdapter, store: &Store) -> Result<usize, SimError> {
        let documents = adapter.to_documents(store)?;
        let count = documents.len();
        self.clear();
        self.upsert_documents(documents);
        tracing::debug!(collection = %adapter.collection, documents = count, "search index synced");
        Ok(count)
    }

    /// Queries the default strategy.
    pub fn search(&self, query: &str, filter: Option<&Map<String, Value>>, limit: Option<usize>) -> Vec<Value> {
        self.search_with(self.default, query, filter, limit)
    }

    pub fn search_with(
        &self,
        kind: StrategyKind,
        query: &str,
        filter: Option<&Map<String, Value>>,
        limit: Option<usize>,
    ) -> Vec<Value> {
        self.strategies
            .get(&kind)
            .map(|s| s.search(query, filter, limit))
            .unwrap_or_default()
    }
}
