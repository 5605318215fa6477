//! Inverted index with BM25 ranking.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{DocumentList, SearchStrategy, SearchableDocument, Upsert, DEFAULT_SEARCH_LIMIT};

/// Words dropped by the tokenizer.
const STOP_WORDS: [&str; 34] = [
    "a", "an", "and", "are", "as", "at", "be", "by", "can", "for", "from", "have", "if", "in",
    "is", "it", "may", "not", "of", "on", "or", "tbd", "that", "the", "this", "to", "us", "we",
    "when", "will", "with", "yet", "you", "your",
];

/// BM25 parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KeywordConfig {
    /// Term frequency saturation
    pub k1: f64,
    /// Length normalization
    pub b: f64,
    /// Tokens shorter than this are ignored
    pub min_token_len: usize,
    /// Match documents holding any query term instead of all of them
    #[serde(default)]
    pub any_term: bool,
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            k1: 1.2,
            b: 0.75,
            min_token_len: 2,
            any_term: false,
        }
    }
}

/// Lowercased alphanumeric tokens without stop words.
pub fn tokenize(text: &str, min_len: usize) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= min_len)
        .map(str::to_lowercase)
        .filter(|t| !STOP_WORDS.contains(&t.as_str()))
        .collect()
}

/// Ranks documents by BM25 over the query's terms.
///
/// Every term must occur in a document unless [`KeywordConfig::any_term`] is set.
#[derive(Debug, Clone, Default)]
pub struct KeywordStrategy {
    config: KeywordConfig,
    docs: DocumentList,
    /// term -> chunk_id -> term frequency
    postings: HashMap<String, HashMap<String, u32>>,
    /// chunk_id -> token count
    doc_lengths: HashMap<String, usize>,
    total_length: usize,
}

impl KeywordStrategy {
    pub fn new(config: KeywordConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    fn index(&mut self, doc: &SearchableDocument) {
        let tokens = tokenize(&doc.text_content, self.config.min_token_len);
        self.total_length += tokens.len();
        self.doc_lengths.insert(doc.chunk_id.clone(), tokens.len());
        for token in tokens {
            *self
                .postings
                .entry(token)
                .or_default()
                .entry(doc.chunk_id.clone())
                .or_default() += 1;
        }
    }

    /// Drops the postings `text` contributed for `chunk_id`.
    fn unindex(&mut self, chunk_id: &str, text: &str) {
        if let Some(len) = self.doc_lengths.remove(chunk_id) {
            self.total_length -= len;
        }
        for token in tokenize(text, self.config.min_token_len) {
            if let Some(docs) = self.postings.get_mut(&token) {
                docs.remove(chunk_id);
                if docs.is_empty() {
                    self.postings.remove(&token);
                }
            }
        }
    }

    /// BM25 score, `None` when the document does not satisfy the query.
    fn score(&self, terms: &[String], chunk_id: &str) -> Option<f64> {
        let n = self.doc_lengths.len() as f64;
        let avg_len = if self.doc_lengths.is_empty() {
            0.0
        } else {
            self.total_length as f64 / n
        };
        let doc_len = self.doc_lengths.get(chunk_id).copied().unwrap_or(0) as f64;
        let KeywordConfig { k1, b, .. } = self.config;

        let mut total = 0.0;
        let mut matched = 0;
        for term in terms {
            let Some((tf, docs)) = self
                .postings
                .get(term)
                .and_then(|docs| docs.get(chunk_id).map(|tf| (f64::from(*tf), docs)))
            else {
                continue;
            };
            matched += 1;
            let df = docs.len() as f64;
            let idf = (1.0 + (n - df + 0.5) / (df + 0.5)).ln();
            let norm = if avg_len > 0.0 {
                1.0 - b + b * doc_len / avg_len
            } else {
                1.0
            };
            total += idf * tf * (k1 + 1.0) / (tf + k1 * norm);
        }

        let satisfied = if self.config.any_term {
            matched > 0
        } else {
            matched == terms.len()
        };
        (satisfied && total > 0.0).then_some(total)
    }
}

impl SearchStrategy for KeywordStrategy {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn upsert_document(&mut self, document: SearchableDocument) {
        let chunk_id = document.chunk_id.clone();
        let previous = self.docs.get(&chunk_id).map(|d| d.text_content.clone());
        match (self.docs.upsert(document), previous) {
            (Upsert::Unchanged, _) => return,
            (Upsert::Replaced, Some(old_text)) => self.unindex(&chunk_id, &old_text),
            _ => {}
        }
        if let Some(doc) = self.docs.get(&chunk_id).cloned() {
            self.index(&doc);
        }
    }

    fn delete_document(&mut self, chunk_id: &str) {
        if let Some(doc) = self.docs.remove(chunk_id) {
            self.unindex(chunk_id, &doc.text_content);
        }
    }

    fn clear_index(&mut self) {
        self.docs.clear();
        self.postings.clear();
        self.doc_lengths.clear();
        self.total_length = 0;
    }

    fn len(&self) -> usize {
        self.docs.len()
    }

    fn raw_search(
        &self,
        query: &str,
        filter: Option<&Map<String, Value>>,
        limit: Option<usize>,
    ) -> Vec<SearchableDocument> {
        let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        let mut terms = tokenize(query, self.config.min_token_len);
        let mut seen = HashSet::new();
        terms.retain(|t| seen.insert(t.clone()));
        if terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(f64, &SearchableDocument)> = self
            .docs
            .filtered(filter)
            .filter_map(|doc| self.score(&terms, &doc.chunk_id).map(|score| (score, doc)))
            .collect();
        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored
            .into_iter()
            .take(limit)
            .map(|(_, doc)| doc.clone())
            .collect()
    }
}
