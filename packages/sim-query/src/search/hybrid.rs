//! Keyword and fuzzy results fused with reciprocal rank fusion.

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::{
    FuzzyConfig, FuzzyStrategy, KeywordConfig, KeywordStrategy, SearchStrategy, SearchableDocument,
    DEFAULT_SEARCH_LIMIT,
};

/// Rank offset in `1 / (k + rank)`.
pub const RRF_K: f64 = 60.0;

#[derive(Debug, Clone, Default)]
pub struct HybridStrategy {
    keyword: KeywordStrategy,
    fuzzy: FuzzyStrategy,
}

impl HybridStrategy {
    pub fn new(keyword: KeywordConfig, fuzzy: FuzzyConfig) -> Self {
        Self {
            keyword: KeywordStrategy::new(keyword),
            fuzzy: FuzzyStrategy::new(fuzzy),
        }
    }
}

/// Fuses ranked lists; documents are keyed by original hash.
pub fn reciprocal_rank_fusion(lists: &[Vec<SearchableDocument>], k: f64) -> Vec<SearchableDocument> {
    let mut scores: HashMap<&str, f64> = HashMap::new();
    let mut order: Vec<&SearchableDocument> = Vec::new();
    for list in lists {
        for (rank, doc) in list.iter().enumerate() {
            let entry = scores.entry(doc.original_hash.as_str()).or_insert_with(|| {
                order.push(doc);
                0.0
            });
            *entry += 1.0 / (k + rank as f64 + 1.0);
        }
    }
    order.sort_by(|a, b| {
        let sa = scores.get(a.original_hash.as_str()).copied().unwrap_or(0.0);
        let sb = scores.get(b.original_hash.as_str()).copied().unwrap_or(0.0);
        sb.total_cmp(&sa)
    });
    order.into_iter().cloned().collect()
}

impl SearchStrategy for HybridStrategy {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    fn upsert_document(&mut self, document: SearchableDocument) {
        self.keyword.upsert_document(document.clone());
        self.fuzzy.upsert_document(document);
    }

    fn delete_document(&mut self, chunk_id: &str) {
        self.keyword.delete_document(chunk_id);
        self.fuzzy.delete_document(chunk_id);
    }

    fn clear_index(&mut self) {
        self.keyword.clear_index();
        self.fuzzy.clear_index();
    }

    fn len(&self) -> usize {
        self.keyword.len()
    }

    fn raw_search(
        &self,
        query: &str,
        filter: Option<&Map<String, Value>>,
        limit: Option<usize>,
    ) -> Vec<SearchableDocument> {
        let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        let fetch = limit.saturating_mul(2);
        let lists = [
            self.keyword.raw_search(query, filter, Some(fetch)),
            self.fuzzy.raw_search(query, filter, Some(fetch)),
        ];
        let mut fused = reciprocal_rank_fusion(&lists, RRF_K);
        fused.truncate(limit);
        fused
    }
}
