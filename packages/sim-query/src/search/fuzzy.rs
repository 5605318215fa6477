//! Approximate matching by normalized edit-distance similarity.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{DocumentList, SearchStrategy, SearchableDocument, DEFAULT_SEARCH_LIMIT};

/// Similarity function, each scoring in `0.0..=100.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scorer {
    /// Whole-string similarity
    Ratio,
    /// Best match of the shorter string against windows of the longer one
    #[default]
    PartialRatio,
    /// Ratio after sorting whitespace separated tokens
    TokenSortRatio,
}

impl Scorer {
    pub fn score(self, a: &str, b: &str) -> f64 {
        match self {
            Scorer::Ratio => ratio(a, b),
            Scorer::PartialRatio => partial_ratio(a, b),
            Scorer::TokenSortRatio => ratio(&sorted_tokens(a), &sorted_tokens(b)),
        }
    }
}

/// Length of the longest common subsequence.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let mut row = vec![0usize; b.len() + 1];
    for ca in a {
        let mut diag = 0;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == cb {
                diag + 1
            } else {
                above.max(row[j])
            };
            diag = above;
        }
    }
    row[b.len()]
}

fn ratio_chars(a: &[char], b: &[char]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 100.0;
    }
    200.0 * lcs_len(a, b) as f64 / total as f64
}

/// `100 * (1 - indel_distance / (len(a) + len(b)))`.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio_chars(&a, &b)
}

pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return if long.is_empty() { 100.0 } else { 0.0 };
    }
    let mut best: f64 = 0.0;
    for window in long.windows(short.len()) {
        best = best.max(ratio_chars(&short, window));
        if best >= 100.0 {
            break;
        }
    }
    best
}

fn sorted_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuzzyConfig {
    pub scorer: Scorer,
    /// Minimum score to keep a match
    pub score_cutoff: f64,
    /// Compare lowercased text
    pub lowercase: bool,
}

impl Default for FuzzyConfig {
    fn default() -> Self {
        Self {
            scorer: Scorer::PartialRatio,
            score_cutoff: 70.0,
            lowercase: true,
        }
    }
}

/// Ranks documents by similarity of their whole text to the query.
#[derive(Debug, Clone, Default)]
pub struct FuzzyStrategy {
    config: FuzzyConfig,
    docs: DocumentList,
}

impl FuzzyStrategy {
    pub fn new(config: FuzzyConfig) -> Self {
        Self {
            config,
            docs: DocumentList::default(),
        }
    }

    pub fn config(&self) -> &FuzzyConfig {
        &self.config
    }

    fn prepare(&self, text: &str) -> String {
        let text = text.trim();
        if self.config.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        }
    }

    fn score_candidates<'a>(&self, query: &str, candidates: Vec<&'a SearchableDocument>) -> Vec<(f64, &'a SearchableDocument)> {
        let score = |doc: &'a SearchableDocument| {
            let s = self.config.scorer.score(query, &self.prepare(&doc.text_content));
            (s >= self.config.score_cutoff).then_some((s, doc))
        };

        #[cfg(feature = "parallel")]
        {
            candidates.into_par_iter().filter_map(score).collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            candidates.into_iter().filter_map(score).collect()
        }
    }
}

impl SearchStrategy for FuzzyStrategy {
    fn name(&self) -> &'static str {
        "fuzzy"
    }

    fn upsert_document(&mut self, document: SearchableDocument) {
        self.docs.upsert(document);
    }

    fn delete_document(&mut self, chunk_id: &str) {
        self.docs.remove(chunk_id);
    }

    fn clear_index(&mut self) {
        self.docs.clear();
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
        let query = self.prepare(query);
        if query.is_empty() {
            return Vec::new();
        }

        let candidates: Vec<&SearchableDocument> = self.docs.filtered(filter).collect();
        let mut scored = self.score_candidates(&query, candidates);
        // Order preserved by collect, so ties stay in insertion order
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored
            .into_iter()
            .take(limit)
            .map(|(_, doc)| doc.clone())
            .collect()
    }
}
