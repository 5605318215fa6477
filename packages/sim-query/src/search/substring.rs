//! Plain substring containment.

use serde_json::{Map, Value};

use super::{DocumentList, SearchStrategy, SearchableDocument, DEFAULT_SEARCH_LIMIT};

/// Matches documents whose text contains the query.
#[derive(Debug, Clone, Default)]
pub struct SubstringStrategy {
    docs: DocumentList,
    case_sensitive: bool,
}

impl SubstringStrategy {
    pub fn new(case_sensitive: bool) -> Self {
        Self {
            docs: DocumentList::default(),
            case_sensitive,
        }
    }
}

impl SearchStrategy for SubstringStrategy {
    fn name(&self) -> &'static str {
        "substring"
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
        let needle = if self.case_sensitive {
            query.to_string()
        } else {
            query.to_lowercase()
        };
        self.docs
            .filtered(filter)
            .filter(|doc| {
                if self.case_sensitive {
                    doc.text_content.contains(&needle)
                } else {
                    doc.text_content.to_lowercase().contains(&needle)
                }
            })
            .take(limit)
            .cloned()
            .collect()
    }
}
