//! Turns store records into searchable documents.
//!
//! A [`RecordAdapter`] names the collection, the text paths and the metadata
//! paths of one record type. `sync_from_store` re-runs it to rebuild an index.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sim_core::{SimError, Store};

use super::SearchableDocument;
use crate::filter::get_path;

/// Describes how records of one collection become searchable documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordAdapter {
    /// Store collection to index
    pub collection: String,
    /// Dotted paths joined with a space to form the document text
    pub text_fields: Vec<String>,
    /// Dotted paths copied into document metadata under the same name
    #[serde(default)]
    pub metadata_fields: Vec<String>,
}

impl RecordAdapter {
    pub fn new<I, S>(collection: impl Into<String>, text_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            collection: collection.into(),
            text_fields: text_fields.into_iter().map(Into::into).collect(),
            metadata_fields: Vec::new(),
        }
    }

    pub fn metadata_field(mut self, field: impl Into<String>) -> Self {
        self.metadata_fields.push(field.into());
        self
    }

    /// Text of `record`: string fields as-is, other scalars rendered, absent skipped.
    pub fn text_of(&self, record: &Value) -> String {
        self.text_fields
            .iter()
            .filter_map(|field| match get_path(record, field)? {
                Value::Null => None,
                Value::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Builds one document for a record.
    pub fn to_document(&self, chunk_id: impl Into<String>, record: &Value) -> SearchableDocument {
        let metadata: Map<String, Value> = self
            .metadata_fields
            .iter()
            .filter_map(|field| Some((field.clone(), get_path(record, field)?.clone())))
            .collect();
        let mut doc = SearchableDocument::new(chunk_id, self.text_of(record), record.clone());
        doc.metadata = metadata;
        doc
    }

    /// Documents for every record in the collection.
    ///
    /// Chunk ids are the record ids; sequence records without an id fall
    /// back to their position.
    pub fn to_documents(&self, store: &Store) -> Result<Vec<SearchableDocument>, SimError> {
        let spec = store.spec(&self.collection)?;
        let container = store
            .get_setting(&self.collection)?
            .ok_or_else(|| SimError::CollectionNotFound(self.collection.clone()))?;

        let documents = match &container {
            Value::Object(map) => map
                .iter()
                .map(|(id, record)| self.to_document(id.as_str(), record))
                .collect(),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, record)| {
                    let id = match record.get(&spec.id_field) {
                        Some(Value::String(s)) => s.clone(),
                        Some(Value::Number(n)) => n.to_string(),
                        _ => i.to_string(),
                    };
                    self.to_document(id, record)
                })
                .collect(),
            _ => return Err(SimError::CollectionNotFound(self.collection.clone())),
        };
        Ok(documents)
    }
}
