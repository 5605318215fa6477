//! Whole-state validation used when loading persisted state.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::RecordSchema;
use crate::error::{SimError, ValidationErrors};

/// Schemas for the collections of a state document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSchema {
    /// Collection name to record schema
    #[serde(default)]
    pub collections: BTreeMap<String, RecordSchema>,
    /// Top-level keys that must be present (scalar settings, singletons)
    #[serde(default)]
    pub required_keys: Vec<String>,
}

impl StateSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a collection schema.
    pub fn collection(mut self, name: impl Into<String>, schema: RecordSchema) -> Self {
        self.collections.insert(name.into(), schema);
        self
    }

    /// Requires a top-level key to exist.
    pub fn require_key(mut self, key: impl Into<String>) -> Self {
        self.required_keys.push(key.into());
        self
    }

    /// Reads a state schema from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, SimError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SimError::Io(format!("Failed to read schema {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            SimError::Serialization(format!("Failed to parse schema {}: {}", path.display(), e))
        })
    }

    /// Validates every record of every listed collection.
    ///
    /// # Arguments
    /// * `state` - Top-level state object
    ///
    /// # Returns
    /// `Err(SimError::Validation)` carrying every issue across the document.
    pub fn validate(&self, state: &Map<String, Value>) -> Result<(), SimError> {
        let mut errors = ValidationErrors::new("state");

        for key in &self.required_keys {
            if !state.contains_key(key) {
                errors.push(key.as_str(), "Field required");
            }
        }

        for (name, schema) in &self.collections {
            match state.get(name) {
                None => errors.push(name.as_str(), "Collection missing"),
                Some(Value::Object(records)) => {
                    for (id, record) in records {
                        schema.collect_issues(record, &format!("{}.{}", name, id), &mut errors);
                    }
                }
                Some(Value::Array(records)) => {
                    for (i, record) in records.iter().enumerate() {
                        schema.collect_issues(record, &format!("{}[{}]", name, i), &mut errors);
                    }
                }
                Some(_) => errors.push(
                    name.as_str(),
                    "Collection should be a dictionary or a list",
                ),
            }
        }

        errors.into_result()
    }
}
