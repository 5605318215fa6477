//! Record schemas and validation.
//!
//! A [`RecordSchema`] describes the fields a stored record may carry and the
//! field-level constraints on them. Validation collects every issue in a
//! document rather than stopping at the first one.

mod field;
mod state_schema;
mod validation;


use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SimError, ValidationErrors};

pub use field::{Constraints, FieldKind, FieldRule};
pub use state_schema::StateSchema;

/// Schema for one kind of record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSchema {
    /// Field rules, checked in order
    #[serde(default)]
    pub fields: Vec<FieldRule>,
    /// Accept fields with no rule
    #[serde(default = "default_allow_unknown")]
    pub allow_unknown: bool,
}

fn default_allow_unknown() -> bool {
    true
}

impl RecordSchema {
    /// Creates an empty schema that accepts unknown fields.
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            allow_unknown: true,
        }
    }

    /// Adds a field rule.
    pub fn field(mut self, rule: FieldRule) -> Self {
        self.fields.push(rule);
        self
    }

    /// Rejects fields that have no rule.
    pub fn strict(mut self) -> Self {
        self.allow_unknown = false;
        self
    }

    /// Looks up a rule by field name.
    pub fn rule(&self, name: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validates a record, labelling issues with `context`.
    ///
    /// # Returns
    /// `Err(SimError::Validation)` carrying every issue found.
    pub fn validate(&self, context: &str, record: &Value) -> Result<(), SimError> {
        let mut errors = ValidationErrors::new(context);
        validation::validate_record(self, record, "", &mut errors);
        errors.into_result()
    }

    /// Validates a record, appending issues to an existing collector.
    pub fn collect_issues(&self, record: &Value, path: &str, errors: &mut ValidationErrors) {
        validation::validate_record(self, record, path, errors);
    }
}
