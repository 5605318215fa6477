//! Field rule definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RecordSchema;
use crate::datetime::DateTimeFormat;

/// Expected JSON shape of a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    /// Nested record
    Object { schema: RecordSchema },
    /// Homogeneous list
    Array { items: Box<FieldKind> },
    /// Timestamp string in the family of `format`
    DateTime {
        #[serde(default)]
        format: DateTimeFormat,
    },
    Any,
}

impl FieldKind {
    /// Name used in "Input should be a valid ..." messages.
    pub fn describe(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Integer => "integer",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Object { .. } => "dictionary",
            FieldKind::Array { .. } => "list",
            FieldKind::DateTime { .. } => "datetime",
            FieldKind::Any => "value",
        }
    }
}

/// Field-level constraints. Unset members are not checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    /// Minimum string length in characters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    /// Maximum string length in characters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Inclusive numeric lower bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// Inclusive numeric upper bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Allowed values (enum membership)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<Value>,
    /// Regex that must match somewhere in the string; anchor it for a full match
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
}

/// Validation rule for a single record field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Field name
    pub name: String,
    /// Expected kind
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub constraints: Constraints,
}

impl FieldRule {
    /// Creates an optional, non-nullable rule with no constraints.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            nullable: false,
            constraints: Constraints::default(),
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Number)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub fn datetime(name: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::DateTime {
                format: DateTimeFormat::default(),
            },
        )
    }

    pub fn object(name: impl Into<String>, schema: RecordSchema) -> Self {
        Self::new(name, FieldKind::Object { schema })
    }

    pub fn array(name: impl Into<String>, items: FieldKind) -> Self {
        Self::new(
            name,
            FieldKind::Array {
                items: Box::new(items),
            },
        )
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn min_length(mut self, n: usize) -> Self {
        self.constraints.min_length = Some(n);
        self
    }

    pub fn max_length(mut self, n: usize) -> Self {
        self.constraints.max_length = Some(n);
        self
    }

    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.constraints.min = min;
        self.constraints.max = max;
        self
    }

    /// Restricts the field to the given values.
    pub fn one_of<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.constraints.one_of = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.constraints.pattern = Some(pattern.into());
        self
    }

    pub fn items(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.constraints.min_items = min;
        self.constraints.max_items = max;
        self
    }
}
