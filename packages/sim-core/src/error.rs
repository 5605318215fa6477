//! Simulation error types.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Simulation errors surfaced to operation callers.
#[derive(Error, Debug, Clone)]
pub enum SimError {
    /// Record not found
    #[error("{kind} '{id}' not found")]
    NotFound { kind: String, id: String },

    /// Record id already taken
    #[error("{kind} '{id}' already exists")]
    AlreadyExists { kind: String, id: String },

    /// Collection not present in the store
    #[error("Collection '{0}' not found")]
    CollectionNotFound(String),

    /// Record failed schema validation
    #[error("{0}")]
    Validation(ValidationErrors),

    /// Value has the wrong format (dates, resource names, ...)
    #[error("Invalid format for '{field}': {message}")]
    InvalidFormat { field: String, message: String },

    /// Argument rejected before touching the store
    #[error("{0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error during persistence
    #[error("I/O error: {0}")]
    Io(String),

    /// Transient I/O error that may succeed on retry
    #[error("Transient I/O error: {0}")]
    TransientIo(String),

    /// Disk full error during persistence
    #[error("Disk full: {0}")]
    DiskFull(String),

    /// Data corruption detected
    #[error("Data corruption detected: {0}")]
    DataCorruption(String),

    /// Lock poisoned (RwLock poisoned)
    #[error("Lock poisoned")]
    LockPoisoned,

    /// Error injected by the error simulator
    #[error("{message}")]
    Simulated { exception: String, message: String },

    /// Operation not registered
    #[error("Operation '{0}' not found")]
    OperationNotFound(String),
}

impl SimError {
    /// Shorthand for [`SimError::NotFound`].
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        SimError::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Shorthand for [`SimError::InvalidFormat`].
    pub fn invalid_format(field: impl Into<String>, message: impl Into<String>) -> Self {
        SimError::InvalidFormat {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Caller-facing exception name, stable across releases.
    ///
    /// This is the `exceptionType` reported in error dicts.
    pub fn exception_type(&self) -> &str {
        match self {
            SimError::NotFound { .. } => "NotFoundError",
            SimError::AlreadyExists { .. } => "AlreadyExistsError",
            SimError::CollectionNotFound(_) => "CollectionNotFoundError",
            SimError::Validation(_) => "ValidationError",
            SimError::InvalidFormat { .. } => "InvalidFormatError",
            SimError::InvalidInput(_) => "InvalidInputError",
            SimError::Serialization(_) => "SerializationError",
            SimError::Io(_) | SimError::TransientIo(_) | SimError::DiskFull(_) => "IOError",
            SimError::DataCorruption(_) => "DataCorruptionError",
            SimError::LockPoisoned => "LockPoisonedError",
            SimError::Simulated { exception, .. } => exception,
            SimError::OperationNotFound(_) => "OperationNotFoundError",
        }
    }
}

impl From<serde_json::Error> for SimError {
    fn from(e: serde_json::Error) -> Self {
        SimError::Serialization(e.to_string())
    }
}

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Dotted path to the offending value (`sender.name`, `tags[2]`)
    pub path: String,
    /// Human readable description
    pub message: String,
}

/// All issues found while validating one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    /// Context label, usually the collection name
    pub context: String,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationErrors {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            issues: Vec::new(),
        }
    }

    pub fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Converts into `Ok(())` when no issues were collected.
    pub fn into_result(self) -> Result<(), SimError> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(SimError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.issues.len() == 1 {
            "error"
        } else {
            "errors"
        };
        write!(
            f,
            "{} validation {} for {}",
            self.issues.len(),
            noun,
            self.context
        )?;
        for issue in &self.issues {
            let path = if issue.path.is_empty() {
                "<root>"
            } else {
                issue.path.as_str()
            };
            write!(f, "\n  {}: {}", path, issue.message)?;
        }
        Ok(())
    }
}
