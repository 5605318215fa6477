//! Core of the API simulation engine.
//!
//! Provides the explicit in-memory store, record schemas, id generation,
//! datetime handling, configuration and state persistence.

pub mod config;
pub mod datetime;
pub mod error;
pub mod ids;
pub mod persistence;
pub mod schema;
pub mod store;

pub use config::{ErrorMode, SimConfig};
pub use error::{SimError, ValidationErrors, ValidationIssue};
pub use store::Store;
