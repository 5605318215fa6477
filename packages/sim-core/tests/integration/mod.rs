//! Integration tests for the store, schemas and persistence working together.

pub mod helpers;
pub mod persistence_tests;
pub mod store_tests;
