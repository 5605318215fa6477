//! Function-calling schemas generated from Google style docstrings.
//!
//! Simulated API functions document their arguments in docstrings; this
//! crate turns those into the JSON declarations tool-calling clients expect.

pub mod docstring;
pub mod error;
pub mod schema;
pub mod types;

pub use docstring::{parse_docstring, DocParam, DocRaises, DocReturns, Docstring};
pub use error::FcSpecError;
pub use schema::{
    docstring_to_schema, schema_from_docstring, schema_from_file, FunctionSchema, Parameters,
};
pub use types::{map_type, schema_is_nullable};
