use thiserror::Error;

/// Errors raised while building function schemas.
#[derive(Error, Debug)]
pub enum FcSpecError {
    /// Function name missing or blank
    #[error("Function name must not be empty")]
    EmptyFunctionName,

    /// Same argument documented twice
    #[error("Parameter '{param}' documented more than once in '{function}'")]
    DuplicateParameter { function: String, param: String },

    /// Reading a docstring file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Rendering the schema failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
