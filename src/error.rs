//! Error types for wdbc

use thiserror::Error;

/// Main error type for wdbc operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("File too small: {actual} bytes, header needs {required}")]
    TooSmall { actual: usize, required: usize },

    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    #[error("Out of bounds: {0}")]
    OutOfBounds(String),

    #[error("Index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Unterminated string at offset {0}")]
    UnterminatedString(usize),

    #[error("Type mismatch in field: {0}")]
    TypeMismatch(String),

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Record {index} has {actual} fields, schema expects {expected}")]
    FieldCountMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Unknown field type: {0}")]
    UnknownFieldType(String),

    #[error("Invalid value for {field_type}: {value}")]
    InvalidValue { field_type: String, value: String },
}

/// Result type alias for wdbc operations
pub type Result<T> = std::result::Result<T, Error>;
