//! Error types for the data-loader crate.
//!
//! Every `RatingStore` operation reports failures through `StoreError`, so
//! callers can tell a broken store apart from data that is merely missing
//! (missing data is never an error in this crate).

use thiserror::Error;

/// Errors raised while loading or querying the rating store
#[derive(Error, Debug)]
pub enum StoreError {
    /// File could not be found or opened
    #[error("Failed to open file: {path}")]
    FileNotFound { path: String },

    /// I/O error occurred while reading file
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Line in data file couldn't be parsed
    #[error("Parse error at line {line} in {file}: {reason}")]
    ParseError {
        file: String,
        line: usize,
        reason: String,
    },

    /// A data field had an invalid value
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Referenced entity doesn't exist (e.g., rating for non-existent movie)
    #[error("Missing reference: {entity} with id {id}")]
    MissingReference { entity: String, id: u32 },

    /// Data validation failed
    #[error("Validation failed: {0}")]
    ValidationError(String),

    /// A thread panicked while holding the store lock
    #[error("Store lock poisoned")]
    LockPoisoned,

    /// The backing store could not serve the request
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, StoreError>;
