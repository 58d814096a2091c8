//! Storage error types.

use d2q_core::CoreError;

/// Storage operation errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A data file exists but does not hold what it should
    #[error("Corrupt data file {path}: {reason}")]
    Corrupt { path: String, reason: String },

    /// Records could not be serialized
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Record lookup failed
    #[error("{0} not found")]
    NotFound(String),

    /// A bank with this name already exists
    #[error("Question bank name already exists: {0}")]
    DuplicateName(String),

    /// A path points outside the upload directory or is otherwise unusable
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Domain validation failed
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type alias for storage operations
pub type StoreResult<T> = Result<T, StoreError>;
