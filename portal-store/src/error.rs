//! Storage Error Types

use thiserror::Error;

/// Errors from the vault, index and audit log
#[derive(Debug, Error)]
pub enum StoreError {
    /// No such file or record
    #[error("Not found: {0}")]
    NotFound(String),

    /// Target name already occupied
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Index (de)serialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Domain validation failure
    #[error(transparent)]
    Core(#[from] portal_core::CoreError),
}

/// Storage result type
pub type StoreResult<T> = Result<T, StoreError>;
