//! Core Error Types

use thiserror::Error;

/// Core domain errors
#[derive(Debug, Error)]
pub enum CoreError {
    /// Unknown role string
    #[error("Unknown role: {0}")]
    InvalidRole(String),

    /// Unknown country code
    #[error("Unknown country: {0}")]
    InvalidCountry(String),

    /// Filename rejected by the allow-list
    #[error("Unsafe or disallowed filename: {0}")]
    InvalidFilename(String),

    /// Malformed audit log line
    #[error("Malformed audit line: {0}")]
    InvalidAuditLine(String),
}

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;
