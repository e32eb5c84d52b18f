//! Database Error Types

use thiserror::Error;

/// Errors from the account and invite store
#[derive(Debug, Error)]
pub enum DbError {
    /// Underlying SQLite failure
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Password hashing or verification failure
    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    /// Username already taken
    #[error("User already exists: {0}")]
    UserExists(String),

    /// No such account
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// The change would leave no active superuser
    #[error("Cannot remove the last active superuser")]
    LastActiveSuper,

    /// No such invite code
    #[error("Invite not found: {0}")]
    InviteNotFound(String),

    /// Invite code already consumed
    #[error("Invite already used: {0}")]
    InviteUsed(String),

    /// Stored value failed domain validation
    #[error(transparent)]
    Core(#[from] portal_core::CoreError),
}

/// Database result type
pub type DbResult<T> = Result<T, DbError>;
