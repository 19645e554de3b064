//! Error types for logingate.

use thiserror::Error;

use crate::auth::{PasswordError, ValidationError};

/// Common error type for logingate.
#[derive(Error, Debug)]
pub enum GateError {
    /// Database error.
    ///
    /// Backend I/O failures are carried through unchanged as text.
    /// Errors from sqlx are converted automatically.
    #[error("database error: {0}")]
    Database(String),

    /// Database connection error.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An account with the same identifier or username already exists.
    #[error("duplicate account: {0}")]
    DuplicateAccount(String),

    /// A stored timestamp string does not match the expected pattern.
    #[error("malformed timestamp: {0:?}")]
    MalformedTimestamp(String),

    /// A stored row cannot be turned into an account.
    #[error("corrupt account record: {0}")]
    CorruptRecord(String),

    /// Password hashing or verification error.
    #[error(transparent)]
    Password(#[from] PasswordError),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

// Conversion from sqlx errors
impl From<sqlx::Error> for GateError {
    fn from(e: sqlx::Error) -> Self {
        GateError::Database(e.to_string())
    }
}

/// Result type alias for logingate operations.
pub type Result<T> = std::result::Result<T, GateError>;
