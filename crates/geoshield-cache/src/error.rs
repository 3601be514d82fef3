//! Cache-specific error types.

use geoshield_core::{AppError, DatabaseError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Failed to serialize response: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row could not be turned back into a response.
    #[error("Corrupt cache entry {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Invalid key pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

impl CacheError {
    pub(crate) fn corrupt(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::Corrupt {
            key: key.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<CacheError> for DatabaseError {
    fn from(err: CacheError) -> Self {
        match &err {
            CacheError::Database(rusqlite::Error::SqliteFailure(_, Some(msg)))
                if msg.contains("corrupt") =>
            {
                DatabaseError::Corruption(err.to_string())
            }
            CacheError::Corrupt { .. } => DatabaseError::Corruption(err.to_string()),
            CacheError::Io(_) => DatabaseError::ConnectionFailed(err.to_string()),
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        AppError::Database(err.into())
    }
}
