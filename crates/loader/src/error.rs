//! Store error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("timeout after {0}ms")]
    Timeout(u64),

    #[error("value not stored: {0}")]
    NotStored(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),
}

impl StoreError {
    /// Whether another attempt at the same write could succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, StoreError::InvalidKey(_))
    }
}
