use thiserror::Error;

use memload_core::MemloadError;
use memload_ingest::SourceError;

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("invalid configuration: {0}")]
    Config(MemloadError),

    #[error("source discovery failed: {0}")]
    Discovery(#[from] SourceError),

    #[error("payload encoding failed: {0}")]
    Encode(MemloadError),

    #[error("worker did not finish: {0}")]
    Join(#[from] tokio::task::JoinError),
}
