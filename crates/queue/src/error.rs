//! Queue error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("delivery queue for '{0}' is closed")]
    Closed(String),

    #[error("no delivery queue for destination '{0}'")]
    UnknownDestination(String),
}
