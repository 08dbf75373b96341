//! Key-value store trait.

use async_trait::async_trait;

use crate::error::StoreError;

/// Trait for store backends the loading workers write into.
///
/// Writes are plain overwrites keyed by device, so delivering the same
/// task twice is harmless.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Store `value` under `key`, replacing whatever was there.
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Address of the backend (used in logs).
    fn address(&self) -> &str;
}
