//! Loading worker: one per destination.
//!
//! Drains the destination's delivery queue and writes every task to the
//! store, retrying each failed write a bounded number of times with a
//! fixed delay. A task that exhausts its attempts is counted and dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use memload_core::{Config, RetryPolicy, Task};
use memload_queue::DeliveryReceiver;

use crate::error::StoreError;
use crate::store::KeyValueStore;

/// Per-destination write tuning, lifted from [`Config`].
#[derive(Debug, Clone)]
pub struct LoaderSettings {
    pub write_timeout: Duration,
    pub retry: RetryPolicy,
    pub log_every: u64,
}

impl From<&Config> for LoaderSettings {
    fn from(config: &Config) -> Self {
        Self {
            write_timeout: config.write_timeout,
            retry: config.retry,
            log_every: config.log_every,
        }
    }
}

/// Totals reported by a loading worker once its queue is closed and drained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationOutcome {
    pub destination: String,
    pub delivered: u64,
    pub failed: u64,
}

impl DestinationOutcome {
    /// Tasks this worker took off its queue.
    pub fn total(&self) -> u64 {
        self.delivered + self.failed
    }
}

/// Consume `rx` until it is closed and empty, writing every task to `store`.
pub async fn run_loader(
    store: Arc<dyn KeyValueStore>,
    mut rx: DeliveryReceiver,
    settings: LoaderSettings,
) -> DestinationOutcome {
    let mut outcome = DestinationOutcome {
        destination: rx.destination().to_string(),
        delivered: 0,
        failed: 0,
    };
    info!(destination = %outcome.destination, address = store.address(), "begin load");

    while let Some(batch) = rx.recv().await {
        for task in batch {
            if deliver(store.as_ref(), &task, &settings).await {
                outcome.delivered += 1;
            } else {
                outcome.failed += 1;
            }

            let n = outcome.total();
            if settings.log_every != 0 && n % settings.log_every == 0 {
                info!(address = store.address(), "{} messages loaded", n);
            }
        }
    }

    info!(
        destination = %outcome.destination,
        address = store.address(),
        delivered = outcome.delivered,
        failed = outcome.failed,
        "end load"
    );
    outcome
}

/// Write one task, retrying on failure. Returns whether it was stored.
async fn deliver(store: &dyn KeyValueStore, task: &Task, settings: &LoaderSettings) -> bool {
    let attempts = settings.retry.attempts();
    for attempt in 1..=attempts {
        let result = match timeout(settings.write_timeout, store.set(&task.key, &task.payload)).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(settings.write_timeout.as_millis() as u64)),
        };

        match result {
            Ok(()) => return true,
            Err(e) if attempt < attempts && e.is_retryable() => {
                warn!(address = store.address(), key = %task.key, attempt, error = %e, "not loaded, retry");
                sleep(settings.retry.delay).await;
            }
            Err(e) => {
                warn!(address = store.address(), key = %task.key, attempt, error = %e, "not loaded, skip");
                return false;
            }
        }
    }
    false
}
