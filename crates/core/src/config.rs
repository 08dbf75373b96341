use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::MemloadError;
use crate::record::DEVICE_TYPES;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

// ── Defaults ──────────────────────────────────────────────────

pub const DEFAULT_PATTERN: &str = "/var/log/appsinstalled/*.tsv.gz";
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;
pub const DEFAULT_BATCH_SIZE: usize = 0;
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_ERROR_RATE: f64 = 0.1;
pub const DEFAULT_LOG_EVERY: u64 = 100_000;
/// Port of the first device type's store; the rest follow in order.
pub const DEFAULT_FIRST_PORT: u16 = 33013;

// ── Retry ─────────────────────────────────────────────────────

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one fails.
    pub max_retries: u32,
    /// Sleep between consecutive attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Total number of attempts a write gets before it is given up.
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY)
    }
}

// ── Top-level config ──────────────────────────────────────────

/// Runtime configuration. Built once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct Config {
    /// Glob-style pattern selecting the input files.
    pub pattern: String,
    /// Device type → store address. One loading worker per entry.
    pub stores: BTreeMap<String, String>,
    /// Tasks per batch before a flush. `0` flushes every task.
    pub batch_size: usize,
    /// Batches buffered per destination. `0` makes every hand-off a rendezvous.
    pub queue_capacity: usize,
    pub write_timeout: Duration,
    pub retry: RetryPolicy,
    /// Runs at or above this error rate are not committed.
    pub max_error_rate: f64,
    /// Progress log interval in lines/messages. `0` disables progress logs.
    pub log_every: u64,
    /// Stop reading a source after this many lines. `0` means no limit.
    pub max_lines: u64,
}

impl Default for Config {
    fn default() -> Self {
        // idfa, gaid, adid, dvid on consecutive local ports.
        let stores = DEVICE_TYPES
            .iter()
            .zip(DEFAULT_FIRST_PORT..)
            .map(|(t, port)| (t.to_string(), format!("127.0.0.1:{port}")))
            .collect();

        Self {
            pattern: DEFAULT_PATTERN.to_string(),
            stores,
            batch_size: DEFAULT_BATCH_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            retry: RetryPolicy::default(),
            max_error_rate: DEFAULT_MAX_ERROR_RATE,
            log_every: DEFAULT_LOG_EVERY,
            max_lines: 0,
        }
    }
}

impl Config {
    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), MemloadError> {
        if self.pattern.trim().is_empty() {
            return Err(MemloadError::Config("source pattern is empty".into()));
        }
        if self.stores.is_empty() {
            return Err(MemloadError::Config("no store destinations configured".into()));
        }
        if let Some((dev_type, _)) = self.stores.iter().find(|(t, a)| t.is_empty() || a.is_empty()) {
            return Err(MemloadError::Config(format!(
                "destination '{}' has an empty device type or address",
                dev_type
            )));
        }
        if self.write_timeout.is_zero() {
            return Err(MemloadError::Config("write timeout must be greater than zero".into()));
        }
        if !(self.max_error_rate > 0.0 && self.max_error_rate <= 1.0) {
            return Err(MemloadError::Config(format!(
                "max error rate must be in (0, 1], got {}",
                self.max_error_rate
            )));
        }
        Ok(())
    }

    /// Print a one-line summary for startup logs.
    pub fn log_summary(&self) {
        let stores = self
            .stores
            .iter()
            .map(|(t, a)| format!("{}={}", t, a))
            .collect::<Vec<_>>()
            .join(", ");
        tracing::info!(
            "Run with options: pattern = {}, {}, batch_size = {}, queue_capacity = {}, timeout = {:?}, retries = {}, retry_delay = {:?}",
            self.pattern,
            stores,
            self.batch_size,
            self.queue_capacity,
            self.write_timeout,
            self.retry.max_retries,
            self.retry.delay,
        );
    }
}
