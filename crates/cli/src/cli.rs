use std::collections::BTreeMap;
use std::time::Duration;

use clap::Parser;

use memload_core::config::{
    DEFAULT_BATCH_SIZE, DEFAULT_LOG_EVERY, DEFAULT_MAX_ERROR_RATE, DEFAULT_MAX_RETRIES,
    DEFAULT_PATTERN, DEFAULT_QUEUE_CAPACITY, DEFAULT_RETRY_DELAY, DEFAULT_WRITE_TIMEOUT,
};
use memload_core::{Config, RetryPolicy};

const DEFAULT_TIMEOUT_MS: u64 = DEFAULT_WRITE_TIMEOUT.as_millis() as u64;
const DEFAULT_RETRY_DELAY_MS: u64 = DEFAULT_RETRY_DELAY.as_millis() as u64;

/// Load installed-apps logs into per-device-type memcached instances.
///
/// Every matching gzip log is parsed, encoded and written to the store of
/// its device type. When the run's error rate is acceptable the loaded
/// files are renamed with a leading dot so the next run skips them.
#[derive(Parser, Debug)]
#[command(name = "memload", version, about)]
pub struct CliArgs {
    /// Log file pattern
    #[arg(short = 'p', long, env = "MEMLOAD_PATTERN", default_value = DEFAULT_PATTERN)]
    pub pattern: String,

    /// idfa memcached address
    #[arg(long, env = "MEMLOAD_IDFA", default_value = "127.0.0.1:33013")]
    pub idfa: String,

    /// gaid memcached address
    #[arg(long, env = "MEMLOAD_GAID", default_value = "127.0.0.1:33014")]
    pub gaid: String,

    /// adid memcached address
    #[arg(long, env = "MEMLOAD_ADID", default_value = "127.0.0.1:33015")]
    pub adid: String,

    /// dvid memcached address
    #[arg(long, env = "MEMLOAD_DVID", default_value = "127.0.0.1:33016")]
    pub dvid: String,

    /// Tasks per batch handed to a loader (0 = every task on its own)
    #[arg(short = 'b', long, env = "MEMLOAD_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Batches buffered per destination (0 = synchronous hand-off)
    #[arg(short = 'c', long, env = "MEMLOAD_QUEUE_CAPACITY", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Timeout for a single memcached write, in milliseconds
    #[arg(long, env = "MEMLOAD_TIMEOUT_MS", default_value_t = DEFAULT_TIMEOUT_MS)]
    pub timeout_ms: u64,

    /// Extra attempts for a failed write
    #[arg(long, env = "MEMLOAD_RETRIES", default_value_t = DEFAULT_MAX_RETRIES)]
    pub retries: u32,

    /// Pause between write attempts, in milliseconds
    #[arg(long, env = "MEMLOAD_RETRY_DELAY_MS", default_value_t = DEFAULT_RETRY_DELAY_MS)]
    pub retry_delay_ms: u64,

    /// Error rate at or above which loaded files are not marked
    #[arg(long, env = "MEMLOAD_MAX_ERROR_RATE", default_value_t = DEFAULT_MAX_ERROR_RATE)]
    pub max_error_rate: f64,

    /// Progress log interval in lines/messages (0 = off)
    #[arg(long, env = "MEMLOAD_LOG_EVERY", default_value_t = DEFAULT_LOG_EVERY)]
    pub log_every: u64,

    /// Read at most this many lines per file (0 = all)
    #[arg(long, env = "MEMLOAD_MAX_LINES", default_value_t = 0)]
    pub max_lines: u64,
}

impl CliArgs {
    pub fn into_config(self) -> Config {
        let stores: BTreeMap<String, String> = [
            ("idfa", self.idfa),
            ("gaid", self.gaid),
            ("adid", self.adid),
            ("dvid", self.dvid),
        ]
        .into_iter()
        .map(|(t, a)| (t.to_string(), a))
        .collect();

        Config {
            pattern: self.pattern,
            stores,
            batch_size: self.batch_size,
            queue_capacity: self.queue_capacity,
            write_timeout: Duration::from_millis(self.timeout_ms),
            retry: RetryPolicy::new(self.retries, Duration::from_millis(self.retry_delay_ms)),
            max_error_rate: self.max_error_rate,
            log_every: self.log_every,
            max_lines: self.max_lines,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_onto_config() {
        let args = CliArgs::try_parse_from([
            "memload",
            "-p",
            "/data/logs/*.tsv.gz",
            "--gaid",
            "10.0.0.2:11211",
            "-b",
            "500",
            "-c",
            "0",
            "--retries",
            "2",
            "--retry-delay-ms",
            "250",
        ])
        .unwrap();
        let config = args.into_config();

        assert_eq!(config.pattern, "/data/logs/*.tsv.gz");
        assert_eq!(config.stores["gaid"], "10.0.0.2:11211");
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.queue_capacity, 0);
        assert_eq!(config.retry, RetryPolicy::new(2, Duration::from_millis(250)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn defaults_match_core_config() {
        let config = CliArgs::try_parse_from(["memload"]).unwrap().into_config();
        let core = Config::default();

        assert_eq!(config.write_timeout, core.write_timeout);
        assert_eq!(config.retry, core.retry);
        assert_eq!(config.batch_size, core.batch_size);
        assert_eq!(config.queue_capacity, core.queue_capacity);
        assert_eq!(config.stores, core.stores);
    }

    #[test]
    fn every_device_type_gets_a_store() {
        let config = CliArgs::try_parse_from(["memload"]).unwrap().into_config();
        for dev_type in memload_core::DEVICE_TYPES {
            assert!(config.stores.contains_key(dev_type));
        }
    }
}
