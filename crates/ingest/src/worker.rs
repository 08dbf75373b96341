//! Ingestion worker: one per source file.
//!
//! Streams lines through parse → encode → per-destination batching and
//! hands full batches to the delivery queues. Runs on a blocking thread
//! because gzip decoding and queue back-pressure both block.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use memload_core::{Config, MemloadError};
use memload_queue::{BatchAccumulator, Routes};

use crate::encoder::encode;
use crate::parser::parse_line;
use crate::source::{open_lines, SourceError};

/// Per-source tuning, lifted from [`Config`].
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub batch_size: usize,
    pub log_every: u64,
    pub max_lines: u64,
}

impl From<&Config> for IngestSettings {
    fn from(config: &Config) -> Self {
        Self {
            batch_size: config.batch_size,
            log_every: config.log_every,
            max_lines: config.max_lines,
        }
    }
}

/// Counters for one source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceStats {
    /// Lines read.
    pub lines: u64,
    /// Lines that did not produce a task.
    pub rejected: u64,
    /// Tasks handed to the accumulator.
    pub tasks: u64,
}

/// How a source ended.
#[derive(Debug)]
pub enum SourceOutcome {
    /// Read to the end (or to the line limit) and fully flushed.
    Completed { path: PathBuf, stats: SourceStats },
    /// Aborted part-way; `stats` covers what was read before the failure.
    Failed {
        path: PathBuf,
        stats: SourceStats,
        error: SourceError,
    },
}

impl SourceOutcome {
    pub fn path(&self) -> &Path {
        match self {
            SourceOutcome::Completed { path, .. } | SourceOutcome::Failed { path, .. } => path,
        }
    }

    pub fn stats(&self) -> SourceStats {
        match self {
            SourceOutcome::Completed { stats, .. } | SourceOutcome::Failed { stats, .. } => *stats,
        }
    }
}

/// Process one source to completion.
///
/// Source-level problems are reported as [`SourceOutcome::Failed`]; any
/// unflushed batches are dropped in that case. `Err` is reserved for
/// payload encoding failures, which abort the whole run.
pub fn ingest_source(
    path: &Path,
    routes: Arc<Routes>,
    settings: &IngestSettings,
) -> Result<SourceOutcome, MemloadError> {
    info!(source = %path.display(), "begin reading source");

    let mut stats = SourceStats::default();
    let failed = |stats: SourceStats, error: SourceError| -> Result<SourceOutcome, MemloadError> {
        warn!(source = %path.display(), error = %error, lines = stats.lines, "source aborted");
        Ok(SourceOutcome::Failed {
            path: path.to_path_buf(),
            stats,
            error,
        })
    };

    let lines = match open_lines(path) {
        Ok(lines) => lines,
        Err(error) => return failed(stats, error),
    };
    let mut batches = BatchAccumulator::new(Arc::clone(&routes), settings.batch_size);

    for line in lines {
        if settings.max_lines != 0 && stats.lines >= settings.max_lines {
            debug!(source = %path.display(), max_lines = settings.max_lines, "line limit reached");
            break;
        }

        let line = match line {
            Ok(line) => line,
            Err(source) => {
                let error = SourceError::Read {
                    path: path.to_path_buf(),
                    line: stats.lines + 1,
                    source,
                };
                return failed(stats, error);
            }
        };
        stats.lines += 1;

        if settings.log_every != 0 && stats.lines % settings.log_every == 0 {
            info!(source = %path.display(), "{} lines processed", stats.lines);
        }

        let record = match parse_line(&line) {
            Ok(record) => record,
            Err(_) => {
                stats.rejected += 1;
                continue;
            }
        };
        if !routes.contains(&record.dev_type) {
            debug!(dev_type = %record.dev_type, "no destination for device type");
            stats.rejected += 1;
            continue;
        }

        let task = encode(&record)?;
        if let Err(e) = batches.append(&record.dev_type, task) {
            return failed(stats, e.into());
        }
        stats.tasks += 1;
    }

    if let Err(e) = batches.flush_all() {
        return failed(stats, e.into());
    }

    info!(
        source = %path.display(),
        lines = stats.lines,
        rejected = stats.rejected,
        batches = batches.flushed_batches(),
        "end reading source"
    );
    Ok(SourceOutcome::Completed {
        path: path.to_path_buf(),
        stats,
    })
}
