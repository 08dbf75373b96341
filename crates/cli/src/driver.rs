//! Run orchestration.
//!
//! One loading worker per destination is started first, each behind its
//! own delivery queue. Then one ingestion worker per source. Once every
//! ingestion worker has finished the queues are closed, the loaders drain
//! and report, and the error budget decides whether the sources that were
//! read cleanly get the processed marker.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use memload_core::Config;
use memload_ingest::{discover, ingest_source, mark_committed, IngestSettings, SourceOutcome};
use memload_loader::{run_loader, KeyValueStore, LoaderSettings, MemcacheStore};
use memload_queue::{delivery_queue, Routes};

use crate::error::DriverError;
use crate::gate::{evaluate, GateDecision, Totals};

/// Builds the store client for `(device_type, address)`.
pub type StoreFactory = dyn Fn(&str, &str) -> Arc<dyn KeyValueStore> + Send + Sync;

/// Summary of one run.
#[derive(Debug)]
pub struct RunReport {
    /// Sources discovered.
    pub sources: usize,
    /// Sources aborted part-way (never committed).
    pub failed_sources: usize,
    pub totals: Totals,
    pub decision: GateDecision,
    /// New paths of the sources that were marked as processed.
    pub committed: Vec<PathBuf>,
    pub elapsed: Duration,
}

pub struct Driver {
    config: Config,
    connect: Box<StoreFactory>,
}

impl Driver {
    /// Driver writing to memcached at the configured addresses.
    pub fn new(config: Config) -> Self {
        Self::with_store_factory(config, |_, addr| {
            Arc::new(MemcacheStore::new(addr)) as Arc<dyn KeyValueStore>
        })
    }

    pub fn with_store_factory<F>(config: Config, connect: F) -> Self
    where
        F: Fn(&str, &str) -> Arc<dyn KeyValueStore> + Send + Sync + 'static,
    {
        Self {
            config,
            connect: Box::new(connect),
        }
    }

    /// Execute one full load.
    ///
    /// A high error rate is reported in the [`RunReport`], not as an error.
    pub async fn run(&self) -> Result<RunReport, DriverError> {
        let started = Instant::now();
        let config = &self.config;
        config.validate().map_err(DriverError::Config)?;

        let sources = discover(&config.pattern)?;
        info!(pattern = %config.pattern, count = sources.len(), "sources discovered");

        // ── Loaders ───────────────────────────────────────────
        let loader_settings = LoaderSettings::from(config);
        let mut loaders = JoinSet::new();
        let mut queues = Vec::with_capacity(config.stores.len());
        for (dev_type, addr) in &config.stores {
            let (queue, rx) = delivery_queue(dev_type.clone(), config.queue_capacity);
            let store = (self.connect)(dev_type.as_str(), addr.as_str());
            loaders.spawn(run_loader(store, rx, loader_settings.clone()));
            queues.push(queue);
        }
        let routes = Arc::new(Routes::new(queues));

        // ── Ingestors ─────────────────────────────────────────
        let ingest_settings = IngestSettings::from(config);
        let mut ingestors = JoinSet::new();
        for path in &sources {
            let path = path.clone();
            let routes = Arc::clone(&routes);
            let settings = ingest_settings.clone();
            ingestors.spawn_blocking(move || ingest_source(&path, routes, &settings));
        }

        let mut totals = Totals::default();
        let mut readable = Vec::with_capacity(sources.len());
        let mut failed_sources = 0;
        while let Some(joined) = ingestors.join_next().await {
            let outcome = joined?.map_err(DriverError::Encode)?;
            let stats = outcome.stats();
            totals.rejected += stats.rejected;
            debug!(
                source = %outcome.path().display(),
                lines = stats.lines,
                rejected = stats.rejected,
                tasks = stats.tasks,
                "source finished"
            );
            match outcome {
                SourceOutcome::Completed { path, .. } => readable.push(path),
                SourceOutcome::Failed { path, error, .. } => {
                    error!(source = %path.display(), error = %error, "source not loaded");
                    failed_sources += 1;
                }
            }
        }

        // Every producer is done; closing lets the loaders drain and stop.
        match Arc::try_unwrap(routes) {
            Ok(routes) => routes.close(),
            Err(routes) => {
                warn!("delivery queues still referenced after ingestion");
                drop(routes);
            }
        }

        while let Some(joined) = loaders.join_next().await {
            let outcome = joined?;
            totals.delivered += outcome.delivered;
            totals.failed += outcome.failed;
        }

        // ── Gate ──────────────────────────────────────────────
        info!("Processed {}, errors {}", totals.processed(), totals.errors());
        let decision = evaluate(totals.processed(), totals.errors(), config.max_error_rate);
        let mut committed = Vec::new();
        match decision {
            GateDecision::NothingProcessed => warn!("Not processed"),
            GateDecision::Accept { error_rate } => {
                for path in &readable {
                    match mark_committed(path) {
                        Ok(marked) => committed.push(marked),
                        Err(e) => warn!(error = %e, "source left unmarked"),
                    }
                }
                info!("Acceptable error rate ({:.4}). Successful load", error_rate);
            }
            GateDecision::Reject { error_rate } => {
                error!(
                    "High error rate ({:.4} >= {}). Failed load",
                    error_rate, config.max_error_rate
                );
            }
        }

        let elapsed = started.elapsed();
        info!("Work time {:?}", elapsed);

        Ok(RunReport {
            sources: sources.len(),
            failed_sources,
            totals,
            decision,
            committed,
            elapsed,
        })
    }
}
