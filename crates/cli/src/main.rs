mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use memload_cli::Driver;

use crate::cli::CliArgs;

#[tokio::main]
async fn main() -> Result<()> {
    memload_core::config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = CliArgs::parse().into_config();
    config.validate().context("invalid configuration")?;
    config.log_summary();

    let report = Driver::new(config)
        .run()
        .await
        .context("load aborted")?;

    // A rejected run still exits cleanly; its sources are retried next time.
    info!(
        sources = report.sources,
        failed_sources = report.failed_sources,
        delivered = report.totals.delivered,
        committed = report.committed.len(),
        accepted = report.decision.is_accepted(),
        "memload finished"
    );
    Ok(())
}
