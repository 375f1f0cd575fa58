//! Run a pipeline end to end

use std::time::Duration;

use anyhow::{Context, Result};
use collector_runtime::{MergeOrder, Orchestrator, RuntimeOptions};

/// Runtime flags collected from the command line
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    /// Per-source fetch timeout in seconds
    pub fetch_timeout: Option<u64>,
    /// Maximum number of concurrent fetches
    pub max_concurrency: Option<usize>,
    /// Merge order of fetched records
    pub merge_order: MergeOrder,
}

impl From<RunArgs> for RuntimeOptions {
    fn from(args: RunArgs) -> Self {
        let mut options = RuntimeOptions::default().with_merge_order(args.merge_order);
        if let Some(secs) = args.fetch_timeout {
            options = options.with_fetch_timeout(Duration::from_secs(secs));
        }
        if let Some(limit) = args.max_concurrency {
            options = options.with_max_concurrent_fetches(limit);
        }
        options
    }
}

/// Run the pipeline described by the configuration file
pub async fn run(config_path: &str, args: RunArgs) -> Result<()> {
    tracing::info!("Loading configuration from {}", config_path);

    let options = RuntimeOptions::from(args);
    tracing::debug!(?options, "runtime options");

    let mut orchestrator = Orchestrator::new(
        options,
        tracing::info_span!("pipeline", config = %config_path),
    );
    let summary = orchestrator
        .run_file(config_path)
        .await
        .context("Pipeline failed")?;

    for source in &summary.sources {
        match &source.error {
            Some(error) => tracing::warn!("✗ {}: {}", source.name, error),
            None => tracing::info!("✓ {}: {} records", source.name, source.records),
        }
    }
    tracing::info!("✓ Wrote {} records", summary.records_written);
    Ok(())
}
