//! Collector CLI
//!
//! Runs a `.col` pipeline from the command line.

use std::process::ExitCode;

use clap::Parser;
use collector_runtime::{MergeOrder, PipelineError};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

/// Collector - configuration-driven ETL runner
#[derive(Parser)]
#[command(name = "collector")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Pipeline configuration file (.col)
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Parse and validate the configuration, then exit
    #[arg(long)]
    validate_only: bool,

    /// Per-source fetch timeout in seconds
    #[arg(long, value_name = "SECS", env = "COLLECTOR_FETCH_TIMEOUT")]
    fetch_timeout: Option<u64>,

    /// Maximum number of sources fetched at once
    #[arg(long, value_name = "N", env = "COLLECTOR_MAX_CONCURRENCY")]
    max_concurrency: Option<usize>,

    /// Order in which fetched records are merged
    #[arg(
        long,
        value_name = "ORDER",
        env = "COLLECTOR_MERGE_ORDER",
        default_value = "completion"
    )]
    merge_order: MergeOrder,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let result = if cli.validate_only {
        commands::validate::run(&cli.config).await
    } else {
        let options = commands::run::RunArgs {
            fetch_timeout: cli.fetch_timeout,
            max_concurrency: cli.max_concurrency,
            merge_order: cli.merge_order,
        };
        commands::run::run(&cli.config, options).await
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let class = err
                .downcast_ref::<PipelineError>()
                .map_or("Error", PipelineError::class);
            eprintln!("{class}: {err:#}");
            ExitCode::FAILURE
        }
    }
}
