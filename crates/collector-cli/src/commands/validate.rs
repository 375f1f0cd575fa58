//! Validate configuration command

use anyhow::{Context, Result};
use collector_runtime::{Orchestrator, RuntimeOptions};

/// Run the validate command
pub async fn run(config_path: &str) -> Result<()> {
    tracing::info!("Validating configuration: {}", config_path);

    let mut orchestrator = Orchestrator::new(
        RuntimeOptions::default(),
        tracing::info_span!("validate", config = %config_path),
    );
    orchestrator
        .load_file(config_path)
        .context("Failed to load configuration")?;
    orchestrator
        .validate()
        .context("Configuration is invalid")?;

    let config = orchestrator.config();
    tracing::debug!(
        "parsed configuration: {}",
        serde_json::to_string(config).context("Failed to render configuration")?
    );
    tracing::info!("✓ Version: {}", config.version.as_deref().unwrap_or_default());
    for source in &config.sources {
        tracing::info!("✓ Source: {} ({})", source.name, source.source_type);
    }
    tracing::info!("✓ Transforms: {}", config.transforms.len());
    if let Some(output) = &config.output {
        tracing::info!("✓ Output: {} ({})", output.name, output.output_type);
    }

    tracing::info!("✓ Configuration is valid");
    Ok(())
}
