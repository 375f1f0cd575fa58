//! Pipeline orchestrator
//!
//! An [`Orchestrator`] walks a configuration through a fixed sequence of
//! stages. Each stage method checks that its predecessor completed, so a
//! caller driving the stages by hand gets a [`PipelineError::StageOrder`]
//! instead of a half-initialized run.
//!
//! ```text
//! New → Loaded → Validated → ConnectorsReady → Fetched → Transformed → Written
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use collector_core::{
    ConfigValidationError, ConnectorError, ConnectorRegistry, Configuration, OutputError,
    OutputRegistry, Record, SourceConnector, Transformer,
};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{Instrument, Span};

use crate::error::{PipelineError, Result};
use crate::options::{MergeOrder, RuntimeOptions};
use crate::summary::{RunSummary, SourceSummary};

/// Position of a run in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// Nothing loaded yet
    New,
    /// Configuration parsed
    Loaded,
    /// Configuration validated
    Validated,
    /// Source connectors constructed
    ConnectorsReady,
    /// Records fetched and merged
    Fetched,
    /// Records transformed
    Transformed,
    /// Output written
    Written,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::New => "new",
            Self::Loaded => "loaded",
            Self::Validated => "validated",
            Self::ConnectorsReady => "connectors-ready",
            Self::Fetched => "fetched",
            Self::Transformed => "transformed",
            Self::Written => "written",
        };
        f.write_str(name)
    }
}

/// Drives one pipeline run
pub struct Orchestrator {
    connectors: ConnectorRegistry,
    outputs: OutputRegistry,
    options: RuntimeOptions,
    span: Span,
    stage: Stage,
    config: Configuration,
    sources: Vec<(String, Arc<dyn SourceConnector>)>,
    records: Vec<Record>,
    summary: RunSummary,
}

impl Orchestrator {
    /// Create an orchestrator with the built-in registries, logging in `span`
    pub fn new(options: RuntimeOptions, span: Span) -> Self {
        Self {
            connectors: ConnectorRegistry::with_builtins(),
            outputs: OutputRegistry::with_builtins(),
            options,
            span,
            stage: Stage::New,
            config: Configuration::default(),
            sources: Vec::new(),
            records: Vec::new(),
            summary: RunSummary::default(),
        }
    }

    /// Replace the connector registry
    pub fn with_connectors(mut self, registry: ConnectorRegistry) -> Self {
        self.connectors = registry;
        self
    }

    /// Replace the output registry
    pub fn with_outputs(mut self, registry: OutputRegistry) -> Self {
        self.outputs = registry;
        self
    }

    /// Current stage
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The loaded configuration
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Counts collected so far
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    fn expect_stage(&self, action: &'static str, expected: Stage) -> Result<()> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(PipelineError::StageOrder {
                action,
                expected,
                actual: self.stage,
            })
        }
    }

    // =========================================================================
    // Stages
    // =========================================================================

    /// Parse configuration text
    pub fn load_str(&mut self, text: &str) -> Result<()> {
        self.expect_stage("load", Stage::New)?;
        let config = collector_core::parse(text).map_err(collector_core::Error::from)?;
        self.set_config(config);
        Ok(())
    }

    /// Read and parse a configuration file
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.expect_stage("load", Stage::New)?;
        let config = Configuration::load(path.as_ref())?;
        self.set_config(config);
        Ok(())
    }

    fn set_config(&mut self, config: Configuration) {
        let _entered = self.span.enter();
        tracing::info!(
            sources = config.sources.len(),
            transforms = config.transforms.len(),
            "configuration loaded"
        );
        self.config = config;
        self.stage = Stage::Loaded;
    }

    /// Validate the loaded configuration
    pub fn validate(&mut self) -> Result<()> {
        self.expect_stage("validate", Stage::Loaded)?;
        collector_core::validate(&self.config)?;
        self.span.in_scope(|| tracing::info!("✓ configuration is valid"));
        self.stage = Stage::Validated;
        Ok(())
    }

    /// Construct one connector per declared source
    pub fn init_connectors(&mut self) -> Result<()> {
        self.expect_stage("initialize connectors", Stage::Validated)?;

        let mut sources: Vec<(String, Arc<dyn SourceConnector>)> =
            Vec::with_capacity(self.config.sources.len());
        for spec in &self.config.sources {
            let connector = self.connectors.create(spec)?;
            sources.push((spec.name.clone(), Arc::from(connector)));
        }
        if sources.is_empty() {
            return Err(ConfigValidationError {
                errors: vec!["at least one SOURCE is required".to_string()],
            }
            .into());
        }

        self.span
            .in_scope(|| tracing::info!(count = sources.len(), "connectors initialized"));
        self.sources = sources;
        self.stage = Stage::ConnectorsReady;
        Ok(())
    }

    /// Fetch every source concurrently and merge the results
    ///
    /// A source that errors, panics or times out is logged and contributes
    /// no records. The run fails only when the merged result is empty.
    pub async fn fetch(&mut self) -> Result<()> {
        self.expect_stage("fetch", Stage::ConnectorsReady)?;

        let semaphore = self
            .options
            .max_concurrent_fetches
            .map(|limit| Arc::new(Semaphore::new(limit.max(1))));
        let timeout = self.options.fetch_timeout;

        let mut tasks = JoinSet::new();
        let mut task_sources = HashMap::new();
        for (index, (name, connector)) in self.sources.iter().enumerate() {
            let connector = Arc::clone(connector);
            let semaphore = semaphore.clone();
            let span = tracing::info_span!(parent: &self.span, "fetch", source = %name);

            let handle = tasks.spawn(
                async move {
                    let _permit = match semaphore {
                        Some(semaphore) => semaphore.acquire_owned().await.ok(),
                        None => None,
                    };
                    match timeout {
                        Some(limit) => tokio::time::timeout(limit, connector.fetch())
                            .await
                            .unwrap_or(Err(ConnectorError::Timeout(limit))),
                        None => connector.fetch().await,
                    }
                }
                .instrument(span),
            );
            task_sources.insert(handle.id(), index);
        }

        let mut outcomes: Vec<Option<SourceSummary>> = vec![None; self.sources.len()];
        let mut batches: Vec<(usize, Vec<Record>)> = Vec::with_capacity(self.sources.len());

        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, result) = match joined {
                Ok((id, result)) => (id, result),
                Err(e) => (e.id(), Err(ConnectorError::Fetch(format!("task failed: {e}")))),
            };
            let Some(&index) = task_sources.get(&id) else {
                continue;
            };
            let name = self.sources[index].0.clone();

            let summary = match result {
                Ok(records) => {
                    self.span.in_scope(|| {
                        tracing::info!(source = %name, count = records.len(), "fetched records")
                    });
                    let summary = SourceSummary {
                        name,
                        records: records.len(),
                        error: None,
                    };
                    batches.push((index, records));
                    summary
                }
                Err(e) => {
                    self.span.in_scope(|| {
                        tracing::warn!(source = %name, error = %e, "source fetch failed, continuing")
                    });
                    SourceSummary {
                        name,
                        records: 0,
                        error: Some(e.to_string()),
                    }
                }
            };
            outcomes[index] = Some(summary);
        }

        if self.options.merge_order == MergeOrder::Declaration {
            batches.sort_by_key(|(index, _)| *index);
        }
        let records: Vec<Record> = batches.into_iter().flat_map(|(_, batch)| batch).collect();

        self.summary.sources = outcomes.into_iter().flatten().collect();
        self.summary.records_fetched = records.len();

        if records.is_empty() {
            return Err(PipelineError::EmptyResult {
                sources: self.sources.len(),
                failed: self.summary.failed_count(),
            });
        }

        self.records = records;
        self.stage = Stage::Fetched;
        Ok(())
    }

    /// Apply the configured transforms to the fetched records
    pub fn transform(&mut self) -> Result<()> {
        self.expect_stage("transform", Stage::Fetched)?;
        let transformer = Transformer::new(
            self.config.transforms.clone(),
            tracing::info_span!(parent: &self.span, "transform"),
        );
        self.records = transformer.transform(&self.records);
        self.stage = Stage::Transformed;
        Ok(())
    }

    /// Write the transformed records to the configured output
    pub async fn write(&mut self) -> Result<()> {
        self.expect_stage("write", Stage::Transformed)?;
        let output = self.config.output.as_ref().ok_or(OutputError::MissingOutput)?;
        let writer = self.outputs.create(output)?;
        writer
            .write(&self.records)
            .instrument(tracing::info_span!(parent: &self.span, "write", output = %output.name))
            .await?;

        self.summary.records_written = self.records.len();
        self.stage = Stage::Written;
        Ok(())
    }

    // =========================================================================
    // Whole runs
    // =========================================================================

    /// Run every stage on configuration text
    pub async fn run_str(&mut self, text: &str) -> Result<RunSummary> {
        self.load_str(text)?;
        self.run_loaded().await
    }

    /// Run every stage on a configuration file
    pub async fn run_file(&mut self, path: impl AsRef<Path>) -> Result<RunSummary> {
        self.load_file(path)?;
        self.run_loaded().await
    }

    async fn run_loaded(&mut self) -> Result<RunSummary> {
        self.validate()?;
        self.init_connectors()?;
        self.fetch().await?;
        self.transform()?;
        self.write().await?;

        let summary = self.summary.clone();
        self.span.in_scope(|| {
            tracing::info!(
                fetched = summary.records_fetched,
                written = summary.records_written,
                failed_sources = summary.failed_count(),
                "✓ pipeline complete"
            )
        });
        Ok(summary)
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("stage", &self.stage)
            .field("options", &self.options)
            .field("connectors", &self.connectors)
            .field("outputs", &self.outputs)
            .field("records", &self.records.len())
            .finish()
    }
}
