//! Runtime error types

use collector_core::{ConfigValidationError, ConnectorInitError, OutputError};
use thiserror::Error;

use crate::engine::Stage;

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// A fatal pipeline error, tagged with the stage that produced it
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The configuration could not be read or parsed
    #[error(transparent)]
    Load(#[from] collector_core::Error),

    /// The configuration failed validation
    #[error(transparent)]
    Validate(#[from] ConfigValidationError),

    /// A source connector could not be constructed
    #[error(transparent)]
    ConnectorInit(#[from] ConnectorInitError),

    /// Every source failed or returned nothing
    #[error("no records fetched from {sources} source(s), {failed} failed")]
    EmptyResult {
        /// Number of sources fetched
        sources: usize,
        /// Number of sources that failed
        failed: usize,
    },

    /// The output could not be written
    #[error(transparent)]
    Output(#[from] OutputError),

    /// A stage was requested before its predecessor completed
    #[error("cannot {action}: pipeline is {actual}, expected {expected}")]
    StageOrder {
        /// Requested operation
        action: &'static str,
        /// Stage the operation requires
        expected: Stage,
        /// Stage the pipeline is in
        actual: Stage,
    },
}

impl PipelineError {
    /// Error class name reported to users
    pub fn class(&self) -> &'static str {
        match self {
            Self::Load(collector_core::Error::ConfigNotFound { .. }) => "ConfigNotFound",
            Self::Load(collector_core::Error::Parse(_)) => "ParseError",
            Self::Validate(_) => "ConfigValidationError",
            Self::Load(collector_core::Error::Io(_)) => "IoError",
            Self::ConnectorInit(_) => "ConnectorInitError",
            Self::EmptyResult { .. } => "PipelineEmptyResultError",
            Self::Output(_) => "OutputError",
            Self::StageOrder { .. } => "StageOrderError",
        }
    }
}
