//! Error types for collector-core
//!
//! Each stage of a pipeline run has its own error type so callers can tell a
//! malformed file from a failing source or a broken sink. [`Error`] wraps the
//! ones that can surface while loading a configuration.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for collector-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading a configuration
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be found
    #[error("configuration file not found: {path}")]
    ConfigNotFound {
        /// Path that was searched
        path: String,
    },

    /// Configuration text is malformed
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A top-level line that could not be parsed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {message}: `{text}`")]
pub struct ParseError {
    /// 1-based line number
    pub line: usize,
    /// The offending line, trimmed
    pub text: String,
    /// What was expected
    pub message: String,
}

impl ParseError {
    pub(crate) fn new(line: usize, text: &str, message: impl Into<String>) -> Self {
        Self {
            line,
            text: text.trim().to_string(),
            message: message.into(),
        }
    }
}

/// Every semantic violation found in a configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("configuration has {} error(s): {}", .errors.len(), .errors.join("; "))]
pub struct ConfigValidationError {
    /// Human-readable violations, in the order they were found
    pub errors: Vec<String>,
}

/// A source connector could not be constructed
#[derive(Error, Debug)]
pub enum ConnectorInitError {
    /// No factory is registered for the source type
    #[error("source '{source_name}': no connector registered for type '{type_tag}'")]
    UnknownType {
        /// Declared source name
        source_name: String,
        /// Declared type tag
        type_tag: String,
    },

    /// A detail the connector needs is absent
    #[error("source '{source_name}': missing required detail '{key}'")]
    MissingDetail {
        /// Declared source name
        source_name: String,
        /// Detail key (lowercase)
        key: String,
    },

    /// A detail is present but unusable
    #[error("source '{source_name}': {message}")]
    Invalid {
        /// Declared source name
        source_name: String,
        /// Description of the problem
        message: String,
    },
}

/// A fetch-time failure, isolated to one source
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// IO error while reading the source
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV decoding failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The source returned data that is not a sequence of records
    #[error("malformed data: {0}")]
    Malformed(String),

    /// The fetch did not finish in time
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    /// Any other connector-specific failure
    #[error("{0}")]
    Fetch(String),
}

/// An output writer could not be constructed or failed to write
#[derive(Error, Debug)]
pub enum OutputError {
    /// No writer is registered for the output type
    #[error("unsupported output type '{0}'")]
    UnsupportedType(String),

    /// The configuration has no OUTPUT block
    #[error("configuration declares no output")]
    MissingOutput,

    /// The output spec is unusable
    #[error("invalid output '{name}': {message}")]
    Invalid {
        /// Output name
        name: String,
        /// Description of the problem
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding failed
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON encoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML encoding failed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Any other writer-specific failure
    #[error("{0}")]
    Write(String),
}

/// A per-field conversion failure.
///
/// Never returned as an error: the engine logs it and keeps the existing
/// value of the target field.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot convert field '{source_field}' ({value}) to {kind} for '{target}': {reason}")]
pub struct TransformationWarning {
    /// Field written by the transform
    pub target: String,
    /// Field the value was read from
    pub source_field: String,
    /// Requested kind
    pub kind: String,
    /// The value that failed to convert
    pub value: serde_json::Value,
    /// Why the conversion failed
    pub reason: String,
}
