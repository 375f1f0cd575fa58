//! Configuration model and loading
//!
//! A configuration is read from a `.col` file:
//!
//! ```text
//! VERSION 1.0
//!
//! SOURCE sales TYPE csv
//!   FILE_PATH "data/sales.csv"
//!
//! TRANSFORM unified_amount FROM amount
//!   TYPE float
//!
//! OUTPUT unified TYPE json
//!   PATH "out/unified.json"
//! ```
//!
//! The text is turned into a [`Configuration`] by [`crate::parser`] and checked
//! by [`crate::validator`]. Nothing here is mutated after parsing.

use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, ParseError, Result};
use crate::transforms::TransformSpec;

/// One unit of data: field name to value
pub type Record = serde_json::Map<String, Value>;

/// Detail mapping attached to a source or output.
///
/// Values are strings, integers, or (for `options`) nested mappings.
pub type Details = serde_json::Map<String, Value>;

/// A declared origin of records
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSpec {
    /// Source name (unique within a configuration)
    pub name: String,

    /// Type tag selecting the connector
    #[serde(rename = "type")]
    pub source_type: String,

    /// Connection details, keys lowercased
    pub details: Details,
}

impl SourceSpec {
    /// Create a source with no details
    pub fn new(name: impl Into<String>, source_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_type: source_type.into(),
            details: Details::new(),
        }
    }

    /// Add a detail, lowercasing the key
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_lowercase(), value.into());
        self
    }

    /// Get a detail rendered as a string.
    ///
    /// Integer details are rendered in decimal; nested mappings yield `None`.
    pub fn detail_str(&self, key: &str) -> Option<String> {
        value_as_string(self.details.get(key)?)
    }
}

/// The single sink of a configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputSpec {
    /// Output name
    pub name: String,

    /// Type tag selecting the writer
    #[serde(rename = "type")]
    pub output_type: String,

    /// Output details; `path` is required, `options` is a nested mapping
    pub details: Details,
}

impl OutputSpec {
    /// Create an output with no details
    pub fn new(name: impl Into<String>, output_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output_type: output_type.into(),
            details: Details::new(),
        }
    }

    /// Add a detail, lowercasing the key
    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_lowercase(), value.into());
        self
    }

    /// The destination path, if declared as a string
    pub fn path(&self) -> Option<&str> {
        self.details.get("path").and_then(Value::as_str)
    }

    /// The `OPTIONS { ... }` block, if any
    pub fn options(&self) -> Option<&Details> {
        self.details.get("options").and_then(Value::as_object)
    }

    /// Get an option rendered as a string
    pub fn option_str(&self, key: &str) -> Option<String> {
        value_as_string(self.options()?.get(key)?)
    }
}

fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A parsed configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Configuration {
    /// Version string, expected to look like `X.Y`
    pub version: Option<String>,

    /// Sources in declaration order
    pub sources: Vec<SourceSpec>,

    /// Transforms in declaration order
    pub transforms: Vec<TransformSpec>,

    /// The output sink
    pub output: Option<OutputSpec>,
}

impl Configuration {
    /// Load and parse a configuration file
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let config = Configuration::load("pipelines/sales.col")?;
    /// println!("{} source(s)", config.sources.len());
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let contents = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), bytes = contents.len(), "read configuration");
        Ok(crate::parser::parse(&contents)?)
    }
}

impl FromStr for Configuration {
    type Err = ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        crate::parser::parse(s)
    }
}
