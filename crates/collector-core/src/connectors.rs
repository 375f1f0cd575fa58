//! Source connector trait, registry and built-in file sources
//!
//! A connector is constructed from a [`SourceSpec`] by the factory registered
//! for its type tag, and fetches the whole source as a list of records.
//! Adding a source type means registering one factory; the orchestrator
//! never matches on type names.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{Record, SourceSpec};
use crate::error::{ConnectorError, ConnectorInitError};

/// Trait for source connectors
#[async_trait]
pub trait SourceConnector: Send + Sync {
    /// Fetch every record from the source
    async fn fetch(&self) -> Result<Vec<Record>, ConnectorError>;
}

/// Builds a connector from its declaration
pub type SourceFactory = Arc<
    dyn Fn(&SourceSpec) -> Result<Box<dyn SourceConnector>, ConnectorInitError> + Send + Sync,
>;

/// Maps source type tags to connector factories
#[derive(Clone)]
pub struct ConnectorRegistry {
    factories: HashMap<String, SourceFactory>,
}

impl ConnectorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry with the built-in `csv` and `json` sources
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("csv", |spec| {
            Ok(Box::new(CsvSource::from_spec(spec)?) as Box<dyn SourceConnector>)
        });
        registry.register("json", |spec| {
            Ok(Box::new(JsonSource::from_spec(spec)?) as Box<dyn SourceConnector>)
        });
        registry
    }

    /// Register (or replace) the factory for a type tag
    pub fn register<F>(&mut self, type_tag: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&SourceSpec) -> Result<Box<dyn SourceConnector>, ConnectorInitError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.insert(type_tag.into(), Arc::new(factory));
        self
    }

    /// Registered type tags, sorted
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Construct the connector for a source
    pub fn create(&self, spec: &SourceSpec) -> Result<Box<dyn SourceConnector>, ConnectorInitError> {
        let factory =
            self.factories
                .get(&spec.source_type)
                .ok_or_else(|| ConnectorInitError::UnknownType {
                    source_name: spec.name.clone(),
                    type_tag: spec.source_type.clone(),
                })?;
        factory(spec)
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("types", &self.types())
            .finish()
    }
}

fn required_detail(spec: &SourceSpec, key: &str) -> Result<String, ConnectorInitError> {
    match spec.detail_str(key) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ConnectorInitError::MissingDetail {
            source_name: spec.name.clone(),
            key: key.to_string(),
        }),
    }
}

// ============================================================================
// CSV source
// ============================================================================

/// Reads a delimited file with a header row
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: String,
    delimiter: u8,
}

impl CsvSource {
    /// Create a CSV source
    pub fn new(path: impl Into<String>, delimiter: u8) -> Self {
        Self {
            path: path.into(),
            delimiter,
        }
    }

    /// Build from `FILE_PATH` and optional `DELIMITER` details
    pub fn from_spec(spec: &SourceSpec) -> Result<Self, ConnectorInitError> {
        let path = required_detail(spec, "file_path")?;
        let delimiter = match spec.detail_str("delimiter") {
            None => b',',
            Some(raw) => parse_delimiter(&raw).ok_or_else(|| ConnectorInitError::Invalid {
                source_name: spec.name.clone(),
                message: format!("delimiter must be a single ASCII character, got '{raw}'"),
            })?,
        };
        Ok(Self::new(path, delimiter))
    }
}

/// Parse a one-character delimiter; `tab` and `\t` mean a tab
pub(crate) fn parse_delimiter(raw: &str) -> Option<u8> {
    match raw {
        "tab" | "\\t" | "\t" => Some(b'\t'),
        s if s.len() == 1 && s.is_ascii() => Some(s.as_bytes()[0]),
        _ => None,
    }
}

/// Infer a cell: integer, then float, empty as null, otherwise string
fn infer_cell(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if !is_plain_number(cell) {
        return Value::String(cell.to_string());
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = cell.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(cell.to_string())
}

/// Leading zeros (`007`) and exponents (`1e5`) mark identifiers, not numbers
fn is_plain_number(cell: &str) -> bool {
    let digits = cell.strip_prefix(['-', '+']).unwrap_or(cell);
    let leading_zero = digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.");
    !leading_zero && !digits.contains(['e', 'E'])
}

#[async_trait]
impl SourceConnector for CsvSource {
    async fn fetch(&self) -> Result<Vec<Record>, ConnectorError> {
        let bytes = tokio::fs::read(&self.path).await?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .trim(csv::Trim::All)
            .from_reader(bytes.as_slice());

        let headers = reader.headers()?.clone();
        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            let record: Record = headers
                .iter()
                .zip(row.iter())
                .map(|(name, cell)| (name.to_string(), infer_cell(cell)))
                .collect();
            records.push(record);
        }
        tracing::debug!(path = %self.path, count = records.len(), "read CSV");
        Ok(records)
    }
}

// ============================================================================
// JSON source
// ============================================================================

/// Reads a JSON array of objects, a single object, or JSON Lines
#[derive(Debug, Clone)]
pub struct JsonSource {
    path: String,
}

impl JsonSource {
    /// Create a JSON source
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Build from the `FILE_PATH` detail
    pub fn from_spec(spec: &SourceSpec) -> Result<Self, ConnectorInitError> {
        Ok(Self::new(required_detail(spec, "file_path")?))
    }
}

fn into_record(value: Value, position: usize) -> Result<Record, ConnectorError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ConnectorError::Malformed(format!(
            "item {position} is not an object: {other}"
        ))),
    }
}

/// Parse JSON text into records
pub(crate) fn parse_json_records(text: &str) -> Result<Vec<Record>, ConnectorError> {
    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        let items: Vec<Value> = serde_json::from_str(trimmed)?;
        return items
            .into_iter()
            .enumerate()
            .map(|(i, v)| into_record(v, i + 1))
            .collect();
    }

    if let Ok(single) = serde_json::from_str::<Value>(trimmed) {
        return Ok(vec![into_record(single, 1)?]);
    }

    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .enumerate()
        .map(|(i, line)| into_record(serde_json::from_str(line)?, i + 1))
        .collect()
}

#[async_trait]
impl SourceConnector for JsonSource {
    async fn fetch(&self) -> Result<Vec<Record>, ConnectorError> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        let records = parse_json_records(&text)?;
        tracing::debug!(path = %self.path, count = records.len(), "read JSON");
        Ok(records)
    }
}
