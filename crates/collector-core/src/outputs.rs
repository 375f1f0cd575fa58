//! Output writer trait, registry and built-in file writers
//!
//! Writers receive the complete transformed record list once per run.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{OutputSpec, Record};
use crate::connectors::parse_delimiter;
use crate::error::OutputError;

/// Trait for output writers (sinks)
#[async_trait]
pub trait OutputWriter: Send + Sync {
    /// Write every record to the sink
    async fn write(&self, records: &[Record]) -> Result<(), OutputError>;
}

/// Builds a writer from the output declaration
pub type WriterFactory =
    Arc<dyn Fn(&OutputSpec) -> Result<Box<dyn OutputWriter>, OutputError> + Send + Sync>;

/// Maps output type tags to writer factories
#[derive(Clone)]
pub struct OutputRegistry {
    factories: HashMap<String, WriterFactory>,
}

impl OutputRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry with the `json`, `jsonl`, `csv` and `yaml` writers
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("json", |spec| {
            Ok(Box::new(FileWriter::from_spec(spec, FileFormat::Json)?) as Box<dyn OutputWriter>)
        });
        registry.register("jsonl", |spec| {
            Ok(Box::new(FileWriter::from_spec(spec, FileFormat::JsonLines)?) as Box<dyn OutputWriter>)
        });
        registry.register("csv", |spec| {
            Ok(Box::new(FileWriter::from_spec(spec, FileFormat::Csv)?) as Box<dyn OutputWriter>)
        });
        registry.register("yaml", |spec| {
            Ok(Box::new(FileWriter::from_spec(spec, FileFormat::Yaml)?) as Box<dyn OutputWriter>)
        });
        registry
    }

    /// Register (or replace) the factory for a type tag
    pub fn register<F>(&mut self, type_tag: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&OutputSpec) -> Result<Box<dyn OutputWriter>, OutputError> + Send + Sync + 'static,
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

    /// Construct the writer for an output
    pub fn create(&self, spec: &OutputSpec) -> Result<Box<dyn OutputWriter>, OutputError> {
        let factory = self
            .factories
            .get(&spec.output_type)
            .ok_or_else(|| OutputError::UnsupportedType(spec.output_type.clone()))?;
        factory(spec)
    }
}

impl Default for OutputRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for OutputRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputRegistry")
            .field("types", &self.types())
            .finish()
    }
}

/// Serialization used by [`FileWriter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// A JSON array
    Json,
    /// One JSON object per line
    JsonLines,
    /// Delimited text with a header row
    Csv,
    /// A YAML sequence
    Yaml,
}

/// Writes records to a local file, creating parent directories
#[derive(Debug, Clone)]
pub struct FileWriter {
    path: PathBuf,
    format: FileFormat,
    compact: bool,
    delimiter: u8,
}

impl FileWriter {
    /// Create a writer with default options
    pub fn new(path: impl AsRef<Path>, format: FileFormat) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            format,
            compact: false,
            delimiter: b',',
        }
    }

    /// Build from `PATH` and the `OPTIONS` block (`compact`, `delimiter`)
    pub fn from_spec(spec: &OutputSpec, format: FileFormat) -> Result<Self, OutputError> {
        let invalid = |message: String| OutputError::Invalid {
            name: spec.name.clone(),
            message,
        };

        let path = spec
            .path()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| invalid("missing path".to_string()))?;
        let mut writer = Self::new(path, format);

        if let Some(compact) = spec.option_str("compact") {
            writer.compact = compact.eq_ignore_ascii_case("true");
        }
        if let Some(raw) = spec.option_str("delimiter") {
            writer.delimiter = parse_delimiter(&raw).ok_or_else(|| {
                invalid(format!("delimiter must be a single ASCII character, got '{raw}'"))
            })?;
        }
        if let Some(compression) = spec.option_str("compression") {
            tracing::warn!(
                output = %spec.name,
                compression = %compression,
                "compression is not supported by file writers, writing uncompressed"
            );
        }
        Ok(writer)
    }

    fn encode(&self, records: &[Record]) -> Result<Vec<u8>, OutputError> {
        match self.format {
            FileFormat::Json if self.compact => Ok(serde_json::to_vec(records)?),
            FileFormat::Json => Ok(serde_json::to_vec_pretty(records)?),
            FileFormat::JsonLines => {
                let mut buf = Vec::new();
                for record in records {
                    serde_json::to_writer(&mut buf, record)?;
                    buf.push(b'\n');
                }
                Ok(buf)
            }
            FileFormat::Csv => encode_csv(records, self.delimiter),
            FileFormat::Yaml => Ok(serde_yaml::to_string(records)?.into_bytes()),
        }
    }
}

fn encode_csv(records: &[Record], delimiter: u8) -> Result<Vec<u8>, OutputError> {
    let columns: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.keys().map(String::as_str))
        .collect();

    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());
    writer.write_record(&columns)?;
    for record in records {
        let row = columns
            .iter()
            .map(|col| cell_text(record.get(*col)))
            .collect::<Result<Vec<_>, _>>()?;
        writer.write_record(&row)?;
    }
    writer
        .into_inner()
        .map_err(|e| OutputError::Write(e.to_string()))
}

fn cell_text(value: Option<&Value>) -> Result<String, serde_json::Error> {
    Ok(match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(nested) => serde_json::to_string(nested)?,
    })
}

#[async_trait]
impl OutputWriter for FileWriter {
    async fn write(&self, records: &[Record]) -> Result<(), OutputError> {
        let bytes = self.encode(records)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, &bytes).await?;
        tracing::info!(
            path = %self.path.display(),
            count = records.len(),
            format = ?self.format,
            "wrote records"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::{CsvSource, JsonSource, SourceConnector};
    use serde_json::json;

    fn records() -> Vec<Record> {
        vec![
            json!({"id": 1, "name": "Alice", "amount": 10.5}),
            json!({"id": 2, "name": "Bob", "active": true}),
            json!({"id": 3, "name": "Carol, Jr.", "amount": 7.25}),
        ]
        .into_iter()
        .map(|v| v.as_object().unwrap().clone())
        .collect()
    }

    fn spec(output_type: &str, path: &Path) -> OutputSpec {
        OutputSpec::new("out", output_type).with_detail("path", path.to_str().unwrap())
    }

    #[test]
    fn test_builtin_types() {
        assert_eq!(
            OutputRegistry::with_builtins().types(),
            vec!["csv", "json", "jsonl", "yaml"]
        );
    }

    #[test]
    fn test_unsupported_type() {
        let registry = OutputRegistry::with_builtins();
        let spec = OutputSpec::new("out", "parquet").with_detail("path", "x.parquet");
        match registry.create(&spec) {
            Err(OutputError::UnsupportedType(t)) => assert_eq!(t, "parquet"),
            _ => panic!("Expected unsupported type"),
        }
    }

    #[test]
    fn test_missing_path() {
        let spec = OutputSpec::new("out", "json");
        assert!(matches!(
            FileWriter::from_spec(&spec, FileFormat::Json),
            Err(OutputError::Invalid { .. })
        ));
    }

    #[test]
    fn test_options_are_applied() {
        let spec = OutputSpec::new("out", "csv")
            .with_detail("path", "out.csv")
            .with_detail("options", json!({"delimiter": "|", "compact": "TRUE"}));
        let writer = FileWriter::from_spec(&spec, FileFormat::Csv).unwrap();
        assert_eq!(writer.delimiter, b'|');
        assert!(writer.compact);
    }

    #[tokio::test]
    async fn test_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.json");

        let writer = OutputRegistry::with_builtins()
            .create(&spec("json", &path))
            .unwrap();
        writer.write(&records()).await.unwrap();

        let read = JsonSource::new(path.to_str().unwrap()).fetch().await.unwrap();
        assert_eq!(read, records());
    }

    #[tokio::test]
    async fn test_jsonl_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jsonl");

        FileWriter::new(&path, FileFormat::JsonLines)
            .write(&records())
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 3);
        let read = JsonSource::new(path.to_str().unwrap()).fetch().await.unwrap();
        assert_eq!(read, records());
    }

    #[tokio::test]
    async fn test_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        FileWriter::new(&path, FileFormat::Csv)
            .write(&records())
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().next().unwrap(), "active,amount,id,name");

        let read = CsvSource::new(path.to_str().unwrap(), b',')
            .fetch()
            .await
            .unwrap();
        assert_eq!(read.len(), 3);
        assert_eq!(read[0]["name"], "Alice");
        assert_eq!(read[0]["amount"], json!(10.5));
        assert_eq!(read[0]["active"], Value::Null);
        assert_eq!(read[1]["active"], "true");
        assert_eq!(read[2]["name"], "Carol, Jr.");
    }

    #[tokio::test]
    async fn test_yaml_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.yaml");

        FileWriter::new(&path, FileFormat::Yaml)
            .write(&records())
            .await
            .unwrap();

        let parsed: Vec<serde_json::Map<String, Value>> =
            serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, records());
    }

    #[tokio::test]
    async fn test_compact_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let spec = spec("json", &path).with_detail("options", json!({"compact": "true"}));

        let writer = FileWriter::from_spec(&spec, FileFormat::Json).unwrap();
        writer.write(&records()).await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_write_to_unwritable_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let writer = FileWriter::new(blocker.join("out.json"), FileFormat::Json);
        assert!(matches!(
            writer.write(&records()).await,
            Err(OutputError::Io(_))
        ));
    }
}
