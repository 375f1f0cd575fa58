//! Integration tests for the configuration-to-records path
//!
//! Tests use temporary directories with real file fixtures to verify:
//! - Loading and validating a `.col` file
//! - Building connectors and writers from the registries
//! - Applying transforms to fetched records

use collector_core::{
    apply_transforms, validate, Configuration, ConnectorInitError, ConnectorRegistry, Error,
    OutputRegistry, OutputWriter, SourceConnector,
};
use serde_json::json;
use tempfile::TempDir;

fn write_fixture(dir: &TempDir, name: &str, contents: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path.to_str().unwrap().to_string()
}

fn pipeline_text(csv_path: &str, json_path: &str, out_path: &str) -> String {
    format!(
        r#"
# Nightly sales rollup
VERSION 1.0

SOURCE store_sales TYPE csv
  FILE_PATH "{csv_path}"

SOURCE web_sales TYPE json
  FILE_PATH "{json_path}"

TRANSFORM amount_usd FROM amount
  TYPE float

TRANSFORM region FROM region
  DEFAULT "unknown"

TRANSFORM sold_on FROM date
  TYPE date "%d/%m/%Y"

OUTPUT rollup TYPE jsonl
  PATH "{out_path}"
"#
    )
}

// =============================================================================
// Complete Pipeline Tests
// =============================================================================

#[tokio::test]
async fn test_load_validate_fetch_transform() {
    let dir = TempDir::new().unwrap();
    let csv_path = write_fixture(
        &dir,
        "store.csv",
        "id,amount,region,date\n1,10,north,01/02/2024\n2,12.5,,15/03/2024\n",
    );
    let json_path = write_fixture(
        &dir,
        "web.json",
        r#"[{"id": 3, "amount": "7.25", "date": "31/12/2023"}]"#,
    );
    let out_path = dir.path().join("out/rollup.jsonl");
    let col_path = write_fixture(
        &dir,
        "sales.col",
        &pipeline_text(&csv_path, &json_path, out_path.to_str().unwrap()),
    );

    let config = Configuration::load(&col_path).unwrap();
    validate(&config).unwrap();
    assert_eq!(config.sources.len(), 2);
    assert_eq!(config.transforms.len(), 3);

    let registry = ConnectorRegistry::with_builtins();
    let mut records = Vec::new();
    for source in &config.sources {
        let connector = registry.create(source).unwrap();
        records.extend(connector.fetch().await.unwrap());
    }
    assert_eq!(records.len(), 3);

    let transformed = apply_transforms(&records, &config.transforms);
    assert_eq!(transformed.len(), 3);

    assert_eq!(transformed[0]["amount_usd"], json!(10.0));
    assert_eq!(transformed[0]["region"], "north");
    assert_eq!(transformed[0]["sold_on"], "2024-02-01");

    // An empty CSV cell is null, which counts as present
    assert_eq!(transformed[1]["region"], json!(null));
    assert_eq!(transformed[1]["sold_on"], "2024-03-15");

    assert_eq!(transformed[2]["amount_usd"], json!(7.25));
    assert_eq!(transformed[2]["region"], "unknown");
    assert_eq!(transformed[2]["sold_on"], "2023-12-31");

    let output = config.output.as_ref().unwrap();
    let writer = OutputRegistry::with_builtins().create(output).unwrap();
    writer.write(&transformed).await.unwrap();

    let written = std::fs::read_to_string(&out_path).unwrap();
    assert_eq!(written.lines().count(), 3);
}

#[test]
fn test_invalid_file_reports_every_error() {
    let dir = TempDir::new().unwrap();
    let col_path = write_fixture(
        &dir,
        "broken.col",
        r#"
VERSION 1
SOURCE db TYPE sql
  HOST "localhost"
SOURCE feed TYPE ftp
"#,
    );

    let config = Configuration::load(&col_path).unwrap();
    let err = validate(&config).unwrap_err();

    // version, five sql fields, unknown type, missing output
    assert_eq!(err.errors.len(), 8, "{:?}", err.errors);
}

#[test]
fn test_missing_file_is_distinct_from_parse_error() {
    let dir = TempDir::new().unwrap();

    let missing = Configuration::load(dir.path().join("absent.col"));
    assert!(matches!(missing, Err(Error::ConfigNotFound { .. })));

    let col_path = write_fixture(&dir, "bad.col", "VERSION 1.0\nSOURCE orphan\n");
    match Configuration::load(&col_path) {
        Err(Error::Parse(e)) => assert_eq!(e.line, 2),
        other => panic!("Expected parse error, got {:?}", other),
    }
}

#[test]
fn test_validated_but_unregistered_source_type() {
    let config: Configuration = r#"
VERSION 1.0
SOURCE events TYPE api
  ENDPOINT "https://example.com/events"
OUTPUT out TYPE json
  PATH "out.json"
"#
    .parse()
    .unwrap();

    validate(&config).unwrap();
    match ConnectorRegistry::with_builtins().create(&config.sources[0]) {
        Err(ConnectorInitError::UnknownType { type_tag, .. }) => assert_eq!(type_tag, "api"),
        _ => panic!("Expected unknown type"),
    }
}
