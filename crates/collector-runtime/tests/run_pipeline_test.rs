//! End-to-end runs against the built-in connectors and writers

use collector_runtime::{MergeOrder, Orchestrator, PipelineError, RuntimeOptions, Stage};
use serde_json::{json, Value};
use tempfile::TempDir;
use tracing::Span;

fn fixture(dir: &TempDir, name: &str, contents: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path.to_str().unwrap().to_string()
}

#[tokio::test]
async fn test_csv_and_json_sources_to_json_output() {
    let dir = TempDir::new().unwrap();
    let orders = fixture(&dir, "orders.csv", "id;amount\n1;100.50\n2;3\n");
    let refunds = fixture(
        &dir,
        "refunds.jsonl",
        "{\"id\": 9, \"amount\": \"-4\", \"sale_date\": \"2023-09-17\"}\n",
    );
    let missing = dir.path().join("missing.csv");
    let out = dir.path().join("reports/combined.json");

    let config = format!(
        r#"
VERSION 1.0
SOURCE orders TYPE csv
  FILE_PATH "{orders}"
  DELIMITER ";"
SOURCE refunds TYPE json
  FILE_PATH "{refunds}"
SOURCE archive TYPE csv
  FILE_PATH "{missing}"
TRANSFORM unified_amount FROM amount
  TYPE float
TRANSFORM date FROM sale_date
  RENAME
OUTPUT combined TYPE json
  PATH "{out}"
  OPTIONS {{
    COMPACT "true"
  }}
"#,
        missing = missing.display(),
        out = out.display(),
    );
    let config_path = fixture(&dir, "pipeline.col", &config);

    let options = RuntimeOptions::default().with_merge_order(MergeOrder::Declaration);
    let mut orch = Orchestrator::new(options, Span::none());
    let summary = orch.run_file(&config_path).await.unwrap();

    assert_eq!(orch.stage(), Stage::Written);
    assert_eq!(summary.records_fetched, 3);
    assert_eq!(summary.records_written, 3);
    assert_eq!(summary.failed_count(), 1);
    assert_eq!(summary.failed_sources().next().unwrap().name, "archive");

    let text = std::fs::read_to_string(&out).unwrap();
    assert_eq!(text.lines().count(), 1);
    let written: Vec<Value> = serde_json::from_str(&text).unwrap();
    assert_eq!(written.len(), 3);
    assert_eq!(written[0]["unified_amount"], json!(100.5));
    assert_eq!(written[1]["unified_amount"], json!(3.0));
    assert_eq!(written[2]["unified_amount"], json!(-4.0));
    assert_eq!(written[2]["date"], "2023-09-17");
    assert!(written[2].get("sale_date").is_none());
}

#[tokio::test]
async fn test_missing_config_file() {
    let dir = TempDir::new().unwrap();
    let mut orch = Orchestrator::new(RuntimeOptions::default(), Span::none());

    let err = orch
        .run_file(dir.path().join("nope.col"))
        .await
        .unwrap_err();
    assert_eq!(err.class(), "ConfigNotFound");
    assert_eq!(orch.stage(), Stage::New);
}

#[tokio::test]
async fn test_every_source_missing_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out.json");
    let config = format!(
        "VERSION 1.0\nSOURCE a TYPE csv\n  FILE_PATH \"{}\"\nOUTPUT o TYPE json\n  PATH \"{}\"\n",
        dir.path().join("absent.csv").display(),
        out.display()
    );

    let mut orch = Orchestrator::new(RuntimeOptions::default(), Span::none());
    let err = orch.run_str(&config).await.unwrap_err();

    assert!(matches!(err, PipelineError::EmptyResult { sources: 1, failed: 1 }));
    assert!(!out.exists());
}
