//! Semantic validation of a parsed configuration
//!
//! The parser only checks shape. This module checks that a configuration is
//! complete enough to run, and reports every problem in one pass.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::config::{Configuration, OutputSpec, SourceSpec};
use crate::error::ConfigValidationError;
use crate::transforms::TransformSpec;

static VERSION_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\.\d+$").expect("valid regex"));

/// Source types and the detail keys each one requires
const SOURCE_REQUIREMENTS: &[(&str, &[&str])] = &[
    (
        "sql",
        &["host", "port", "username", "password", "database", "query"],
    ),
    ("csv", &["file_path"]),
    ("json", &["file_path"]),
    ("parquet", &["file_path"]),
    ("api", &["endpoint"]),
    ("mongodb", &["host", "port", "database", "collection"]),
    ("s3", &["aws_access_key", "aws_secret_key", "bucket", "key"]),
    ("gcs", &["google_cloud_key_file", "bucket", "object"]),
    (
        "azure_blob",
        &["azure_storage_account", "azure_storage_key", "container", "blob"],
    ),
];

/// Output types a configuration may declare
const OUTPUT_TYPES: &[&str] = &["csv", "json", "jsonl", "yaml", "xml", "parquet"];

/// Required detail keys for a source type, `None` if the type is unknown
pub fn required_source_fields(source_type: &str) -> Option<&'static [&'static str]> {
    SOURCE_REQUIREMENTS
        .iter()
        .find(|(ty, _)| *ty == source_type)
        .map(|(_, fields)| *fields)
}

/// Whether an output type is recognized
pub fn is_known_output_type(output_type: &str) -> bool {
    OUTPUT_TYPES.contains(&output_type)
}

/// Validate a configuration, collecting every violation
///
/// # Example
///
/// ```rust,ignore
/// if let Err(e) = validate(&config) {
///     for message in &e.errors {
///         eprintln!("{message}");
///     }
/// }
/// ```
pub fn validate(config: &Configuration) -> Result<(), ConfigValidationError> {
    let mut errors = Vec::new();

    validate_version(config.version.as_deref(), &mut errors);
    validate_sources(&config.sources, &mut errors);
    validate_transforms(&config.transforms, &mut errors);
    validate_output(config.output.as_ref(), &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        for error in &errors {
            tracing::debug!("validation error: {}", error);
        }
        Err(ConfigValidationError { errors })
    }
}

fn validate_version(version: Option<&str>, errors: &mut Vec<String>) {
    match version {
        None => errors.push("missing VERSION line".to_string()),
        Some(v) if !VERSION_FORMAT.is_match(v) => errors.push(format!(
            "invalid version format '{v}', expected 'X.Y'"
        )),
        Some(_) => {}
    }
}

fn validate_sources(sources: &[SourceSpec], errors: &mut Vec<String>) {
    if sources.is_empty() {
        errors.push("at least one SOURCE is required".to_string());
        return;
    }

    let mut seen = HashSet::new();
    for source in sources {
        if !seen.insert(source.name.as_str()) {
            errors.push(format!("duplicate source name '{}'", source.name));
        }

        let Some(required) = required_source_fields(&source.source_type) else {
            let known: Vec<&str> = SOURCE_REQUIREMENTS.iter().map(|(ty, _)| *ty).collect();
            errors.push(format!(
                "source '{}': unknown type '{}', expected one of [{}]",
                source.name,
                source.source_type,
                known.join(", ")
            ));
            continue;
        };

        for field in required {
            if !source.details.contains_key(*field) {
                errors.push(format!(
                    "source '{}' ({}): missing required field '{}'",
                    source.name, source.source_type, field
                ));
            }
        }
    }
}

fn validate_transforms(transforms: &[TransformSpec], errors: &mut Vec<String>) {
    for (idx, transform) in transforms.iter().enumerate() {
        if transform.source.trim().is_empty() {
            errors.push(format!("transform #{}: missing source field", idx + 1));
        }
        if transform.target.trim().is_empty() {
            errors.push(format!("transform #{}: missing target field", idx + 1));
        }
    }
}

fn validate_output(output: Option<&OutputSpec>, errors: &mut Vec<String>) {
    let Some(output) = output else {
        errors.push("missing OUTPUT block".to_string());
        return;
    };

    if !is_known_output_type(&output.output_type) {
        errors.push(format!(
            "output '{}': unknown type '{}', expected one of [{}]",
            output.name,
            output.output_type,
            OUTPUT_TYPES.join(", ")
        ));
    }

    match output.path() {
        Some(path) if !path.trim().is_empty() => {}
        _ => errors.push(format!(
            "output '{}': missing required field 'path'",
            output.name
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use rstest::rstest;

    fn valid_config() -> Configuration {
        parse(
            r#"
VERSION 1.0
SOURCE warehouse TYPE sql
  HOST "db"
  PORT 5432
  USERNAME "u"
  PASSWORD "p"
  DATABASE "sales"
  QUERY "SELECT 1"
SOURCE export TYPE csv
  FILE_PATH "export.csv"
TRANSFORM total FROM amount
  TYPE float
OUTPUT out TYPE json
  PATH "out.json"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_valid_configuration_passes() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
        assert_eq!(config.sources.len(), 2);
    }

    #[test]
    fn test_one_error_per_missing_field() {
        let mut config = valid_config();
        config.sources[0].details.remove("password");
        config.sources[0].details.remove("query");
        config.sources[0].details.remove("host");

        let err = validate(&config).unwrap_err();
        assert_eq!(err.errors.len(), 3);
        assert!(err.errors.iter().any(|e| e.contains("'password'")));
        assert!(err.errors.iter().any(|e| e.contains("'query'")));
        assert!(err.errors.iter().any(|e| e.contains("'host'")));
    }

    #[rstest]
    #[case("sql", 6)]
    #[case("csv", 1)]
    #[case("api", 1)]
    #[case("mongodb", 4)]
    #[case("s3", 4)]
    #[case("gcs", 3)]
    #[case("azure_blob", 4)]
    fn test_required_fields_per_type(#[case] source_type: &str, #[case] expected: usize) {
        let mut config = valid_config();
        config.sources = vec![SourceSpec::new("bare", source_type)];
        let err = validate(&config).unwrap_err();
        assert_eq!(err.errors.len(), expected, "{:?}", err.errors);
    }

    #[rstest]
    #[case(None, "missing VERSION")]
    #[case(Some("1"), "invalid version")]
    #[case(Some("1.0.0"), "invalid version")]
    #[case(Some("v1.0"), "invalid version")]
    fn test_bad_versions(#[case] version: Option<&str>, #[case] message: &str) {
        let mut config = valid_config();
        config.version = version.map(str::to_string);
        let err = validate(&config).unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert!(err.errors[0].contains(message));
    }

    #[test]
    fn test_unknown_types_are_single_errors() {
        let mut config = valid_config();
        config.sources[1].source_type = "ftp".to_string();
        config.output.as_mut().unwrap().output_type = "excel".to_string();

        let err = validate(&config).unwrap_err();
        assert_eq!(err.errors.len(), 2);
        assert!(err.errors[0].contains("unknown type 'ftp'"));
        assert!(err.errors[1].contains("unknown type 'excel'"));
    }

    #[test]
    fn test_collects_everything_in_one_pass() {
        let config = Configuration {
            version: Some("one".to_string()),
            sources: vec![],
            transforms: vec![TransformSpec::new("", "")],
            output: None,
        };
        let err = validate(&config).unwrap_err();
        assert_eq!(err.errors.len(), 5, "{:?}", err.errors);
    }

    #[test]
    fn test_duplicate_source_names() {
        let mut config = valid_config();
        config.sources[1].name = "warehouse".to_string();
        let err = validate(&config).unwrap_err();
        assert_eq!(err.errors, vec!["duplicate source name 'warehouse'".to_string()]);
    }

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    #[case(Some("   "))]
    fn test_output_requires_path(#[case] path: Option<&str>) {
        let mut config = valid_config();
        let output = config.output.as_mut().unwrap();
        output.details.remove("path");
        if let Some(path) = path {
            output.details.insert("path".to_string(), path.into());
        }
        let err = validate(&config).unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert!(err.errors[0].contains("'path'"));
    }

    #[test]
    fn test_empty_rules_are_allowed() {
        let mut config = valid_config();
        config.transforms.push(TransformSpec::new("copy", "amount"));
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_lookup_helpers() {
        assert_eq!(required_source_fields("csv"), Some(&["file_path"][..]));
        assert!(required_source_fields("ftp").is_none());
        assert!(is_known_output_type("jsonl"));
        assert!(!is_known_output_type("excel"));
    }
}
