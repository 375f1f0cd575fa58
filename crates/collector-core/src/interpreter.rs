//! Transform interpreter
//!
//! Applies [`TransformSpec`] rules to records. Input records are never
//! modified; every output record is a transformed copy.
//!
//! Rules of one transform run against the progressively mutated copy. The
//! transform keeps a "current key" that starts at its source field. A
//! successful coercion moves the current key to the target, and a rename
//! moves it to the rename destination, so every rule sees the value the
//! previous rule produced:
//!
//! ```text
//! TRANSFORM unified_amount FROM amount
//!   TYPE float     # unified_amount = 100.5, current key is unified_amount
//!   DEFAULT 0      # unified_amount is present, so 100.5 is kept
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Number, Value};
use tracing::Span;

use crate::config::Record;
use crate::error::TransformationWarning;
use crate::transforms::{CoercionKind, Rule, TransformSpec};

/// Default format for `TYPE date`
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Applies an ordered list of transforms to records
#[derive(Debug, Clone)]
pub struct Transformer {
    specs: Vec<TransformSpec>,
    span: Span,
}

impl Transformer {
    /// Create a transformer that logs inside `span`
    pub fn new(specs: Vec<TransformSpec>, span: Span) -> Self {
        Self { specs, span }
    }

    /// Transform every record, preserving length and order
    pub fn transform(&self, records: &[Record]) -> Vec<Record> {
        let _entered = self.span.enter();
        records.iter().map(|r| self.transform_record(r)).collect()
    }

    /// Transform a single record
    pub fn transform_record(&self, record: &Record) -> Record {
        let mut row = record.clone();
        for spec in &self.specs {
            if !row.contains_key(&spec.source) && !spec.has_default() {
                tracing::trace!(source = %spec.source, "source field absent, skipping transform");
                continue;
            }
            apply_spec(&mut row, spec);
        }
        row
    }
}

/// Apply transforms to records within the current span
pub fn apply_transforms(records: &[Record], specs: &[TransformSpec]) -> Vec<Record> {
    Transformer::new(specs.to_vec(), Span::current()).transform(records)
}

fn apply_spec(row: &mut Record, spec: &TransformSpec) {
    let mut current = spec.source.clone();

    for rule in &spec.rules {
        tracing::trace!(
            rule = rule.name(),
            field = %current,
            target = %spec.target,
            "applying rule"
        );
        match rule {
            Rule::Coerce { kind, format } => {
                let Some(value) = row.get(&current) else {
                    tracing::debug!(field = %current, "no value to convert");
                    continue;
                };
                match convert(value, *kind, format.as_deref()) {
                    Ok(converted) => {
                        row.insert(spec.target.clone(), converted);
                        current = spec.target.clone();
                    }
                    Err(reason) => {
                        let warning = TransformationWarning {
                            target: spec.target.clone(),
                            source_field: current.clone(),
                            kind: kind.to_string(),
                            value: value.clone(),
                            reason,
                        };
                        tracing::warn!("{}", warning);
                    }
                }
            }
            Rule::Default { value } => {
                let resolved = row.get(&current).cloned().unwrap_or_else(|| value.clone());
                row.insert(spec.target.clone(), resolved);
            }
            Rule::Rename { new_name } => {
                let destination = new_name.as_deref().unwrap_or(&spec.target);
                match row.remove(&current) {
                    Some(value) => {
                        row.insert(destination.to_string(), value);
                        current = destination.to_string();
                    }
                    None => tracing::debug!(field = %current, "nothing to rename"),
                }
            }
        }
    }
}

/// Convert a value to the requested kind.
///
/// Returns the reason on failure; the caller decides how to report it.
pub fn convert(value: &Value, kind: CoercionKind, format: Option<&str>) -> Result<Value, String> {
    if value.is_null() {
        return Err("value is null".to_string());
    }
    match kind {
        CoercionKind::Int => to_int(value),
        CoercionKind::Float => to_float(value),
        CoercionKind::String => to_string(value),
        CoercionKind::Date => to_date(value, format),
    }
}

fn to_int(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::from(i))
            } else if n.is_u64() {
                Err(format!("{n} does not fit in a 64-bit integer"))
            } else {
                float_to_int(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                Ok(Value::from(i))
            } else if let Ok(f) = trimmed.parse::<f64>() {
                float_to_int(f)
            } else {
                Err(format!("'{s}' is not a number"))
            }
        }
        Value::Bool(b) => Ok(Value::from(i64::from(*b))),
        other => Err(format!("cannot convert {} to int", type_name(other))),
    }
}

fn float_to_int(f: f64) -> Result<Value, String> {
    // i64::MAX as f64 rounds up to 2^63, which is itself out of range
    if f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Ok(Value::from(f.trunc() as i64))
    } else {
        Err(format!("{f} does not fit in a 64-bit integer"))
    }
}

fn to_float(value: &Value) -> Result<Value, String> {
    let f = match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("{n} is not representable as a float"))?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("'{s}' is not a number"))?,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        other => return Err(format!("cannot convert {} to float", type_name(other))),
    };
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| format!("{f} is not a finite number"))
}

fn to_string(value: &Value) -> Result<Value, String> {
    let s = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string(value).map_err(|e| e.to_string())?
        }
        Value::Null => return Err("value is null".to_string()),
    };
    Ok(Value::String(s))
}

fn to_date(value: &Value, format: Option<&str>) -> Result<Value, String> {
    let Value::String(raw) = value else {
        return Err(format!("cannot convert {} to date", type_name(value)));
    };
    let text = raw.trim();
    let fmt = format.unwrap_or(DEFAULT_DATE_FORMAT);

    let date = NaiveDate::parse_from_str(text, fmt)
        .or_else(|_| NaiveDateTime::parse_from_str(text, fmt).map(|dt| dt.date()))
        .or_else(|e| match format {
            None => DateTime::parse_from_rfc3339(text).map(|dt| dt.date_naive()),
            Some(_) => Err(e),
        })
        .map_err(|e| format!("'{raw}' does not match '{fmt}': {e}"))?;

    Ok(Value::String(date.format(DEFAULT_DATE_FORMAT).to_string()))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
