//! Transform rules
//!
//! A transform reads one field of a record and writes another, applying its
//! rules in the order they were declared.
//!
//! # Rules
//!
//! - `TYPE <kind> ["<format>"]` - coerce to `int`, `float`, `string` or `date`
//! - `DEFAULT <value>` - fill the target when the source field is absent
//! - `RENAME [<new-name>]` - move the value, removing the source field
//!
//! # Example
//!
//! ```text
//! TRANSFORM unified_amount FROM amount
//!   TYPE float
//!   DEFAULT 0
//!
//! TRANSFORM date FROM sale_date
//!   RENAME
//! ```
//!
//! Rules are executed by [`crate::interpreter`].

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Target kind of a type-coercion rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CoercionKind {
    /// 64-bit signed integer
    Int,
    /// 64-bit float
    Float,
    /// String
    String,
    /// ISO `YYYY-MM-DD` date string
    Date,
}

impl FromStr for CoercionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "int" | "integer" => Ok(Self::Int),
            "float" | "double" => Ok(Self::Float),
            "string" | "str" => Ok(Self::String),
            "date" => Ok(Self::Date),
            other => Err(format!(
                "unknown type '{other}', expected one of int, float, string, date"
            )),
        }
    }
}

impl fmt::Display for CoercionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Date => "date",
        };
        f.write_str(name)
    }
}

/// One field-level instruction
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Rule {
    /// Convert the value to another type
    Coerce {
        /// Target kind
        kind: CoercionKind,
        /// `chrono` format string, used by `date`
        #[serde(skip_serializing_if = "Option::is_none")]
        format: Option<String>,
    },

    /// Use a fixed value when the source field is absent
    Default {
        /// Fallback value
        value: Value,
    },

    /// Move the value to a new field
    Rename {
        /// Destination field; the transform's target when `None`
        #[serde(skip_serializing_if = "Option::is_none")]
        new_name: Option<String>,
    },
}

impl Rule {
    /// Coerce without a format
    pub fn coerce(kind: CoercionKind) -> Self {
        Self::Coerce { kind, format: None }
    }

    /// Short rule name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Coerce { .. } => "type",
            Self::Default { .. } => "default",
            Self::Rename { .. } => "rename",
        }
    }
}

/// A declared transform: `TRANSFORM <target> FROM <source>`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformSpec {
    /// Field written by the rules
    pub target: String,

    /// Field read by the rules
    pub source: String,

    /// Rules in declaration order; empty means no-op
    pub rules: Vec<Rule>,
}

impl TransformSpec {
    /// Create a transform with no rules
    pub fn new(target: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            source: source.into(),
            rules: Vec::new(),
        }
    }

    /// Append a rule
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Whether any rule can produce a value without the source field
    pub fn has_default(&self) -> bool {
        self.rules.iter().any(|r| matches!(r, Rule::Default { .. }))
    }
}
