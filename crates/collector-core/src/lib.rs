//! Collector Core Library
//!
//! This crate provides the core functionality for Collector:
//! - The `.col` configuration language and its parser
//! - Semantic validation of parsed configurations
//! - Rule-based record transformation
//! - Source connector and output writer traits with registries
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Parser    │────▶│  Validator  │────▶│ Transformer │────▶│   Output    │
//! │   (.col)    │     │             │     │   (rules)   │     │   Writer    │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use collector_core::{validate, Configuration};
//!
//! let config = Configuration::load("./pipeline.col")?;
//! validate(&config)?;
//! for source in &config.sources {
//!     println!("Source: {} ({})", source.name, source.source_type);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod connectors;
pub mod error;
pub mod interpreter;
pub mod outputs;
pub mod parser;
pub mod transforms;
pub mod validator;

pub use config::{Configuration, Details, OutputSpec, Record, SourceSpec};
pub use connectors::{ConnectorRegistry, CsvSource, JsonSource, SourceConnector, SourceFactory};
pub use error::{
    ConfigValidationError, ConnectorError, ConnectorInitError, Error, OutputError, ParseError,
    Result, TransformationWarning,
};
pub use interpreter::{apply_transforms, convert, Transformer};
pub use outputs::{FileFormat, FileWriter, OutputRegistry, OutputWriter, WriterFactory};
pub use parser::parse;
pub use transforms::{CoercionKind, Rule, TransformSpec};
pub use validator::validate;
