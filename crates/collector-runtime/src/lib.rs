//! Collector Runtime
//!
//! This crate drives a pipeline run from configuration text to written
//! output. Sources are fetched concurrently; every other stage runs in order.
//!
//! # Features
//!
//! - Staged orchestrator with out-of-order detection
//! - Concurrent fetch with optional timeout and concurrency limit
//! - Per-run summary of fetched, failed and written records
//!
//! # Usage
//!
//! ```rust,ignore
//! use collector_runtime::{Orchestrator, RuntimeOptions};
//!
//! let mut orchestrator = Orchestrator::new(RuntimeOptions::default(), tracing::Span::current());
//! let summary = orchestrator.run_file("pipeline.col").await?;
//! println!("wrote {} records", summary.records_written);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;
pub mod error;
pub mod options;
pub mod summary;

pub use engine::{Orchestrator, Stage};
pub use error::{PipelineError, Result};
pub use options::{MergeOrder, RuntimeOptions};
pub use summary::{RunSummary, SourceSummary};
