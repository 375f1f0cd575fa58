//! Runtime knobs that are not part of the pipeline configuration

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How fetched record lists are merged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergeOrder {
    /// Sources are appended in the order their fetches finish
    #[default]
    Completion,
    /// Sources are appended in the order they are declared
    Declaration,
}

impl FromStr for MergeOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "completion" => Ok(Self::Completion),
            "declaration" => Ok(Self::Declaration),
            other => Err(format!(
                "unknown merge order '{other}', expected 'completion' or 'declaration'"
            )),
        }
    }
}

impl fmt::Display for MergeOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completion => f.write_str("completion"),
            Self::Declaration => f.write_str("declaration"),
        }
    }
}

/// Options for an [`Orchestrator`](crate::Orchestrator) run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeOptions {
    /// Per-source fetch timeout; a source that exceeds it counts as failed
    pub fetch_timeout: Option<Duration>,

    /// Maximum number of fetches in flight at once
    pub max_concurrent_fetches: Option<usize>,

    /// Merge order of fetched records
    pub merge_order: MergeOrder,
}

impl RuntimeOptions {
    /// Set the per-source fetch timeout
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Bound the number of concurrent fetches (at least one)
    pub fn with_max_concurrent_fetches(mut self, limit: usize) -> Self {
        self.max_concurrent_fetches = Some(limit.max(1));
        self
    }

    /// Set the merge order
    pub fn with_merge_order(mut self, order: MergeOrder) -> Self {
        self.merge_order = order;
        self
    }
}
