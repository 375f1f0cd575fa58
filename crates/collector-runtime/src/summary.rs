//! Run summary reported after a pipeline completes

/// Outcome of fetching one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSummary {
    /// Declared source name
    pub name: String,
    /// Records the source contributed
    pub records: usize,
    /// Failure description, if the fetch failed
    pub error: Option<String>,
}

impl SourceSummary {
    /// Whether the fetch failed
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Counts collected over one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Per-source outcomes, in declaration order
    pub sources: Vec<SourceSummary>,
    /// Records that reached the transform stage
    pub records_fetched: usize,
    /// Records handed to the writer
    pub records_written: usize,
}

impl RunSummary {
    /// Sources whose fetch failed
    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceSummary> {
        self.sources.iter().filter(|s| s.failed())
    }

    /// Number of failed sources
    pub fn failed_count(&self) -> usize {
        self.failed_sources().count()
    }
}
