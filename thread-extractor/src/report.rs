use harvest_core::{CanonicalRecord, ErrorExt, ExtractionError, FailureKind, NormalizationError};
use serde::Serialize;
use std::fmt;

/// A thread that produced no records, and why.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadFailure {
    pub identifier: String,
    pub kind: FailureKind,
    pub code: &'static str,
    pub reason: String,
    /// Whether the same thread may succeed in a later run.
    pub retryable: bool,
}

/// A single comment left out of an otherwise successful thread.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedRecord {
    pub identifier: String,
    pub node_id: String,
    pub field: &'static str,
}

/// Run-level account of what succeeded and what did not.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FailureReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<ThreadFailure>,
    pub skipped: Vec<SkippedRecord>,
}

impl FailureReport {
    pub fn record_success(&mut self, identifier: impl Into<String>) {
        self.succeeded.push(identifier.into());
    }

    pub fn record_failure(&mut self, identifier: impl Into<String>, error: &ExtractionError) {
        self.failed.push(ThreadFailure {
            identifier: identifier.into(),
            kind: error.kind(),
            code: error.error_code(),
            reason: error.to_string(),
            retryable: error.is_retryable(),
        });
    }

    pub fn record_skip(&mut self, identifier: impl Into<String>, error: &NormalizationError) {
        self.skipped.push(SkippedRecord {
            identifier: identifier.into(),
            node_id: error.node_id.clone(),
            field: error.field,
        });
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }

    pub fn failure_for(&self, identifier: &str) -> Option<&ThreadFailure> {
        self.failed.iter().find(|f| f.identifier == identifier)
    }

    pub fn merge(&mut self, other: FailureReport) {
        self.succeeded.extend(other.succeeded);
        self.failed.extend(other.failed);
        self.skipped.extend(other.skipped);
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} thread(s) succeeded, {} failed, {} record(s) skipped",
            self.succeeded.len(),
            self.failed.len(),
            self.skipped.len()
        )?;
        for failure in &self.failed {
            writeln!(f, "  [{}] {}: {}", failure.kind, failure.identifier, failure.reason)?;
        }
        for skip in &self.skipped {
            writeln!(
                f,
                "  [skipped] {} in {}: missing `{}`",
                skip.node_id, skip.identifier, skip.field
            )?;
        }
        Ok(())
    }
}

/// Everything a batch run produced: records in output order plus the report.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub records: Vec<CanonicalRecord>,
    pub report: FailureReport,
}

impl BatchOutcome {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
