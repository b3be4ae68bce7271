//! Outcome of one sync invocation.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::diagnostics::{DiagnosticStage, SkipReason, SyncDiagnostic};
use crate::error::{ArchitectumError, ErrorKind};

/// A file that could not be synced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    pub path: String,
    pub kind: ErrorKind,
    pub stage: DiagnosticStage,
    pub message: String,
}

impl SyncFailure {
    pub fn new(path: impl Into<String>, stage: DiagnosticStage, err: &ArchitectumError) -> Self {
        Self {
            path: path.into(),
            kind: err.kind(),
            stage,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Files committed (created, updated or removed), in processing order.
    pub synced: Vec<String>,
    /// Files whose previous contribution was removed; a subset of `synced`.
    pub removed: Vec<String>,
    pub skipped: Vec<String>,
    pub skipped_reasons: BTreeMap<String, SkipReason>,
    pub failed: Vec<SyncFailure>,
    /// Pending relationships left in the graph after the batch.
    pub unresolved_relationships: usize,
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl SyncReport {
    pub fn skip(&mut self, path: &str, reason: SkipReason) {
        if self.skipped_reasons.insert(path.to_string(), reason).is_none() {
            self.skipped.push(path.to_string());
        }
    }

    pub fn fail(&mut self, path: &str, stage: DiagnosticStage, err: &ArchitectumError) {
        self.failed.push(SyncFailure::new(path, stage, err));
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }

    /// Skips and failures as diagnostics, sorted by path.
    pub fn diagnostics(&self) -> Vec<SyncDiagnostic> {
        let mut diagnostics: Vec<SyncDiagnostic> = self
            .skipped_reasons
            .iter()
            .map(|(path, reason)| SyncDiagnostic::skipped(path.as_str(), *reason))
            .collect();
        diagnostics.extend(self.failed.iter().map(|failure| SyncDiagnostic::Error {
            path: failure.path.clone(),
            stage: failure.stage,
            kind: failure.kind,
            message: failure.message.clone(),
        }));
        diagnostics.sort();
        diagnostics
    }

    /// Sort the path lists so reports compare independent of walk order.
    pub(crate) fn finalize(&mut self) {
        self.skipped.sort();
        self.failed.sort_by(|a, b| a.path.cmp(&b.path).then(a.stage.cmp(&b.stage)));
    }
}
