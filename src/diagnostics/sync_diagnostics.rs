//! Sync diagnostics for structured skip reasons and error reporting.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{ArchitectumError, ErrorKind};

/// Reason why a file was skipped during sync.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Hash matches the ledger
    Unchanged,
    /// Sync was cancelled before this file was reached
    Cancelled,
    /// Internal hard-coded ignore rules (.git/, .architectum/, target/, etc.)
    IgnoredInternal,
    /// Matched by gitignore-style rules (.gitignore, .ignore)
    IgnoredByGitignore,
    /// Excluded by include/exclude glob pattern
    ExcludedByGlob,
    /// File is not a regular file (directory, symlink, etc.)
    NotAFile,
}

impl SkipReason {
    /// Stable sort key for deterministic ordering.
    ///
    /// Lower values = higher priority in reporting.
    pub fn sort_key(&self) -> u8 {
        match self {
            SkipReason::Cancelled => 0,
            SkipReason::Unchanged => 1,
            SkipReason::IgnoredInternal => 2,
            SkipReason::IgnoredByGitignore => 3,
            SkipReason::ExcludedByGlob => 4,
            SkipReason::NotAFile => 5,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SkipReason::Unchanged => "unchanged since last sync",
            SkipReason::Cancelled => "sync cancelled",
            SkipReason::IgnoredInternal => "internal ignore rule",
            SkipReason::IgnoredByGitignore => "matched by gitignore",
            SkipReason::ExcludedByGlob => "excluded by pattern",
            SkipReason::NotAFile => "not a regular file",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl PartialOrd for SkipReason {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SkipReason {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// Stage in the per-file sync pipeline where a failure occurred.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticStage {
    /// Failed to read or hash the file
    Read,
    /// Parser failed, timed out, or returned an invalid contribution
    Parse,
    /// Failed to write the mirror entry or mutate the graph
    Commit,
    /// Failed while removing a deleted file
    Remove,
}

impl DiagnosticStage {
    pub fn sort_key(&self) -> u8 {
        match self {
            DiagnosticStage::Read => 0,
            DiagnosticStage::Parse => 1,
            DiagnosticStage::Commit => 2,
            DiagnosticStage::Remove => 3,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DiagnosticStage::Read => "reading file",
            DiagnosticStage::Parse => "parsing source",
            DiagnosticStage::Commit => "committing",
            DiagnosticStage::Remove => "removing",
        }
    }
}

impl fmt::Display for DiagnosticStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl PartialOrd for DiagnosticStage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DiagnosticStage {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// A diagnostic event from the sync pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncDiagnostic {
    Skipped {
        /// Path relative to root
        path: String,
        reason: SkipReason,
    },
    Error {
        /// Path relative to root
        path: String,
        stage: DiagnosticStage,
        kind: ErrorKind,
        message: String,
    },
}

impl SyncDiagnostic {
    pub fn path(&self) -> &str {
        match self {
            SyncDiagnostic::Skipped { path, .. } => path,
            SyncDiagnostic::Error { path, .. } => path,
        }
    }

    /// Stable sort key: path, then errors before skips, then stage/reason.
    pub fn sort_key(&self) -> (&str, u8, u8) {
        match self {
            SyncDiagnostic::Error { path, stage, .. } => (path, 0, stage.sort_key()),
            SyncDiagnostic::Skipped { path, reason } => (path, 1, reason.sort_key()),
        }
    }

    pub fn skipped(path: impl Into<String>, reason: SkipReason) -> Self {
        SyncDiagnostic::Skipped {
            path: path.into(),
            reason,
        }
    }

    pub fn error(path: impl Into<String>, stage: DiagnosticStage, err: &ArchitectumError) -> Self {
        SyncDiagnostic::Error {
            path: path.into(),
            stage,
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// One-line form for stderr.
    ///
    /// Examples:
    /// - "SKIP src/a.py: unchanged since last sync"
    /// - "ERROR src/bad.py: parsing source: failed to parse src/bad.py: ..."
    pub fn format_stderr(&self) -> String {
        match self {
            SyncDiagnostic::Skipped { path, reason } => format!("SKIP {}: {}", path, reason),
            SyncDiagnostic::Error {
                path,
                stage,
                message,
                ..
            } => format!("ERROR {}: {}: {}", path, stage, message),
        }
    }
}

impl fmt::Display for SyncDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_stderr())
    }
}

impl PartialOrd for SyncDiagnostic {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SyncDiagnostic {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skip_reason_ord() {
        assert!(SkipReason::Cancelled < SkipReason::Unchanged);
        assert!(SkipReason::IgnoredInternal < SkipReason::IgnoredByGitignore);
        assert!(SkipReason::IgnoredByGitignore < SkipReason::ExcludedByGlob);
    }

    #[test]
    fn test_diagnostic_stage_ord() {
        assert!(DiagnosticStage::Read < DiagnosticStage::Parse);
        assert!(DiagnosticStage::Parse < DiagnosticStage::Commit);
    }

    #[test]
    fn test_error_diagnostic_carries_kind() {
        let err = ArchitectumError::parse("src/bad.py", "timed out after 30000 ms");
        let diag = SyncDiagnostic::error("src/bad.py", DiagnosticStage::Parse, &err);

        assert_eq!(diag.path(), "src/bad.py");
        match &diag {
            SyncDiagnostic::Error { kind, .. } => assert_eq!(*kind, ErrorKind::Parse),
            other => panic!("unexpected diagnostic {:?}", other),
        }
        assert_eq!(
            diag.format_stderr(),
            "ERROR src/bad.py: parsing source: failed to parse src/bad.py: timed out after 30000 ms"
        );
    }

    #[test]
    fn test_sorting_by_path_then_variant() {
        let err = ArchitectumError::parse("src/a.py", "boom");
        let mut diagnostics = vec![
            SyncDiagnostic::skipped("src/c.py", SkipReason::Unchanged),
            SyncDiagnostic::skipped("src/a.py", SkipReason::Cancelled),
            SyncDiagnostic::error("src/a.py", DiagnosticStage::Parse, &err),
            SyncDiagnostic::skipped("src/b.py", SkipReason::IgnoredInternal),
        ];

        diagnostics.sort();

        assert!(matches!(diagnostics[0], SyncDiagnostic::Error { .. }));
        assert_eq!(diagnostics[1].path(), "src/a.py");
        assert_eq!(diagnostics[2].path(), "src/b.py");
        assert_eq!(diagnostics[3].path(), "src/c.py");
    }

    #[test]
    fn test_json_shape() {
        let diag = SyncDiagnostic::skipped("a.py", SkipReason::Unchanged);
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["event"], "skipped");
        assert_eq!(json["reason"], "unchanged");
    }
}
