//! Structured diagnostics for sync operations.
//!
//! Provides deterministic, sortable diagnostic types for skip reasons and
//! per-file failures carried by the sync report.

pub mod sync_diagnostics;

pub use sync_diagnostics::{DiagnosticStage, SkipReason, SyncDiagnostic};
