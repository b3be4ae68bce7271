//! Write-only notifications about committed files.
//!
//! The sync orchestrator calls the sink after a file's commit has reached
//! both stores and the ledger. Sinks cannot fail the sync; a sink that cannot
//! record an event logs and moves on.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

/// What happened to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitChange {
    Created,
    Updated,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitEvent {
    pub path: String,
    pub change: CommitChange,
    /// Hash recorded in the ledger; absent for removals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    pub node_count: usize,
    pub relationship_count: usize,
}

pub trait CatalogSink: Send + Sync {
    fn file_committed(&self, event: &CommitEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCatalog;

impl CatalogSink for NullCatalog {
    fn file_committed(&self, _event: &CommitEvent) {}
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    events: Mutex<Vec<CommitEvent>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CommitEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl CatalogSink for MemoryCatalog {
    fn file_committed(&self, event: &CommitEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Appends one JSON line per event to a journal file.
#[derive(Debug)]
pub struct JournalCatalog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

#[derive(Serialize)]
struct JournalLine<'a> {
    at: String,
    #[serde(flatten)]
    event: &'a CommitEvent,
}

impl JournalCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn append(&self, event: &CommitEvent) -> std::io::Result<()> {
        let line = JournalLine {
            at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            event,
        };
        let mut json = serde_json::to_string(&line)?;
        json.push('\n');

        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(json.as_bytes())
    }
}

impl CatalogSink for JournalCatalog {
    fn file_committed(&self, event: &CommitEvent) {
        if let Err(e) = self.append(event) {
            warn!(journal = %self.path.display(), path = %event.path, error = %e, "catalog append failed");
        }
    }
}
