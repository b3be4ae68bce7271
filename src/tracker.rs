//! Content-hash change tracking.
//!
//! The ledger maps each synced path to the SHA-256 of the bytes that were
//! last committed for it. It is the only place staleness is decided.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::common::{hash_file, read_json, write_json};
use crate::error::{ArchitectumError, Result};
use crate::validation::{is_within, parent_of, resolve, ROOT};

/// Part of the tree a sync invocation is responsible for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum SyncScope {
    File { path: String },
    Directory { path: String, recursive: bool },
}

impl SyncScope {
    /// True when `path` falls inside this scope.
    pub fn covers(&self, path: &str) -> bool {
        match self {
            SyncScope::File { path: file } => file == path,
            SyncScope::Directory {
                path: dir,
                recursive: true,
            } => path != dir && is_within(path, dir),
            SyncScope::Directory {
                path: dir,
                recursive: false,
            } => parent_of(path).as_deref() == Some(dir.as_str()),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            SyncScope::File { path } | SyncScope::Directory { path, .. } => path,
        }
    }
}

/// A new or modified file with the hash that classified it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangedFile {
    pub path: String,
    pub hash: String,
}

/// Classification of a set of files against the ledger.
#[derive(Debug, Default)]
pub struct ChangeSet {
    pub unchanged: Vec<String>,
    pub new: Vec<ChangedFile>,
    pub modified: Vec<ChangedFile>,
    pub deleted: Vec<String>,
    /// Files that could not be read; each carries an `Io` error.
    pub errors: Vec<(String, ArchitectumError)>,
}

impl ChangeSet {
    pub fn has_changes(&self) -> bool {
        !(self.new.is_empty() && self.modified.is_empty() && self.deleted.is_empty())
    }
}

/// Durable `path -> hash` ledger.
#[derive(Debug)]
pub struct ChangeTracker {
    root: PathBuf,
    ledger_path: PathBuf,
    ledger: Mutex<BTreeMap<String, String>>,
}

impl ChangeTracker {
    /// Open the ledger at `ledger_path`, starting empty if it does not exist.
    pub fn open(root: impl Into<PathBuf>, ledger_path: impl Into<PathBuf>) -> Result<Self> {
        let ledger_path = ledger_path.into();
        let ledger = read_json::<BTreeMap<String, String>>(&ledger_path)?.unwrap_or_default();
        debug!(entries = ledger.len(), path = %ledger_path.display(), "ledger loaded");
        Ok(Self {
            root: root.into(),
            ledger_path,
            ledger: Mutex::new(ledger),
        })
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        // The map is always left consistent, so a poisoned guard is still usable.
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Classify `files` (normalized, existing) and find deletions inside `scope`.
    ///
    /// # Guarantees
    /// - each readable file is hashed exactly once
    /// - an unreadable file is reported in `errors` and nowhere else
    /// - a ledger entry is `deleted` when it lies in `scope` and is not in `files`
    pub fn detect_changes(&self, files: &[String], scope: &[SyncScope]) -> ChangeSet {
        let mut changes = ChangeSet::default();
        let ledger = self.entries().clone();

        for path in files {
            let hash = match hash_path(&self.root, path) {
                Ok(hash) => hash,
                Err(err) => {
                    warn!(path = %path, error = %err, "cannot hash file");
                    changes.errors.push((path.clone(), err));
                    continue;
                }
            };
            match ledger.get(path) {
                Some(previous) if *previous == hash => changes.unchanged.push(path.clone()),
                Some(_) => changes.modified.push(ChangedFile {
                    path: path.clone(),
                    hash,
                }),
                None => changes.new.push(ChangedFile {
                    path: path.clone(),
                    hash,
                }),
            }
        }

        changes.deleted = self.deleted_within(files, scope, &ledger);
        debug!(
            unchanged = changes.unchanged.len(),
            new = changes.new.len(),
            modified = changes.modified.len(),
            deleted = changes.deleted.len(),
            errors = changes.errors.len(),
            "changes detected"
        );
        changes
    }

    /// Ledger entries inside `scope` that are absent from `files`.
    pub fn deleted_within(
        &self,
        files: &[String],
        scope: &[SyncScope],
        ledger: &BTreeMap<String, String>,
    ) -> Vec<String> {
        let present: HashSet<&str> = files.iter().map(String::as_str).collect();
        ledger
            .keys()
            .filter(|path| !present.contains(path.as_str()))
            .filter(|path| scope.iter().any(|s| s.covers(path)))
            .cloned()
            .collect()
    }

    /// Snapshot of the ledger.
    pub fn ledger(&self) -> BTreeMap<String, String> {
        self.entries().clone()
    }

    pub fn hash_of(&self, path: &str) -> Option<String> {
        self.entries().get(path).cloned()
    }

    pub fn record(&self, path: &str, hash: &str) {
        self.entries().insert(path.to_string(), hash.to_string());
    }

    pub fn forget(&self, path: &str) -> bool {
        self.entries().remove(path).is_some()
    }

    /// Tracked paths, sorted.
    pub fn tracked_paths(&self) -> Vec<String> {
        self.entries().keys().cloned().collect()
    }

    /// True when any ledger entry lies at or below `path`.
    pub fn tracks_under(&self, path: &str) -> bool {
        self.entries()
            .keys()
            .any(|tracked| path == ROOT || is_within(tracked, path))
    }

    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }

    /// Persist the ledger atomically.
    pub fn save(&self) -> Result<()> {
        let snapshot = self.ledger();
        write_json(&self.ledger_path, &snapshot)
    }
}

/// Hash `rel` under `root`; I/O errors name the relative path.
pub fn hash_path(root: &Path, rel: &str) -> Result<String> {
    hash_file(&resolve(root, rel)).map_err(|err| match err {
        ArchitectumError::Io { source, .. } => ArchitectumError::io(rel, source),
        other => other,
    })
}
