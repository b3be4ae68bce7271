//! Expansion of sync arguments into a concrete, sorted file list.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::diagnostics::SkipReason;
use crate::error::{ArchitectumError, Result};
use crate::filter::FileFilter;
use crate::tracker::{ChangeTracker, SyncScope};
use crate::validation::{normalize_path, resolve, ROOT};

/// Files and scopes derived from the sync arguments.
#[derive(Debug, Default)]
pub struct Expansion {
    /// Normalized, sorted, deduplicated existing files to consider.
    pub files: Vec<String>,
    /// What the invocation is responsible for; bounds deletion detection.
    pub scope: Vec<SyncScope>,
    pub skipped: Vec<(String, SkipReason)>,
    /// Arguments that exist neither on disk nor in the ledger.
    pub missing: Vec<String>,
    /// Entries the directory walk could not read. Ledger paths below them
    /// are not treated as deleted.
    pub unreadable: Vec<(String, ArchitectumError)>,
}

impl Expansion {
    /// Whether `path` is, or lies below, an entry the walk could not read.
    pub fn is_unreadable(&self, path: &str) -> bool {
        self.unreadable.iter().any(|(entry, _)| {
            path == entry
                || entry == ROOT
                || path
                    .strip_prefix(entry.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

/// Expand `paths` below the filter's root.
///
/// # Errors
/// `ValidationError` when an argument escapes the root. Missing arguments
/// are not errors; they land in [`Expansion::missing`], or become a scope
/// when the ledger still tracks something there (the deletion case).
pub fn expand_paths(
    filter: &FileFilter,
    tracker: &ChangeTracker,
    paths: &[PathBuf],
    recursive: bool,
) -> Result<Expansion> {
    let root = filter.root();
    let mut expansion = Expansion::default();

    for input in paths {
        let rel = normalize_path(root, input)?;
        let abs = resolve(root, &rel);

        if abs.is_file() {
            expansion.scope.push(SyncScope::File { path: rel.clone() });
            match filter.should_skip(&abs) {
                Some(reason) => expansion.skipped.push((rel, reason)),
                None => expansion.files.push(rel),
            }
        } else if abs.is_dir() {
            if rel != ROOT && filter.skips_directory(&abs) {
                return Err(ArchitectumError::validation(
                    rel,
                    "directory is excluded by ignore rules",
                ));
            }
            expansion.scope.push(SyncScope::Directory {
                path: rel.clone(),
                recursive,
            });
            walk_directory(filter, root, &abs, recursive, &mut expansion)?;
        } else if tracker.hash_of(&rel).is_some() {
            expansion.scope.push(SyncScope::File { path: rel });
        } else if tracker.tracks_under(&rel) {
            expansion.scope.push(SyncScope::Directory {
                path: rel,
                recursive: true,
            });
        } else {
            expansion.missing.push(rel);
        }
    }

    expansion.files.sort();
    expansion.files.dedup();
    expansion.skipped.sort();
    expansion.skipped.dedup();
    debug!(
        files = expansion.files.len(),
        skipped = expansion.skipped.len(),
        missing = expansion.missing.len(),
        unreadable = expansion.unreadable.len(),
        "sync paths expanded"
    );
    Ok(expansion)
}

fn walk_directory(
    filter: &FileFilter,
    root: &Path,
    dir: &Path,
    recursive: bool,
    expansion: &mut Expansion,
) -> Result<()> {
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(if recursive { usize::MAX } else { 1 })
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !(entry.file_type().is_dir() && filter.skips_directory(entry.path())));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(dir);
                let rel = normalize_path(root, path)?;
                warn!(path = %rel, error = %e, "directory entry unreadable");
                let err = ArchitectumError::io(&rel, e.into());
                expansion.unreadable.push((rel, err));
                continue;
            }
        };
        if entry.file_type().is_dir() {
            continue;
        }
        let rel = normalize_path(root, entry.path())?;
        if !entry.file_type().is_file() {
            expansion.skipped.push((rel, SkipReason::NotAFile));
            continue;
        }
        match filter.should_skip(entry.path()) {
            Some(reason) => expansion.skipped.push((rel, reason)),
            None => expansion.files.push(rel),
        }
    }
    Ok(())
}
