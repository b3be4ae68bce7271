//! Incremental synchronization of the graph and mirror stores.
//!
//! # Per-file pipeline
//!
//! | change | steps |
//! |--------|-------|
//! | unchanged | skipped |
//! | new | parse → commit |
//! | modified | parse → commit (old contribution replaced) |
//! | deleted | remove from both stores and the ledger |
//!
//! A commit writes the mirror entry, replaces the file's graph contribution,
//! records the ledger hash and notifies the catalog, all while holding the
//! stores' write lock. Parse and I/O failures are collected per file and never
//! abort the batch.

pub mod expand;
pub mod locks;
pub mod report;

pub use expand::{expand_paths, Expansion};
pub use locks::{CancellationToken, PathLockGuard, PathLockTable};
pub use report::{SyncFailure, SyncReport};

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::catalog::{CatalogSink, CommitChange, CommitEvent, NullCatalog};
use crate::diagnostics::{DiagnosticStage, SkipReason};
use crate::error::{ArchitectumError, ErrorKind, Result};
use crate::filter::FileFilter;
use crate::graph::{check_contribution, Node, NodeType};
use crate::ingest::{ParseOutput, Parser, ParserRegistry, SourceFile};
use crate::stores::SharedStores;
use crate::tracker::ChangeTracker;
use crate::validation::{ancestors, resolve};

/// Default bound on a single parser call.
pub const DEFAULT_PARSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Progress callback: (current, total, path).
pub type SyncProgress = dyn Fn(usize, usize, &str) + Send + Sync;

#[derive(Clone, Default)]
pub struct SyncOptions {
    pub recursive: bool,
    /// Re-parse every file regardless of the ledger.
    pub force: bool,
    pub cancel: Option<CancellationToken>,
    pub progress: Option<Arc<SyncProgress>>,
}

impl SyncOptions {
    pub fn recursive() -> Self {
        Self {
            recursive: true,
            ..Self::default()
        }
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, CancellationToken::is_cancelled)
    }
}

impl std::fmt::Debug for SyncOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOptions")
            .field("recursive", &self.recursive)
            .field("force", &self.force)
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
struct WorkItem {
    path: String,
    hash: String,
    change: CommitChange,
}

/// Drives change detection and parsing, and commits results to both stores.
pub struct SyncOrchestrator {
    root: PathBuf,
    stores: SharedStores,
    tracker: Arc<ChangeTracker>,
    parsers: ParserRegistry,
    filter: Arc<FileFilter>,
    locks: Arc<PathLockTable>,
    catalog: Arc<dyn CatalogSink>,
    parse_timeout: Duration,
    /// Where the graph is saved after each batch; `None` keeps it in memory.
    graph_path: Option<PathBuf>,
}

impl SyncOrchestrator {
    pub fn new(
        root: impl Into<PathBuf>,
        stores: SharedStores,
        tracker: Arc<ChangeTracker>,
        parsers: ParserRegistry,
        filter: Arc<FileFilter>,
    ) -> Self {
        let root = root.into();
        Self {
            root: std::fs::canonicalize(&root).unwrap_or(root),
            stores,
            tracker,
            parsers,
            filter,
            locks: PathLockTable::new(),
            catalog: Arc::new(NullCatalog),
            parse_timeout: DEFAULT_PARSE_TIMEOUT,
            graph_path: None,
        }
    }

    pub fn with_locks(mut self, locks: Arc<PathLockTable>) -> Self {
        self.locks = locks;
        self
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn CatalogSink>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_parse_timeout(mut self, timeout: Duration) -> Self {
        self.parse_timeout = timeout;
        self
    }

    pub fn with_graph_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.graph_path = Some(path.into());
        self
    }

    pub fn locks(&self) -> &Arc<PathLockTable> {
        &self.locks
    }

    /// Bring both stores in line with `paths`.
    ///
    /// # Errors
    /// Only invocation-level problems are errors: a path outside the root, a
    /// poisoned lock, or failing to persist the graph or ledger. Everything
    /// that goes wrong with an individual file is reported in the
    /// [`SyncReport`].
    pub fn sync(&self, paths: &[PathBuf], options: &SyncOptions) -> Result<SyncReport> {
        let started = Instant::now();
        let mut report = SyncReport::default();

        let expansion = expand_paths(&self.filter, &self.tracker, paths, options.recursive)?;
        for (path, reason) in &expansion.skipped {
            report.skip(path, *reason);
        }
        for path in &expansion.missing {
            report.fail(
                path,
                DiagnosticStage::Read,
                &ArchitectumError::not_found("path", path.as_str()),
            );
        }
        for (path, err) in &expansion.unreadable {
            report.fail(path, DiagnosticStage::Read, err);
        }

        let ledger = self.tracker.ledger();
        let mut deletion_candidates = self
            .tracker
            .deleted_within(&expansion.files, &expansion.scope, &ledger);
        deletion_candidates.retain(|path| !expansion.is_unreadable(path));
        let _guard = self.locks.acquire(
            expansion
                .files
                .iter()
                .chain(deletion_candidates.iter())
                .cloned(),
        )?;

        let mut changes = self.tracker.detect_changes(&expansion.files, &expansion.scope);
        // Another sync may have recorded paths since the snapshot. Only
        // locked candidates whose ledger entry is untouched are removed.
        changes.deleted.retain(|path| {
            deletion_candidates.contains(path) && self.tracker.hash_of(path) == ledger.get(path).cloned()
        });
        for (path, err) in &changes.errors {
            report.fail(path, DiagnosticStage::Read, err);
        }

        let mut work: Vec<WorkItem> = Vec::new();
        for changed in &changes.new {
            work.push(WorkItem {
                path: changed.path.clone(),
                hash: changed.hash.clone(),
                change: CommitChange::Created,
            });
        }
        for changed in &changes.modified {
            work.push(WorkItem {
                path: changed.path.clone(),
                hash: changed.hash.clone(),
                change: CommitChange::Updated,
            });
        }
        for path in &changes.unchanged {
            match (options.force, self.tracker.hash_of(path)) {
                (true, Some(hash)) => work.push(WorkItem {
                    path: path.clone(),
                    hash,
                    change: CommitChange::Updated,
                }),
                _ => report.skip(path, SkipReason::Unchanged),
            }
        }
        work.sort_by(|a, b| a.path.cmp(&b.path));

        let total = work.len() + changes.deleted.len();
        let mut touched_dirs: BTreeSet<String> = BTreeSet::new();
        let mut done = 0;

        for item in &work {
            if options.is_cancelled() {
                report.cancelled = true;
                report.skip(&item.path, SkipReason::Cancelled);
                continue;
            }
            done += 1;
            if let Some(progress) = &options.progress {
                progress(done, total, item.path.as_str());
            }

            let output = match self.parse_with_timeout(&item.path) {
                Ok(output) => output,
                Err(err) => {
                    let stage = match err.kind() {
                        ErrorKind::Io => DiagnosticStage::Read,
                        _ => DiagnosticStage::Parse,
                    };
                    warn!(path = %item.path, error = %err, "parse failed");
                    report.fail(&item.path, stage, &err);
                    continue;
                }
            };

            match self.commit(item, output) {
                Ok(()) => {
                    if item.change == CommitChange::Created {
                        touched_dirs.extend(ancestors(&item.path));
                    }
                    report.synced.push(item.path.clone());
                }
                Err((stage, err)) => {
                    warn!(path = %item.path, error = %err, "commit failed");
                    report.fail(&item.path, stage, &err);
                }
            }
        }

        for path in &changes.deleted {
            if options.is_cancelled() {
                report.cancelled = true;
                report.skip(path, SkipReason::Cancelled);
                continue;
            }
            done += 1;
            if let Some(progress) = &options.progress {
                progress(done, total, path.as_str());
            }
            match self.remove(path) {
                Ok(()) => {
                    touched_dirs.extend(ancestors(path));
                    report.synced.push(path.clone());
                    report.removed.push(path.clone());
                }
                Err(err) => {
                    warn!(path = %path, error = %err, "removal failed");
                    report.fail(path, DiagnosticStage::Remove, &err);
                }
            }
        }

        self.refresh_directories(&touched_dirs)?;
        self.persist(!report.synced.is_empty())?;

        report.unresolved_relationships = self.stores.read()?.graph.pending().len();
        report.duration_ms = started.elapsed().as_millis() as u64;
        report.finalize();
        info!(
            synced = report.synced.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            cancelled = report.cancelled,
            duration_ms = report.duration_ms,
            "sync finished"
        );
        Ok(report)
    }

    /// Run the file's parser on a worker thread, bounded by the timeout.
    ///
    /// A parser that overruns is abandoned; its thread finishes on its own
    /// and its result is dropped.
    fn parse_with_timeout(&self, path: &str) -> Result<ParseOutput> {
        let file = SourceFile::new(&self.root, path);
        let parser: Arc<dyn Parser> = self.parsers.for_extension(&file.extension);
        let (tx, rx) = mpsc::channel();

        std::thread::Builder::new()
            .name(format!("parse {}", path))
            .spawn(move || {
                let _ = tx.send(parser.parse(&file));
            })
            .map_err(|e| ArchitectumError::io(path, e))?;

        match rx.recv_timeout(self.parse_timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(ArchitectumError::parse(
                path,
                format!("parser timed out after {} ms", self.parse_timeout.as_millis()),
            )),
            Err(RecvTimeoutError::Disconnected) => {
                Err(ArchitectumError::parse(path, "parser terminated without a result"))
            }
        }
    }

    /// Commit one parsed file to the mirror, the graph, the ledger and the
    /// catalog, in that order.
    fn commit(
        &self,
        item: &WorkItem,
        mut output: ParseOutput,
    ) -> std::result::Result<(), (DiagnosticStage, ArchitectumError)> {
        let path = item.path.as_str();
        if !output
            .nodes
            .iter()
            .any(|node| node.node_type() == NodeType::File && node.owner.as_deref() == Some(path))
        {
            output.nodes.insert(0, Node::file(path));
        }

        let mut stores = self.stores.write().map_err(|e| (DiagnosticStage::Commit, e))?;

        check_contribution(&stores.graph, path, &output.nodes)
            .map_err(|e| (DiagnosticStage::Parse, ArchitectumError::parse(path, e.to_string())))?;
        if output.content.path != path {
            return Err((
                DiagnosticStage::Parse,
                ArchitectumError::parse(
                    path,
                    format!("content describes {} instead", output.content.path),
                ),
            ));
        }

        stores
            .mirrors
            .commit_content(path, output.content, &item.hash)
            .map_err(|e| (DiagnosticStage::Commit, e))?;
        let outcome = stores
            .graph
            .replace_file(path, output.nodes, output.relationships)
            .map_err(|e| (DiagnosticStage::Commit, e))?;
        self.tracker.record(path, &item.hash);

        let stats = stores.graph.file_stats(path);
        drop(stores);

        debug!(
            path,
            nodes = stats.nodes,
            relationships = stats.relationships,
            parked = outcome.parked,
            activated = outcome.activated,
            "file committed"
        );
        self.catalog.file_committed(&CommitEvent {
            path: path.to_string(),
            change: item.change,
            hash: Some(item.hash.clone()),
            node_count: stats.nodes,
            relationship_count: stats.relationships,
        });
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<()> {
        let mut stores = self.stores.write()?;
        stores.mirrors.remove(path)?;
        let outcome = stores.graph.remove_file(path);
        self.tracker.forget(path);
        drop(stores);

        debug!(
            path,
            removed_nodes = outcome.removed_nodes,
            parked_foreign = outcome.parked_foreign,
            "file removed"
        );
        self.catalog.file_committed(&CommitEvent {
            path: path.to_string(),
            change: CommitChange::Removed,
            hash: None,
            node_count: outcome.removed_nodes,
            relationship_count: 0,
        });
        Ok(())
    }

    /// Rewrite the directory entries whose listing may have changed.
    fn refresh_directories(&self, dirs: &BTreeSet<String>) -> Result<()> {
        if dirs.is_empty() {
            return Ok(());
        }
        let stores = self.stores.write()?;
        for dir in dirs {
            let result = if resolve(&self.root, dir).is_dir() {
                stores
                    .mirrors
                    .scan_directory(dir)
                    .and_then(|listing| stores.mirrors.update_directory_content(&listing))
            } else {
                stores.mirrors.remove_directory(dir).map(|_| ())
            };
            if let Err(err) = result {
                warn!(dir = %dir, error = %err, "directory entry not refreshed");
            }
        }
        Ok(())
    }

    fn persist(&self, changed: bool) -> Result<()> {
        if let Some(graph_path) = &self.graph_path {
            if changed || !graph_path.exists() {
                self.stores.read()?.graph.save(graph_path)?;
            }
        }
        if changed || !self.tracker.ledger_path().exists() {
            self.tracker.save()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("root", &self.root)
            .field("parsers", &self.parsers)
            .field("parse_timeout", &self.parse_timeout)
            .field("graph_path", &self.graph_path)
            .finish()
    }
}
