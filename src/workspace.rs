//! Workspace facade: one project root, its persisted state, and the sync and
//! blueprint entrypoints over it.
//!
//! State layout under `<root>/.architectum/`:
//!
//! ```text
//! graph.json        relationship graph
//! ledger.json       path -> content hash
//! mirrors/          JSON content mirror
//! blueprints/       durable blueprints, <name>/v<N>.json
//! catalog.jsonl     commit journal
//! ```

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::blueprint::{self, Blueprint, BlueprintOptions, BlueprintStore, Persistence, Selection};
use crate::catalog::{CatalogSink, JournalCatalog};
use crate::config::ArchitectumConfig;
use crate::error::{ArchitectumError, ErrorKind, Result};
use crate::filter::FileFilter;
use crate::graph::{GraphStore, IntegrityReport};
use crate::ingest::ParserRegistry;
use crate::mirror::MirrorStore;
use crate::stores::SharedStores;
use crate::sync::{SyncOptions, SyncOrchestrator, SyncReport};
use crate::tracker::ChangeTracker;
use crate::validation::normalize_path;

pub const GRAPH_FILE: &str = "graph.json";
pub const LEDGER_FILE: &str = "ledger.json";
pub const MIRROR_DIR: &str = "mirrors";
pub const BLUEPRINT_DIR: &str = "blueprints";
pub const CATALOG_FILE: &str = "catalog.jsonl";

/// Where two stores disagree about one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyIssueKind {
    /// Graph File node without a mirror entry.
    MissingMirror,
    /// Mirror entry without a graph File node.
    MissingGraphNode,
    /// In both stores but absent from the ledger.
    Untracked,
    /// Ledger entry with nothing in either store.
    StaleLedgerEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ConsistencyIssue {
    pub path: String,
    pub issue: ConsistencyIssueKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    /// Stable error code shared by every issue below.
    pub code: &'static str,
    pub issues: Vec<ConsistencyIssue>,
    pub integrity: IntegrityReport,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty() && self.integrity.is_clean()
    }

    /// First issue as an error, for callers that fail on inconsistency.
    pub fn first_error(&self) -> Option<ArchitectumError> {
        self.issues.first().map(|issue| {
            ArchitectumError::consistency(issue.path.as_str(), format!("{:?}", issue.issue))
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceStatus {
    pub root: String,
    pub files: usize,
    pub nodes: usize,
    pub relationships: usize,
    pub pending_relationships: usize,
    pub nodes_by_type: BTreeMap<String, usize>,
    pub tracked_files: usize,
    pub mirrored_files: usize,
    pub blueprints: Vec<String>,
}

/// An opened project.
pub struct Architectum {
    root: PathBuf,
    config: ArchitectumConfig,
    stores: SharedStores,
    tracker: Arc<ChangeTracker>,
    orchestrator: SyncOrchestrator,
    blueprints: BlueprintStore,
}

impl Architectum {
    /// Open `root` with its configuration and the bundled parsers.
    pub fn open(root: &Path) -> Result<Self> {
        let root = canonical_root(root)?;
        let config = ArchitectumConfig::load(&root)?;
        let parsers = ParserRegistry::with_defaults(&root);
        Self::open_with(&root, config, parsers)
    }

    /// Open `root` with explicit configuration and parsers.
    pub fn open_with(root: &Path, config: ArchitectumConfig, parsers: ParserRegistry) -> Result<Self> {
        let root = canonical_root(root)?;
        let state = config.state_path(&root);

        let graph_path = state.join(GRAPH_FILE);
        let mut graph = GraphStore::load(&graph_path)?.unwrap_or_default();
        graph.set_detail_level(config.graph_detail_level);
        let mirrors = MirrorStore::new(&root, state.join(MIRROR_DIR));
        let stores = SharedStores::new(graph, mirrors);
        let tracker = Arc::new(ChangeTracker::open(&root, state.join(LEDGER_FILE))?);
        let filter = Arc::new(FileFilter::new(
            &root,
            &config.include,
            &config.exclude,
            config.respect_gitignore,
        )?);
        let catalog: Arc<dyn CatalogSink> = Arc::new(JournalCatalog::new(state.join(CATALOG_FILE)));

        let orchestrator = SyncOrchestrator::new(
            &root,
            stores.clone(),
            Arc::clone(&tracker),
            parsers,
            filter,
        )
        .with_catalog(catalog)
        .with_parse_timeout(config.parse_timeout())
        .with_graph_path(graph_path);

        info!(root = %root.display(), "workspace opened");
        Ok(Self {
            blueprints: BlueprintStore::new(state.join(BLUEPRINT_DIR)),
            root,
            config,
            stores,
            tracker,
            orchestrator,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &ArchitectumConfig {
        &self.config
    }

    pub fn stores(&self) -> &SharedStores {
        &self.stores
    }

    pub fn orchestrator(&self) -> &SyncOrchestrator {
        &self.orchestrator
    }

    pub fn blueprint_store(&self) -> &BlueprintStore {
        &self.blueprints
    }

    /// Sync `paths`; relative paths are taken against the root.
    pub fn sync(&self, paths: &[PathBuf], options: &SyncOptions) -> Result<SyncReport> {
        self.orchestrator.sync(paths, options)
    }

    /// Assemble a blueprint under the stores' read lock, saving it when durable.
    pub fn blueprint(&self, selection: Selection, options: &BlueprintOptions) -> Result<Blueprint> {
        let selection = self.normalize_selection(selection)?;
        let mut bp = {
            let stores = self.stores.read()?;
            blueprint::create(&stores, &selection, options)?
        };
        if options.persistence == Persistence::Durable {
            self.blueprints.save(&mut bp)?;
        }
        Ok(bp)
    }

    pub fn create_file_blueprint(&self, paths: &[PathBuf], options: &BlueprintOptions) -> Result<Blueprint> {
        let paths = paths.iter().map(|p| p.to_string_lossy().into_owned()).collect();
        self.blueprint(Selection::Files(paths), options)
    }

    pub fn create_path_blueprint(&self, root: &Path, depth: usize, options: &BlueprintOptions) -> Result<Blueprint> {
        self.blueprint(
            Selection::Path {
                root: root.to_string_lossy().into_owned(),
                depth,
            },
            options,
        )
    }

    pub fn create_method_blueprint(
        &self,
        file: &Path,
        names: &[String],
        options: &BlueprintOptions,
    ) -> Result<Blueprint> {
        self.blueprint(
            Selection::Method {
                file: file.to_string_lossy().into_owned(),
                names: names.to_vec(),
            },
            options,
        )
    }

    fn normalize_selection(&self, selection: Selection) -> Result<Selection> {
        let normalize = |raw: &str| normalize_path(&self.root, Path::new(raw));
        Ok(match selection {
            Selection::Files(paths) => Selection::Files(
                paths
                    .iter()
                    .map(|p| normalize(p))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Selection::Path { root, depth } => Selection::Path {
                root: normalize(&root)?,
                depth,
            },
            Selection::Method { file, names } => Selection::Method {
                file: normalize(&file)?,
                names,
            },
        })
    }

    /// Cross-check graph, mirror and ledger. Nothing is repaired.
    pub fn verify(&self) -> Result<VerifyReport> {
        let stores = self.stores.read()?;
        let graph_files: BTreeSet<String> = stores.graph.file_paths().into_iter().collect();
        let mirror_files: BTreeSet<String> = stores.mirrors.list_all_mirrors()?.into_iter().collect();
        let integrity = stores.graph.validate();
        drop(stores);
        let ledger = self.tracker.ledger();

        let mut issues = Vec::new();
        for path in graph_files.union(&mirror_files) {
            let issue = match (graph_files.contains(path), mirror_files.contains(path)) {
                (true, false) => Some(ConsistencyIssueKind::MissingMirror),
                (false, true) => Some(ConsistencyIssueKind::MissingGraphNode),
                _ if !ledger.contains_key(path) => Some(ConsistencyIssueKind::Untracked),
                _ => None,
            };
            if let Some(issue) = issue {
                issues.push(ConsistencyIssue {
                    path: path.clone(),
                    issue,
                });
            }
        }
        for path in ledger.keys() {
            if !graph_files.contains(path) && !mirror_files.contains(path) {
                issues.push(ConsistencyIssue {
                    path: path.clone(),
                    issue: ConsistencyIssueKind::StaleLedgerEntry,
                });
            }
        }
        issues.sort();

        debug!(issues = issues.len(), "verify finished");
        Ok(VerifyReport {
            code: ErrorKind::Consistency.code(),
            issues,
            integrity,
        })
    }

    pub fn status(&self) -> Result<WorkspaceStatus> {
        let stores = self.stores.read()?;
        let nodes_by_type = stores
            .graph
            .counts_by_type()
            .into_iter()
            .map(|(kind, count)| (kind.as_str().to_string(), count))
            .collect();
        Ok(WorkspaceStatus {
            root: self.root.to_string_lossy().into_owned(),
            files: stores.graph.file_paths().len(),
            nodes: stores.graph.node_count(),
            relationships: stores.graph.relationship_count(),
            pending_relationships: stores.graph.pending().len(),
            nodes_by_type,
            tracked_files: self.tracker.tracked_paths().len(),
            mirrored_files: stores.mirrors.list_all_mirrors()?.len(),
            blueprints: self.blueprints.list_names()?,
        })
    }

    /// Graph document as pretty JSON.
    pub fn export_graph(&self) -> Result<String> {
        self.stores.read()?.graph.to_json()
    }
}

impl std::fmt::Debug for Architectum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Architectum")
            .field("root", &self.root)
            .field("config", &self.config)
            .field("orchestrator", &self.orchestrator)
            .finish()
    }
}

fn canonical_root(root: &Path) -> Result<PathBuf> {
    let canonical = std::fs::canonicalize(root).map_err(|e| ArchitectumError::io(root, e))?;
    if !canonical.is_dir() {
        return Err(ArchitectumError::validation(
            canonical.to_string_lossy(),
            "project root must be a directory",
        ));
    }
    Ok(canonical)
}
