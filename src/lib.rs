//! Architectum: a code relationship graph and a JSON content mirror kept in
//! step by incremental sync, with focused "blueprint" views assembled from
//! both on demand.
//!
//! # Position Conventions
//!
//! - **Line positions**: 1-indexed (line 1 is the first line)
//! - **Paths**: normalized, root-relative, `/`-separated; the root itself is `.`
//!
//! # Stores
//!
//! | store | contents | persisted as |
//! |-------|----------|--------------|
//! | graph | typed nodes and relationships | `.architectum/graph.json` |
//! | mirror | per-file element content | `.architectum/mirrors/<path>.json` |
//! | ledger | path -> content hash | `.architectum/ledger.json` |
//!
//! Every commit updates all three for one file under a single write lock.

pub mod blueprint;
pub mod catalog;
pub mod common;
pub mod config;
pub mod detail;
pub mod diagnostics;
pub mod error;
pub mod error_codes;
pub mod filter;
pub mod graph;
pub mod ingest;
pub mod mirror;
pub mod output;
pub mod stores;
pub mod sync;
pub mod tracker;
pub mod validation;
pub mod workspace;

pub use blueprint::{
    Blueprint, BlueprintDiff, BlueprintNode, BlueprintOptions, BlueprintStore, CrossFileConfig,
    Persistence, Selection, SelectionKind,
};
pub use catalog::{CatalogSink, CommitChange, CommitEvent, JournalCatalog, MemoryCatalog};
pub use common::{compute_hash, hash_file};
pub use config::ArchitectumConfig;
pub use detail::{project, DetailLevel, DetailLevelConfig, Project};
pub use diagnostics::{DiagnosticStage, SkipReason, SyncDiagnostic};
pub use error::{ArchitectumError, ErrorKind, Result};
pub use filter::FileFilter;
pub use graph::{
    Direction, GraphStore, Node, NodeId, NodeKind, NodeType, Relationship, RelationshipKind,
    RelationshipType,
};
pub use ingest::{ParseOutput, Parser, ParserRegistry, SourceFile};
pub use mirror::{CodeElement, DirectoryContent, FileContent, MirrorStore};
pub use output::{generate_execution_id, output_json, JsonResponse};
pub use stores::{SharedStores, Stores};
pub use sync::{CancellationToken, PathLockTable, SyncOptions, SyncOrchestrator, SyncReport};
pub use tracker::{ChangeSet, ChangeTracker, SyncScope};
pub use workspace::{Architectum, VerifyReport, WorkspaceStatus};
