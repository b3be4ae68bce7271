//! Blueprints: focused, self-contained views over both stores.
//!
//! A blueprint resolves a [`Selection`] to a node set, takes the induced
//! subgraph (optionally widened across file boundaries), and attaches the
//! mirror content of the selected files at the requested detail level.

mod assemble;
mod store;

pub use assemble::{
    create, create_file_blueprint, create_method_blueprint, create_path_blueprint,
};
pub use store::{BlueprintDiff, BlueprintStore, RelationshipKey};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::detail::DetailLevelConfig;
use crate::graph::{Node, Relationship};
use crate::mirror::{DirectoryContent, FileContent};

/// Default hop count for cross-file expansion.
pub const DEFAULT_CROSS_FILE_DEPTH: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionKind {
    File,
    Path,
    Method,
}

impl SelectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionKind::File => "file",
            SelectionKind::Path => "path",
            SelectionKind::Method => "method",
        }
    }
}

/// What a blueprint covers. Paths are normalized root-relative strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Files plus everything they transitively contain.
    Files(Vec<String>),
    /// Containment walk from a directory; `depth == 0` is unlimited.
    Path { root: String, depth: usize },
    /// Named elements of one file.
    Method { file: String, names: Vec<String> },
}

impl Selection {
    pub fn kind(&self) -> SelectionKind {
        match self {
            Selection::Files(_) => SelectionKind::File,
            Selection::Path { .. } => SelectionKind::Path,
            Selection::Method { .. } => SelectionKind::Method,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persistence {
    #[default]
    Ephemeral,
    Durable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossFileConfig {
    pub depth: usize,
}

impl Default for CrossFileConfig {
    fn default() -> Self {
        Self {
            depth: DEFAULT_CROSS_FILE_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlueprintOptions {
    /// Required for durable blueprints; generated otherwise.
    pub name: Option<String>,
    pub detail: DetailLevelConfig,
    pub cross_file: Option<CrossFileConfig>,
    pub persistence: Persistence,
}

impl BlueprintOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn durable(mut self) -> Self {
        self.persistence = Persistence::Durable;
        self
    }

    pub fn with_detail(mut self, detail: DetailLevelConfig) -> Self {
        self.detail = detail;
        self
    }

    pub fn with_cross_file(mut self, config: CrossFileConfig) -> Self {
        self.cross_file = Some(config);
        self
    }
}

/// A node as it appears in a blueprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintNode {
    #[serde(flatten)]
    pub node: Node,
    /// Pulled in by cross-file expansion rather than the selection.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cross_file: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owning_file: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlueprintContent {
    /// Mirror entries keyed by file path.
    pub files: BTreeMap<String, FileContent>,
    pub nodes: Vec<BlueprintNode>,
    pub relationships: Vec<Relationship>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub directories: BTreeMap<String, DirectoryContent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    pub name: String,
    #[serde(rename = "type")]
    pub selection_kind: SelectionKind,
    pub detail_level: DetailLevelConfig,
    pub content: BlueprintContent,
    /// Requested files or element names that could not be resolved.
    pub missing: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    pub persistence: Persistence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Blueprint {
    pub fn node(&self, id: &str) -> Option<&BlueprintNode> {
        self.content.nodes.iter().find(|n| n.node.id.as_str() == id)
    }

    pub fn node_ids(&self) -> Vec<&str> {
        self.content.nodes.iter().map(|n| n.node.id.as_str()).collect()
    }
}
