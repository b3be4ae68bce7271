//! Graph JSON export and import.
//!
//! The document lists nodes and relationships in insertion order, so an
//! unchanged graph always serializes to the same bytes.
//!
//! `to_json` is the export view and applies the active detail level.
//! `save` writes the lossless store; the level is only recorded as a tag, so
//! a reopened graph holds exactly what the parsers produced.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{GraphStore, Node, PendingRelationship, Relationship};
use crate::common::{read_json, write_json};
use crate::detail::{DetailLevel, Project};
use crate::error::{ArchitectumError, Result};

/// Persisted graph document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<Node>,
    pub relationships: Vec<Relationship>,
    pub detail_level: DetailLevel,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending: Vec<PendingRelationship>,
}

impl GraphStore {
    /// Document projected at the active detail level.
    pub fn to_document(&self) -> GraphDocument {
        let level = self.detail_level;
        GraphDocument {
            nodes: self.nodes().map(|node| node.project(level)).collect(),
            relationships: self.relationships().map(|rel| rel.project(level)).collect(),
            detail_level: level,
            pending: self.pending.clone(),
        }
    }

    /// Document with every field, tagged with the active detail level.
    pub fn to_lossless_document(&self) -> GraphDocument {
        GraphDocument {
            nodes: self.nodes().cloned().collect(),
            relationships: self.relationships().cloned().collect(),
            detail_level: self.detail_level,
            pending: self.pending.clone(),
        }
    }

    /// Rebuild a store from a document.
    ///
    /// Fails with `ValidationError` on duplicate node ids and with
    /// `ReferenceError` on relationships whose endpoints are absent.
    pub fn from_document(document: GraphDocument) -> Result<Self> {
        let mut graph = GraphStore::with_detail_level(document.detail_level);
        for node in document.nodes {
            graph.add_node(node)?;
        }
        for rel in document.relationships {
            graph.add_relationship(rel)?;
        }
        graph.pending = document.pending;
        Ok(graph)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_document())
            .map_err(|e| ArchitectumError::validation("graph", e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let document: GraphDocument = serde_json::from_str(json)
            .map_err(|e| ArchitectumError::validation("graph json", e.to_string()))?;
        Self::from_document(document)
    }

    /// Write the lossless document atomically to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, &self.to_lossless_document())
    }

    /// Load a saved graph; `Ok(None)` when no file exists yet.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        match read_json::<GraphDocument>(path)? {
            Some(document) => Ok(Some(Self::from_document(document)?)),
            None => Ok(None),
        }
    }
}
