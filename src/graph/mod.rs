//! Typed relationship graph.
//!
//! An arena keyed by deterministic [`NodeId`]s. Nodes and relationships carry
//! insertion sequence numbers so iteration, traversal tie-breaking and
//! serialization are deterministic.
mod algorithms;
mod export;
mod ops;
mod schema;
mod validation;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::detail::{DetailLevel, Project};
use crate::error::{ArchitectumError, Result};

pub use algorithms::Direction;
pub use export::GraphDocument;
pub use ops::{check_contribution, RemoveOutcome, ReplaceOutcome};
pub use schema::{
    Metadata, Node, NodeId, NodeKind, NodeType, ParameterInfo, PropertyInfo, Relationship,
    RelationshipKind, RelationshipType,
};
pub use validation::IntegrityReport;

/// Relationship held back until both endpoints exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRelationship {
    /// File whose parse emitted the relationship.
    pub owner: String,
    #[serde(flatten)]
    pub relationship: Relationship,
}

/// Per-file contribution counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStats {
    pub nodes: usize,
    pub relationships: usize,
}

#[derive(Debug, Clone)]
struct NodeEntry {
    seq: u64,
    node: Node,
}

/// In-memory graph store.
#[derive(Debug, Clone)]
pub struct GraphStore {
    nodes: HashMap<NodeId, NodeEntry>,
    node_order: BTreeMap<u64, NodeId>,
    relationships: BTreeMap<u64, Relationship>,
    outgoing: HashMap<NodeId, BTreeSet<u64>>,
    incoming: HashMap<NodeId, BTreeSet<u64>>,
    pending: Vec<PendingRelationship>,
    next_node_seq: u64,
    next_rel_seq: u64,
    detail_level: DetailLevel,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore {
    /// Empty store at DETAILED (lossless) level.
    pub fn new() -> Self {
        Self::with_detail_level(DetailLevel::Detailed)
    }

    pub fn with_detail_level(detail_level: DetailLevel) -> Self {
        Self {
            nodes: HashMap::new(),
            node_order: BTreeMap::new(),
            relationships: BTreeMap::new(),
            outgoing: HashMap::new(),
            incoming: HashMap::new(),
            pending: Vec::new(),
            next_node_seq: 0,
            next_rel_seq: 0,
            detail_level,
        }
    }

    /// Level applied by `to_json` and carried through `subgraph`.
    pub fn detail_level(&self) -> DetailLevel {
        self.detail_level
    }

    pub fn set_detail_level(&mut self, level: DetailLevel) {
        self.detail_level = level;
    }

    /// Insert a node; a duplicate id is a validation error.
    pub fn add_node(&mut self, node: Node) -> Result<()> {
        if self.nodes.contains_key(&node.id) {
            return Err(ArchitectumError::validation(
                node.id.as_str(),
                "a node with this id already exists",
            ));
        }
        let seq = self.next_node_seq;
        self.next_node_seq += 1;
        self.node_order.insert(seq, node.id.clone());
        self.nodes.insert(node.id.clone(), NodeEntry { seq, node });
        Ok(())
    }

    /// Insert `node` unless its id is already present.
    pub fn ensure_node(&mut self, node: Node) -> bool {
        if self.nodes.contains_key(&node.id) {
            return false;
        }
        // Cannot fail: presence checked above.
        let _ = self.add_node(node);
        true
    }

    /// Insert a relationship; both endpoints must exist.
    pub fn add_relationship(&mut self, relationship: Relationship) -> Result<()> {
        for endpoint in [&relationship.source_id, &relationship.target_id] {
            if !self.nodes.contains_key(endpoint) {
                return Err(ArchitectumError::Reference {
                    source_id: relationship.source_id.to_string(),
                    target_id: relationship.target_id.to_string(),
                    missing: endpoint.to_string(),
                });
            }
        }
        let seq = self.next_rel_seq;
        self.next_rel_seq += 1;
        self.outgoing
            .entry(relationship.source_id.clone())
            .or_default()
            .insert(seq);
        self.incoming
            .entry(relationship.target_id.clone())
            .or_default()
            .insert(seq);
        self.relationships.insert(seq, relationship);
        Ok(())
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Stored node without projection.
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id).map(|entry| &entry.node)
    }

    /// Node projected to `level`.
    pub fn get_node(&self, id: &NodeId, level: DetailLevel) -> Option<Node> {
        self.node(id).map(|node| node.project(level))
    }

    /// Remove a node and every relationship touching it.
    pub fn remove_node(&mut self, id: &NodeId) -> Result<Node> {
        let entry = self
            .nodes
            .remove(id)
            .ok_or_else(|| ArchitectumError::not_found("node", id.as_str()))?;
        self.node_order.remove(&entry.seq);

        let mut touching: BTreeSet<u64> = BTreeSet::new();
        if let Some(seqs) = self.outgoing.remove(id) {
            touching.extend(seqs);
        }
        if let Some(seqs) = self.incoming.remove(id) {
            touching.extend(seqs);
        }
        for seq in touching {
            self.detach_relationship(seq);
        }
        Ok(entry.node)
    }

    /// Remove every `source -> target` relationship of `kind`.
    pub fn remove_relationship(
        &mut self,
        source: &NodeId,
        target: &NodeId,
        kind: RelationshipType,
    ) -> Result<usize> {
        let matching: Vec<u64> = self
            .outgoing
            .get(source)
            .map(|seqs| {
                seqs.iter()
                    .copied()
                    .filter(|seq| {
                        self.relationships.get(seq).is_some_and(|rel| {
                            &rel.target_id == target && rel.relationship_type() == kind
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        if matching.is_empty() {
            return Err(ArchitectumError::not_found(
                "relationship",
                format!("{} -[{}]-> {}", source, kind, target),
            ));
        }
        for seq in &matching {
            self.detach_relationship(*seq);
        }
        Ok(matching.len())
    }

    fn detach_relationship(&mut self, seq: u64) -> Option<Relationship> {
        let rel = self.relationships.remove(&seq)?;
        if let Some(seqs) = self.outgoing.get_mut(&rel.source_id) {
            seqs.remove(&seq);
            if seqs.is_empty() {
                self.outgoing.remove(&rel.source_id);
            }
        }
        if let Some(seqs) = self.incoming.get_mut(&rel.target_id) {
            seqs.remove(&seq);
            if seqs.is_empty() {
                self.incoming.remove(&rel.target_id);
            }
        }
        Some(rel)
    }

    pub fn has_relationship(&self, source: &NodeId, target: &NodeId, kind: RelationshipType) -> bool {
        self.outgoing(source)
            .any(|rel| &rel.target_id == target && rel.relationship_type() == kind)
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.node_order
            .values()
            .filter_map(move |id| self.nodes.get(id).map(|entry| &entry.node))
    }

    /// Relationships in insertion order.
    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.values()
    }

    pub fn get_relationships_by_type(&self, kind: RelationshipType) -> Vec<&Relationship> {
        self.relationships()
            .filter(|rel| rel.relationship_type() == kind)
            .collect()
    }

    pub fn nodes_by_type(&self, kind: NodeType) -> Vec<&Node> {
        self.nodes().filter(|node| node.node_type() == kind).collect()
    }

    /// Nodes produced by the parse of `path`.
    pub fn nodes_owned_by(&self, path: &str) -> Vec<&Node> {
        self.nodes()
            .filter(|node| node.owner.as_deref() == Some(path))
            .collect()
    }

    /// Outgoing relationships of `id` in insertion order.
    pub fn outgoing<'a>(&'a self, id: &NodeId) -> impl Iterator<Item = &'a Relationship> + 'a {
        self.outgoing
            .get(id)
            .into_iter()
            .flat_map(|seqs| seqs.iter())
            .filter_map(move |seq| self.relationships.get(seq))
    }

    /// Incoming relationships of `id` in insertion order.
    pub fn incoming<'a>(&'a self, id: &NodeId) -> impl Iterator<Item = &'a Relationship> + 'a {
        self.incoming
            .get(id)
            .into_iter()
            .flat_map(|seqs| seqs.iter())
            .filter_map(move |seq| self.relationships.get(seq))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn pending(&self) -> &[PendingRelationship] {
        &self.pending
    }

    pub fn counts_by_type(&self) -> BTreeMap<NodeType, usize> {
        let mut counts = BTreeMap::new();
        for node in self.nodes() {
            *counts.entry(node.node_type()).or_insert(0) += 1;
        }
        counts
    }

    /// File that owns `relationship`: the source's owner, else the target's.
    pub fn relationship_owner(&self, relationship: &Relationship) -> Option<&str> {
        self.node(&relationship.source_id)
            .and_then(|node| node.owner.as_deref())
            .or_else(|| {
                self.node(&relationship.target_id)
                    .and_then(|node| node.owner.as_deref())
            })
    }

    /// Paths that own a File node, in insertion order.
    pub fn file_paths(&self) -> Vec<String> {
        self.nodes()
            .filter_map(|node| match &node.kind {
                NodeKind::File { path, .. } => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn file_stats(&self, path: &str) -> FileStats {
        FileStats {
            nodes: self.nodes_owned_by(path).len(),
            relationships: self
                .relationships()
                .filter(|rel| self.relationship_owner(rel) == Some(path))
                .count(),
        }
    }

    /// Canonical serialization of one file's contribution.
    ///
    /// Entries are sorted by their JSON text so the snapshot is independent of
    /// insertion order; two snapshots are equal iff the contributions are.
    pub fn file_snapshot(&self, path: &str) -> String {
        let mut nodes: Vec<String> = self
            .nodes_owned_by(path)
            .into_iter()
            .filter_map(|node| serde_json::to_string(node).ok())
            .collect();
        nodes.sort();

        let mut relationships: Vec<String> = self
            .relationships()
            .filter(|rel| self.relationship_owner(rel) == Some(path))
            .filter_map(|rel| serde_json::to_string(rel).ok())
            .collect();
        relationships.sort();

        let mut pending: Vec<String> = self
            .pending
            .iter()
            .filter(|p| p.owner == path)
            .filter_map(|p| serde_json::to_string(&p.relationship).ok())
            .collect();
        pending.sort();

        serde_json::json!({
            "nodes": nodes,
            "relationships": relationships,
            "pending": pending,
        })
        .to_string()
    }

    pub fn clear(&mut self) {
        *self = Self::with_detail_level(self.detail_level);
    }

    pub(crate) fn node_seq(&self, id: &NodeId) -> Option<u64> {
        self.nodes.get(id).map(|entry| entry.seq)
    }

    pub(crate) fn push_pending(&mut self, owner: &str, relationship: Relationship) {
        self.pending.push(PendingRelationship {
            owner: owner.to_string(),
            relationship,
        });
    }

    pub(crate) fn drop_pending_owned_by(&mut self, path: &str) -> usize {
        let before = self.pending.len();
        self.pending.retain(|p| p.owner != path);
        before - self.pending.len()
    }

    /// Move every pending relationship whose endpoints now exist into the graph.
    pub(crate) fn activate_pending(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let mut activated = 0;
        for entry in pending {
            if self.contains_node(&entry.relationship.source_id)
                && self.contains_node(&entry.relationship.target_id)
            {
                // Endpoints verified; insertion cannot fail.
                let _ = self.add_relationship(entry.relationship);
                activated += 1;
            } else {
                self.pending.push(entry);
            }
        }
        activated
    }

    pub(crate) fn relationship_seqs_touching(&self, id: &NodeId) -> BTreeSet<u64> {
        let mut seqs = BTreeSet::new();
        if let Some(out) = self.outgoing.get(id) {
            seqs.extend(out.iter().copied());
        }
        if let Some(inc) = self.incoming.get(id) {
            seqs.extend(inc.iter().copied());
        }
        seqs
    }

    pub(crate) fn relationship_at(&self, seq: u64) -> Option<&Relationship> {
        self.relationships.get(&seq)
    }
}

#[cfg(test)]
mod tests;
