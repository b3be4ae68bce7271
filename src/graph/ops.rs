//! Path-scoped graph mutation.
//!
//! Provides the remove-then-insert resync of one file's contribution and the
//! removal of a deleted file. Relationships owned by other files that point
//! into the replaced file are parked and restored, never silently dropped.

use serde::Serialize;
use std::collections::HashSet;

use super::{GraphStore, Node, NodeId, NodeType, Relationship, RelationshipType};
use crate::error::{ArchitectumError, Result};
use crate::validation::{ancestors, parent_of, ROOT};

/// Result of [`GraphStore::replace_file`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplaceOutcome {
    pub nodes_added: usize,
    pub relationships_added: usize,
    /// Relationships of this file waiting for an endpoint in another file.
    pub parked: usize,
    /// Foreign relationships re-attached after the replace.
    pub restored_foreign: usize,
    /// Foreign relationships whose endpoint disappeared.
    pub parked_foreign: usize,
    /// Previously pending relationships that became resolvable.
    pub activated: usize,
}

/// Result of [`GraphStore::remove_file`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RemoveOutcome {
    pub removed_nodes: usize,
    pub parked_foreign: usize,
    pub pruned_directories: Vec<String>,
}

/// Check that a parse result only claims what belongs to `path`.
///
/// # Guarantees
/// - every node is owned by `path`, or is an unowned Directory/Feature node
/// - no two nodes share an id
/// - no owned node collides with a node owned by another file
/// - the File node for `path` is present
pub fn check_contribution(graph: &GraphStore, path: &str, nodes: &[Node]) -> Result<()> {
    let mut seen: HashSet<&NodeId> = HashSet::new();
    let mut has_file_node = false;

    for node in nodes {
        if !seen.insert(&node.id) {
            return Err(ArchitectumError::validation(
                node.id.as_str(),
                format!("duplicate node id in contribution of {}", path),
            ));
        }
        match node.owner.as_deref() {
            Some(owner) if owner == path => {}
            None if matches!(node.node_type(), NodeType::Directory | NodeType::Feature) => continue,
            other => {
                return Err(ArchitectumError::validation(
                    node.id.as_str(),
                    format!(
                        "node owned by {:?} cannot be contributed by {}",
                        other.unwrap_or("nobody"),
                        path
                    ),
                ));
            }
        }
        if let Some(existing) = graph.node(&node.id) {
            if existing.owner.as_deref() != Some(path) {
                return Err(ArchitectumError::validation(
                    node.id.as_str(),
                    "id already taken by a node of another owner",
                ));
            }
        }
        if node.id == NodeId::file(path) {
            has_file_node = true;
        }
    }

    if !has_file_node {
        return Err(ArchitectumError::validation(
            path,
            "contribution has no File node for its own path",
        ));
    }
    Ok(())
}

impl GraphStore {
    /// Replace the contribution of `path` with `nodes` and `relationships`.
    ///
    /// # Behavior
    /// 1. Validate the contribution (nothing is mutated on failure)
    /// 2. Drop pending relationships owned by `path`
    /// 3. Collect foreign relationships touching nodes owned by `path`
    /// 4. Remove owned nodes (cascading their relationships)
    /// 5. Ensure the directory chain and `dir -> file` containment
    /// 6. Insert nodes, then relationships (unresolvable ones are parked)
    /// 7. Restore foreign relationships, then activate pending ones
    ///
    /// # Guarantees
    /// Nodes and relationships owned by other paths are unchanged unless
    /// they reference a node of `path` that no longer exists, in which case
    /// they are parked until it reappears.
    pub fn replace_file(
        &mut self,
        path: &str,
        nodes: Vec<Node>,
        relationships: Vec<Relationship>,
    ) -> Result<ReplaceOutcome> {
        check_contribution(self, path, &nodes)?;

        let mut outcome = ReplaceOutcome::default();
        self.drop_pending_owned_by(path);
        let foreign = self.detach_owned(path);

        self.ensure_directory_chain(path);
        for node in nodes {
            if node.owner.is_none() {
                if self.ensure_node(node) {
                    outcome.nodes_added += 1;
                }
            } else {
                self.add_node(node)?;
                outcome.nodes_added += 1;
            }
        }

        let file_id = NodeId::file(path);
        if let Some(parent) = parent_of(path) {
            let dir_id = NodeId::directory(&parent);
            if !self.has_relationship(&dir_id, &file_id, RelationshipType::Contains) {
                self.add_relationship(Relationship::contains(dir_id, file_id))?;
                outcome.relationships_added += 1;
            }
        }

        for rel in relationships {
            if self.contains_node(&rel.source_id) && self.contains_node(&rel.target_id) {
                self.add_relationship(rel)?;
                outcome.relationships_added += 1;
            } else {
                self.push_pending(path, rel);
                outcome.parked += 1;
            }
        }

        for (owner, rel) in foreign {
            if self.contains_node(&rel.source_id) && self.contains_node(&rel.target_id) {
                self.add_relationship(rel)?;
                outcome.restored_foreign += 1;
            } else if let Some(owner) = owner {
                self.push_pending(&owner, rel);
                outcome.parked_foreign += 1;
            }
        }

        outcome.activated = self.activate_pending();
        Ok(outcome)
    }

    /// Remove everything owned by `path` and prune emptied directories.
    pub fn remove_file(&mut self, path: &str) -> RemoveOutcome {
        let mut outcome = RemoveOutcome::default();
        self.drop_pending_owned_by(path);

        let owned = self.nodes_owned_by(path).len();
        let foreign = self.detach_owned(path);
        outcome.removed_nodes = owned;

        for (owner, rel) in foreign {
            if let Some(owner) = owner {
                self.push_pending(&owner, rel);
                outcome.parked_foreign += 1;
            }
        }

        for dir in ancestors(path).into_iter().rev() {
            if dir == ROOT {
                break;
            }
            let dir_id = NodeId::directory(&dir);
            if !self.contains_node(&dir_id) {
                continue;
            }
            let has_children = self
                .outgoing(&dir_id)
                .any(|rel| rel.relationship_type() == RelationshipType::Contains);
            if has_children {
                break;
            }
            if self.remove_node(&dir_id).is_ok() {
                outcome.pruned_directories.push(dir);
            }
        }
        outcome
    }

    /// Remove nodes owned by `path`, returning the foreign relationships
    /// (with their owners) that the cascade took with them.
    fn detach_owned(&mut self, path: &str) -> Vec<(Option<String>, Relationship)> {
        let owned: Vec<NodeId> = self
            .nodes_owned_by(path)
            .into_iter()
            .map(|node| node.id.clone())
            .collect();

        let mut seqs = std::collections::BTreeSet::new();
        for id in &owned {
            seqs.extend(self.relationship_seqs_touching(id));
        }

        let mut foreign = Vec::new();
        for seq in seqs {
            if let Some(rel) = self.relationship_at(seq) {
                let owner = self.relationship_owner(rel).map(str::to_string);
                if owner.as_deref() != Some(path) {
                    foreign.push((owner, rel.clone()));
                }
            }
        }

        for id in &owned {
            let _ = self.remove_node(id);
        }
        foreign
    }

    /// Create Directory nodes from the root down to the parent of `path`.
    fn ensure_directory_chain(&mut self, path: &str) {
        let mut parent: Option<NodeId> = None;
        for dir in ancestors(path) {
            let dir_id = NodeId::directory(&dir);
            self.ensure_node(Node::directory(&dir));
            if let Some(parent_id) = parent.take() {
                if !self.has_relationship(&parent_id, &dir_id, RelationshipType::Contains) {
                    // Both endpoints were just ensured.
                    let _ = self.add_relationship(Relationship::contains(parent_id, dir_id.clone()));
                }
            }
            parent = Some(dir_id);
        }
    }
}
