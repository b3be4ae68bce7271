//! Graph validation module
//!
//! Structural invariant checks for the graph store: dangling relationship
//! endpoints, adjacency index drift, and files detached from their directory.

use serde::{Deserialize, Serialize};

use super::{GraphStore, NodeId, NodeType, RelationshipType};
use crate::validation::parent_of;

/// Report of integrity check results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// Whether the check passed (no errors)
    pub passed: bool,
    pub errors: Vec<IntegrityIssue>,
    pub warnings: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    pub fn total_issues(&self) -> usize {
        self.errors.len() + self.warnings.len()
    }

    pub fn is_clean(&self) -> bool {
        self.total_issues() == 0
    }
}

/// One integrity finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityIssue {
    /// Machine-readable code (SCREAMING_SNAKE_CASE)
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

impl IntegrityIssue {
    fn new(code: &str, message: String, entity_id: Option<&NodeId>) -> Self {
        Self {
            code: code.to_string(),
            message,
            entity_id: entity_id.map(|id| id.to_string()),
        }
    }
}

impl GraphStore {
    /// Check graph invariants.
    pub fn validate(&self) -> IntegrityReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        let mut indexed = 0usize;
        for (seq, rel) in &self.relationships {
            for endpoint in [&rel.source_id, &rel.target_id] {
                if !self.contains_node(endpoint) {
                    errors.push(IntegrityIssue::new(
                        "ORPHAN_RELATIONSHIP",
                        format!(
                            "{} -[{}]-> {} references missing node",
                            rel.source_id,
                            rel.relationship_type(),
                            rel.target_id
                        ),
                        Some(endpoint),
                    ));
                }
            }
            let out_ok = self
                .outgoing
                .get(&rel.source_id)
                .is_some_and(|seqs| seqs.contains(seq));
            let in_ok = self
                .incoming
                .get(&rel.target_id)
                .is_some_and(|seqs| seqs.contains(seq));
            if out_ok && in_ok {
                indexed += 1;
            } else {
                errors.push(IntegrityIssue::new(
                    "INDEX_MISMATCH",
                    format!("relationship #{} missing from adjacency index", seq),
                    Some(&rel.source_id),
                ));
            }
        }

        let index_entries: usize = self.outgoing.values().map(|s| s.len()).sum();
        if index_entries != indexed {
            errors.push(IntegrityIssue::new(
                "INDEX_MISMATCH",
                format!(
                    "adjacency index holds {} entries for {} relationships",
                    index_entries, indexed
                ),
                None,
            ));
        }

        for node in self.nodes_by_type(NodeType::File) {
            let path = node.name();
            if let Some(parent) = parent_of(path) {
                let dir_id = NodeId::directory(&parent);
                if !self.has_relationship(&dir_id, &node.id, RelationshipType::Contains) {
                    warnings.push(IntegrityIssue::new(
                        "FILE_WITHOUT_DIRECTORY",
                        format!("{} is not contained by {}", path, dir_id),
                        Some(&node.id),
                    ));
                }
            }
        }

        for pending in &self.pending {
            warnings.push(IntegrityIssue::new(
                "PENDING_RELATIONSHIP",
                format!(
                    "{} -[{}]-> {} waits for a missing endpoint (owner {})",
                    pending.relationship.source_id,
                    pending.relationship.relationship_type(),
                    pending.relationship.target_id,
                    pending.owner
                ),
                Some(&pending.relationship.source_id),
            ));
        }

        errors.sort_by(|a, b| a.code.cmp(&b.code).then_with(|| a.message.cmp(&b.message)));
        warnings.sort_by(|a, b| a.code.cmp(&b.code).then_with(|| a.message.cmp(&b.message)));

        IntegrityReport {
            passed: errors.is_empty(),
            errors,
            warnings,
        }
    }
}
