//! Durable blueprint persistence.
//!
//! Layout: `<dir>/<name>/v<N>.json`, versions counting up from 1.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{Blueprint, Persistence};
use crate::common::{read_json, write_json};
use crate::error::{ArchitectumError, Result};
use crate::graph::{Relationship, RelationshipType};

/// Identity of a relationship inside a blueprint diff.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipKey {
    pub source_id: String,
    pub target_id: String,
    #[serde(rename = "type")]
    pub relationship_type: RelationshipType,
}

impl From<&Relationship> for RelationshipKey {
    fn from(rel: &Relationship) -> Self {
        Self {
            source_id: rel.source_id.to_string(),
            target_id: rel.target_id.to_string(),
            relationship_type: rel.relationship_type(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlueprintDiff {
    pub name: String,
    pub from: u32,
    pub to: u32,
    pub added_nodes: Vec<String>,
    pub removed_nodes: Vec<String>,
    pub added_relationships: Vec<RelationshipKey>,
    pub removed_relationships: Vec<RelationshipKey>,
    pub added_files: Vec<String>,
    pub removed_files: Vec<String>,
    /// Files in both versions whose `content_hash` differs.
    pub changed_files: Vec<String>,
}

impl BlueprintDiff {
    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty()
            && self.removed_nodes.is_empty()
            && self.added_relationships.is_empty()
            && self.removed_relationships.is_empty()
            && self.added_files.is_empty()
            && self.removed_files.is_empty()
            && self.changed_files.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct BlueprintStore {
    dir: PathBuf,
}

impl BlueprintStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn version_path(&self, name: &str, version: u32) -> PathBuf {
        self.dir.join(name).join(format!("v{}.json", version))
    }

    /// Persist `blueprint` as the next version of its name.
    ///
    /// Stamps version, `created_at` and durable persistence on the value
    /// and returns the assigned version.
    pub fn save(&self, blueprint: &mut Blueprint) -> Result<u32> {
        validate_name(&blueprint.name)?;
        let version = self.list_versions(&blueprint.name)?.last().copied().unwrap_or(0) + 1;

        blueprint.version = Some(version);
        blueprint.persistence = Persistence::Durable;
        blueprint.created_at = Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
        write_json(&self.version_path(&blueprint.name, version), blueprint)?;

        info!(
            name = blueprint.name.as_str(),
            version,
            nodes = blueprint.content.nodes.len(),
            "blueprint saved"
        );
        Ok(version)
    }

    /// Load one version, or the latest when `version` is `None`.
    pub fn load(&self, name: &str, version: Option<u32>) -> Result<Blueprint> {
        validate_name(name)?;
        let version = match version {
            Some(v) => v,
            None => self
                .list_versions(name)?
                .last()
                .copied()
                .ok_or_else(|| ArchitectumError::not_found("blueprint", name))?,
        };
        read_json::<Blueprint>(&self.version_path(name, version))?
            .ok_or_else(|| ArchitectumError::not_found("blueprint version", format!("{}@v{}", name, version)))
    }

    /// Stored versions of `name`, ascending.
    pub fn list_versions(&self, name: &str) -> Result<Vec<u32>> {
        let dir = self.dir.join(name);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ArchitectumError::io(&dir, e)),
        };

        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ArchitectumError::io(&dir, e))?;
            let file_name = entry.file_name();
            let Some(version) = file_name
                .to_str()
                .and_then(|n| n.strip_prefix('v'))
                .and_then(|n| n.strip_suffix(".json"))
                .and_then(|n| n.parse::<u32>().ok())
            else {
                continue;
            };
            versions.push(version);
        }
        versions.sort_unstable();
        Ok(versions)
    }

    /// Names with at least one stored version, sorted.
    pub fn list_names(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ArchitectumError::io(&self.dir, e)),
        };
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ArchitectumError::io(&self.dir, e))?;
            if let Some(name) = entry.file_name().to_str() {
                if !self.list_versions(name)?.is_empty() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn diff(&self, name: &str, from: u32, to: u32) -> Result<BlueprintDiff> {
        let old = self.load(name, Some(from))?;
        let new = self.load(name, Some(to))?;

        let old_nodes: BTreeSet<String> = old.content.nodes.iter().map(|n| n.node.id.to_string()).collect();
        let new_nodes: BTreeSet<String> = new.content.nodes.iter().map(|n| n.node.id.to_string()).collect();
        let old_rels: BTreeSet<RelationshipKey> =
            old.content.relationships.iter().map(RelationshipKey::from).collect();
        let new_rels: BTreeSet<RelationshipKey> =
            new.content.relationships.iter().map(RelationshipKey::from).collect();

        let old_files = &old.content.files;
        let new_files = &new.content.files;

        Ok(BlueprintDiff {
            name: name.to_string(),
            from,
            to,
            added_nodes: new_nodes.difference(&old_nodes).cloned().collect(),
            removed_nodes: old_nodes.difference(&new_nodes).cloned().collect(),
            added_relationships: new_rels.difference(&old_rels).cloned().collect(),
            removed_relationships: old_rels.difference(&new_rels).cloned().collect(),
            added_files: new_files.keys().filter(|p| !old_files.contains_key(*p)).cloned().collect(),
            removed_files: old_files.keys().filter(|p| !new_files.contains_key(*p)).cloned().collect(),
            changed_files: new_files
                .iter()
                .filter(|(path, content)| {
                    old_files
                        .get(*path)
                        .is_some_and(|prev| prev.content_hash != content.content_hash)
                })
                .map(|(path, _)| path.clone())
                .collect(),
        })
    }
}

/// Names become directory names: no separators, no leading dot, not empty.
fn validate_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.starts_with('.')
        || name.chars().any(|c| matches!(c, '/' | '\\' | '\0') || c.is_control());
    if bad {
        return Err(ArchitectumError::validation(
            name,
            "blueprint names must be non-empty, without path separators or a leading dot",
        ));
    }
    Ok(())
}
