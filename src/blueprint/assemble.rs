//! Selection resolution and extraction.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    Blueprint, BlueprintContent, BlueprintNode, BlueprintOptions, CrossFileConfig, Persistence,
    Selection,
};
use crate::detail::Project;
use crate::error::{ArchitectumError, Result};
use crate::graph::{GraphStore, NodeId, NodeType, RelationshipType};
use crate::mirror::FileContent;
use crate::stores::Stores;

/// Nodes picked by a selection, before extraction.
#[derive(Debug, Default)]
struct Resolved {
    /// Selected node ids; order is irrelevant, extraction keeps graph order.
    ids: BTreeSet<NodeId>,
    /// Files the selection covers, with the element names to keep from
    /// their mirror entries (`None` keeps all of them).
    files: BTreeMap<String, Option<BTreeSet<String>>>,
    directories: Vec<String>,
    missing: Vec<String>,
    warnings: Vec<String>,
}

/// Assemble a blueprint for any selection.
///
/// # Errors
/// - `ValidationError` when nothing in the selection resolves, or when a
///   durable blueprint has no name
/// - `ConsistencyError` when a requested file is in exactly one store
pub fn create(stores: &Stores, selection: &Selection, options: &BlueprintOptions) -> Result<Blueprint> {
    if options.persistence == Persistence::Durable && options.name.is_none() {
        return Err(ArchitectumError::validation(
            "blueprint",
            "durable blueprints need a name",
        ));
    }

    let resolved = match selection {
        Selection::Files(paths) => resolve_files(stores, paths)?,
        Selection::Path { root, depth } => resolve_path(stores, root, *depth)?,
        Selection::Method { file, names } => resolve_method(stores, file, names)?,
    };
    extract(stores, selection, options, resolved)
}

pub fn create_file_blueprint(
    stores: &Stores,
    paths: &[String],
    options: &BlueprintOptions,
) -> Result<Blueprint> {
    create(stores, &Selection::Files(paths.to_vec()), options)
}

pub fn create_path_blueprint(
    stores: &Stores,
    root: &str,
    depth: usize,
    options: &BlueprintOptions,
) -> Result<Blueprint> {
    create(
        stores,
        &Selection::Path {
            root: root.to_string(),
            depth,
        },
        options,
    )
}

/// Unknown element names land in [`Blueprint::missing`]; they never fail the call.
pub fn create_method_blueprint(
    stores: &Stores,
    file: &str,
    names: &[String],
    options: &BlueprintOptions,
) -> Result<Blueprint> {
    create(
        stores,
        &Selection::Method {
            file: file.to_string(),
            names: names.to_vec(),
        },
        options,
    )
}

/// Whether `path` is present in both stores; `Ok(false)` when in neither.
fn check_file(stores: &Stores, path: &str) -> Result<bool> {
    let in_graph = stores.graph.contains_node(&NodeId::file(path));
    let in_mirror = stores.mirrors.exists(path);
    match (in_graph, in_mirror) {
        (true, true) => Ok(true),
        (false, false) => Ok(false),
        (true, false) => Err(ArchitectumError::consistency(
            path,
            "file is in the graph but has no mirror entry",
        )),
        (false, true) => Err(ArchitectumError::consistency(
            path,
            "file has a mirror entry but no graph node",
        )),
    }
}

/// Every node reachable from `start` through Contains edges.
fn contained_closure(graph: &GraphStore, start: &NodeId, into: &mut BTreeSet<NodeId>) {
    let mut queue = VecDeque::from([start.clone()]);
    while let Some(id) = queue.pop_front() {
        for rel in graph.outgoing(&id) {
            if rel.relationship_type() == RelationshipType::Contains && into.insert(rel.target_id.clone()) {
                queue.push_back(rel.target_id.clone());
            }
        }
    }
}

fn resolve_files(stores: &Stores, paths: &[String]) -> Result<Resolved> {
    let mut resolved = Resolved::default();
    for path in paths {
        if resolved.files.contains_key(path) {
            continue;
        }
        if !check_file(stores, path)? {
            resolved.missing.push(path.clone());
            continue;
        }
        let file_id = NodeId::file(path);
        resolved.ids.insert(file_id.clone());
        contained_closure(&stores.graph, &file_id, &mut resolved.ids);
        resolved.files.insert(path.clone(), None);
    }

    if resolved.files.is_empty() {
        return Err(ArchitectumError::validation(
            "blueprint",
            format!("none of the requested files are synced: {}", paths.join(", ")),
        ));
    }
    Ok(resolved)
}

fn resolve_path(stores: &Stores, root: &str, depth: usize) -> Result<Resolved> {
    let graph = &stores.graph;
    let root_id = NodeId::directory(root);
    if !graph.contains_node(&root_id) {
        return Err(ArchitectumError::validation(
            root,
            "directory has no synced content",
        ));
    }

    let mut resolved = Resolved::default();
    let mut seen = BTreeSet::from([root_id.clone()]);
    let mut queue = VecDeque::from([(root_id, 0usize)]);
    while let Some((id, hops)) = queue.pop_front() {
        if let Some(node) = graph.node(&id) {
            match node.node_type() {
                NodeType::Directory => resolved.directories.push(node.name().to_string()),
                NodeType::File => {
                    let path = node.name().to_string();
                    if !check_file(stores, &path)? {
                        resolved.missing.push(path);
                        continue;
                    }
                    resolved.files.insert(path, Some(BTreeSet::new()));
                    resolved.ids.insert(id.clone());
                }
                _ => {
                    resolved.ids.insert(id.clone());
                }
            }
        }
        if depth != 0 && hops >= depth {
            continue;
        }
        for rel in graph.outgoing(&id) {
            if rel.relationship_type() == RelationshipType::Contains && seen.insert(rel.target_id.clone()) {
                queue.push_back((rel.target_id.clone(), hops + 1));
            }
        }
    }

    for id in &resolved.ids {
        if let (Some(path), Some(qualname)) = (id.file_path(), id.qualified_name()) {
            if let Some(Some(keep)) = resolved.files.get_mut(path) {
                keep.insert(qualname.to_string());
            }
        }
    }
    Ok(resolved)
}

fn resolve_method(stores: &Stores, file: &str, names: &[String]) -> Result<Resolved> {
    if names.is_empty() {
        return Err(ArchitectumError::validation(
            file,
            "no element names given",
        ));
    }
    if !check_file(stores, file)? {
        return Err(ArchitectumError::validation(file, "file is not synced"));
    }

    let graph = &stores.graph;
    let elements: Vec<_> = graph
        .nodes_owned_by(file)
        .into_iter()
        .filter(|node| node.node_type().is_code_element())
        .collect();

    let mut resolved = Resolved::default();
    for name in names {
        let matches: Vec<&NodeId> = elements
            .iter()
            .filter(|node| node.id.qualified_name() == Some(name.as_str()) || node.name() == name.as_str())
            .map(|node| &node.id)
            .collect();
        if matches.is_empty() {
            resolved.missing.push(name.clone());
            continue;
        }
        if matches.len() > 1 {
            resolved.warnings.push(format!(
                "'{}' matches {} elements in {}",
                name,
                matches.len(),
                file
            ));
        }
        for id in matches {
            resolved.ids.insert(id.clone());
            if graph.node(id).map(|n| n.node_type()) == Some(NodeType::Class) {
                contained_closure(graph, id, &mut resolved.ids);
            }
        }
    }

    let keep = resolved
        .ids
        .iter()
        .filter_map(|id| id.qualified_name().map(str::to_string))
        .collect();
    resolved.files.insert(file.to_string(), Some(keep));
    Ok(resolved)
}

/// Nodes owned by files outside `files`, within `config.depth` cross-file hops.
fn expand_cross_file(
    graph: &GraphStore,
    seeds: &BTreeSet<NodeId>,
    files: &BTreeMap<String, Option<BTreeSet<String>>>,
    config: CrossFileConfig,
) -> BTreeMap<NodeId, String> {
    let mut added = BTreeMap::new();
    let mut visited: HashSet<NodeId> = seeds.iter().cloned().collect();
    let mut frontier: Vec<NodeId> = seeds.iter().cloned().collect();

    for _ in 0..config.depth {
        let mut next = Vec::new();
        for id in &frontier {
            let cross: Vec<&NodeId> = graph
                .outgoing(id)
                .chain(graph.incoming(id))
                .filter(|rel| rel.relationship_type().is_cross_file())
                .map(|rel| if &rel.source_id == id { &rel.target_id } else { &rel.source_id })
                .collect();
            for neighbor in cross {
                if !visited.insert(neighbor.clone()) {
                    continue;
                }
                let Some(owner) = graph.node(neighbor).and_then(|n| n.owner.clone()) else {
                    continue;
                };
                if files.contains_key(&owner) {
                    continue;
                }
                added.insert(neighbor.clone(), owner);
                next.push(neighbor.clone());
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
    added
}

fn extract(
    stores: &Stores,
    selection: &Selection,
    options: &BlueprintOptions,
    mut resolved: Resolved,
) -> Result<Blueprint> {
    let graph = &stores.graph;
    let cross = match options.cross_file {
        Some(config) => expand_cross_file(graph, &resolved.ids, &resolved.files, config),
        None => BTreeMap::new(),
    };

    let wanted: Vec<&NodeId> = resolved.ids.iter().chain(cross.keys()).collect();
    let sub = graph.subgraph(wanted);
    let node_level = options.detail.relationship_map;

    let nodes = sub
        .nodes()
        .map(|node| BlueprintNode {
            node: node.project(node_level),
            cross_file: cross.contains_key(&node.id),
            owning_file: cross.get(&node.id).cloned(),
        })
        .collect();
    let relationships = sub.relationships().map(|rel| rel.project(node_level)).collect();

    let mut files = BTreeMap::new();
    for (path, keep) in &resolved.files {
        let content = match stores.mirrors.get_mirrored_content(path, options.detail.json_mirrors) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = path.as_str(), error = %e, "mirror entry unreadable");
                resolved.warnings.push(format!("{}: {}", path, e));
                continue;
            }
        };
        let content: FileContent = match keep {
            Some(names) => content.retain_elements(names.iter().map(String::as_str)),
            None => content,
        };
        files.insert(path.clone(), content);
    }

    let mut directories = BTreeMap::new();
    for dir in &resolved.directories {
        match stores.mirrors.get_directory_content(dir) {
            Ok(content) => {
                directories.insert(dir.clone(), content.project(options.detail.json_mirrors));
            }
            Err(e) => debug!(dir = dir.as_str(), error = %e, "no directory entry"),
        }
    }

    let name = options
        .name
        .clone()
        .unwrap_or_else(|| format!("{}-{}", selection.kind().as_str(), Uuid::new_v4()));

    debug!(
        name = name.as_str(),
        nodes = sub.node_count(),
        relationships = sub.relationship_count(),
        cross_file = cross.len(),
        missing = resolved.missing.len(),
        "blueprint assembled"
    );

    Ok(Blueprint {
        name,
        selection_kind: selection.kind(),
        detail_level: options.detail,
        content: BlueprintContent {
            files,
            nodes,
            relationships,
            directories,
        },
        missing: resolved.missing,
        warnings: resolved.warnings,
        persistence: options.persistence,
        version: None,
        created_at: None,
    })
}
