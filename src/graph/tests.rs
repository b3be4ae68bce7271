//! Tests for graph module

use super::*;
use crate::detail::DetailLevel;
use crate::error::ErrorKind;

fn function(path: &str, name: &str, line: u32) -> Node {
    Node::element(
        path,
        name,
        NodeKind::Function {
            name: name.to_string(),
            parameters: vec![ParameterInfo::named("x")],
            return_type: Some("int".to_string()),
            line_start: line,
            line_end: line + 1,
        },
    )
}

/// File node, one function per name, file -> function containment.
fn contribution(path: &str, names: &[&str]) -> (Vec<Node>, Vec<Relationship>) {
    let mut nodes = vec![Node::file(path)];
    let mut rels = Vec::new();
    for (i, name) in names.iter().enumerate() {
        let node = function(path, name, (i as u32) * 3 + 1);
        rels.push(Relationship::contains(NodeId::file(path), node.id.clone()));
        nodes.push(node);
    }
    (nodes, rels)
}

fn ids(raw: &[&str]) -> Vec<NodeId> {
    raw.iter().map(|s| NodeId::from(*s)).collect()
}

fn plain(id: &str) -> Node {
    Node::feature(id, None)
}

#[test]
fn test_add_relationship_requires_endpoints() {
    let mut graph = GraphStore::new();
    graph.add_node(plain("a")).unwrap();

    let err = graph
        .add_relationship(Relationship::contains(NodeId::feature("a"), NodeId::feature("b")))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Reference);
    assert_eq!(err.subject(), "feature:b");
    assert_eq!(graph.relationship_count(), 0);
}

#[test]
fn test_duplicate_node_rejected() {
    let mut graph = GraphStore::new();
    graph.add_node(plain("a")).unwrap();
    let err = graph.add_node(plain("a")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(graph.node_count(), 1);
}

#[test]
fn test_remove_node_cascades() {
    let mut graph = GraphStore::new();
    for name in ["a", "b", "c"] {
        graph.add_node(plain(name)).unwrap();
    }
    let [a, b, c] = [NodeId::feature("a"), NodeId::feature("b"), NodeId::feature("c")];
    graph.add_relationship(Relationship::contains(a.clone(), b.clone())).unwrap();
    graph.add_relationship(Relationship::calls(b.clone(), c.clone(), None)).unwrap();
    graph.add_relationship(Relationship::calls(c.clone(), a.clone(), None)).unwrap();

    graph.remove_node(&b).unwrap();

    assert_eq!(graph.relationship_count(), 1);
    assert!(graph.relationships().all(|rel| !rel.touches(&b)));
    assert!(graph.validate().passed);
    assert_eq!(graph.remove_node(&b).unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn test_remove_relationship_by_kind() {
    let mut graph = GraphStore::new();
    graph.add_node(plain("a")).unwrap();
    graph.add_node(plain("b")).unwrap();
    let (a, b) = (NodeId::feature("a"), NodeId::feature("b"));
    graph.add_relationship(Relationship::calls(a.clone(), b.clone(), Some(1))).unwrap();
    graph.add_relationship(Relationship::calls(a.clone(), b.clone(), Some(9))).unwrap();
    graph.add_relationship(Relationship::contains(a.clone(), b.clone())).unwrap();

    assert_eq!(graph.remove_relationship(&a, &b, RelationshipType::Calls).unwrap(), 2);
    assert_eq!(graph.relationship_count(), 1);
    let err = graph
        .remove_relationship(&a, &b, RelationshipType::Imports)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_integrity_under_mixed_mutations() {
    // Deterministic pseudo-random sequence of adds and removes.
    let mut graph = GraphStore::new();
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    for step in 0..500 {
        let a = NodeId::feature(&format!("n{}", next() % 40));
        let b = NodeId::feature(&format!("n{}", next() % 40));
        match next() % 4 {
            0 => {
                let _ = graph.add_node(Node::feature(a.as_str().trim_start_matches("feature:"), None));
            }
            1 | 2 => {
                let result = graph.add_relationship(Relationship::calls(a.clone(), b.clone(), None));
                if !(graph.contains_node(&a) && graph.contains_node(&b)) {
                    assert!(result.is_err(), "step {}: dangling insert accepted", step);
                }
            }
            _ => {
                let _ = graph.remove_node(&a);
            }
        }
        for rel in graph.relationships() {
            assert!(graph.contains_node(&rel.source_id), "step {}", step);
            assert!(graph.contains_node(&rel.target_id), "step {}", step);
        }
    }
    assert!(graph.validate().passed);
}

#[test]
fn test_traverse_breaks_ties_by_insertion_order() {
    let mut graph = GraphStore::new();
    for name in ["root", "z", "a", "m", "leaf"] {
        graph.add_node(plain(name)).unwrap();
    }
    let f = |s: &str| NodeId::feature(s);
    graph.add_relationship(Relationship::contains(f("root"), f("z"))).unwrap();
    graph.add_relationship(Relationship::contains(f("root"), f("a"))).unwrap();
    graph.add_relationship(Relationship::contains(f("root"), f("m"))).unwrap();
    graph.add_relationship(Relationship::contains(f("a"), f("leaf"))).unwrap();

    let order = graph.traverse(&f("root"), Direction::Outgoing, None).unwrap();
    assert_eq!(
        order,
        ids(&["feature:root", "feature:z", "feature:a", "feature:m", "feature:leaf"])
    );

    let shallow = graph.traverse(&f("root"), Direction::Outgoing, Some(1)).unwrap();
    assert_eq!(shallow.len(), 4);

    let upward = graph.traverse(&f("leaf"), Direction::Incoming, None).unwrap();
    assert_eq!(upward, ids(&["feature:leaf", "feature:a", "feature:root"]));

    assert_eq!(
        graph.traverse(&f("ghost"), Direction::Both, None).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn test_shortest_path_directed() {
    let mut graph = GraphStore::new();
    for name in ["a", "b", "c", "d"] {
        graph.add_node(plain(name)).unwrap();
    }
    let f = |s: &str| NodeId::feature(s);
    graph.add_relationship(Relationship::calls(f("a"), f("b"), None)).unwrap();
    graph.add_relationship(Relationship::calls(f("b"), f("c"), None)).unwrap();
    graph.add_relationship(Relationship::calls(f("a"), f("c"), None)).unwrap();

    let path = graph.shortest_path(&f("a"), &f("c")).unwrap().unwrap();
    assert_eq!(path, ids(&["feature:a", "feature:c"]));
    assert!(graph.shortest_path(&f("c"), &f("a")).unwrap().is_none());
    assert!(graph.shortest_path(&f("a"), &f("d")).unwrap().is_none());
    assert_eq!(graph.shortest_path(&f("a"), &f("a")).unwrap().unwrap().len(), 1);
}

#[test]
fn test_connected_components_are_weak_and_ordered() {
    let mut graph = GraphStore::new();
    for name in ["a", "b", "c", "d", "e"] {
        graph.add_node(plain(name)).unwrap();
    }
    let f = |s: &str| NodeId::feature(s);
    graph.add_relationship(Relationship::calls(f("b"), f("a"), None)).unwrap();
    graph.add_relationship(Relationship::calls(f("d"), f("c"), None)).unwrap();

    let components = graph.connected_components();
    assert_eq!(
        components,
        vec![
            ids(&["feature:a", "feature:b"]),
            ids(&["feature:c", "feature:d"]),
            ids(&["feature:e"]),
        ]
    );
}

#[test]
fn test_subgraph_is_induced() {
    let mut graph = GraphStore::with_detail_level(DetailLevel::Standard);
    for name in ["a", "b", "c"] {
        graph.add_node(plain(name)).unwrap();
    }
    let f = |s: &str| NodeId::feature(s);
    graph.add_relationship(Relationship::calls(f("a"), f("b"), None)).unwrap();
    graph.add_relationship(Relationship::calls(f("b"), f("c"), None)).unwrap();

    let keep = [f("a"), f("b"), f("missing")];
    let sub = graph.subgraph(keep.iter());
    assert_eq!(sub.node_count(), 2);
    assert_eq!(sub.relationship_count(), 1);
    assert_eq!(sub.detail_level(), DetailLevel::Standard);
}

#[test]
fn test_json_round_trip_is_byte_identical() {
    let mut graph = GraphStore::new();
    let (nodes, rels) = contribution("src/a.py", &["foo", "bar"]);
    graph.replace_file("src/a.py", nodes, rels).unwrap();
    graph.ensure_node(Node::feature("auth", Some("Login flow")));

    let json = graph.to_json().unwrap();
    let back = GraphStore::from_json(&json).unwrap();
    assert_eq!(back.to_json().unwrap(), json);
    assert_eq!(back.detail_level(), DetailLevel::Detailed);
}

#[test]
fn test_json_round_trip_keeps_detail_tag() {
    let mut graph = GraphStore::with_detail_level(DetailLevel::Minimal);
    let (nodes, rels) = contribution("a.py", &["foo"]);
    graph.replace_file("a.py", nodes, rels).unwrap();

    let json = graph.to_json().unwrap();
    assert!(json.contains("\"detail_level\": \"minimal\""));
    assert!(!json.contains("\"parameters\""));
    let back = GraphStore::from_json(&json).unwrap();
    assert_eq!(back.detail_level(), DetailLevel::Minimal);
}

#[test]
fn test_save_is_lossless_at_any_level() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let path = temp_dir.path().join("graph.json");
    let mut graph = GraphStore::with_detail_level(DetailLevel::Minimal);
    let (nodes, rels) = contribution("a.py", &["foo"]);
    graph.replace_file("a.py", nodes, rels).unwrap();
    graph.save(&path).unwrap();

    let back = GraphStore::load(&path).unwrap().unwrap();
    assert_eq!(back.detail_level(), DetailLevel::Minimal);
    let foo = back.node(&NodeId::element("a.py", "foo")).unwrap();
    match &foo.kind {
        NodeKind::Function {
            parameters,
            return_type,
            ..
        } => {
            assert_eq!(parameters.len(), 1);
            assert_eq!(return_type.as_deref(), Some("int"));
        }
        other => panic!("unexpected kind {:?}", other),
    }
    assert!(!back.to_json().unwrap().contains("\"parameters\""));
}

#[test]
fn test_from_json_rejects_dangling() {
    let json = r#"{"nodes":[],"relationships":[{"source_id":"x","target_id":"y","type":"contains"}],"detail_level":"standard"}"#;
    assert_eq!(GraphStore::from_json(json).unwrap_err().kind(), ErrorKind::Reference);
    assert_eq!(GraphStore::from_json("{").unwrap_err().kind(), ErrorKind::Validation);
}

#[test]
fn test_replace_file_builds_directory_chain() {
    let mut graph = GraphStore::new();
    let (nodes, rels) = contribution("src/pkg/a.py", &["foo"]);
    graph.replace_file("src/pkg/a.py", nodes, rels).unwrap();

    for dir in [".", "src", "src/pkg"] {
        assert!(graph.contains_node(&NodeId::directory(dir)), "missing dir {}", dir);
    }
    assert!(graph.has_relationship(
        &NodeId::directory("src/pkg"),
        &NodeId::file("src/pkg/a.py"),
        RelationshipType::Contains
    ));
    assert!(graph.has_relationship(
        &NodeId::directory("."),
        &NodeId::directory("src"),
        RelationshipType::Contains
    ));
    assert!(graph.validate().is_clean());
}

#[test]
fn test_replace_file_twice_is_stable() {
    let mut graph = GraphStore::new();
    let (nodes, rels) = contribution("a.py", &["foo", "bar"]);
    graph.replace_file("a.py", nodes.clone(), rels.clone()).unwrap();
    let first = graph.file_snapshot("a.py");
    let stats = graph.file_stats("a.py");

    graph.replace_file("a.py", nodes, rels).unwrap();
    assert_eq!(graph.file_snapshot("a.py"), first);
    assert_eq!(graph.file_stats("a.py"), stats);
    assert_eq!(stats.nodes, 3);
    // dir -> file plus two file -> function
    assert_eq!(stats.relationships, 3);
}

#[test]
fn test_replace_file_rejects_foreign_nodes() {
    let mut graph = GraphStore::new();
    let (mut nodes, rels) = contribution("a.py", &["foo"]);
    nodes.push(function("b.py", "sneaky", 1));

    let err = graph.replace_file("a.py", nodes, rels).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(graph.node_count(), 0, "failed replace must not mutate");
}

#[test]
fn test_sibling_relationships_survive_resync() {
    let mut graph = GraphStore::new();
    let (a_nodes, a_rels) = contribution("a.py", &["foo"]);
    graph.replace_file("a.py", a_nodes.clone(), a_rels.clone()).unwrap();

    let (b_nodes, mut b_rels) = contribution("b.py", &["bar"]);
    b_rels.push(Relationship::calls(
        NodeId::element("b.py", "bar"),
        NodeId::element("a.py", "foo"),
        Some(2),
    ));
    graph.replace_file("b.py", b_nodes, b_rels).unwrap();
    let before = graph.file_snapshot("b.py");

    let outcome = graph.replace_file("a.py", a_nodes, a_rels).unwrap();
    assert_eq!(outcome.restored_foreign, 1);
    assert_eq!(graph.file_snapshot("b.py"), before);
}

#[test]
fn test_pending_relationship_activates_when_target_arrives() {
    let mut graph = GraphStore::new();
    let (b_nodes, mut b_rels) = contribution("b.py", &["bar"]);
    b_rels.push(Relationship::calls(
        NodeId::element("b.py", "bar"),
        NodeId::element("a.py", "foo"),
        Some(2),
    ));
    let outcome = graph.replace_file("b.py", b_nodes, b_rels).unwrap();
    assert_eq!(outcome.parked, 1);
    assert_eq!(graph.pending().len(), 1);
    assert!(graph.get_relationships_by_type(RelationshipType::Calls).is_empty());

    let (a_nodes, a_rels) = contribution("a.py", &["foo"]);
    let outcome = graph.replace_file("a.py", a_nodes, a_rels).unwrap();
    assert_eq!(outcome.activated, 1);
    assert!(graph.pending().is_empty());
    assert_eq!(graph.get_relationships_by_type(RelationshipType::Calls).len(), 1);
}

#[test]
fn test_remove_file_parks_foreign_and_prunes_directories() {
    let mut graph = GraphStore::new();
    let (a_nodes, a_rels) = contribution("lib/deep/a.py", &["foo"]);
    graph.replace_file("lib/deep/a.py", a_nodes, a_rels).unwrap();
    let (b_nodes, mut b_rels) = contribution("b.py", &["bar"]);
    b_rels.push(Relationship::calls(
        NodeId::element("b.py", "bar"),
        NodeId::element("lib/deep/a.py", "foo"),
        None,
    ));
    graph.replace_file("b.py", b_nodes, b_rels).unwrap();

    let outcome = graph.remove_file("lib/deep/a.py");
    assert_eq!(outcome.removed_nodes, 2);
    assert_eq!(outcome.parked_foreign, 1);
    assert_eq!(outcome.pruned_directories, vec!["lib/deep", "lib"]);
    assert!(graph.contains_node(&NodeId::directory(".")));
    assert_eq!(graph.pending()[0].owner, "b.py");
    assert!(graph.validate().passed);
}

#[test]
fn test_nodes_by_type_and_counts() {
    let mut graph = GraphStore::new();
    let (nodes, rels) = contribution("a.py", &["foo", "bar"]);
    graph.replace_file("a.py", nodes, rels).unwrap();

    assert_eq!(graph.nodes_by_type(NodeType::Function).len(), 2);
    let counts = graph.counts_by_type();
    assert_eq!(counts.get(&NodeType::File), Some(&1));
    assert_eq!(counts.get(&NodeType::Directory), Some(&1));
    assert_eq!(graph.file_paths(), vec!["a.py".to_string()]);
}

#[test]
fn test_get_node_projects() {
    let mut graph = GraphStore::new();
    let (nodes, rels) = contribution("a.py", &["foo"]);
    graph.replace_file("a.py", nodes, rels).unwrap();

    let id = NodeId::element("a.py", "foo");
    let minimal = graph.get_node(&id, DetailLevel::Minimal).unwrap();
    match minimal.kind {
        NodeKind::Function { parameters, return_type, .. } => {
            assert!(parameters.is_empty());
            assert!(return_type.is_none());
        }
        other => panic!("unexpected kind {:?}", other),
    }
    assert!(graph.get_node(&NodeId::from("nope"), DetailLevel::Detailed).is_none());
}
