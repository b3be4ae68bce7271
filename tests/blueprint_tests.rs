//! Blueprints assembled through the workspace facade over synced projects.

mod common;

use architectum::workspace::ConsistencyIssueKind;
use architectum::{
    Blueprint, BlueprintOptions, CrossFileConfig, DetailLevel, DetailLevelConfig, ErrorKind,
    NodeKind, Persistence, Selection, SyncOptions,
};
use common::{strings, Project};
use std::path::PathBuf;

fn synced_python() -> (Project, architectum::Architectum) {
    let project = Project::new();
    project.write("a.py", "def foo():\n    \"\"\"Answer.\"\"\"\n    return 1\n");
    project.write("b.py", "from a import foo\n\n\ndef bar():\n    return foo()\n");
    let workspace = project.bundled();
    let report = workspace
        .sync(&[project.root.clone()], &SyncOptions::recursive())
        .unwrap();
    assert!(report.is_clean(), "{:?}", report.failed);
    (project, workspace)
}

#[test]
fn test_scenario_c_method_blueprint_with_unknown_name() {
    let (project, workspace) = synced_python();

    let bp = workspace
        .create_method_blueprint(
            &project.path("a.py"),
            &strings(&["foo", "bogus"]),
            &BlueprintOptions::default(),
        )
        .unwrap();
    assert_eq!(bp.node_ids(), vec!["elem:a.py::foo"]);
    assert_eq!(bp.missing, vec!["bogus"]);
    assert_eq!(bp.persistence, Persistence::Ephemeral);
    assert!(bp.name.starts_with("method-"));
    assert!(bp.content.files["a.py"].elements.contains_key("foo"));
}

#[test]
fn test_relative_and_absolute_selections_agree() {
    let (project, workspace) = synced_python();
    let options = BlueprintOptions::named("same");

    let absolute = workspace
        .create_file_blueprint(&[project.path("b.py")], &options)
        .unwrap();
    let relative = workspace
        .create_file_blueprint(&[PathBuf::from("b.py")], &options)
        .unwrap();
    assert_eq!(absolute.node_ids(), relative.node_ids());
    assert_eq!(absolute.content.files.keys().collect::<Vec<_>>(), vec!["b.py"]);
}

#[test]
fn test_cross_file_blueprint_reaches_callee() {
    let (project, workspace) = synced_python();
    let options = BlueprintOptions::default().with_cross_file(CrossFileConfig::default());

    let bp = workspace
        .create_file_blueprint(&[project.path("b.py")], &options)
        .unwrap();
    let foo = bp.node("elem:a.py::foo").unwrap();
    assert!(foo.cross_file);
    assert_eq!(foo.owning_file.as_deref(), Some("a.py"));
    assert!(!bp.content.files.contains_key("a.py"));
}

#[test]
fn test_mirror_detail_level_controls_docstrings() {
    let (project, workspace) = synced_python();

    let full = BlueprintOptions::default().with_detail(DetailLevelConfig::uniform(DetailLevel::Detailed));
    let detailed = workspace
        .create_file_blueprint(&[project.path("a.py")], &full)
        .unwrap();
    assert_eq!(
        detailed.content.files["a.py"].elements["foo"].metadata["docstring"],
        "Answer."
    );

    let options = BlueprintOptions::default()
        .with_detail(DetailLevelConfig::new(DetailLevel::Detailed, DetailLevel::Minimal));
    let minimal = workspace
        .create_file_blueprint(&[project.path("a.py")], &options)
        .unwrap();
    assert!(minimal.content.files["a.py"].elements["foo"].metadata.is_empty());

    let standard = workspace
        .create_file_blueprint(&[project.path("a.py")], &BlueprintOptions::default())
        .unwrap();
    assert!(standard.content.files["a.py"].elements["foo"]
        .metadata
        .get("docstring")
        .is_none());
}

#[test]
fn test_durable_versions_and_diff() {
    let (project, workspace) = synced_python();
    let options = BlueprintOptions::named("core").durable();

    let first = workspace
        .create_file_blueprint(&[project.path("a.py")], &options)
        .unwrap();
    assert_eq!(first.version, Some(1));
    assert!(project.state("blueprints/core/v1.json").is_file());

    project.write(
        "a.py",
        "def foo():\n    \"\"\"Answer.\"\"\"\n    return 1\n\n\ndef baz():\n    return 2\n",
    );
    workspace
        .sync(&[project.path("a.py")], &SyncOptions::default())
        .unwrap();
    let second = workspace
        .create_file_blueprint(&[project.path("a.py")], &options)
        .unwrap();
    assert_eq!(second.version, Some(2));

    let store = workspace.blueprint_store();
    assert_eq!(store.list_versions("core").unwrap(), vec![1, 2]);
    assert_eq!(store.load("core", None).unwrap(), second);
    assert_eq!(store.load("core", Some(1)).unwrap(), first);

    let diff = store.diff("core", 1, 2).unwrap();
    assert!(diff.added_nodes.contains(&"elem:a.py::baz".to_string()));
    assert!(diff.removed_nodes.is_empty());
    assert_eq!(diff.changed_files, vec!["a.py"]);

    assert_eq!(workspace.status().unwrap().blueprints, vec!["core"]);
}

#[test]
fn test_durable_without_name_is_rejected() {
    let (project, workspace) = synced_python();
    let options = BlueprintOptions::default().durable();
    let err = workspace
        .create_file_blueprint(&[project.path("a.py")], &options)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(workspace.blueprint_store().list_names().unwrap().is_empty());
}

#[test]
fn test_missing_mirror_is_consistency_error() {
    let (project, workspace) = synced_python();
    std::fs::remove_file(project.state("mirrors/b.py.json")).unwrap();

    let err = workspace
        .create_file_blueprint(&[project.path("b.py")], &BlueprintOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Consistency);

    let verify = workspace.verify().unwrap();
    assert!(!verify.is_clean());
    assert_eq!(verify.issues.len(), 1);
    assert_eq!(verify.issues[0].path, "b.py");
    assert_eq!(verify.issues[0].issue, ConsistencyIssueKind::MissingMirror);
    assert!(verify.first_error().is_some());

    // A forced resync restores the mirror.
    workspace
        .sync(&[project.path("b.py")], &SyncOptions::default().forced())
        .unwrap();
    assert!(workspace.verify().unwrap().issues.is_empty());
}

#[test]
fn test_unknown_path_root_is_validation_error() {
    let (_project, workspace) = synced_python();
    let err = workspace
        .blueprint(
            Selection::Path {
                root: "nowhere".to_string(),
                depth: 0,
            },
            &BlueprintOptions::default(),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_blueprint_json_shape() {
    let (project, workspace) = synced_python();
    let bp = workspace
        .create_file_blueprint(
            &[project.path("a.py"), project.path("ghost.py")],
            &BlueprintOptions::named("shape"),
        )
        .unwrap();

    let json = serde_json::to_value(&bp).unwrap();
    assert_eq!(json["name"], "shape");
    assert_eq!(json["type"], "file");
    assert_eq!(json["detail_level"]["relationship_map"], "standard");
    assert_eq!(json["detail_level"]["json_mirrors"], "standard");
    assert!(json["content"]["files"]["a.py"].is_object());
    assert!(json["content"]["nodes"].is_array());
    assert!(json["content"]["relationships"].is_array());
    assert_eq!(json["missing"], serde_json::json!(["ghost.py"]));
}

fn parameter_count(bp: &Blueprint, id: &str) -> usize {
    match &bp.node(id).unwrap().node.kind {
        NodeKind::Function { parameters, .. } => parameters.len(),
        other => panic!("unexpected kind {:?}", other),
    }
}

#[test]
fn test_reopened_workspace_keeps_full_graph_detail() {
    let project = Project::new();
    project.write(".architectum/config.json", r#"{ "graph_detail_level": "minimal" }"#);
    project.write("a.py", "def foo(x: int, y: str) -> bool:\n    return True\n");
    let full = BlueprintOptions::default().with_detail(DetailLevelConfig::uniform(DetailLevel::Detailed));

    let workspace = project.bundled();
    workspace
        .sync(&[project.root.clone()], &SyncOptions::recursive())
        .unwrap();
    let before = workspace
        .create_method_blueprint(&project.path("a.py"), &strings(&["foo"]), &full)
        .unwrap();
    assert_eq!(parameter_count(&before, "elem:a.py::foo"), 2);
    drop(workspace);

    let reopened = project.bundled();
    let after = reopened
        .create_method_blueprint(&project.path("a.py"), &strings(&["foo"]), &full)
        .unwrap();
    assert_eq!(parameter_count(&after, "elem:a.py::foo"), 2);
    assert_eq!(before.content.nodes, after.content.nodes);

    let exported = reopened.export_graph().unwrap();
    assert!(exported.contains("\"detail_level\": \"minimal\""));
    assert!(!exported.contains("\"parameters\""));
}
