//! Failure isolation, cancellation, timeouts and path locking.

mod common;

use architectum::{
    ArchitectumConfig, CancellationToken, DiagnosticStage, ErrorKind, SkipReason, SyncOptions,
};
use common::Project;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_parse_failure_is_isolated() {
    let project = Project::new();
    project.write("good.py", "fn ok\n");
    project.write("bad.py", "fn broken\nfail\n");
    let workspace = project.scripted();

    let report = workspace
        .sync(&[project.root.clone()], &SyncOptions::recursive())
        .unwrap();
    assert_eq!(report.synced, vec!["good.py"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].path, "bad.py");
    assert_eq!(report.failed[0].kind, ErrorKind::Parse);
    assert_eq!(report.failed[0].stage, DiagnosticStage::Parse);
    assert!(!report.is_clean());

    let stores = workspace.stores().read().unwrap();
    assert!(stores.graph.nodes_owned_by("bad.py").is_empty());
    assert!(!stores.mirrors.exists("bad.py"));
    drop(stores);

    // Not recorded in the ledger, so the next run retries it.
    let again = workspace
        .sync(&[project.root.clone()], &SyncOptions::recursive())
        .unwrap();
    assert_eq!(again.failed.len(), 1);
    assert_eq!(again.skipped_reasons.get("good.py"), Some(&SkipReason::Unchanged));
}

#[test]
fn test_python_syntax_error_is_isolated() {
    let project = Project::new();
    project.write("ok.py", "def fine():\n    return 1\n");
    project.write("broken.py", "def nope(:\n    return\n");
    let workspace = project.bundled();

    let report = workspace
        .sync(&[project.root.clone()], &SyncOptions::recursive())
        .unwrap();
    assert_eq!(report.synced, vec!["ok.py"]);
    assert_eq!(report.failed[0].path, "broken.py");
    assert_eq!(report.failed[0].kind, ErrorKind::Parse);
}

#[test]
fn test_parser_timeout_is_per_file_parse_error() {
    let project = Project::new();
    project.write("fast.py", "fn quick\n");
    project.write("slow.py", "fn slow\nsleep 1500\n");
    let config = ArchitectumConfig {
        parse_timeout_ms: 100,
        ..ArchitectumConfig::default()
    };
    let workspace = project.scripted_with(config);

    let report = workspace
        .sync(&[project.root.clone()], &SyncOptions::recursive())
        .unwrap();
    assert_eq!(report.synced, vec!["fast.py"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].path, "slow.py");
    assert_eq!(report.failed[0].kind, ErrorKind::Parse);
    assert!(report.failed[0].message.contains("timed out"));
}

#[test]
fn test_cancellation_keeps_completed_files() {
    let project = Project::new();
    project.write("a.py", "fn a\n");
    project.write("b.py", "fn b\n");
    project.write("c.py", "fn c\n");
    let workspace = project.scripted();

    let token = CancellationToken::new();
    let trigger = token.clone();
    let mut options = SyncOptions::recursive().with_cancel(token);
    options.progress = Some(Arc::new(move |done: usize, _total: usize, _path: &str| {
        if done == 1 {
            trigger.cancel();
        }
    }));

    let report = workspace.sync(&[project.root.clone()], &options).unwrap();
    assert!(report.cancelled);
    assert_eq!(report.synced, vec!["a.py"]);
    assert_eq!(report.skipped_reasons.get("b.py"), Some(&SkipReason::Cancelled));
    assert_eq!(report.skipped_reasons.get("c.py"), Some(&SkipReason::Cancelled));
    assert!(workspace.stores().read().unwrap().mirrors.exists("a.py"));

    let resumed = workspace
        .sync(&[project.root.clone()], &SyncOptions::recursive())
        .unwrap();
    assert_eq!(resumed.synced, vec!["b.py", "c.py"]);
    assert!(!resumed.cancelled);
}

#[test]
fn test_missing_and_outside_paths() {
    let project = Project::new();
    project.write("a.py", "fn a\n");
    let workspace = project.scripted();

    let report = workspace
        .sync(&[project.path("a.py"), project.path("ghost.py")], &SyncOptions::default())
        .unwrap();
    assert_eq!(report.synced, vec!["a.py"]);
    assert_eq!(report.failed[0].path, "ghost.py");
    assert_eq!(report.failed[0].kind, ErrorKind::NotFound);

    let err = workspace
        .sync(&[project.root.join("../elsewhere.py")], &SyncOptions::default())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_is_reported() {
    use std::os::unix::fs::PermissionsExt;

    let project = Project::new();
    project.write("open.py", "fn open\n");
    project.write("locked.py", "fn locked\n");
    let locked = project.path("locked.py");
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o000)).unwrap();
    if std::fs::read(&locked).is_ok() {
        // Running with privileges that ignore file modes.
        return;
    }
    let workspace = project.scripted();

    let report = workspace
        .sync(&[project.root.clone()], &SyncOptions::recursive())
        .unwrap();
    assert_eq!(report.synced, vec!["open.py"]);
    assert_eq!(report.failed[0].path, "locked.py");
    assert_eq!(report.failed[0].kind, ErrorKind::Io);
    assert_eq!(report.failed[0].stage, DiagnosticStage::Read);

    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o644)).unwrap();
}

#[test]
fn test_overlapping_sync_waits_for_path_lock() {
    let project = Project::new();
    project.write("a.py", "fn a\n");
    let workspace = project.scripted();

    let guard = workspace
        .orchestrator()
        .locks()
        .acquire(vec!["a.py".to_string()])
        .unwrap();

    std::thread::scope(|scope| {
        let (tx, rx) = mpsc::channel();
        let ws = &workspace;
        let target = project.path("a.py");
        scope.spawn(move || {
            let report = ws.sync(&[target], &SyncOptions::default()).unwrap();
            tx.send(report).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        drop(guard);
        let report = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(report.synced, vec!["a.py"]);
    });
}

#[test]
fn test_waiting_sync_leaves_files_recorded_by_another_sync() {
    let project = Project::new();
    project.write("src/a.py", "fn a\n");
    let workspace = project.scripted();
    workspace
        .sync(&[project.path("src")], &SyncOptions::recursive())
        .unwrap();

    let locks = workspace.orchestrator().locks();
    let guard = locks.acquire(vec!["src/a.py".to_string()]).unwrap();

    std::thread::scope(|scope| {
        let (tx, rx) = mpsc::channel();
        let ws = &workspace;
        let dir = project.path("src");
        scope.spawn(move || {
            let report = ws.sync(&[dir], &SyncOptions::recursive()).unwrap();
            tx.send(report).unwrap();
        });

        // The directory sync has expanded src/ and is blocked on src/a.py.
        while locks.waiting() == 0 {
            std::thread::sleep(Duration::from_millis(5));
        }
        project.write("src/x.py", "fn x\n");
        let other = workspace
            .sync(&[project.path("src/x.py")], &SyncOptions::default())
            .unwrap();
        assert_eq!(other.synced, vec!["src/x.py"]);

        drop(guard);
        let report = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert!(report.removed.is_empty());
        assert!(report.failed.is_empty());
    });

    let stores = workspace.stores().read().unwrap();
    assert!(!stores.graph.nodes_owned_by("src/x.py").is_empty());
    assert!(stores.mirrors.exists("src/x.py"));
    drop(stores);
    assert!(workspace.verify().unwrap().issues.is_empty());
}

#[test]
fn test_disjoint_syncs_run_side_by_side() {
    let project = Project::new();
    project.write("a.py", "fn a\n");
    project.write("b.py", "fn b\n");
    let workspace = project.scripted();

    let _guard = workspace
        .orchestrator()
        .locks()
        .acquire(vec!["a.py".to_string()])
        .unwrap();
    let report = workspace
        .sync(&[project.path("b.py")], &SyncOptions::default())
        .unwrap();
    assert_eq!(report.synced, vec!["b.py"]);
}

#[test]
fn test_commit_journal_records_changes() {
    let project = Project::new();
    project.write("a.py", "fn a\n");
    let workspace = project.scripted();
    workspace
        .sync(&[project.root.clone()], &SyncOptions::recursive())
        .unwrap();
    project.remove("a.py");
    workspace
        .sync(&[project.root.clone()], &SyncOptions::recursive())
        .unwrap();

    let journal = std::fs::read_to_string(project.state("catalog.jsonl")).unwrap();
    let lines: Vec<serde_json::Value> = journal
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["path"], "a.py");
    assert_eq!(lines[0]["change"], "created");
    assert_eq!(lines[1]["change"], "removed");
}

#[cfg(unix)]
#[test]
fn test_unreadable_directory_is_reported_per_path() {
    use std::fs;
    use std::os::unix::fs::PermissionsExt;

    let project = Project::new();
    project.write("a.py", "fn a\n");
    project.write("locked/b.py", "fn b\n");
    let workspace = project.scripted();
    workspace
        .sync(&[project.root.clone()], &SyncOptions::recursive())
        .unwrap();

    let locked = project.path("locked");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read_dir(&locked).is_ok() {
        // Permission bits are not enforced for this user.
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }
    project.write("c.py", "fn c\n");
    let result = workspace.sync(&[project.root.clone()], &SyncOptions::recursive());
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
    let report = result.unwrap();

    assert_eq!(report.synced, vec!["c.py"]);
    assert!(report.removed.is_empty());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].path, "locked");
    assert_eq!(report.failed[0].kind, ErrorKind::Io);
    assert_eq!(report.failed[0].stage, DiagnosticStage::Read);

    let stores = workspace.stores().read().unwrap();
    assert!(stores.mirrors.exists("locked/b.py"));
    assert!(!stores.graph.nodes_owned_by("locked/b.py").is_empty());
}
