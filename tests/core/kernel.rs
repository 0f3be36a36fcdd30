use maid_runner::core::config::MaidConfig;
use maid_runner::core::diagnostics::{DiagnosticKind, Severity};
use maid_runner::core::runner::{CancelToken, Target, ValidationRequest, run_validation};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, content).expect("write");
}

fn clean_project(root: &Path) {
    write(
        root,
        "manifests/task-001-auth.manifest.json",
        r#"{
  "goal": "Create the auth module",
  "taskType": "create",
  "creatableFiles": ["src/auth.py"],
  "expectedArtifacts": {
    "file": "src/auth.py",
    "contains": [
      {"type": "class", "name": "AuthService"},
      {"type": "method", "name": "login", "class": "AuthService",
       "args": [{"name": "username", "type": "str"}], "returns": "bool"},
      {"type": "function", "name": "authenticate",
       "args": [{"name": "username", "type": "str"}, {"name": "password", "type": "str"}],
       "returns": "bool"}
    ]
  },
  "validationCommand": ["pytest", "tests/test_auth.py"]
}"#,
    );
    write(
        root,
        "src/auth.py",
        "class AuthService:\n    def login(self, username: str) -> bool:\n        return True\n\n\ndef authenticate(username: str, password: str) -> bool:\n    return False\n",
    );
    write(
        root,
        "tests/test_auth.py",
        "from src.auth import AuthService, authenticate\n\n\ndef test_login():\n    svc = AuthService()\n    assert svc.login(username=\"u\")\n\n\ndef test_authenticate():\n    assert authenticate(\"u\", \"p\")\n",
    );
}

fn run(root: &Path) -> maid_runner::core::report::ValidationReport {
    run_validation(
        &ValidationRequest::repo(root),
        &MaidConfig::default(),
        &CancelToken::new(),
    )
    .expect("validation run")
}

#[test]
fn clean_project_validates_without_findings() {
    let tmp = tempdir().expect("tempdir");
    clean_project(tmp.path());

    let report = run(tmp.path());
    assert!(
        !report.failed(),
        "unexpected diagnostics: {:?}",
        report.diagnostics
    );
    assert_eq!(report.summary.errors, 0);
    assert_eq!(report.file_tracking.tracked, vec!["src/auth.py"]);
    assert!(report.file_tracking.untracked_tests.is_empty());
}

#[test]
fn runs_are_deterministic() {
    let tmp = tempdir().expect("tempdir");
    clean_project(tmp.path());
    // Introduce a finding so the diagnostic lists are non-trivial.
    write(tmp.path(), "src/extra.py", "def stray():\n    pass\n");

    let first = run(tmp.path());
    let second = run(tmp.path());
    assert_eq!(first.diagnostics, second.diagnostics);
    assert_ne!(first.run_id, second.run_id);
}

#[test]
fn empty_manifest_directory_is_an_empty_success() {
    let tmp = tempdir().expect("tempdir");
    fs::create_dir_all(tmp.path().join("manifests")).expect("mkdir");

    let report = run(tmp.path());
    assert!(!report.failed());
    assert!(report.diagnostics.is_empty());
    assert_eq!(report.summary.total, 0);
}

#[test]
fn empty_contains_with_existing_editable_file_succeeds() {
    let tmp = tempdir().expect("tempdir");
    write(
        tmp.path(),
        "manifests/task-001.manifest.json",
        r#"{
  "goal": "register the module",
  "taskType": "edit",
  "editableFiles": ["src/util.py"],
  "expectedArtifacts": {"file": "src/util.py", "contains": []}
}"#,
    );
    write(tmp.path(), "src/util.py", "def helper():\n    pass\n");

    let report = run(tmp.path());
    assert!(
        !report.failed(),
        "unexpected diagnostics: {:?}",
        report.diagnostics
    );
    // Declared but without artifacts: registered, not tracked.
    assert_eq!(report.file_tracking.registered, vec!["src/util.py"]);
}

#[test]
fn duplicate_manifest_content_is_fatal() {
    let tmp = tempdir().expect("tempdir");
    let body = r#"{"goal": "same", "editableFiles": ["src/a.py"]}"#;
    write(tmp.path(), "manifests/task-001.manifest.json", body);
    write(tmp.path(), "manifests/task-002.manifest.json", body);

    let report = run(tmp.path());
    assert!(report.failed());
    assert!(
        report
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::DuplicateManifest
                && d.severity == Severity::Fatal)
    );
    // Load-phase fatal terminates the run before per-file validation.
    assert!(report.summary.skipped > 0);
}

#[test]
fn non_numeric_manifest_name_is_rejected() {
    let tmp = tempdir().expect("tempdir");
    write(
        tmp.path(),
        "manifests/task-alpha.manifest.json",
        r#"{"goal": "bad name"}"#,
    );

    let report = run(tmp.path());
    assert!(report.failed());
    assert!(
        report
            .diagnostics
            .iter()
            .any(|d| d.message.contains("task-<digits>"))
    );
}

#[test]
fn supersession_cycle_aborts_with_fatal() {
    let tmp = tempdir().expect("tempdir");
    write(
        tmp.path(),
        "manifests/task-001.manifest.json",
        r#"{"goal": "a", "editableFiles": ["src/a.py"], "supersedes": ["task-002.manifest.json"]}"#,
    );
    write(
        tmp.path(),
        "manifests/task-002.manifest.json",
        r#"{"goal": "b", "editableFiles": ["src/a.py"], "supersedes": ["task-001.manifest.json"]}"#,
    );

    let report = run(tmp.path());
    assert!(report.failed());
    assert!(
        report
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::SupersessionCycle)
    );
}

#[test]
fn single_manifest_target_validates_in_isolation() {
    let tmp = tempdir().expect("tempdir");
    clean_project(tmp.path());

    let request = ValidationRequest {
        target: Target::Manifest("task-001-auth.manifest.json".to_string()),
        ..ValidationRequest::repo(tmp.path())
    };
    let report = run_validation(&request, &MaidConfig::default(), &CancelToken::new())
        .expect("validation run");
    assert!(!report.failed());
    assert_eq!(report.inputs.mode, "manifest");
    assert_eq!(report.inputs.targets, vec!["src/auth.py"]);
}

#[test]
fn unknown_manifest_target_is_misuse() {
    let tmp = tempdir().expect("tempdir");
    clean_project(tmp.path());

    let request = ValidationRequest {
        target: Target::Manifest("task-099.manifest.json".to_string()),
        ..ValidationRequest::repo(tmp.path())
    };
    assert!(run_validation(&request, &MaidConfig::default(), &CancelToken::new()).is_err());
}

#[test]
fn report_serialises_with_contract_fields() {
    let tmp = tempdir().expect("tempdir");
    clean_project(tmp.path());

    let report = run(tmp.path());
    let value = report.to_json();
    assert!(value["run_id"].is_string());
    assert_eq!(value["inputs"]["used_chain"], true);
    assert_eq!(value["inputs"]["mode"], "repo");
    assert!(value["summary"]["errors"].is_number());
    assert!(value["diagnostics"].is_array());
    assert!(value["file_tracking"]["undeclared"].is_array());
}

#[test]
fn graph_export_attaches_on_request() {
    let tmp = tempdir().expect("tempdir");
    clean_project(tmp.path());

    let request = ValidationRequest {
        graph_format: Some(maid_runner::core::graph::GraphFormat::Dot),
        ..ValidationRequest::repo(tmp.path())
    };
    let report = run_validation(&request, &MaidConfig::default(), &CancelToken::new())
        .expect("validation run");
    let export = report.graph_export.expect("graph export present");
    assert!(!export.nodes.is_empty());
    assert!(export.rendered.expect("dot text").starts_with("digraph"));
}
