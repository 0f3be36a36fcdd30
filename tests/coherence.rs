//! Cross-file coherence and file-tracking behaviour, end to end.

use maid_runner::core::config;
use maid_runner::core::diagnostics::{DiagnosticKind, Severity};
use maid_runner::core::runner::{CancelToken, ValidationRequest, run_validation};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(path, content).expect("write");
}

fn run(root: &Path) -> maid_runner::core::report::ValidationReport {
    let config = config::load_config(root).expect("config");
    run_validation(
        &ValidationRequest::repo(root),
        &config,
        &CancelToken::new(),
    )
    .expect("run")
}

fn simple_manifest(goal: &str, file: &str, artifact: &str) -> String {
    format!(
        r#"{{
  "goal": "{goal}",
  "taskType": "edit",
  "editableFiles": ["{file}"],
  "expectedArtifacts": {{
    "file": "{file}",
    "contains": [{{"type": "function", "name": "{artifact}"}}]
  }},
  "validationCommand": ["pytest", "tests/test_all.py"]
}}"#
    )
}

#[test]
fn duplicate_public_artifact_across_files() {
    let tmp = tempdir().expect("tempdir");
    write(
        tmp.path(),
        "manifests/task-001.manifest.json",
        &simple_manifest("first", "src/a.py", "process"),
    );
    write(
        tmp.path(),
        "manifests/task-002.manifest.json",
        &simple_manifest("second", "src/b.py", "process"),
    );
    write(tmp.path(), "src/a.py", "def process():\n    pass\n");
    write(tmp.path(), "src/b.py", "def process():\n    pass\n");
    write(
        tmp.path(),
        "tests/test_all.py",
        "from src.a import process\n\n\ndef test_process():\n    process()\n",
    );

    let report = run(tmp.path());
    let dupes: Vec<_> = report
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::DuplicateArtifact)
        .collect();
    assert_eq!(dupes.len(), 1);
    assert!(dupes[0].hints[0].contains("src/a.py"));
    assert!(dupes[0].hints[0].contains("src/b.py"));
}

#[test]
fn dependency_cycle_between_declared_files() {
    let tmp = tempdir().expect("tempdir");
    write(
        tmp.path(),
        "manifests/task-001.manifest.json",
        &simple_manifest("a", "src/a.py", "fa"),
    );
    write(
        tmp.path(),
        "manifests/task-002.manifest.json",
        &simple_manifest("b", "src/b.py", "fb"),
    );
    write(tmp.path(), "src/a.py", "from src.b import fb\n\n\ndef fa():\n    fb()\n");
    write(tmp.path(), "src/b.py", "from src.a import fa\n\n\ndef fb():\n    pass\n");
    write(
        tmp.path(),
        "tests/test_all.py",
        "from src.a import fa\nfrom src.b import fb\n\n\ndef test_cycle():\n    fa()\n    fb()\n",
    );

    let report = run(tmp.path());
    assert!(
        report
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::DependencyCycle)
    );
}

#[test]
fn import_of_undeclared_file_is_flagged() {
    let tmp = tempdir().expect("tempdir");
    write(
        tmp.path(),
        "manifests/task-001.manifest.json",
        &simple_manifest("a", "src/a.py", "fa"),
    );
    write(
        tmp.path(),
        "src/a.py",
        "from src.util import helper\n\n\ndef fa():\n    helper()\n",
    );
    write(tmp.path(), "src/util.py", "def helper():\n    pass\n");
    write(
        tmp.path(),
        "tests/test_all.py",
        "from src.a import fa\n\n\ndef test_fa():\n    fa()\n",
    );

    let report = run(tmp.path());
    assert!(
        report
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::MissingDeclaration
                && d.message.contains("src/util.py"))
    );
    // The file itself is also undeclared in tracking terms.
    assert_eq!(report.file_tracking.undeclared, vec!["src/util.py"]);
}

#[test]
fn naming_and_constraint_rules_from_config() {
    let tmp = tempdir().expect("tempdir");
    write(
        tmp.path(),
        ".maid.toml",
        r#"
[naming]
function = "^[a-z_][a-z0-9_]*$"

[[constraint]]
name = "core-no-os"
applies_to = "^src/core/"
forbid_import = "^os$"
"#,
    );
    write(
        tmp.path(),
        "manifests/task-001.manifest.json",
        r#"{
  "goal": "core module",
  "taskType": "edit",
  "editableFiles": ["src/core/pure.py"],
  "expectedArtifacts": {
    "file": "src/core/pure.py",
    "contains": [{"type": "function", "name": "BadName"}]
  },
  "validationCommand": ["pytest", "tests/test_all.py"]
}"#,
    );
    write(
        tmp.path(),
        "src/core/pure.py",
        "import os\n\n\ndef BadName():\n    return os.sep\n",
    );
    write(
        tmp.path(),
        "tests/test_all.py",
        "from src.core.pure import BadName\n\n\ndef test_bad():\n    BadName()\n",
    );

    let report = run(tmp.path());
    let naming: Vec<_> = report
        .diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::NamingViolation)
        .collect();
    assert_eq!(naming.len(), 1);
    assert_eq!(naming[0].severity, Severity::Info);
    assert!(
        report
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::ConstraintViolation
                && d.message.contains("core-no-os"))
    );
}

#[test]
fn stray_test_file_is_untracked() {
    let tmp = tempdir().expect("tempdir");
    write(
        tmp.path(),
        "manifests/task-001.manifest.json",
        &simple_manifest("a", "src/a.py", "fa"),
    );
    write(tmp.path(), "src/a.py", "def fa():\n    pass\n");
    write(
        tmp.path(),
        "tests/test_all.py",
        "from src.a import fa\n\n\ndef test_fa():\n    fa()\n",
    );
    write(
        tmp.path(),
        "tests/test_stray.py",
        "def test_orphan():\n    assert True\n",
    );

    let report = run(tmp.path());
    assert_eq!(report.file_tracking.untracked_tests, vec!["tests/test_stray.py"]);
    assert!(
        report
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::UntrackedTest)
    );
    // Warnings alone do not fail the run.
    assert!(!report.failed());
}

#[test]
fn coherence_pass_is_idempotent_across_runs() {
    let tmp = tempdir().expect("tempdir");
    write(
        tmp.path(),
        "manifests/task-001.manifest.json",
        &simple_manifest("first", "src/a.py", "process"),
    );
    write(
        tmp.path(),
        "manifests/task-002.manifest.json",
        &simple_manifest("second", "src/b.py", "process"),
    );
    write(tmp.path(), "src/a.py", "def process():\n    pass\n");
    write(tmp.path(), "src/b.py", "def process():\n    pass\n");
    write(
        tmp.path(),
        "tests/test_all.py",
        "from src.a import process\n\n\ndef test_process():\n    process()\n",
    );

    let first = run(tmp.path());
    let second = run(tmp.path());
    assert_eq!(first.diagnostics, second.diagnostics);
}
