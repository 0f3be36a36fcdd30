//! Snapshot derivation: turn a parsed source file into the expected set that
//! would validate it cleanly.
//!
//! This is the kernel half of snapshot authoring (the interactive tooling
//! lives outside the kernel) and what makes the round-trip law testable:
//! parse → snapshot → validate the same source → no diagnostics.

use crate::adapters::SourceDescriptor;
use crate::core::manifest::{
    Artifact, ArtifactStatus, ExpectedArtifacts, Manifest, TaskType,
};

/// Public artifacts of a descriptor, in definition order.
pub fn snapshot_artifacts(descriptor: &SourceDescriptor) -> Vec<Artifact> {
    descriptor
        .defined
        .iter()
        .filter(|a| a.is_public())
        .cloned()
        .collect()
}

/// Build a snapshot manifest capturing the current state of `file`.
pub fn snapshot_manifest(name: &str, file: &str, descriptor: &SourceDescriptor) -> Manifest {
    Manifest {
        goal: format!("Snapshot of {}", file),
        task_type: Some(TaskType::Snapshot),
        editable_files: vec![file.to_string()],
        expected_artifacts: Some(ExpectedArtifacts {
            file: file.to_string(),
            contains: snapshot_artifacts(descriptor),
            status: ArtifactStatus::Present,
        }),
        name: name.to_string(),
        task_index: crate::core::manifest::parse_task_index(name).unwrap_or_default(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{LanguageAdapter, python::PythonAdapter};
    use crate::core::implementation::check_implementation;
    use crate::core::manifest::ValidationMode;
    use crate::core::merge::merge_chain;

    #[test]
    fn test_round_trip_yields_no_diagnostics() {
        let source = "class AuthService:\n    def login(self, username: str) -> bool:\n        return True\n\ndef authenticate(username: str, password: str) -> bool:\n    return False\n\n_PRIVATE = 1\n";
        let descriptor = PythonAdapter
            .parse_source("src/auth.py", source)
            .descriptor;

        let manifest =
            snapshot_manifest("task-001-snapshot.manifest.json", "src/auth.py", &descriptor);
        let outcome = merge_chain(&[&manifest], "src/auth.py");

        let diags = check_implementation(
            "src/auth.py",
            &outcome.set,
            Some(&descriptor),
            ValidationMode::Strict,
            true,
        );
        assert!(diags.is_empty(), "round trip must be clean: {:?}", diags);
    }

    #[test]
    fn test_private_artifacts_excluded_from_snapshot() {
        let descriptor = PythonAdapter
            .parse_source("src/m.py", "def _hidden():\n    pass\n\ndef visible():\n    pass\n")
            .descriptor;
        let artifacts = snapshot_artifacts(&descriptor);
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].name, "visible");
    }
}
