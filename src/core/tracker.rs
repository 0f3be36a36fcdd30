//! File tracking: classify every source file under the project root.
//!
//! Classification per file: **tracked** (declared with artifacts, and every
//! public definition is covered by the merged expected set), **registered**
//! (mentioned by some manifest but without artifact coverage), or
//! **undeclared** (on disk, referenced nowhere). Test files are scored
//! separately: any test not referenced by a validation command is an
//! untracked test. The walk respects the configurable exclusion list.

use crate::adapters::{self, SourceDescriptor};
use crate::core::diagnostics::{Diagnostic, DiagnosticKind, Location};
use crate::core::error::MaidError;
use crate::core::merge::ExpectedSet;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Structured classification, one entry per file, severity-ranked:
/// undeclared and untracked tests are findings, registered files are noted,
/// tracked files are healthy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileTracking {
    pub tracked: Vec<String>,
    pub registered: Vec<String>,
    pub undeclared: Vec<String>,
    pub untracked_tests: Vec<String>,
}

/// Recursively collect source files under `root`, skipping excluded
/// directory names. Paths come back relative, normalised, sorted.
pub fn collect_source_files(root: &Path, exclude: &[String]) -> Result<Vec<String>, MaidError> {
    fn recurse(
        root: &Path,
        dir: &Path,
        exclude: &[String],
        out: &mut Vec<String>,
    ) -> Result<(), MaidError> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if path.is_dir() {
                if exclude.iter().any(|e| e == name) || name.starts_with('.') {
                    continue;
                }
                recurse(root, &path, exclude, out)?;
            } else if path.is_file()
                && let Ok(rel) = path.strip_prefix(root)
            {
                let rel = rel.to_string_lossy().replace('\\', "/");
                if adapters::is_source_path(&rel) {
                    out.push(rel);
                }
            }
        }
        Ok(())
    }

    let mut out = Vec::new();
    recurse(root, root, exclude, &mut out)?;
    out.sort();
    Ok(out)
}

/// Classify collected files against the merged model.
pub fn classify_files(
    files: &[String],
    expected_sets: &BTreeMap<String, ExpectedSet>,
    descriptors: &BTreeMap<String, SourceDescriptor>,
    declared_files: &FxHashSet<String>,
    referenced_tests: &FxHashSet<String>,
) -> (FileTracking, Vec<Diagnostic>) {
    let mut tracking = FileTracking::default();
    let mut diagnostics = Vec::new();

    for file in files {
        if adapters::is_test_path(file) {
            if !referenced_tests.contains(file) {
                tracking.untracked_tests.push(file.clone());
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::UntrackedTest,
                    Location::file(file),
                    "test file is not referenced by any validation command".to_string(),
                ));
            }
            continue;
        }

        if !declared_files.contains(file) {
            tracking.undeclared.push(file.clone());
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::UntrackedFile,
                Location::file(file),
                "file exists on disk but no manifest references it".to_string(),
            ));
            continue;
        }

        let covered = expected_sets.get(file).is_some_and(|set| {
            if set.tombstoned || set.is_empty() {
                return false;
            }
            let Some(descriptor) = descriptors.get(file) else {
                return false;
            };
            descriptor
                .defined
                .iter()
                .filter(|a| a.is_public())
                .all(|a| set.get(&a.merge_key()).is_some() || set.near_match(a).is_some())
        });

        if covered {
            tracking.tracked.push(file.clone());
        } else {
            tracking.registered.push(file.clone());
        }
    }

    (tracking, diagnostics)
}
