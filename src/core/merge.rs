//! Artifact merging along a file's active chain.
//!
//! Folds `expectedArtifacts.contains` across the chain into an ordered map
//! keyed by the merge key `(kind, class, name, returns)`. Later entries
//! overwrite earlier ones under the same key (intentional refinement). A
//! `status: absent` entry tombstones the set; a subsequent non-absent entry
//! re-creates it from scratch.

use crate::core::diagnostics::{Diagnostic, DiagnosticKind, Location};
use crate::core::manifest::{Artifact, ArtifactStatus, Manifest, MergeKey};
use rustc_hash::FxHashMap;

/// Merged expected-artifact set for one file.
#[derive(Debug, Clone, Default)]
pub struct ExpectedSet {
    pub file: String,
    /// True when the latest relevant chain entry declares the file absent.
    pub tombstoned: bool,
    order: Vec<MergeKey>,
    map: FxHashMap<MergeKey, Artifact>,
    /// Union of validation commands from non-snapshot chain entries,
    /// deduplicated by exact argument-vector equality.
    pub commands: Vec<Vec<String>>,
}

impl ExpectedSet {
    pub fn new(file: &str) -> Self {
        ExpectedSet {
            file: file.to_string(),
            ..Default::default()
        }
    }

    /// Insert or refine an artifact. The first insertion fixes the position;
    /// later same-key entries replace the value in place.
    pub fn insert(&mut self, artifact: Artifact) {
        let key = artifact.merge_key();
        if self.map.insert(key.clone(), artifact).is_none() {
            self.order.push(key);
        }
    }

    pub fn get(&self, key: &MergeKey) -> Option<&Artifact> {
        self.map.get(key)
    }

    /// Artifacts in first-insertion order.
    pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
        self.order.iter().map(|k| &self.map[k])
    }

    /// Loose lookup ignoring the `returns` component of the key; used to turn
    /// a would-be `MissingArtifact` into a precise mismatch report.
    pub fn near_match(&self, artifact: &Artifact) -> Option<&Artifact> {
        self.artifacts().find(|a| {
            a.kind == artifact.kind && a.class == artifact.class && a.name == artifact.name
        })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn clear_artifacts(&mut self) {
        self.order.clear();
        self.map.clear();
    }
}

/// Outcome of merging one chain: the set plus any command-tokenisation
/// diagnostics.
#[derive(Debug, Default)]
pub struct MergeOutcome {
    pub set: ExpectedSet,
    pub diagnostics: Vec<Diagnostic>,
}

/// Merge a chronological chain into the expected set for `file`.
pub fn merge_chain(chain: &[&Manifest], file: &str) -> MergeOutcome {
    let mut set = ExpectedSet::new(file);
    let mut diagnostics = Vec::new();

    for manifest in chain {
        if let Some(expected) = &manifest.expected_artifacts
            && manifest.expected_file().as_deref() == Some(file)
        {
            match expected.status {
                ArtifactStatus::Absent => {
                    set.tombstoned = true;
                    set.clear_artifacts();
                }
                ArtifactStatus::Present => {
                    if set.tombstoned {
                        // Re-creation after deletion starts a fresh set.
                        set.tombstoned = false;
                        set.clear_artifacts();
                    }
                    for artifact in &expected.contains {
                        set.insert(artifact.clone());
                    }
                }
            }
        }

        if manifest.is_snapshot() {
            continue;
        }
        for command in manifest.commands() {
            match command.tokens() {
                Ok(tokens) => {
                    if !tokens.is_empty() && !set.commands.contains(&tokens) {
                        set.commands.push(tokens);
                    }
                }
                Err(e) => diagnostics.push(Diagnostic::new(
                    DiagnosticKind::SchemaViolation,
                    Location::file(&manifest.name),
                    e.to_string(),
                )),
            }
        }
    }

    MergeOutcome { set, diagnostics }
}
