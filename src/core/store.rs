//! Manifest store: loading, indexing and querying the manifest directory.
//!
//! The store owns every `*.manifest.json` under one directory. Loading
//! rejects duplicates (by task index and by byte-identical content), runs the
//! schema validator, normalises all path fields, and builds two indices:
//! filename → manifest and affected-file → chronological manifest list.
//!
//! The store is copy-on-write: it is frozen after load, and mutations
//! ([`ManifestStore::with_manifest`]) produce a new store. Tests construct
//! stores in memory via [`ManifestStore::from_manifests`].

use crate::core::diagnostics::{Diagnostic, DiagnosticKind, Location, Severity};
use crate::core::error::MaidError;
use crate::core::manifest::{
    ArtifactStatus, MANIFEST_SUFFIX, Manifest, parse_task_index,
};
use rustc_hash::FxHashSet;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Frozen, indexed manifest set.
#[derive(Debug, Clone, Default)]
pub struct ManifestStore {
    dir: PathBuf,
    manifests: BTreeMap<String, Manifest>,
    /// Manifest names in ascending task-index order.
    order: Vec<String>,
    /// Normalised affected file → manifest names, chronological.
    by_file: BTreeMap<String, Vec<String>>,
    fingerprint: String,
}

/// Result of a store load: the (possibly partial) store plus load diagnostics.
#[derive(Debug, Default)]
pub struct StoreLoad {
    pub store: ManifestStore,
    pub diagnostics: Vec<Diagnostic>,
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn fatal(kind: DiagnosticKind, file: &str, message: String) -> Diagnostic {
    Diagnostic::new(kind, Location::file(file), message).with_severity(Severity::Fatal)
}

impl ManifestStore {
    /// Load every manifest under `dir`. An unreadable directory is a hard
    /// error (CLI misuse); malformed content surfaces as fatal diagnostics in
    /// the returned [`StoreLoad`].
    pub fn load_dir(dir: &Path) -> Result<StoreLoad, MaidError> {
        let entries = fs::read_dir(dir).map_err(|e| {
            MaidError::Manifest(format!(
                "cannot read manifest directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        let mut names: Vec<String> = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if file_name.ends_with(MANIFEST_SUFFIX) {
                names.push(file_name.to_string());
            }
        }
        names.sort();

        let mut diagnostics = Vec::new();
        let mut parsed: Vec<(Manifest, String)> = Vec::new();
        let mut content_hashes: BTreeMap<String, String> = BTreeMap::new();

        for name in &names {
            let Some(task_index) = parse_task_index(name) else {
                diagnostics.push(fatal(
                    DiagnosticKind::SchemaViolation,
                    name,
                    "manifest filename must match task-<digits>(-<slug>)?.manifest.json"
                        .to_string(),
                ));
                continue;
            };

            let raw = match fs::read_to_string(dir.join(name)) {
                Ok(raw) => raw,
                Err(e) => {
                    diagnostics.push(fatal(
                        DiagnosticKind::SchemaViolation,
                        name,
                        format!("unreadable manifest: {}", e),
                    ));
                    continue;
                }
            };

            // Same manifest twice under different filenames is a load error.
            let content_hash = sha256_hex(raw.as_bytes());
            if let Some(prior) = content_hashes.get(&content_hash) {
                diagnostics.push(fatal(
                    DiagnosticKind::DuplicateManifest,
                    name,
                    format!("byte-identical to {}", prior),
                ));
                continue;
            }
            content_hashes.insert(content_hash.clone(), name.clone());

            let json: serde_json::Value = match serde_json::from_str(&raw) {
                Ok(json) => json,
                Err(e) => {
                    diagnostics.push(fatal(
                        DiagnosticKind::SchemaViolation,
                        name,
                        format!("malformed JSON: {}", e),
                    ));
                    continue;
                }
            };

            diagnostics.extend(crate::core::schema::validate_schema(name, &json));

            let mut manifest: Manifest = match serde_json::from_value(json) {
                Ok(manifest) => manifest,
                Err(e) => {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::SchemaViolation,
                        Location::file(name),
                        format!("undecodable manifest: {}", e),
                    ));
                    continue;
                }
            };
            manifest.name = name.clone();
            manifest.task_index = task_index;
            parsed.push((manifest, content_hash));
        }

        Ok(Self::index(dir.to_path_buf(), parsed, diagnostics))
    }

    /// Build a store from already-typed manifests (in-memory, for tests and
    /// copy-on-write). `name`/`task_index` must be filled by the caller; when
    /// `name` is set but `task_index` is zero, the index is recovered from the
    /// name.
    pub fn from_manifests(manifests: Vec<Manifest>) -> StoreLoad {
        let parsed = manifests
            .into_iter()
            .map(|mut m| {
                if m.task_index == 0
                    && let Some(idx) = parse_task_index(&m.name)
                {
                    m.task_index = idx;
                }
                let hash = sha256_hex(
                    serde_json::to_string(&m)
                        .unwrap_or_default()
                        .as_bytes(),
                );
                (m, hash)
            })
            .collect();
        Self::index(PathBuf::new(), parsed, Vec::new())
    }

    /// Copy-on-write append: a new store containing this store's manifests
    /// plus `manifest`.
    pub fn with_manifest(&self, manifest: Manifest) -> StoreLoad {
        let mut manifests: Vec<Manifest> = self.manifests.values().cloned().collect();
        manifests.push(manifest);
        Self::from_manifests(manifests)
    }

    fn index(
        dir: PathBuf,
        parsed: Vec<(Manifest, String)>,
        mut diagnostics: Vec<Diagnostic>,
    ) -> StoreLoad {
        let mut manifests: BTreeMap<String, Manifest> = BTreeMap::new();
        let mut seen_indices: BTreeMap<u64, String> = BTreeMap::new();
        let mut hashes: BTreeMap<String, String> = BTreeMap::new();

        for (manifest, content_hash) in parsed {
            if let Some(prior) = seen_indices.get(&manifest.task_index) {
                diagnostics.push(fatal(
                    DiagnosticKind::DuplicateManifest,
                    &manifest.name,
                    format!(
                        "task index {} already used by {}",
                        manifest.task_index, prior
                    ),
                ));
                continue;
            }
            seen_indices.insert(manifest.task_index, manifest.name.clone());
            hashes.insert(manifest.name.clone(), content_hash);
            manifests.insert(manifest.name.clone(), manifest);
        }

        let mut order: Vec<String> = manifests.keys().cloned().collect();
        order.sort_by_key(|name| manifests[name].task_index);

        let mut by_file: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for name in &order {
            for file in manifests[name].affected_files() {
                by_file.entry(file).or_default().push(name.clone());
            }
        }

        // Fingerprint over (name, content-hash) pairs in name order; this is
        // the cache key for everything derived from the manifest set.
        let mut hasher = Sha256::new();
        for (name, hash) in &hashes {
            hasher.update(name.as_bytes());
            hasher.update(b":");
            hasher.update(hash.as_bytes());
            hasher.update(b"\n");
        }
        let fingerprint = format!("{:x}", hasher.finalize());

        let store = ManifestStore {
            dir,
            manifests,
            order,
            by_file,
            fingerprint,
        };
        store.check_tombstone_conflicts(&mut diagnostics);
        StoreLoad {
            store,
            diagnostics,
        }
    }

    /// Tombstoning is final: a deletion manifest whose target file is still
    /// listed by an earlier manifest that nothing superseded is a conflict.
    fn check_tombstone_conflicts(&self, diagnostics: &mut Vec<Diagnostic>) {
        let superseded = self.superseded_set();
        for manifest in self.manifests.values() {
            let Some(expected) = &manifest.expected_artifacts else {
                continue;
            };
            if expected.status != ArtifactStatus::Absent {
                continue;
            }
            let Some(file) = manifest.expected_file() else {
                continue;
            };
            for other in self.manifests.values() {
                if other.name == manifest.name
                    || other.task_index >= manifest.task_index
                    || superseded.contains(other.name.as_str())
                {
                    continue;
                }
                if other.references_file(&file) {
                    diagnostics.push(Diagnostic::new(
                        DiagnosticKind::SchemaViolation,
                        Location::file(&manifest.name),
                        format!(
                            "declares \"{}\" absent but active manifest {} still references it",
                            file, other.name
                        ),
                    ));
                }
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Manifest> {
        self.manifests.get(name)
    }

    /// All manifests in ascending task-index order.
    pub fn all(&self) -> impl Iterator<Item = &Manifest> {
        self.order.iter().map(|name| &self.manifests[name])
    }

    /// Manifests referencing `file` (normalised), chronological.
    pub fn by_file(&self, file: &str) -> Vec<&Manifest> {
        self.by_file
            .get(file)
            .map(|names| names.iter().map(|n| &self.manifests[n]).collect())
            .unwrap_or_default()
    }

    /// Every normalised file path any manifest references.
    pub fn affected_files(&self) -> impl Iterator<Item = &str> {
        self.by_file.keys().map(String::as_str)
    }

    /// Union of all `supersedes` lists. Superseded manifests stay in the
    /// store, so this union is already transitively closed.
    pub fn superseded_set(&self) -> FxHashSet<&str> {
        let mut set = FxHashSet::default();
        for manifest in self.manifests.values() {
            for target in &manifest.supersedes {
                set.insert(target.as_str());
            }
        }
        set
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.manifests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifests.is_empty()
    }
}
