//! Content-hashed memoisation for parsed sources and merged artifact sets.
//!
//! Keys are SHA-256 hashes: source bytes for descriptors, the manifest-store
//! fingerprint plus file path for merged sets. Invalidation is by key
//! mismatch, never TTL. Entries persist under a project-local directory
//! (default `.maid-cache/`); a version marker forces a full rebuild when the
//! on-disk format changes. Corruption is never fatal: the cache is always
//! reconstructible, so unreadable entries are dropped and noted as
//! `CacheCorrupted` info diagnostics.
//!
//! Writes use write-temp-then-rename so concurrent validators only ever see
//! finalised entries; the first writer wins and later writers leave the entry
//! alone.

use crate::adapters::SourceDescriptor;
use crate::core::diagnostics::{Diagnostic, DiagnosticKind, Location};
use crate::core::merge::ExpectedSet;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Bumped whenever the serialised entry layout changes.
pub const CACHE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct FingerprintFile {
    version: u32,
    store_fingerprint: String,
}

/// A memoised parse: the descriptor plus the diagnostics the parse emitted,
/// so a warm cache reproduces a cold run exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedParse {
    pub descriptor: SourceDescriptor,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Serialisable projection of an [`ExpectedSet`].
#[derive(Debug, Serialize, Deserialize)]
struct CachedMergedSet {
    file: String,
    tombstoned: bool,
    artifacts: Vec<crate::core::manifest::Artifact>,
    commands: Vec<Vec<String>>,
}

impl CachedMergedSet {
    fn from_set(set: &ExpectedSet) -> Self {
        CachedMergedSet {
            file: set.file.clone(),
            tombstoned: set.tombstoned,
            artifacts: set.artifacts().cloned().collect(),
            commands: set.commands.clone(),
        }
    }

    fn into_set(self) -> ExpectedSet {
        let mut set = ExpectedSet::new(&self.file);
        for artifact in self.artifacts {
            set.insert(artifact);
        }
        set.tombstoned = self.tombstoned;
        set.commands = self.commands;
        set
    }
}

/// Hash source bytes into a cache key.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Cache key for one file's merged set under one manifest-store state.
pub fn merged_key(store_fingerprint: &str, file: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(store_fingerprint.as_bytes());
    hasher.update(b"/");
    hasher.update(file.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Handle on the on-disk cache, acquired at run start and released on
/// completion. Thread-safe for read-mostly access: in-memory maps sit behind
/// mutexes, on-disk writes are atomic renames.
#[derive(Debug)]
pub struct CacheHandle {
    dir: Option<PathBuf>,
    descriptors: Mutex<FxHashMap<String, CachedParse>>,
    merged: Mutex<FxHashMap<String, ExpectedSet>>,
    corrupted: Mutex<Vec<Diagnostic>>,
}

impl CacheHandle {
    /// Open (or initialise) the cache under `cache_dir`. A format-version or
    /// fingerprint change from the previous run wipes the stale entries.
    /// Never fails: on any I/O trouble the handle degrades to memory-only.
    pub fn open(cache_dir: &Path, store_fingerprint: &str) -> Self {
        let handle = CacheHandle {
            dir: Some(cache_dir.to_path_buf()),
            descriptors: Mutex::new(FxHashMap::default()),
            merged: Mutex::new(FxHashMap::default()),
            corrupted: Mutex::new(Vec::new()),
        };

        if fs::create_dir_all(cache_dir.join("descriptors")).is_err()
            || fs::create_dir_all(cache_dir.join("merged")).is_err()
        {
            return CacheHandle {
                dir: None,
                ..handle
            };
        }

        let marker = cache_dir.join("fingerprint.json");
        let previous: Option<FingerprintFile> = fs::read_to_string(&marker)
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok());
        match previous {
            Some(prev) if prev.version == CACHE_FORMAT_VERSION => {
                if prev.store_fingerprint != store_fingerprint {
                    // Descriptors are keyed by content hash and survive a
                    // manifest change; merged sets do not.
                    let _ = fs::remove_dir_all(cache_dir.join("merged"));
                    let _ = fs::create_dir_all(cache_dir.join("merged"));
                }
            }
            Some(_) => {
                let _ = fs::remove_dir_all(cache_dir.join("descriptors"));
                let _ = fs::remove_dir_all(cache_dir.join("merged"));
                let _ = fs::create_dir_all(cache_dir.join("descriptors"));
                let _ = fs::create_dir_all(cache_dir.join("merged"));
            }
            None => {}
        }

        let current = FingerprintFile {
            version: CACHE_FORMAT_VERSION,
            store_fingerprint: store_fingerprint.to_string(),
        };
        if let Ok(body) = serde_json::to_string_pretty(&current) {
            let _ = atomic_write(&marker, body.as_bytes());
        }

        handle
    }

    /// Memory-only cache for in-process use (tests, cache-free runs).
    pub fn in_memory() -> Self {
        CacheHandle {
            dir: None,
            descriptors: Mutex::new(FxHashMap::default()),
            merged: Mutex::new(FxHashMap::default()),
            corrupted: Mutex::new(Vec::new()),
        }
    }

    pub fn parsed(&self, hash: &str) -> Option<CachedParse> {
        if let Some(hit) = self.descriptors.lock().unwrap().get(hash) {
            return Some(hit.clone());
        }
        let path = self.dir.as_ref()?.join("descriptors").join(format!("{}.json", hash));
        let raw = fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<CachedParse>(&raw) {
            Ok(parsed) => {
                self.descriptors
                    .lock()
                    .unwrap()
                    .insert(hash.to_string(), parsed.clone());
                Some(parsed)
            }
            Err(e) => {
                self.note_corruption(&path, &e.to_string());
                let _ = fs::remove_file(&path);
                None
            }
        }
    }

    pub fn store_parsed(&self, hash: &str, parsed: &CachedParse) {
        self.descriptors
            .lock()
            .unwrap()
            .insert(hash.to_string(), parsed.clone());
        let Some(dir) = &self.dir else { return };
        let path = dir.join("descriptors").join(format!("{}.json", hash));
        if path.exists() {
            // Write-once per key: the first writer's entry is final.
            return;
        }
        if let Ok(body) = serde_json::to_vec(parsed) {
            let _ = atomic_write(&path, &body);
        }
    }

    pub fn merged_set(&self, key: &str) -> Option<ExpectedSet> {
        if let Some(hit) = self.merged.lock().unwrap().get(key) {
            return Some(hit.clone());
        }
        let path = self.dir.as_ref()?.join("merged").join(format!("{}.json", key));
        let raw = fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<CachedMergedSet>(&raw) {
            Ok(cached) => {
                let set = cached.into_set();
                self.merged
                    .lock()
                    .unwrap()
                    .insert(key.to_string(), set.clone());
                Some(set)
            }
            Err(e) => {
                self.note_corruption(&path, &e.to_string());
                let _ = fs::remove_file(&path);
                None
            }
        }
    }

    pub fn store_merged_set(&self, key: &str, set: &ExpectedSet) {
        self.merged
            .lock()
            .unwrap()
            .insert(key.to_string(), set.clone());
        let Some(dir) = &self.dir else { return };
        let path = dir.join("merged").join(format!("{}.json", key));
        if path.exists() {
            return;
        }
        if let Ok(body) = serde_json::to_vec(&CachedMergedSet::from_set(set)) {
            let _ = atomic_write(&path, &body);
        }
    }

    fn note_corruption(&self, path: &Path, detail: &str) {
        self.corrupted.lock().unwrap().push(Diagnostic::new(
            DiagnosticKind::CacheCorrupted,
            Location::file(&path.display().to_string()),
            format!("discarded corrupt cache entry: {}", detail),
        ));
    }

    /// Drain `CacheCorrupted` notes collected during the run.
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.corrupted.lock().unwrap())
    }
}

fn atomic_write(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, body)?;
    fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::{Artifact, ArtifactKind};

    fn parsed() -> CachedParse {
        CachedParse {
            descriptor: SourceDescriptor {
                defined: vec![Artifact::new(ArtifactKind::Function, "f")],
                ..Default::default()
            },
            diagnostics: Vec::new(),
        }
    }

    #[test]
    fn test_content_hash_changes_per_byte() {
        assert_ne!(content_hash(b"a"), content_hash(b"b"));
        assert_eq!(content_hash(b"a"), content_hash(b"a"));
    }

    #[test]
    fn test_parse_round_trip_on_disk() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cache = CacheHandle::open(&tmp.path().join(".maid-cache"), "fp1");
        let hash = content_hash(b"def f(): pass");
        assert!(cache.parsed(&hash).is_none());
        cache.store_parsed(&hash, &parsed());

        // A fresh handle sees the persisted entry.
        let reopened = CacheHandle::open(&tmp.path().join(".maid-cache"), "fp1");
        let loaded = reopened.parsed(&hash).expect("cache hit");
        assert_eq!(loaded, parsed());
    }

    #[test]
    fn test_fingerprint_change_drops_merged_keeps_descriptors() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = tmp.path().join(".maid-cache");
        let cache = CacheHandle::open(&dir, "fp1");
        let hash = content_hash(b"src");
        cache.store_parsed(&hash, &parsed());
        let mut set = ExpectedSet::new("src/a.py");
        set.insert(Artifact::new(ArtifactKind::Function, "f"));
        let key = merged_key("fp1", "src/a.py");
        cache.store_merged_set(&key, &set);

        let reopened = CacheHandle::open(&dir, "fp2");
        assert!(reopened.parsed(&hash).is_some());
        assert!(reopened.merged_set(&key).is_none());
    }

    #[test]
    fn test_corrupt_entry_ignored_and_noted() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = tmp.path().join(".maid-cache");
        let cache = CacheHandle::open(&dir, "fp1");
        let hash = content_hash(b"x");
        fs::write(
            dir.join("descriptors").join(format!("{}.json", hash)),
            b"{ not json",
        )
        .expect("write corrupt entry");

        assert!(cache.parsed(&hash).is_none());
        let diags = cache.take_diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::CacheCorrupted);
        assert_eq!(
            diags[0].severity,
            crate::core::diagnostics::Severity::Info
        );
    }

    #[test]
    fn test_write_once_discipline() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = tmp.path().join(".maid-cache");
        let cache = CacheHandle::open(&dir, "fp1");
        let hash = content_hash(b"y");
        cache.store_parsed(&hash, &parsed());

        let mut second = parsed();
        second.descriptor.defined[0].name = "g".to_string();
        // Second writer must not clobber the finalised entry on disk.
        let other = CacheHandle::open(&dir, "fp1");
        other.store_parsed(&hash, &second);

        let fresh = CacheHandle::open(&dir, "fp1");
        assert_eq!(
            fresh.parsed(&hash).unwrap().descriptor.defined[0].name,
            "f"
        );
    }

    #[test]
    fn test_version_bump_forces_rebuild() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = tmp.path().join(".maid-cache");
        let cache = CacheHandle::open(&dir, "fp1");
        let hash = content_hash(b"z");
        cache.store_parsed(&hash, &parsed());

        let marker = FingerprintFile {
            version: CACHE_FORMAT_VERSION + 1,
            store_fingerprint: "fp1".to_string(),
        };
        fs::write(
            dir.join("fingerprint.json"),
            serde_json::to_string(&marker).unwrap(),
        )
        .expect("rewrite marker");

        let reopened = CacheHandle::open(&dir, "fp1");
        assert!(reopened.parsed(&hash).is_none());
    }
}
