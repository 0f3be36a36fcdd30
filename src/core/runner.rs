//! Validation run orchestration.
//!
//! The run walks `Load → Resolve → Parse → CheckImpl → CheckBehaviour →
//! CheckCoherence → Report`. Load and Resolve are sequential; the per-file
//! phases fan out over rayon workers and join before the global phases. The
//! manifest index is frozen after Load, the cache synchronises internally,
//! and the diagnostic sink is append-only, so workers share nothing else.
//!
//! A fatal diagnostic in Load terminates the run; a fatal from Resolve (a
//! supersession cycle) skips the phases that depend on chains but still
//! reports. Cancellation is cooperative: the flag is checked between files
//! and partially collected diagnostics are discarded.

use crate::adapters::{self, SourceDescriptor};
use crate::core::behaviour::{self, TestFile};
use crate::core::cache::{self, CacheHandle, CachedParse};
use crate::core::chain;
use crate::core::coherence::{self, CoherenceInput};
use crate::core::config::MaidConfig;
use crate::core::diagnostics::{
    Diagnostic, DiagnosticKind, DiagnosticSink, Location, Severity, finalize,
};
use crate::core::error::MaidError;
use crate::core::graph::{self, GraphFormat};
use crate::core::implementation;
use crate::core::manifest::{Manifest, ValidationMode};
use crate::core::merge::{self, ExpectedSet};
use crate::core::report::{GraphExport, ReportInputs, ValidationReport, summarize};
use crate::core::store::ManifestStore;
use crate::core::tracker;
use rayon::prelude::*;
use rustc_hash::FxHashSet;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// What to validate: the whole repo, every manifest in the directory, or one
/// manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Repo,
    ManifestDir,
    Manifest(String),
}

impl Target {
    fn mode_label(&self) -> &'static str {
        match self {
            Target::Repo => "repo",
            Target::ManifestDir => "directory",
            Target::Manifest(_) => "manifest",
        }
    }
}

/// Cooperative cancel signal, checked between files and before each parse.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct ValidationRequest {
    pub project_root: PathBuf,
    /// Defaults to `<project_root>/<config.manifest_dir>` when `None`.
    pub manifest_dir: Option<PathBuf>,
    pub target: Target,
    /// Resolve full chains; `false` validates single manifests in isolation.
    pub use_chain: bool,
    pub graph_format: Option<GraphFormat>,
    /// `false` forces a cache-free run (memory-only memoisation).
    pub use_cache: bool,
}

impl ValidationRequest {
    pub fn repo(project_root: &Path) -> Self {
        ValidationRequest {
            project_root: project_root.to_path_buf(),
            manifest_dir: None,
            target: Target::Repo,
            use_chain: true,
            graph_format: None,
            use_cache: true,
        }
    }
}

struct FileOutcome {
    file: String,
    expected: ExpectedSet,
    descriptor: Option<SourceDescriptor>,
    referenced_tests: Vec<String>,
}

fn parse_hash(bytes: &[u8], tests: bool) -> String {
    let tag: &[u8] = if tests { b"#tests" } else { b"#source" };
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.update(tag);
    format!("{:x}", hasher.finalize())
}

/// Read and parse one project file through the cache. Returns
/// `(exists, parse)`; a missing file is `(false, None)`.
fn parse_file(
    root: &Path,
    rel: &str,
    tests: bool,
    cache: &CacheHandle,
) -> (bool, Option<CachedParse>) {
    let Some(adapter) = adapters::adapter_for_path(rel) else {
        return (root.join(rel).exists(), None);
    };
    let bytes = match fs::read(root.join(rel)) {
        Ok(bytes) => bytes,
        Err(_) => return (false, None),
    };
    let hash = parse_hash(&bytes, tests);
    if let Some(hit) = cache.parsed(&hash) {
        return (true, Some(hit));
    }
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            let parsed = CachedParse {
                descriptor: SourceDescriptor::default(),
                diagnostics: vec![Diagnostic::new(
                    DiagnosticKind::ParseError,
                    Location::file(rel),
                    format!("file is not valid UTF-8: {}", e),
                )],
            };
            return (true, Some(parsed));
        }
    };
    let outcome = if tests {
        adapter.parse_tests(rel, &text)
    } else {
        adapter.parse_source(rel, &text)
    };
    let parsed = CachedParse {
        descriptor: outcome.descriptor,
        diagnostics: outcome.diagnostics,
    };
    cache.store_parsed(&hash, &parsed);
    (true, Some(parsed))
}

/// Merged-set cache key: manifest-store fingerprint plus the exact chain.
fn chain_merged_key(store: &ManifestStore, chain: &[&Manifest], file: &str) -> String {
    let names: Vec<&str> = chain.iter().map(|m| m.name.as_str()).collect();
    cache::merged_key(store.fingerprint(), &format!("{}|{}", file, names.join(",")))
}

fn validate_file(
    store: &ManifestStore,
    file: &str,
    request: &ValidationRequest,
    config: &MaidConfig,
    cache: &CacheHandle,
    sink: &DiagnosticSink,
) -> FileOutcome {
    let root = &request.project_root;

    // Resolve
    let chain: Vec<&Manifest> = if request.use_chain {
        let resolution = chain::active_chain(store, file);
        sink.extend(resolution.diagnostics);
        resolution.chain
    } else if let Target::Manifest(name) = &request.target {
        store.get(name).into_iter().collect()
    } else {
        chain::active_chain(store, file).chain
    };

    // Merge (memoised on the exact merge order under this store state; sets
    // whose merge emitted diagnostics stay uncached so reruns reproduce them)
    let order = chain::merge_order(store, &chain);
    let key = chain_merged_key(store, &order, file);
    let expected = match cache.merged_set(&key) {
        Some(set) => set,
        None => {
            let outcome = merge::merge_chain(&order, file);
            if outcome.diagnostics.is_empty() {
                cache.store_merged_set(&key, &outcome.set);
            } else {
                sink.extend(outcome.diagnostics);
            }
            outcome.set
        }
    };

    // Parse
    let (exists, parsed) = parse_file(root, file, false, cache);
    if let Some(parsed) = &parsed {
        sink.extend(parsed.diagnostics.iter().cloned());
    }
    let descriptor = parsed.map(|p| p.descriptor);

    // CheckImpl: the latest chain entry naming the file picks the mode.
    let mode = chain
        .iter()
        .rev()
        .find_map(|m| m.mode_for(file))
        .unwrap_or(ValidationMode::Permissive);
    sink.extend(implementation::check_implementation(
        file,
        &expected,
        descriptor.as_ref(),
        mode,
        exists,
    ));

    // CheckBehaviour
    let test_paths = behaviour::discover_test_paths(&expected.commands);
    let mut tests: Vec<TestFile> = Vec::new();
    for path in &test_paths {
        let (test_exists, parsed) = parse_file(root, path, true, cache);
        if let Some(parsed) = &parsed {
            sink.extend(parsed.diagnostics.iter().cloned());
        }
        tests.push(TestFile {
            path: path.clone(),
            exists: test_exists,
            descriptor: parsed.map(|p| p.descriptor).unwrap_or_default(),
        });
    }
    let mut load = |helper: &str| -> Option<SourceDescriptor> {
        let (helper_exists, parsed) = parse_file(root, helper, true, cache);
        if !helper_exists {
            return None;
        }
        parsed.map(|p| p.descriptor)
    };
    let followed =
        behaviour::follow_imports(&tests, config.behaviour.import_depth, &mut load);
    tests.extend(followed);
    sink.extend(behaviour::check_behaviour(&expected, &tests));

    // Helpers reached by import-following count as referenced for tracking.
    let referenced_tests = tests.iter().map(|t| t.path.clone()).collect();

    FileOutcome {
        file: file.to_string(),
        expected,
        descriptor,
        referenced_tests,
    }
}

fn cancelled_report(inputs: ReportInputs) -> ValidationReport {
    // Partial diagnostics are discarded on cancel.
    let diagnostics = vec![Diagnostic::new(
        DiagnosticKind::Cancelled,
        Location::file(""),
        "validation run cancelled before completion".to_string(),
    )];
    ValidationReport::new(inputs, diagnostics)
}

/// Execute a validation run. `Err` is reserved for misuse (unreadable
/// manifest directory, unknown target manifest); everything else lands in
/// the report.
pub fn run_validation(
    request: &ValidationRequest,
    config: &MaidConfig,
    cancel: &CancelToken,
) -> Result<ValidationReport, MaidError> {
    let manifest_dir = request
        .manifest_dir
        .clone()
        .unwrap_or_else(|| request.project_root.join(&config.manifest_dir));

    let mut inputs = ReportInputs {
        manifest_dir: manifest_dir.display().to_string(),
        mode: request.target.mode_label().to_string(),
        used_chain: request.use_chain,
        targets: Vec::new(),
    };

    // Load
    let load = ManifestStore::load_dir(&manifest_dir)?;
    let store = load.store;
    let mut load_diagnostics = load.diagnostics;
    if load_diagnostics
        .iter()
        .any(|d| d.severity == Severity::Fatal)
    {
        // The run terminates on the first fatal diagnostic in the Load phase.
        finalize(&mut load_diagnostics);
        let mut report = ValidationReport::new(inputs, load_diagnostics);
        report.summary.skipped = store.len();
        return Ok(report);
    }

    // Resolve (global supersession legality)
    load_diagnostics.extend(chain::supersession_diagnostics(&store));
    let resolve_failed = load_diagnostics
        .iter()
        .any(|d| d.severity == Severity::Fatal);

    let target_files: Vec<String> = match &request.target {
        Target::Repo | Target::ManifestDir => {
            store.affected_files().map(str::to_string).collect()
        }
        Target::Manifest(name) => store
            .get(name)
            .ok_or_else(|| MaidError::Manifest(format!("no such manifest: {}", name)))?
            .affected_files(),
    };
    inputs.targets = target_files.clone();

    if resolve_failed {
        finalize(&mut load_diagnostics);
        let mut report = ValidationReport::new(inputs, load_diagnostics);
        report.summary.skipped = target_files.len();
        return Ok(report);
    }

    let cache = if request.use_cache {
        CacheHandle::open(
            &request.project_root.join(&config.cache_dir),
            store.fingerprint(),
        )
    } else {
        CacheHandle::in_memory()
    };

    // Parse / CheckImpl / CheckBehaviour fan-out
    let sink = DiagnosticSink::new();
    sink.extend(load_diagnostics);
    let outcomes: Vec<Option<FileOutcome>> = target_files
        .par_iter()
        .map(|file| {
            if cancel.is_cancelled() {
                return None;
            }
            Some(validate_file(&store, file, request, config, &cache, &sink))
        })
        .collect();

    if cancel.is_cancelled() {
        return Ok(cancelled_report(inputs));
    }

    let mut expected_sets: BTreeMap<String, ExpectedSet> = BTreeMap::new();
    let mut descriptors: BTreeMap<String, SourceDescriptor> = BTreeMap::new();
    let mut referenced_tests: FxHashSet<String> = FxHashSet::default();
    for outcome in outcomes.into_iter().flatten() {
        if let Some(descriptor) = outcome.descriptor {
            descriptors.insert(outcome.file.clone(), descriptor);
        }
        referenced_tests.extend(outcome.referenced_tests);
        expected_sets.insert(outcome.file, outcome.expected);
    }

    let declared_files: FxHashSet<String> =
        store.affected_files().map(str::to_string).collect();

    // File tracking over the source tree (repo-granularity runs only); the
    // walk also feeds the dependency check with every file on disk.
    let mut project_files: FxHashSet<String> =
        descriptors.keys().cloned().collect();
    let mut file_tracking = Default::default();
    if matches!(request.target, Target::Repo | Target::ManifestDir) {
        let files = tracker::collect_source_files(&request.project_root, &config.exclude)?;
        project_files.extend(files.iter().cloned());
        let (tracking, diagnostics) = tracker::classify_files(
            &files,
            &expected_sets,
            &descriptors,
            &declared_files,
            &referenced_tests,
        );
        sink.extend(diagnostics);
        file_tracking = tracking;
    }

    // CheckCoherence over the global merged view
    sink.extend(coherence::check_coherence(&CoherenceInput {
        expected_sets: &expected_sets,
        descriptors: &descriptors,
        project_files: &project_files,
        declared_files: &declared_files,
        config,
    }));

    sink.extend(cache.take_diagnostics());

    // Report
    let diagnostics = sink.into_finalized();
    let summary = summarize(&diagnostics, 0);
    let graph_export = request.graph_format.map(|format| {
        let graph = graph::build_graph(&store, &expected_sets, &descriptors);
        let rendered = match format {
            GraphFormat::NodeLink => None,
            GraphFormat::Dot => Some(graph.to_dot()),
            GraphFormat::Flowchart => Some(graph.to_flowchart()),
        };
        GraphExport {
            nodes: graph.nodes,
            edges: graph.edges,
            format,
            rendered,
        }
    });

    Ok(ValidationReport {
        run_id: ulid::Ulid::new().to_string(),
        inputs,
        summary,
        diagnostics,
        file_tracking,
        graph_export,
    })
}
