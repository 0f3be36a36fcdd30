//! Chain resolution: supersession closure and per-file chronological chains.
//!
//! A file's active chain is the ordered sequence of manifests referencing it
//! after removing every manifest present in some other manifest's
//! `supersedes`. Ordering is by ascending task index; ties are impossible
//! because duplicate indices are rejected at store load.
//!
//! Two legality rules live here: only snapshot (or legacy unlabelled)
//! manifests may be superseded, and the supersession graph must be acyclic.
//! A cycle aborts chain resolution for the whole store.

use crate::core::diagnostics::{Diagnostic, DiagnosticKind, Location, Severity};
use crate::core::manifest::Manifest;
use crate::core::store::ManifestStore;
use rustc_hash::{FxHashMap, FxHashSet};

/// Outcome of resolving one file's chain.
#[derive(Debug, Default)]
pub struct ChainResolution<'a> {
    /// Chronological active chain; empty when resolution aborted.
    pub chain: Vec<&'a Manifest>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Global supersession legality and cycle diagnostics for a store.
///
/// Run once per validation; [`active_chain`] repeats the cycle check so it is
/// safe standalone, but callers should surface these diagnostics exactly once.
pub fn supersession_diagnostics(store: &ManifestStore) -> Vec<Diagnostic> {
    let mut out = Vec::new();

    for manifest in store.all() {
        for target in &manifest.supersedes {
            if let Some(superseded) = store.get(target)
                && !superseded.is_snapshot()
            {
                out.push(Diagnostic::new(
                    DiagnosticKind::IllegalSupersession,
                    Location::file(&manifest.name),
                    format!(
                        "supersedes {} whose task type is {:?}; only snapshots may be superseded",
                        target,
                        superseded.effective_task_type()
                    ),
                ));
            }
        }
    }

    if let Some(cycle) = find_cycle(store) {
        out.push(
            Diagnostic::new(
                DiagnosticKind::SupersessionCycle,
                Location::file(&cycle[0]),
                format!("supersession cycle: {}", cycle.join(" -> ")),
            )
            .with_severity(Severity::Fatal),
        );
    }

    out
}

/// Depth-first search over supersedes edges; returns one cycle path if any.
fn find_cycle(store: &ManifestStore) -> Option<Vec<String>> {
    const WHITE: u8 = 0;
    const GREY: u8 = 1;
    const BLACK: u8 = 2;

    let mut color: FxHashMap<&str, u8> = FxHashMap::default();
    let mut stack: Vec<&str> = Vec::new();

    fn visit<'a>(
        node: &'a str,
        store: &'a ManifestStore,
        color: &mut FxHashMap<&'a str, u8>,
        stack: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        color.insert(node, GREY);
        stack.push(node);
        if let Some(manifest) = store.get(node) {
            for target in &manifest.supersedes {
                if store.get(target).is_none() {
                    continue;
                }
                match color.get(target.as_str()).copied().unwrap_or(WHITE) {
                    WHITE => {
                        if let Some(cycle) = visit(target, store, color, stack) {
                            return Some(cycle);
                        }
                    }
                    GREY => {
                        let start = stack
                            .iter()
                            .position(|n| *n == target.as_str())
                            .unwrap_or(0);
                        let mut cycle: Vec<String> =
                            stack[start..].iter().map(|s| s.to_string()).collect();
                        cycle.push(target.clone());
                        return Some(cycle);
                    }
                    _ => {}
                }
            }
        }
        stack.pop();
        color.insert(node, BLACK);
        None
    }

    for manifest in store.all() {
        if color.get(manifest.name.as_str()).copied().unwrap_or(WHITE) == WHITE
            && let Some(cycle) = visit(&manifest.name, store, &mut color, &mut stack)
        {
            return Some(cycle);
        }
    }
    None
}

/// Resolve the active chain for `file` (normalised path).
///
/// Gathers every manifest referencing the file, removes those in the global
/// superseded set, and returns the remainder in ascending task-index order.
/// A supersession cycle aborts resolution with a fatal diagnostic.
pub fn active_chain<'a>(store: &'a ManifestStore, file: &str) -> ChainResolution<'a> {
    if let Some(cycle) = find_cycle(store) {
        return ChainResolution {
            chain: Vec::new(),
            diagnostics: vec![
                Diagnostic::new(
                    DiagnosticKind::SupersessionCycle,
                    Location::file(&cycle[0]),
                    format!("supersession cycle: {}", cycle.join(" -> ")),
                )
                .with_severity(Severity::Fatal),
            ],
        };
    }

    let superseded: FxHashSet<&str> = store.superseded_set();
    let chain: Vec<&Manifest> = store
        .by_file(file)
        .into_iter()
        .filter(|m| !superseded.contains(m.name.as_str()))
        .collect();
    // by_file is already chronological; keep the sort as the contract.
    debug_assert!(chain.windows(2).all(|w| w[0].task_index < w[1].task_index));

    ChainResolution {
        chain,
        diagnostics: Vec::new(),
    }
}

/// Expand an active chain into merge order.
///
/// A manifest that supersedes snapshots absorbs their declarations: the
/// superseded manifests are archived (never part of the active chain), but
/// their `expectedArtifacts` still seed the superseder's baseline. Each chain
/// entry is therefore preceded by its transitive supersession closure,
/// chronologically sorted and deduplicated. A tombstone entry still
/// annihilates whatever it absorbed.
pub fn merge_order<'a>(store: &'a ManifestStore, chain: &[&'a Manifest]) -> Vec<&'a Manifest> {
    fn collect<'a>(
        store: &'a ManifestStore,
        manifest: &'a Manifest,
        visited: &mut FxHashSet<&'a str>,
        out: &mut Vec<&'a Manifest>,
    ) {
        for target in &manifest.supersedes {
            if let Some(superseded) = store.get(target)
                && visited.insert(superseded.name.as_str())
            {
                collect(store, superseded, visited, out);
                out.push(superseded);
            }
        }
    }

    let mut order: Vec<&Manifest> = Vec::new();
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    for manifest in chain {
        let mut visited: FxHashSet<&str> = FxHashSet::default();
        let mut history: Vec<&Manifest> = Vec::new();
        collect(store, manifest, &mut visited, &mut history);
        history.sort_by_key(|m| m.task_index);
        for entry in history {
            if seen.insert(entry.name.as_str()) {
                order.push(entry);
            }
        }
        if seen.insert(manifest.name.as_str()) {
            order.push(manifest);
        }
    }
    order
}

/// Chronological filter for prior-artifact lookups: every active manifest
/// with task index strictly below `before_index`. Never a plain
/// "present in store" test.
pub fn manifests_before<'a>(store: &'a ManifestStore, before_index: u64) -> Vec<&'a Manifest> {
    let superseded: FxHashSet<&str> = store.superseded_set();
    store
        .all()
        .filter(|m| m.task_index < before_index && !superseded.contains(m.name.as_str()))
        .collect()
}
