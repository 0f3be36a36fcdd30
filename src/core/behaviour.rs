//! Behavioural validation: declared artifacts must be exercised by tests.
//!
//! Test file paths are discovered by tokenising each validation command and
//! keeping path-like tokens with a source-file extension. Usage is aggregated
//! across all discovered test files plus helper modules reached through
//! imports (bounded depth, cycle-safe, confined to the test root). An
//! expected artifact is satisfied by a call, instantiation, subclassing,
//! attribute access on an instance, or a `raises`-style reference; pure type
//! declarations are exempt.

use crate::adapters::{self, ImportRef, SourceDescriptor, UsageKind, UsageRef};
use crate::core::diagnostics::{Diagnostic, DiagnosticKind, Location};
use crate::core::manifest::{Artifact, ArtifactKind, normalize_rel_path};
use crate::core::merge::ExpectedSet;
use rustc_hash::FxHashMap;

/// Default import-follow depth; configurable via `.maid.toml`.
pub const DEFAULT_IMPORT_DEPTH: usize = 3;

/// One parsed test (or helper) file feeding the usage pool.
#[derive(Debug, Clone)]
pub struct TestFile {
    pub path: String,
    pub exists: bool,
    pub descriptor: SourceDescriptor,
}

/// Extract test-file paths from tokenised validation commands: any token that
/// looks like a path and carries an extension some adapter claims.
pub fn discover_test_paths(commands: &[Vec<String>]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for command in commands {
        for token in command {
            if token.starts_with('-') {
                continue;
            }
            // pytest-style node ids carry `::test_name` suffixes.
            let path_part = token.split("::").next().unwrap_or(token);
            if adapters::is_source_path(path_part) {
                let normalised = normalize_rel_path(path_part);
                if !out.contains(&normalised) {
                    out.push(normalised);
                }
            }
        }
    }
    out
}

/// Resolve an import to candidate project-relative paths.
///
/// Python dotted modules map to `a/b.py` or `a/b/__init__.py`; leading dots
/// are relative to the importing file. TypeScript relative specifiers try the
/// adapter extensions plus `index.*`; bare (package) specifiers resolve to
/// nothing.
pub fn resolve_import_candidates(importing_file: &str, import: &ImportRef) -> Vec<String> {
    let module = import.module.as_str();
    let parent = match importing_file.rsplit_once('/') {
        Some((dir, _)) => dir,
        None => "",
    };
    let mut candidates = Vec::new();

    if module.starts_with('.') && !module.starts_with("./") && !module.starts_with("..") {
        // Python relative import: `.helpers` / `..shared.util`.
        let dots = module.chars().take_while(|c| *c == '.').count();
        let rest = &module[dots..];
        let mut base: Vec<&str> = if parent.is_empty() {
            Vec::new()
        } else {
            parent.split('/').collect()
        };
        for _ in 1..dots {
            base.pop();
        }
        let mut segments = base.join("/");
        if !rest.is_empty() {
            if !segments.is_empty() {
                segments.push('/');
            }
            segments.push_str(&rest.replace('.', "/"));
        }
        candidates.push(format!("{}.py", segments));
        candidates.push(format!("{}/__init__.py", segments));
    } else if module.starts_with("./") || module.starts_with("..") {
        // TypeScript relative specifier.
        let joined = normalize_rel_path(&format!("{}/{}", parent, module));
        for ext in ["ts", "tsx", "js", "jsx", "svelte"] {
            candidates.push(format!("{}.{}", joined, ext));
        }
        for ext in ["ts", "tsx", "js", "jsx"] {
            candidates.push(format!("{}/index.{}", joined, ext));
        }
    } else if importing_file.ends_with(".py") {
        // Python absolute module path within the project.
        let base = module.replace('.', "/");
        candidates.push(format!("{}.py", base));
        candidates.push(format!("{}/__init__.py", base));
    }

    candidates
        .into_iter()
        .map(|c| normalize_rel_path(&c))
        .filter(|c| !c.starts_with('.'))
        .collect()
}

/// Follow imports out of the seed test files, bounded by `depth` and confined
/// to the seed files' top-level directories. `load` parses one project file
/// (through the cache) and returns `None` when it does not exist.
pub fn follow_imports(
    seeds: &[TestFile],
    depth: usize,
    load: &mut dyn FnMut(&str) -> Option<SourceDescriptor>,
) -> Vec<TestFile> {
    let mut roots: Vec<String> = seeds
        .iter()
        .filter_map(|t| t.path.split('/').next().map(str::to_string))
        .collect();
    roots.sort();
    roots.dedup();

    let mut visited: Vec<String> = seeds.iter().map(|t| t.path.clone()).collect();
    let mut frontier: Vec<TestFile> = seeds.to_vec();
    let mut followed: Vec<TestFile> = Vec::new();

    for _ in 0..depth {
        let mut next = Vec::new();
        for file in &frontier {
            for import in &file.descriptor.imports {
                for candidate in resolve_import_candidates(&file.path, import) {
                    let under_test_root = candidate
                        .split('/')
                        .next()
                        .is_some_and(|top| roots.iter().any(|r| r == top));
                    if !under_test_root || visited.iter().any(|v| v == &candidate) {
                        continue;
                    }
                    visited.push(candidate.clone());
                    if let Some(descriptor) = load(&candidate) {
                        next.push(TestFile {
                            path: candidate,
                            exists: true,
                            descriptor,
                        });
                    }
                }
            }
        }
        if next.is_empty() {
            break;
        }
        followed.extend(next.iter().cloned());
        frontier = next;
    }

    followed
}

/// Map instance bindings (`svc = AuthService()`) to class names.
fn binding_map(usages: &[UsageRef]) -> FxHashMap<&str, &str> {
    let mut map = FxHashMap::default();
    for usage in usages {
        if usage.kind == UsageKind::Instantiation
            && let Some(binding) = &usage.binding
        {
            map.insert(binding.as_str(), usage.name.as_str());
        }
    }
    map
}

fn satisfied(artifact: &Artifact, usages: &[UsageRef], bindings: &FxHashMap<&str, &str>) -> bool {
    match artifact.kind {
        ArtifactKind::Function => usages.iter().any(|u| {
            (u.kind == UsageKind::Call || u.kind == UsageKind::RaisesRef) && u.name == artifact.name
        }),
        ArtifactKind::Method => {
            let class = artifact.class.as_deref();
            usages.iter().any(|u| {
                if u.name != artifact.name {
                    return false;
                }
                match u.kind {
                    UsageKind::Call => match (&u.receiver, class) {
                        // A receiver bound to a different class disqualifies;
                        // anything unresolvable is accepted conservatively.
                        (Some(receiver), Some(class)) => bindings
                            .get(receiver.as_str())
                            .is_none_or(|bound| *bound == class),
                        _ => true,
                    },
                    UsageKind::RaisesRef => true,
                    _ => false,
                }
            })
        }
        ArtifactKind::Class => usages.iter().any(|u| {
            (u.kind == UsageKind::Instantiation
                || u.kind == UsageKind::SubclassBase
                || u.kind == UsageKind::RaisesRef)
                && u.name == artifact.name
        }),
        ArtifactKind::Attribute => {
            let Some(class) = artifact.class.as_deref() else {
                // Module-level constants have no instance to observe.
                return true;
            };
            let class_instantiated = usages
                .iter()
                .any(|u| u.kind == UsageKind::Instantiation && u.name == class);
            usages.iter().any(|u| {
                u.kind == UsageKind::AttributeAccess
                    && u.name == artifact.name
                    && match &u.receiver {
                        Some(receiver) => match bindings.get(receiver.as_str()) {
                            Some(bound) => *bound == class,
                            None => class_instantiated,
                        },
                        None => class_instantiated,
                    }
            })
        }
        // Pure type declarations carry no runtime presence.
        ArtifactKind::Interface
        | ArtifactKind::TypeAlias
        | ArtifactKind::Enum
        | ArtifactKind::Namespace => true,
    }
}

/// Check behavioural coverage of `expected` against the aggregated test pool.
pub fn check_behaviour(expected: &ExpectedSet, tests: &[TestFile]) -> Vec<Diagnostic> {
    let mut out = Vec::new();

    for test in tests {
        if !test.exists {
            out.push(Diagnostic::new(
                DiagnosticKind::BehaviourMissing,
                Location::file(&test.path),
                format!(
                    "test file referenced by a validation command does not exist: {}",
                    test.path
                ),
            )
            .with_severity(crate::core::diagnostics::Severity::Warning));
        }
    }

    if expected.tombstoned {
        return out;
    }

    let usages: Vec<UsageRef> = tests
        .iter()
        .filter(|t| t.exists)
        .flat_map(|t| t.descriptor.usages.iter().cloned())
        .collect();
    let bindings = binding_map(&usages);

    for artifact in expected.artifacts() {
        if !artifact.is_public() || artifact.kind.is_type_only() {
            continue;
        }
        if !satisfied(artifact, &usages, &bindings) {
            out.push(
                Diagnostic::new(
                    DiagnosticKind::BehaviourMissing,
                    Location::file(&expected.file),
                    format!(
                        "{} is never exercised by the tests named in the chain's validation commands",
                        artifact.label()
                    ),
                )
                .with_hint(format!(
                    "add a test that uses {} to one of the referenced test files",
                    artifact.name
                )),
            );
        }
    }

    out
}
