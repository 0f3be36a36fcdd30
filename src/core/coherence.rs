//! Cross-manifest coherence checks over the global merged view.
//!
//! Four independently invocable checks: duplicate public artifacts across
//! files, naming conventions, dependency-graph validation (cycles and
//! undeclared references), and user-supplied constraint rules. All are pure
//! functions of their inputs, which is what makes the whole pass idempotent.

use crate::adapters::SourceDescriptor;
use crate::core::behaviour::resolve_import_candidates;
use crate::core::config::MaidConfig;
use crate::core::diagnostics::{Diagnostic, DiagnosticKind, Location};
use crate::core::manifest::ArtifactKind;
use crate::core::merge::ExpectedSet;
use regex::Regex;
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;

/// Inputs shared by the coherence checks.
pub struct CoherenceInput<'a> {
    /// Merged expected set per file, across all active chains.
    pub expected_sets: &'a BTreeMap<String, ExpectedSet>,
    /// Parsed descriptors for implementation files (dependency edges).
    pub descriptors: &'a BTreeMap<String, SourceDescriptor>,
    /// Every source file known to exist in the project tree.
    pub project_files: &'a FxHashSet<String>,
    /// Files referenced by at least one active manifest.
    pub declared_files: &'a FxHashSet<String>,
    pub config: &'a MaidConfig,
}

/// Run every coherence check.
pub fn check_coherence(input: &CoherenceInput) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    out.extend(check_duplicates(input.expected_sets));
    out.extend(check_naming(input.expected_sets, input.config));
    out.extend(check_dependencies(
        input.descriptors,
        input.project_files,
        input.declared_files,
    ));
    out.extend(check_constraints(
        input.expected_sets,
        input.descriptors,
        input.config,
    ));
    out
}

/// A public artifact identity may be declared in exactly one file. The key is
/// the full merge key, so overloads distinguished by return type (and methods
/// under distinct classes) do not collide.
pub fn check_duplicates(expected_sets: &BTreeMap<String, ExpectedSet>) -> Vec<Diagnostic> {
    let mut seen: BTreeMap<String, &str> = BTreeMap::new();
    let mut out = Vec::new();
    for (file, set) in expected_sets {
        if set.tombstoned {
            continue;
        }
        for artifact in set.artifacts() {
            if !artifact.is_public() {
                continue;
            }
            let key = format!(
                "{}:{}:{}:{}",
                artifact.kind.as_str(),
                artifact.class.as_deref().unwrap_or(""),
                artifact.name,
                artifact.returns.as_deref().unwrap_or("")
            );
            match seen.get(&key) {
                Some(prior) if *prior != file.as_str() => {
                    out.push(
                        Diagnostic::new(
                            DiagnosticKind::DuplicateArtifact,
                            Location::file(file),
                            format!("{} is already declared in {}", artifact.label(), prior),
                        )
                        .with_hint(format!("declared in both {} and {}", prior, file)),
                    );
                }
                Some(_) => {}
                None => {
                    seen.insert(key, file);
                }
            }
        }
    }
    out
}

fn compile(pattern: &Option<String>) -> Option<Regex> {
    pattern.as_ref().and_then(|p| Regex::new(p).ok())
}

/// Configurable pattern match on artifact names and file paths; findings are
/// informational.
pub fn check_naming(
    expected_sets: &BTreeMap<String, ExpectedSet>,
    config: &MaidConfig,
) -> Vec<Diagnostic> {
    let function_re = compile(&config.naming.function);
    let class_re = compile(&config.naming.class);
    let method_re = compile(&config.naming.method);
    let attribute_re = compile(&config.naming.attribute);
    let file_re = compile(&config.naming.file);

    let mut out = Vec::new();
    for (file, set) in expected_sets {
        if let Some(re) = &file_re
            && !re.is_match(file)
        {
            out.push(Diagnostic::new(
                DiagnosticKind::NamingViolation,
                Location::file(file),
                format!("file path does not match configured pattern {}", re.as_str()),
            ));
        }
        for artifact in set.artifacts() {
            let re = match artifact.kind {
                ArtifactKind::Function => &function_re,
                ArtifactKind::Class => &class_re,
                ArtifactKind::Method => &method_re,
                ArtifactKind::Attribute => &attribute_re,
                _ => &None,
            };
            if let Some(re) = re
                && !re.is_match(&artifact.name)
            {
                out.push(Diagnostic::new(
                    DiagnosticKind::NamingViolation,
                    Location::file(file),
                    format!(
                        "{} does not match configured pattern {}",
                        artifact.label(),
                        re.as_str()
                    ),
                ));
            }
        }
    }
    out
}

/// Build the file dependency graph from parsed imports; report cycles and
/// references to project files no manifest declares.
pub fn check_dependencies(
    descriptors: &BTreeMap<String, SourceDescriptor>,
    project_files: &FxHashSet<String>,
    declared_files: &FxHashSet<String>,
) -> Vec<Diagnostic> {
    let mut out = Vec::new();

    let mut edges: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (file, descriptor) in descriptors {
        let mut targets = Vec::new();
        for import in &descriptor.imports {
            for candidate in resolve_import_candidates(file, import) {
                let exists =
                    project_files.contains(&candidate) || descriptors.contains_key(&candidate);
                if exists && candidate != *file {
                    if !declared_files.contains(&candidate) {
                        out.push(Diagnostic::new(
                            DiagnosticKind::MissingDeclaration,
                            Location::at(file, import.line),
                            format!("imports {} which no manifest declares", candidate),
                        ));
                    }
                    if !targets.contains(&candidate) {
                        targets.push(candidate);
                    }
                }
            }
        }
        edges.insert(file, targets);
    }

    // Iterative DFS cycle detection, deterministic over the BTreeMap order.
    const WHITE: u8 = 0;
    const GREY: u8 = 1;
    const BLACK: u8 = 2;
    let mut color: BTreeMap<&str, u8> = BTreeMap::new();

    fn visit<'a>(
        node: &'a str,
        edges: &'a BTreeMap<&str, Vec<String>>,
        color: &mut BTreeMap<&'a str, u8>,
        stack: &mut Vec<&'a str>,
        out: &mut Vec<Diagnostic>,
    ) {
        color.insert(node, GREY);
        stack.push(node);
        if let Some(targets) = edges.get(node) {
            for target in targets {
                let Some((key, _)) = edges.get_key_value(target.as_str()) else {
                    continue;
                };
                match color.get(key).copied().unwrap_or(WHITE) {
                    WHITE => visit(key, edges, color, stack, out),
                    GREY => {
                        let start = stack.iter().position(|n| n == key).unwrap_or(0);
                        let mut cycle: Vec<&str> = stack[start..].to_vec();
                        cycle.push(key);
                        out.push(Diagnostic::new(
                            DiagnosticKind::DependencyCycle,
                            Location::file(cycle[0]),
                            format!("import cycle: {}", cycle.join(" -> ")),
                        ));
                    }
                    _ => {}
                }
            }
        }
        stack.pop();
        color.insert(node, BLACK);
    }

    let nodes: Vec<&str> = edges.keys().copied().collect();
    for node in nodes {
        if color.get(node).copied().unwrap_or(WHITE) == WHITE {
            let mut stack = Vec::new();
            visit(node, &edges, &mut color, &mut stack, &mut out);
        }
    }

    out
}

/// Evaluate user-supplied constraint rules from `.maid.toml`.
pub fn check_constraints(
    expected_sets: &BTreeMap<String, ExpectedSet>,
    descriptors: &BTreeMap<String, SourceDescriptor>,
    config: &MaidConfig,
) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    for rule in &config.constraints {
        let Ok(applies_to) = Regex::new(&rule.applies_to) else {
            out.push(Diagnostic::new(
                DiagnosticKind::ConstraintViolation,
                Location::file(crate::core::config::CONFIG_FILE),
                format!("constraint \"{}\" has an invalid applies_to pattern", rule.name),
            ));
            continue;
        };

        if let Some(forbid) = &rule.forbid_import
            && let Ok(forbid_re) = Regex::new(forbid)
        {
            for (file, descriptor) in descriptors {
                if !applies_to.is_match(file) {
                    continue;
                }
                for import in &descriptor.imports {
                    if forbid_re.is_match(&import.module) {
                        out.push(Diagnostic::new(
                            DiagnosticKind::ConstraintViolation,
                            Location::at(file, import.line),
                            format!(
                                "constraint \"{}\": import of {} is forbidden here",
                                rule.name, import.module
                            ),
                        ));
                    }
                }
            }
        }

        if let Some(prefix) = &rule.require_prefix {
            for (file, set) in expected_sets {
                if !applies_to.is_match(file) {
                    continue;
                }
                for artifact in set.artifacts() {
                    if artifact.is_public()
                        && matches!(
                            artifact.kind,
                            ArtifactKind::Function | ArtifactKind::Method
                        )
                        && !artifact.name.starts_with(prefix.as_str())
                    {
                        out.push(Diagnostic::new(
                            DiagnosticKind::ConstraintViolation,
                            Location::file(file),
                            format!(
                                "constraint \"{}\": {} must be prefixed with \"{}\"",
                                rule.name,
                                artifact.label(),
                                prefix
                            ),
                        ));
                    }
                }
            }
        }
    }
    out
}
