//! Implementation validation: merged expected set versus parsed source.
//!
//! Strict mode (file in `creatableFiles`) demands that public definitions
//! equal the expected set exactly; permissive mode (`editableFiles`) allows
//! extra public definitions. Private artifacts are never required and never
//! forbidden.

use crate::adapters::SourceDescriptor;
use crate::core::diagnostics::{Diagnostic, DiagnosticKind, Location};
use crate::core::manifest::{Artifact, ValidationMode};
use crate::core::merge::ExpectedSet;
use rustc_hash::FxHashMap;

/// Compare argument vectors positionally. Names must match; types must match
/// when both sides carry one; a missing type on the defined side is tolerated
/// only when the expected side omits it too.
fn compare_args(file: &str, expected: &Artifact, actual: &Artifact, out: &mut Vec<Diagnostic>) {
    if expected.args.len() != actual.args.len() {
        out.push(Diagnostic::new(
            DiagnosticKind::TypeMismatch,
            Location::file(file),
            format!(
                "{} takes {} parameter(s), expected {}",
                expected.label(),
                actual.args.len(),
                expected.args.len()
            ),
        ));
        return;
    }
    for (position, (want, got)) in expected.args.iter().zip(actual.args.iter()).enumerate() {
        if want.name != got.name {
            out.push(Diagnostic::new(
                DiagnosticKind::TypeMismatch,
                Location::file(file),
                format!(
                    "{} parameter {} is named \"{}\", expected \"{}\"",
                    expected.label(),
                    position + 1,
                    got.name,
                    want.name
                ),
            ));
            continue;
        }
        match (&want.type_, &got.type_) {
            (Some(want_ty), Some(got_ty)) if want_ty != got_ty => {
                out.push(Diagnostic::new(
                    DiagnosticKind::TypeMismatch,
                    Location::file(file),
                    format!(
                        "{} parameter \"{}\" has type {}, expected {}",
                        expected.label(),
                        want.name,
                        got_ty,
                        want_ty
                    ),
                ));
            }
            (Some(want_ty), None) => {
                out.push(Diagnostic::new(
                    DiagnosticKind::TypeMismatch,
                    Location::file(file),
                    format!(
                        "{} parameter \"{}\" is untyped, expected {}",
                        expected.label(),
                        want.name,
                        want_ty
                    ),
                ));
            }
            _ => {}
        }
    }
}

/// Check one file's implementation against its merged expected set.
///
/// `source` is `None` when the file does not exist on disk; `file_exists`
/// distinguishes an absent file from one that failed to parse.
pub fn check_implementation(
    file: &str,
    expected: &ExpectedSet,
    source: Option<&SourceDescriptor>,
    mode: ValidationMode,
    file_exists: bool,
) -> Vec<Diagnostic> {
    let mut out = Vec::new();

    if expected.tombstoned {
        if file_exists {
            out.push(Diagnostic::new(
                DiagnosticKind::UnexpectedFilePresent,
                Location::file(file),
                "file is declared absent by its manifest chain but exists on disk".to_string(),
            ));
        }
        return out;
    }

    let empty = SourceDescriptor::default();
    let source = source.unwrap_or(&empty);
    let defined_by_key: FxHashMap<_, &Artifact> = source
        .defined
        .iter()
        .map(|a| (a.merge_key(), a))
        .collect();

    for want in expected.artifacts() {
        if !want.is_public() {
            continue;
        }
        match defined_by_key.get(&want.merge_key()) {
            Some(actual) => compare_args(file, want, actual, &mut out),
            None => {
                let near = source.defined.iter().find(|a| {
                    a.kind == want.kind && a.class == want.class && a.name == want.name
                });
                let mut message = format!("{} is not defined", want.label());
                if let Some(returns) = &want.returns {
                    message = format!(
                        "{} with return type {} is not defined",
                        want.label(),
                        returns
                    );
                }
                if !file_exists {
                    message.push_str(" (file missing on disk)");
                }
                let mut diagnostic =
                    Diagnostic::new(DiagnosticKind::MissingArtifact, Location::file(file), message);
                if let Some(actual) = near {
                    diagnostic = diagnostic.with_hint(format!(
                        "a definition named \"{}\" exists with return type {}",
                        actual.name,
                        actual.returns.as_deref().unwrap_or("<none>")
                    ));
                    // Argument drift on the near match is reported precisely.
                    compare_args(file, want, actual, &mut out);
                }
                out.push(diagnostic);
            }
        }
    }

    if mode == ValidationMode::Strict {
        for actual in &source.defined {
            if !actual.is_public() {
                continue;
            }
            let declared = expected.get(&actual.merge_key()).is_some()
                || expected.near_match(actual).is_some();
            if !declared {
                out.push(Diagnostic::new(
                    DiagnosticKind::UndeclaredArtifact,
                    Location::file(file),
                    format!("{} is defined but not declared by any manifest", actual.label()),
                ));
            }
        }
    }

    out
}
