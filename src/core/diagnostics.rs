//! Diagnostic engine: located, kinded reports with canonical ordering.
//!
//! Every validator in the kernel communicates findings as [`Diagnostic`]
//! records pushed into a [`DiagnosticSink`]. Order during collection is not
//! guaranteed (workers run in parallel); the sink imposes the final
//! deduplication and sort before emission, which is what makes two runs over
//! the same snapshot compare equal.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Mutex;

/// Diagnostic severity. `error` and `fatal` fail the run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    #[default]
    Warning,
    Error,
    Fatal,
}

/// Closed taxonomy of diagnostic kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    SchemaViolation,
    IllegalSupersession,
    SupersessionCycle,
    DuplicateManifest,
    ParseError,
    UnsupportedSyntax,
    MissingArtifact,
    UndeclaredArtifact,
    TypeMismatch,
    UnexpectedFilePresent,
    BehaviourMissing,
    DuplicateArtifact,
    NamingViolation,
    DependencyCycle,
    MissingDeclaration,
    ConstraintViolation,
    UntrackedFile,
    UntrackedTest,
    CacheCorrupted,
    Cancelled,
}

impl DiagnosticKind {
    /// The severity a kind carries unless a call site overrides it.
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::SupersessionCycle | Self::DuplicateManifest | Self::Cancelled => Severity::Fatal,
            Self::SchemaViolation
            | Self::IllegalSupersession
            | Self::ParseError
            | Self::MissingArtifact
            | Self::UndeclaredArtifact
            | Self::TypeMismatch
            | Self::UnexpectedFilePresent
            | Self::BehaviourMissing
            | Self::DuplicateArtifact
            | Self::DependencyCycle
            | Self::MissingDeclaration
            | Self::ConstraintViolation => Severity::Error,
            Self::UnsupportedSyntax | Self::UntrackedFile | Self::UntrackedTest => {
                Severity::Warning
            }
            Self::NamingViolation | Self::CacheCorrupted => Severity::Info,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Source location. `line`/`column` are 1-based when present.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Location {
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl Location {
    pub fn file(file: &str) -> Self {
        Location {
            file: file.to_string(),
            line: None,
            column: None,
        }
    }

    pub fn at(file: &str, line: u32) -> Self {
        Location {
            file: file.to_string(),
            line: Some(line),
            column: None,
        }
    }
}

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub location: Location,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

impl Diagnostic {
    /// New diagnostic with the kind's default severity.
    pub fn new(kind: DiagnosticKind, location: Location, message: impl Into<String>) -> Self {
        Diagnostic {
            kind,
            severity: kind.default_severity(),
            location,
            message: message.into(),
            hints: Vec::new(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    pub fn is_failure(&self) -> bool {
        self.severity >= Severity::Error
    }

    /// Dedup identity: `(kind, location, message)`.
    fn dedup_key(&self) -> (DiagnosticKind, &Location, &str) {
        (self.kind, &self.location, self.message.as_str())
    }

    /// Canonical ordering: severity descending, then location, then kind and
    /// message for total determinism.
    fn canonical_cmp(&self, other: &Self) -> Ordering {
        other
            .severity
            .cmp(&self.severity)
            .then_with(|| self.location.cmp(&other.location))
            .then_with(|| self.kind.cmp(&other.kind))
            .then_with(|| self.message.cmp(&other.message))
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.location.file)?;
        if let Some(line) = self.location.line {
            write!(f, ":{}", line)?;
            if let Some(col) = self.location.column {
                write!(f, ":{}", col)?;
            }
        }
        write!(f, ": {}", self.message)
    }
}

/// Deduplicate and canonically order a diagnostic list in place.
pub fn finalize(diagnostics: &mut Vec<Diagnostic>) {
    diagnostics.sort_by(|a, b| a.canonical_cmp(b));
    diagnostics.dedup_by(|a, b| a.dedup_key() == b.dedup_key());
}

/// True when any diagnostic fails the run (`error` or `fatal`).
pub fn has_failures(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_failure)
}

/// Append-only, multi-producer diagnostic sink shared across worker threads.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    inner: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, diagnostic: Diagnostic) {
        self.inner.lock().unwrap().push(diagnostic);
    }

    pub fn extend(&self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.inner.lock().unwrap().extend(diagnostics);
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    pub fn has_fatal(&self) -> bool {
        self.inner
            .lock()
            .unwrap()
            .iter()
            .any(|d| d.severity == Severity::Fatal)
    }

    /// Drain into the deduplicated, canonically ordered final list.
    pub fn into_finalized(self) -> Vec<Diagnostic> {
        let mut out = self.inner.into_inner().unwrap();
        finalize(&mut out);
        out
    }
}
