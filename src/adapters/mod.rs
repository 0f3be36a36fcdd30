//! Language adapters: the capability boundary between source bytes and the
//! kernel's language-agnostic descriptors.
//!
//! An adapter turns one source file into a [`SourceDescriptor`]: the artifacts
//! it defines, the usage references it makes, and the imports it declares.
//! Adapters never execute target code; everything is derived syntactically.
//! Selection is by file suffix, the interface is identical across variants,
//! and parsing failures degrade conservatively: the adapter keeps what it
//! understood and flags what it did not as `UnsupportedSyntax`.

pub mod python;
pub mod svelte;
pub mod typescript;

use crate::core::diagnostics::Diagnostic;
use crate::core::manifest::Artifact;
use serde::{Deserialize, Serialize};

/// Supported language families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    Python,
    TypeScript,
    Svelte,
}

/// How a test references an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UsageKind {
    Call,
    Instantiation,
    AttributeAccess,
    RaisesRef,
    KeywordArg,
    SubclassBase,
}

/// A syntactic occurrence of an artifact in test code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRef {
    pub kind: UsageKind,
    pub name: String,
    /// Receiver expression for attribute and method access (`svc` in
    /// `svc.login()`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    /// Variable an instantiation result is bound to (`svc` in
    /// `svc = AuthService()`), used to map receivers back to classes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<String>,
    pub line: u32,
}

impl UsageRef {
    pub fn new(kind: UsageKind, name: &str, line: u32) -> Self {
        UsageRef {
            kind,
            name: name.to_string(),
            receiver: None,
            binding: None,
            line,
        }
    }
}

/// An import statement, recorded for follow-through into helper modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRef {
    pub module: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub symbols: Vec<String>,
    pub line: u32,
}

/// Adapter output for one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub defined: Vec<Artifact>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub usages: Vec<UsageRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<ImportRef>,
}

/// Descriptor plus whatever the parse flagged along the way.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub descriptor: SourceDescriptor,
    pub diagnostics: Vec<Diagnostic>,
}

/// The adapter capability set: `parse_source` and `parse_tests`.
pub trait LanguageAdapter: Sync {
    fn language(&self) -> Language;

    /// Parse an implementation file into its defined artifacts.
    fn parse_source(&self, path: &str, text: &str) -> ParseOutcome;

    /// Parse a test file into usage references and imports.
    fn parse_tests(&self, path: &str, text: &str) -> ParseOutcome;

    /// Source extensions this adapter claims.
    fn extensions(&self) -> &'static [&'static str];
}

static PYTHON: python::PythonAdapter = python::PythonAdapter;
static TYPESCRIPT: typescript::TypeScriptAdapter = typescript::TypeScriptAdapter;
static SVELTE: svelte::SvelteAdapter = svelte::SvelteAdapter;

/// Select the adapter for a path by file suffix.
pub fn adapter_for_path(path: &str) -> Option<&'static dyn LanguageAdapter> {
    let ext = path.rsplit('.').next()?;
    match ext {
        "py" => Some(&PYTHON),
        "ts" | "tsx" | "js" | "jsx" => Some(&TYPESCRIPT),
        "svelte" => Some(&SVELTE),
        _ => None,
    }
}

/// All adapters, for enumeration (file tracking, extension checks).
pub fn all_adapters() -> [&'static dyn LanguageAdapter; 3] {
    [&PYTHON, &TYPESCRIPT, &SVELTE]
}

/// True when `path` has a suffix some adapter claims.
pub fn is_source_path(path: &str) -> bool {
    adapter_for_path(path).is_some()
}

/// Test-file recognition by naming convention: `test_*.py` / `*_test.py` for
/// Python, `*.test.*` / `*.spec.*` for the TypeScript family, or any source
/// file under a `tests`/`__tests__` directory.
pub fn is_test_path(path: &str) -> bool {
    if !is_source_path(path) {
        return false;
    }
    let file_name = path.rsplit('/').next().unwrap_or(path);
    if file_name.starts_with("test_")
        || file_name.ends_with("_test.py")
        || file_name.contains(".test.")
        || file_name.contains(".spec.")
    {
        return true;
    }
    path.split('/')
        .any(|seg| seg == "tests" || seg == "test" || seg == "__tests__")
}

/// Strip string literal bodies from a line so identifier scans do not match
/// inside quotes. Quote characters themselves are preserved.
pub(crate) fn blank_strings(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for ch in line.chars() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                    out.push(' ');
                } else if ch == '\\' {
                    escaped = true;
                    out.push(' ');
                } else if ch == q {
                    quote = None;
                    out.push(q);
                } else {
                    out.push(' ');
                }
            }
            None => {
                if ch == '"' || ch == '\'' || ch == '`' {
                    quote = Some(ch);
                }
                out.push(ch);
            }
        }
    }
    out
}

/// Normalise a base-class expression to its base identifier:
/// `Generic[T]` → `Generic`, `abc.ABC` → `ABC`, `Base<T>` → `Base`.
pub(crate) fn normalize_base(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.contains('=') {
        // Keyword arguments in a class head (metaclass=...) are not bases.
        return None;
    }
    let no_params = trimmed
        .split(['[', '<', '('])
        .next()
        .unwrap_or(trimmed)
        .trim();
    let last = no_params.rsplit('.').next().unwrap_or(no_params).trim();
    if last.is_empty() || !last.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_') {
        return None;
    }
    Some(last.to_string())
}
