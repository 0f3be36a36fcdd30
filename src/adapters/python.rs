//! Python language adapter.
//!
//! A line-oriented scanner with indentation tracking. It understands the
//! subset of Python needed to describe public surface: `class` heads (with
//! base normalisation), `def`/`async def` signatures (possibly spanning
//! lines), module-level and class-level assignments, `self.attr` assignments,
//! lambdas bound to names, and `raise` statements. Anything beyond that is
//! flagged as `UnsupportedSyntax` and skipped rather than guessed at.

use crate::adapters::{
    ImportRef, Language, LanguageAdapter, ParseOutcome, SourceDescriptor, UsageKind, UsageRef,
    blank_strings, normalize_base,
};
use crate::core::diagnostics::{Diagnostic, DiagnosticKind, Location};
use crate::core::manifest::{ArgSpec, Artifact, ArtifactKind};
use regex::Regex;
use std::sync::LazyLock;

static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^class\s+([A-Za-z_]\w*)\s*(?:\(([^)]*)\))?\s*:").unwrap()
});
static DEF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\(").unwrap());
static ASSIGN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_]\w*)\s*(?::\s*([^=]+?))?\s*=[^=]").unwrap()
});
static ANNOTATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_]\w*)\s*:\s*([^=]+?)\s*$").unwrap());
static SELF_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bself\.([A-Za-z_]\w*)\s*(?::\s*[^=]+?)?\s*=[^=]").unwrap());
static RAISE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^raise\s+([A-Za-z_]\w*(?:\.[A-Za-z_]\w*)*)").unwrap()
});
static FROM_IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^from\s+([\w.]+)\s+import\s+(.+)$").unwrap());
static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^import\s+(.+)$").unwrap());
static BIND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z_]\w*)\s*=\s*([A-Za-z_]\w*)\s*\(").unwrap()
});
static NAME_CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z_]\w*)\s*\(").unwrap());
static DOTTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Za-z_]\w*)\.([A-Za-z_]\w*)").unwrap());
static RAISES_CTX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:raises|assertRaises)\s*\(\s*([A-Za-z_]\w*)").unwrap()
});
static KWARG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[(,]\s*([A-Za-z_]\w*)\s*=[^=]").unwrap());

const KEYWORDS: &[&str] = &[
    "if", "elif", "while", "for", "return", "yield", "assert", "with", "not", "and", "or",
    "lambda", "print", "super", "in", "is", "del", "match", "case", "except",
];

pub struct PythonAdapter;

struct Scope {
    indent: usize,
    name: String,
}

struct Parser<'a> {
    path: &'a str,
    collect_usages: bool,
    descriptor: SourceDescriptor,
    diagnostics: Vec<Diagnostic>,
    class_stack: Vec<Scope>,
    /// Innermost function scope, as (indent, index into `defined`).
    func_stack: Vec<(usize, usize)>,
}

fn indent_of(line: &str) -> usize {
    line.chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .map(|c| if c == '\t' { 4 } else { 1 })
        .sum()
}

fn paren_delta(blanked: &str) -> i32 {
    blanked.chars().fold(0, |acc, c| match c {
        '(' | '[' | '{' => acc + 1,
        ')' | ']' | '}' => acc - 1,
        _ => acc,
    })
}

/// Split at top-level commas, respecting nested brackets.
fn split_top_level(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for ch in text.chars() {
        match ch {
            '(' | '[' | '{' => {
                depth += 1;
                current.push(ch);
            }
            ')' | ']' | '}' => {
                depth -= 1;
                current.push(ch);
            }
            ',' if depth == 0 => {
                out.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        out.push(current.trim().to_string());
    }
    out
}

fn parse_params(raw: &str, skip_self: bool) -> Vec<ArgSpec> {
    let mut args = Vec::new();
    for (i, piece) in split_top_level(raw).into_iter().enumerate() {
        // Positional-only / keyword-only markers and starred params are not
        // part of the declared surface.
        if piece.is_empty() || piece == "*" || piece == "/" || piece.starts_with('*') {
            continue;
        }
        let without_default = split_on_top_level_eq(&piece);
        let (name, type_) = match without_default.split_once(':') {
            Some((n, t)) => (n.trim().to_string(), Some(t.trim().to_string())),
            None => (without_default.trim().to_string(), None),
        };
        if name.is_empty() {
            continue;
        }
        if skip_self && i == 0 && (name == "self" || name == "cls") {
            continue;
        }
        args.push(ArgSpec { name, type_ });
    }
    args
}

fn split_on_top_level_eq(piece: &str) -> String {
    let mut depth = 0i32;
    for (idx, ch) in piece.char_indices() {
        match ch {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            '=' if depth == 0 => return piece[..idx].to_string(),
            _ => {}
        }
    }
    piece.to_string()
}

impl<'a> Parser<'a> {
    fn new(path: &'a str, collect_usages: bool) -> Self {
        Parser {
            path,
            collect_usages,
            descriptor: SourceDescriptor::default(),
            diagnostics: Vec::new(),
            class_stack: Vec::new(),
            func_stack: Vec::new(),
        }
    }

    fn owner_class(&self, indent: usize) -> Option<&str> {
        self.class_stack
            .iter()
            .rev()
            .find(|c| c.indent < indent)
            .map(|c| c.name.as_str())
    }

    fn in_function_body(&self, indent: usize) -> bool {
        self.func_stack.last().is_some_and(|(fi, _)| indent > *fi)
    }

    fn push_attribute(&mut self, name: &str, class: Option<&str>, type_: Option<String>) {
        let exists = self.descriptor.defined.iter().any(|a| {
            a.kind == ArtifactKind::Attribute
                && a.name == name
                && a.class.as_deref() == class
        });
        if exists {
            return;
        }
        let mut artifact = Artifact::new(ArtifactKind::Attribute, name);
        artifact.class = class.map(str::to_string);
        artifact.returns = type_;
        self.descriptor.defined.push(artifact);
    }

    fn run(mut self, text: &str) -> ParseOutcome {
        let lines: Vec<&str> = text.lines().collect();
        let mut i = 0usize;
        let mut triple: Option<&'static str> = None;

        while i < lines.len() {
            let line = lines[i];
            let line_no = (i + 1) as u32;

            // Triple-quoted strings: skip bodies wholesale.
            if let Some(delim) = triple {
                if line.contains(delim) {
                    triple = None;
                }
                i += 1;
                continue;
            }
            for delim in ["\"\"\"", "'''"] {
                let count = line.matches(delim).count();
                if count % 2 == 1 {
                    triple = Some(if delim == "\"\"\"" { "\"\"\"" } else { "'''" });
                }
            }
            if triple.is_some() {
                // Opening line may still carry code before the docstring;
                // statements never do in practice, so skip it.
                i += 1;
                continue;
            }

            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('@') {
                i += 1;
                continue;
            }

            let indent = indent_of(line);
            self.class_stack.retain(|c| c.indent < indent);
            self.func_stack.retain(|(fi, _)| *fi < indent);

            let blanked = blank_strings(trimmed);

            if let Some(caps) = CLASS_RE.captures(&blanked) {
                let name = caps[1].to_string();
                let mut artifact = Artifact::new(ArtifactKind::Class, &name);
                if let Some(bases) = caps.get(2) {
                    artifact.bases = split_top_level(bases.as_str())
                        .iter()
                        .filter_map(|b| normalize_base(b))
                        .collect();
                    if self.collect_usages {
                        for base in &artifact.bases {
                            self.descriptor.usages.push(UsageRef::new(
                                UsageKind::SubclassBase,
                                base,
                                line_no,
                            ));
                        }
                    }
                }
                self.descriptor.defined.push(artifact);
                self.class_stack.push(Scope {
                    indent,
                    name,
                });
                i += 1;
                continue;
            }

            if let Some(caps) = DEF_RE.captures(&blanked) {
                let name = caps[1].to_string();
                let open = blanked.find('(').unwrap_or(0);
                let mut signature = blanked[open..].to_string();
                let mut depth = paren_delta(&signature);
                let start_line = i;
                while depth > 0 {
                    i += 1;
                    let Some(next) = lines.get(i) else {
                        self.diagnostics.push(Diagnostic::new(
                            DiagnosticKind::UnsupportedSyntax,
                            Location::at(self.path, start_line as u32 + 1),
                            format!("unterminated signature for def {}", name),
                        ));
                        return ParseOutcome {
                            descriptor: self.descriptor,
                            diagnostics: self.diagnostics,
                        };
                    };
                    let next_blanked = blank_strings(next.trim_end());
                    signature.push(' ');
                    signature.push_str(next_blanked.trim());
                    depth += paren_delta(&next_blanked);
                }

                let close = matching_paren(&signature);
                let params_raw = &signature[1..close];
                let tail = &signature[close + 1..];
                let returns = tail
                    .split_once("->")
                    .map(|(_, r)| r.trim().trim_end_matches(':').trim().to_string())
                    .filter(|r| !r.is_empty());

                let owner = self.owner_class(indent).map(str::to_string);
                let mut artifact = Artifact::new(
                    if owner.is_some() {
                        ArtifactKind::Method
                    } else {
                        ArtifactKind::Function
                    },
                    &name,
                );
                artifact.args = parse_params(params_raw, owner.is_some());
                artifact.returns = returns;
                artifact.class = owner;
                let idx = self.descriptor.defined.len();
                self.descriptor.defined.push(artifact);
                self.func_stack.push((indent, idx));
                i += 1;
                continue;
            }

            if let Some(caps) = FROM_IMPORT_RE.captures(&blanked) {
                let module = caps[1].to_string();
                let mut symbols_raw = caps[2].to_string();
                // Parenthesised import lists may span lines.
                while paren_delta(&symbols_raw) > 0 {
                    i += 1;
                    let Some(next) = lines.get(i) else { break };
                    symbols_raw.push(' ');
                    symbols_raw.push_str(blank_strings(next).trim());
                }
                let symbols = symbols_raw
                    .replace(['(', ')'], " ")
                    .split(',')
                    .map(|s| {
                        s.split_whitespace()
                            .next()
                            .unwrap_or("")
                            .to_string()
                    })
                    .filter(|s| !s.is_empty() && s != "*")
                    .collect();
                self.descriptor.imports.push(ImportRef {
                    module,
                    symbols,
                    line: line_no,
                });
                i += 1;
                continue;
            }

            if let Some(caps) = IMPORT_RE.captures(&blanked) {
                for piece in caps[1].split(',') {
                    let module = piece.split_whitespace().next().unwrap_or("").to_string();
                    if !module.is_empty() {
                        self.descriptor.imports.push(ImportRef {
                            module,
                            symbols: Vec::new(),
                            line: line_no,
                        });
                    }
                }
                i += 1;
                continue;
            }

            if let Some(caps) = RAISE_RE.captures(&blanked) {
                let exception = caps[1]
                    .rsplit('.')
                    .next()
                    .unwrap_or(&caps[1])
                    .to_string();
                if let Some((_, idx)) = self.func_stack.last()
                    && !self.descriptor.defined[*idx].raises.contains(&exception)
                {
                    self.descriptor.defined[*idx].raises.push(exception);
                }
            }

            if self.in_function_body(indent) {
                // Instance attributes surface from assignment inside methods.
                if let Some(class) = self.owner_class(indent).map(str::to_string) {
                    let blanked_owned = blanked.clone();
                    for caps in SELF_ATTR_RE.captures_iter(&blanked_owned) {
                        self.push_attribute(&caps[1], Some(&class), None);
                    }
                }
            } else if let Some(caps) = ASSIGN_RE.captures(&blanked) {
                let name = caps[1].to_string();
                let type_ = caps.get(2).map(|t| t.as_str().trim().to_string());
                let class = self.owner_class(indent).map(str::to_string);
                let rhs = blanked[caps.get(0).unwrap().end() - 1..].trim().to_string();
                if rhs.starts_with("lambda") {
                    // Lambda bound to a name is a callable definition.
                    let params = rhs
                        .trim_start_matches("lambda")
                        .split_once(':')
                        .map(|(p, _)| p.trim().to_string())
                        .unwrap_or_default();
                    let mut artifact = Artifact::new(
                        if class.is_some() {
                            ArtifactKind::Method
                        } else {
                            ArtifactKind::Function
                        },
                        &name,
                    );
                    artifact.args = parse_params(&params, false);
                    artifact.class = class;
                    self.descriptor.defined.push(artifact);
                } else if class.is_some() || indent == 0 {
                    self.push_attribute(&name, class.as_deref(), type_);
                }
            } else if let Some(caps) = ANNOTATION_RE.captures(&blanked) {
                let class = self.owner_class(indent).map(str::to_string);
                if class.is_some() || indent == 0 {
                    self.push_attribute(
                        &caps[1],
                        class.as_deref(),
                        Some(caps[2].trim().to_string()),
                    );
                }
            }

            if self.collect_usages {
                self.collect_line_usages(&blanked, line_no);
            }
            i += 1;
        }

        ParseOutcome {
            descriptor: self.descriptor,
            diagnostics: self.diagnostics,
        }
    }

    fn collect_line_usages(&mut self, blanked: &str, line_no: u32) {
        if let Some(caps) = BIND_RE.captures(blanked) {
            let callee = caps[2].to_string();
            if callee.chars().next().is_some_and(char::is_uppercase) {
                let mut usage = UsageRef::new(UsageKind::Instantiation, &callee, line_no);
                usage.binding = Some(caps[1].to_string());
                self.descriptor.usages.push(usage);
            }
        }

        for caps in RAISES_CTX_RE.captures_iter(blanked) {
            self.descriptor
                .usages
                .push(UsageRef::new(UsageKind::RaisesRef, &caps[1], line_no));
        }

        for caps in NAME_CALL_RE.captures_iter(blanked) {
            let whole = caps.get(0).unwrap();
            let name = caps.get(1).unwrap();
            if KEYWORDS.contains(&name.as_str()) {
                continue;
            }
            let preceding = blanked[..whole.start()].chars().next_back();
            if preceding == Some('.') {
                // Method or module-qualified call: recover the receiver.
                let receiver = blanked[..whole.start() - 1]
                    .chars()
                    .rev()
                    .take_while(|c| c.is_alphanumeric() || *c == '_')
                    .collect::<String>()
                    .chars()
                    .rev()
                    .collect::<String>();
                let mut usage = UsageRef::new(UsageKind::Call, name.as_str(), line_no);
                usage.receiver = (!receiver.is_empty()).then_some(receiver);
                self.descriptor.usages.push(usage);
            } else if name.as_str() != "def" {
                self.descriptor
                    .usages
                    .push(UsageRef::new(UsageKind::Call, name.as_str(), line_no));
                if name.as_str().chars().next().is_some_and(char::is_uppercase) {
                    self.descriptor.usages.push(UsageRef::new(
                        UsageKind::Instantiation,
                        name.as_str(),
                        line_no,
                    ));
                }
            }
        }

        for caps in DOTTED_RE.captures_iter(blanked) {
            let whole = caps.get(0).unwrap();
            let after = blanked[whole.end()..].trim_start().chars().next();
            if after != Some('(') {
                let mut usage =
                    UsageRef::new(UsageKind::AttributeAccess, &caps[2], line_no);
                usage.receiver = Some(caps[1].to_string());
                self.descriptor.usages.push(usage);
            }
        }

        for caps in KWARG_RE.captures_iter(blanked) {
            self.descriptor
                .usages
                .push(UsageRef::new(UsageKind::KeywordArg, &caps[1], line_no));
        }
    }
}

fn matching_paren(signature: &str) -> usize {
    let mut depth = 0i32;
    for (idx, ch) in signature.char_indices() {
        match ch {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth -= 1;
                if depth == 0 {
                    return idx;
                }
            }
            _ => {}
        }
    }
    signature.len().saturating_sub(1)
}

impl LanguageAdapter for PythonAdapter {
    fn language(&self) -> Language {
        Language::Python
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["py"]
    }

    fn parse_source(&self, path: &str, text: &str) -> ParseOutcome {
        Parser::new(path, false).run(text)
    }

    fn parse_tests(&self, path: &str, text: &str) -> ParseOutcome {
        Parser::new(path, true).run(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> SourceDescriptor {
        PythonAdapter.parse_source("src/auth.py", text).descriptor
    }

    fn parse_test_file(text: &str) -> SourceDescriptor {
        PythonAdapter
            .parse_tests("tests/test_auth.py", text)
            .descriptor
    }

    fn find<'a>(d: &'a SourceDescriptor, name: &str) -> &'a Artifact {
        d.defined
            .iter()
            .find(|a| a.name == name)
            .unwrap_or_else(|| panic!("artifact {} not found in {:?}", name, d.defined))
    }

    #[test]
    fn test_function_with_types_and_return() {
        let d = parse("def authenticate(username: str, password: str) -> bool:\n    return True\n");
        let f = find(&d, "authenticate");
        assert_eq!(f.kind, ArtifactKind::Function);
        assert_eq!(
            f.args,
            vec![ArgSpec::typed("username", "str"), ArgSpec::typed("password", "str")]
        );
        assert_eq!(f.returns.as_deref(), Some("bool"));
    }

    #[test]
    fn test_multiline_signature() {
        let d = parse(
            "def transfer(\n    source: Account,\n    target: Account,\n    amount: int = 0,\n) -> Receipt:\n    pass\n",
        );
        let f = find(&d, "transfer");
        assert_eq!(f.args.len(), 3);
        assert_eq!(f.args[2], ArgSpec::typed("amount", "int"));
        assert_eq!(f.returns.as_deref(), Some("Receipt"));
    }

    #[test]
    fn test_class_with_normalised_bases_and_methods() {
        let d = parse(
            "class AuthService(BaseService, Generic[T]):\n    def login(self, username: str) -> bool:\n        self.attempts = 0\n        return True\n\n    def _internal(self):\n        pass\n",
        );
        let class = find(&d, "AuthService");
        assert_eq!(class.kind, ArtifactKind::Class);
        assert_eq!(class.bases, vec!["BaseService", "Generic"]);

        let login = find(&d, "login");
        assert_eq!(login.kind, ArtifactKind::Method);
        assert_eq!(login.class.as_deref(), Some("AuthService"));
        // self is not part of the declared surface.
        assert_eq!(login.args, vec![ArgSpec::typed("username", "str")]);

        let attempts = find(&d, "attempts");
        assert_eq!(attempts.kind, ArtifactKind::Attribute);
        assert_eq!(attempts.class.as_deref(), Some("AuthService"));

        assert!(!find(&d, "_internal").is_public());
    }

    #[test]
    fn test_module_constant_is_attribute_without_class() {
        let d = parse("MAX_RETRIES = 3\nTIMEOUT: float = 1.5\n");
        let max = find(&d, "MAX_RETRIES");
        assert_eq!(max.kind, ArtifactKind::Attribute);
        assert_eq!(max.class, None);
        let timeout = find(&d, "TIMEOUT");
        assert_eq!(timeout.returns.as_deref(), Some("float"));
    }

    #[test]
    fn test_async_def_and_lambda() {
        let d = parse("async def fetch(url: str) -> bytes:\n    pass\n\nhandler = lambda event, ctx: None\n");
        assert_eq!(find(&d, "fetch").kind, ArtifactKind::Function);
        let handler = find(&d, "handler");
        assert_eq!(handler.kind, ArtifactKind::Function);
        assert_eq!(handler.args.len(), 2);
    }

    #[test]
    fn test_raises_collected_on_function() {
        let d = parse(
            "def guard(value):\n    if value < 0:\n        raise ValueError(\"negative\")\n    raise errors.AuthError()\n",
        );
        let f = find(&d, "guard");
        assert_eq!(f.raises, vec!["ValueError", "AuthError"]);
    }

    #[test]
    fn test_docstring_bodies_skipped() {
        let d = parse(
            "def f():\n    \"\"\"Docstring with def fake(): inside.\n    class NotReal:\n    \"\"\"\n    return 1\n",
        );
        assert_eq!(d.defined.len(), 1);
        assert_eq!(d.defined[0].name, "f");
    }

    #[test]
    fn test_imports_follow_through() {
        let d = parse(
            "import os\nimport helpers.crypto as crypto\nfrom app.auth import (\n    AuthService,\n    login,\n)\n",
        );
        assert_eq!(d.imports.len(), 3);
        assert_eq!(d.imports[2].module, "app.auth");
        assert_eq!(d.imports[2].symbols, vec!["AuthService", "login"]);
    }

    #[test]
    fn test_usage_collection_in_tests() {
        let d = parse_test_file(
            "from app.auth import AuthService, authenticate\n\ndef test_login():\n    svc = AuthService()\n    assert svc.login(username=\"u\")\n    assert authenticate(\"u\", \"p\")\n    with pytest.raises(AuthError):\n        svc.fail()\n    assert svc.attempts == 0\n",
        );
        let has = |kind: UsageKind, name: &str| {
            d.usages.iter().any(|u| u.kind == kind && u.name == name)
        };
        assert!(has(UsageKind::Instantiation, "AuthService"));
        assert!(has(UsageKind::Call, "login"));
        assert!(has(UsageKind::Call, "authenticate"));
        assert!(has(UsageKind::RaisesRef, "AuthError"));
        assert!(has(UsageKind::KeywordArg, "username"));
        assert!(has(UsageKind::AttributeAccess, "attempts"));
        let inst = d
            .usages
            .iter()
            .find(|u| u.kind == UsageKind::Instantiation)
            .unwrap();
        assert_eq!(inst.binding.as_deref(), Some("svc"));
    }

    #[test]
    fn test_unterminated_signature_flagged() {
        let outcome = PythonAdapter.parse_source("src/bad.py", "def broken(a,\n");
        assert!(
            outcome
                .diagnostics
                .iter()
                .any(|d| d.kind == DiagnosticKind::UnsupportedSyntax)
        );
    }

    #[test]
    fn test_starred_params_excluded() {
        let d = parse("def call(*args, **kwargs):\n    pass\n");
        assert!(find(&d, "call").args.is_empty());
    }
}
