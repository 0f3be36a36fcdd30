//! TypeScript/JavaScript language adapter.
//!
//! Brace-depth scanner over comment-stripped, string-blanked lines. The
//! public/private split follows the language convention: non-exported
//! module-level declarations and `private`/`#`-prefixed members are private.
//! Handles function/class/interface/type-alias/enum/namespace declarations,
//! class members (including arrow functions assigned to properties), ES
//! imports, `require`, and `throw new` attribution.

use crate::adapters::{
    ImportRef, Language, LanguageAdapter, ParseOutcome, SourceDescriptor, UsageKind, UsageRef,
    blank_strings, normalize_base,
};
use crate::core::manifest::{ArgSpec, Artifact, ArtifactKind};
use regex::Regex;
use std::sync::LazyLock;

static FUNCTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)\s*\(",
    )
    .unwrap()
});
static CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)(?:\s+extends\s+([\w.$<>\[\], ]+?))?(?:\s+implements\s+([^{]+))?\s*\{",
    )
    .unwrap()
});
static INTERFACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(export\s+)?interface\s+([A-Za-z_$][\w$]*)(?:\s+extends\s+([^{]+))?").unwrap()
});
static TYPE_ALIAS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(export\s+)?type\s+([A-Za-z_$][\w$]*)").unwrap());
static ENUM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(export\s+)?(?:declare\s+)?(?:const\s+)?enum\s+([A-Za-z_$][\w$]*)").unwrap()
});
static NAMESPACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(export\s+)?(?:declare\s+)?namespace\s+([A-Za-z_$.][\w$.]*)").unwrap()
});
static CONST_ARROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::\s*[^=]+?)?\s*=\s*(?:async\s+)?\(([^)]*)\)\s*(?::\s*([^={]+?))?\s*=>",
    )
    .unwrap()
});
static CONST_ARROW_BARE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?([A-Za-z_$][\w$]*)\s*=>",
    )
    .unwrap()
});
static CONST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::\s*([^=]+?))?\s*=[^=>]")
        .unwrap()
});
static METHOD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^((?:public\s+|private\s+|protected\s+|static\s+|readonly\s+|async\s+|get\s+|set\s+|override\s+|abstract\s+)*)([A-Za-z_$#][\w$]*)\s*\(",
    )
    .unwrap()
});
static PROP_ARROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^((?:public\s+|private\s+|protected\s+|static\s+|readonly\s+)*)([A-Za-z_$#][\w$]*)\s*(?::\s*[^=]+?)?\s*=\s*(?:async\s+)?\(([^)]*)\)\s*(?::\s*([^={]+?))?\s*=>",
    )
    .unwrap()
});
static PROP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^((?:public\s+|private\s+|protected\s+|static\s+|readonly\s+|declare\s+)*)([A-Za-z_$#][\w$]*)\s*\??\s*(?::\s*([^=;]+?))?\s*[=;]",
    )
    .unwrap()
});
static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?:import|export)\s+(?:type\s+)?(.+?)\s+from\s+['"]([^'"]+)['"]"#).unwrap()
});
static BARE_IMPORT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^import\s+['"]([^'"]+)['"]"#).unwrap());
static REQUIRE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:const|let|var)\s+(\{[^}]*\}|[A-Za-z_$][\w$]*)\s*=\s*require\(\s*['"]([^'"]+)['"]"#)
        .unwrap()
});
static THROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bthrow\s+new\s+([A-Za-z_$][\w$]*)").unwrap());
static NEW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bnew\s+([A-Za-z_$][\w$]*)").unwrap());
static NEW_BIND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:await\s+)?new\s+([A-Za-z_$][\w$]*)")
        .unwrap()
});
static NAME_CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z_$][\w$]*)\s*\(").unwrap());
static DOTTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Za-z_$][\w$]*)\.([A-Za-z_$][\w$]*)").unwrap());
static TO_THROW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.toThrow(?:Error)?\s*\(\s*([A-Za-z_$][\w$]*)").unwrap()
});

const KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "switch", "catch", "return", "new", "typeof", "await",
    "function", "constructor", "super", "do", "case", "in", "of", "delete", "void", "yield",
    "describe", "it", "test", "beforeEach", "afterEach", "beforeAll", "afterAll",
];

const MEMBER_KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "switch", "catch", "return", "constructor", "super", "new",
];

pub struct TypeScriptAdapter;

struct ClassCtx {
    entry_depth: i32,
    name: String,
}

struct Parser {
    collect_usages: bool,
    descriptor: SourceDescriptor,
    class_stack: Vec<ClassCtx>,
    /// Innermost callable: (declaration depth, index into `defined`).
    func_stack: Vec<(i32, usize)>,
}

fn parse_params(raw: &str) -> Vec<ArgSpec> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    let mut pieces = Vec::new();
    for ch in raw.chars() {
        match ch {
            '(' | '[' | '{' | '<' => {
                depth += 1;
                current.push(ch);
            }
            ')' | ']' | '}' | '>' => {
                depth -= 1;
                current.push(ch);
            }
            ',' if depth == 0 => {
                pieces.push(current.clone());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        pieces.push(current);
    }
    for piece in pieces {
        let piece = piece.trim();
        if piece.is_empty() || piece.starts_with("...") {
            continue;
        }
        let no_default = piece.split('=').next().unwrap_or(piece);
        let (name, type_) = match no_default.split_once(':') {
            Some((n, t)) => (
                n.trim().trim_end_matches('?').to_string(),
                Some(t.trim().to_string()),
            ),
            None => (no_default.trim().trim_end_matches('?').to_string(), None),
        };
        // Destructuring patterns carry no single declared name.
        if name.is_empty() || name.starts_with('{') || name.starts_with('[') {
            continue;
        }
        out.push(ArgSpec { name, type_ });
    }
    out
}

fn depth_delta(blanked: &str) -> i32 {
    blanked.chars().fold(0, |acc, c| match c {
        '{' => acc + 1,
        '}' => acc - 1,
        _ => acc,
    })
}

/// Strip `//` comments and `/* */` bodies. `in_block` carries state across
/// lines.
fn strip_comments(line: &str, in_block: &mut bool) -> String {
    let mut out = String::with_capacity(line.len());
    let bytes: Vec<char> = line.chars().collect();
    let mut i = 0;
    while i < bytes.len() {
        if *in_block {
            if bytes[i] == '*' && bytes.get(i + 1) == Some(&'/') {
                *in_block = false;
                i += 2;
            } else {
                i += 1;
            }
            continue;
        }
        if bytes[i] == '/' && bytes.get(i + 1) == Some(&'/') {
            break;
        }
        if bytes[i] == '/' && bytes.get(i + 1) == Some(&'*') {
            *in_block = true;
            i += 2;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

impl Parser {
    fn new(collect_usages: bool) -> Self {
        Parser {
            collect_usages,
            descriptor: SourceDescriptor::default(),
            class_stack: Vec::new(),
            func_stack: Vec::new(),
        }
    }

    fn push_defined(&mut self, artifact: Artifact) -> usize {
        self.descriptor.defined.push(artifact);
        self.descriptor.defined.len() - 1
    }

    fn record_import(&mut self, clause: &str, module: &str, line: u32) {
        let clause = clause.trim();
        let mut symbols = Vec::new();
        if clause.starts_with('{') {
            for part in clause.trim_matches(['{', '}']).split(',') {
                let symbol = part.split_whitespace().next().unwrap_or("");
                if !symbol.is_empty() {
                    symbols.push(symbol.to_string());
                }
            }
        } else if let Some(ns) = clause.strip_prefix("* as ") {
            symbols.push(ns.trim().to_string());
        } else if !clause.is_empty() {
            // Default import, possibly `Default, { a, b }`.
            for part in clause.split(',') {
                let part = part.trim();
                if part.starts_with('{') {
                    for inner in part.trim_matches(['{', '}']).split(',') {
                        let symbol = inner.split_whitespace().next().unwrap_or("");
                        if !symbol.is_empty() {
                            symbols.push(symbol.to_string());
                        }
                    }
                } else if !part.is_empty() {
                    symbols.push(part.split_whitespace().next().unwrap_or("").to_string());
                }
            }
        }
        self.descriptor.imports.push(ImportRef {
            module: module.to_string(),
            symbols,
            line,
        });
    }

    fn member_visibility(modifiers: &str, name: &str) -> bool {
        !modifiers.contains("private")
            && !modifiers.contains("protected")
            && !name.starts_with('#')
            && !name.starts_with('_')
    }

    fn run(mut self, text: &str) -> ParseOutcome {
        let mut depth = 0i32;
        let mut in_block_comment = false;

        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = (idx + 1) as u32;
            let uncommented = strip_comments(raw_line, &mut in_block_comment);
            let blanked = blank_strings(uncommented.trim());
            if blanked.is_empty() {
                continue;
            }

            let line_depth = depth;
            depth += depth_delta(&blanked);
            self.class_stack.retain(|c| depth > c.entry_depth);
            self.func_stack.retain(|(d, _)| depth > *d);

            let in_class_body = self
                .class_stack
                .last()
                .is_some_and(|c| line_depth == c.entry_depth + 1);

            self.scan_imports(&blanked, line_no);

            if let Some(caps) = CLASS_RE.captures(&blanked) {
                let exported = caps.get(1).is_some();
                let name = caps[2].to_string();
                let mut artifact = Artifact::new(ArtifactKind::Class, &name);
                artifact.exported = Some(exported);
                for group in [caps.get(3), caps.get(4)] {
                    if let Some(bases) = group {
                        for base in bases.as_str().split(',') {
                            if let Some(normalised) = normalize_base(base) {
                                if self.collect_usages {
                                    self.descriptor.usages.push(UsageRef::new(
                                        UsageKind::SubclassBase,
                                        &normalised,
                                        line_no,
                                    ));
                                }
                                artifact.bases.push(normalised);
                            }
                        }
                    }
                }
                self.push_defined(artifact);
                self.class_stack.push(ClassCtx {
                    entry_depth: line_depth,
                    name,
                });
                continue;
            }

            if let Some(caps) = INTERFACE_RE.captures(&blanked) {
                let mut artifact = Artifact::new(ArtifactKind::Interface, &caps[2]);
                artifact.exported = Some(caps.get(1).is_some());
                if let Some(bases) = caps.get(3) {
                    artifact.bases = bases
                        .as_str()
                        .split(',')
                        .filter_map(normalize_base)
                        .collect();
                }
                self.push_defined(artifact);
                continue;
            }

            if let Some(caps) = TYPE_ALIAS_RE.captures(&blanked) {
                let mut artifact = Artifact::new(ArtifactKind::TypeAlias, &caps[2]);
                artifact.exported = Some(caps.get(1).is_some());
                self.push_defined(artifact);
                continue;
            }

            if let Some(caps) = ENUM_RE.captures(&blanked) {
                let mut artifact = Artifact::new(ArtifactKind::Enum, &caps[2]);
                artifact.exported = Some(caps.get(1).is_some());
                self.push_defined(artifact);
                continue;
            }

            if let Some(caps) = NAMESPACE_RE.captures(&blanked) {
                let mut artifact = Artifact::new(ArtifactKind::Namespace, &caps[2]);
                artifact.exported = Some(caps.get(1).is_some());
                self.push_defined(artifact);
                continue;
            }

            if let Some(caps) = FUNCTION_RE.captures(&blanked) {
                let exported = caps.get(1).is_some();
                let name = caps[2].to_string();
                let open = blanked.find('(').unwrap_or(0);
                let (params_raw, tail) = split_signature(&blanked[open..]);
                let mut artifact = Artifact::new(ArtifactKind::Function, &name);
                artifact.exported = Some(exported);
                artifact.args = parse_params(&params_raw);
                artifact.returns = return_annotation(&tail);
                let id = self.push_defined(artifact);
                self.func_stack.push((line_depth, id));
                continue;
            }

            if line_depth == 0 {
                if let Some(caps) = CONST_ARROW_RE.captures(&blanked) {
                    let mut artifact = Artifact::new(ArtifactKind::Function, &caps[2]);
                    artifact.exported = Some(caps.get(1).is_some());
                    artifact.args = parse_params(&caps[3]);
                    artifact.returns = caps.get(4).map(|r| r.as_str().trim().to_string());
                    let id = self.push_defined(artifact);
                    self.func_stack.push((line_depth, id));
                    continue;
                }
                if let Some(caps) = CONST_ARROW_BARE_RE.captures(&blanked) {
                    let mut artifact = Artifact::new(ArtifactKind::Function, &caps[2]);
                    artifact.exported = Some(caps.get(1).is_some());
                    artifact.args = vec![ArgSpec::named(&caps[3])];
                    let id = self.push_defined(artifact);
                    self.func_stack.push((line_depth, id));
                    continue;
                }
                if let Some(caps) = CONST_RE.captures(&blanked) {
                    // Module-level constants are attributes with no owning class.
                    let mut artifact = Artifact::new(ArtifactKind::Attribute, &caps[2]);
                    artifact.exported = Some(caps.get(1).is_some());
                    artifact.returns = caps.get(3).map(|t| t.as_str().trim().to_string());
                    self.push_defined(artifact);
                    if self.collect_usages {
                        self.collect_line_usages(&blanked, line_no);
                    }
                    continue;
                }
            }

            if in_class_body {
                let class = self.class_stack.last().unwrap().name.clone();
                if let Some(caps) = PROP_ARROW_RE.captures(&blanked) {
                    let name = caps[2].to_string();
                    let mut artifact = Artifact::new(ArtifactKind::Method, &name);
                    artifact.class = Some(class);
                    artifact.exported = Some(Self::member_visibility(&caps[1], &name));
                    artifact.args = parse_params(&caps[3]);
                    artifact.returns = caps.get(4).map(|r| r.as_str().trim().to_string());
                    let id = self.push_defined(artifact);
                    self.func_stack.push((line_depth, id));
                    continue;
                }
                if let Some(caps) = METHOD_RE.captures(&blanked) {
                    let name = caps[2].to_string();
                    if !MEMBER_KEYWORDS.contains(&name.as_str()) {
                        let open = blanked.find('(').unwrap_or(0);
                        let (params_raw, tail) = split_signature(&blanked[open..]);
                        let mut artifact = Artifact::new(ArtifactKind::Method, &name);
                        artifact.class = Some(class);
                        artifact.exported = Some(Self::member_visibility(&caps[1], &name));
                        artifact.args = parse_params(&params_raw);
                        artifact.returns = return_annotation(&tail);
                        let id = self.push_defined(artifact);
                        self.func_stack.push((line_depth, id));
                        continue;
                    }
                }
                if let Some(caps) = PROP_RE.captures(&blanked) {
                    let name = caps[2].to_string();
                    if !MEMBER_KEYWORDS.contains(&name.as_str()) {
                        let mut artifact = Artifact::new(ArtifactKind::Attribute, &name);
                        artifact.class = Some(class);
                        artifact.exported = Some(Self::member_visibility(&caps[1], &name));
                        artifact.returns = caps.get(3).map(|t| t.as_str().trim().to_string());
                        self.push_defined(artifact);
                        continue;
                    }
                }
            }

            if let Some(caps) = THROW_RE.captures(&blanked) {
                let exception = caps[1].to_string();
                if let Some((_, id)) = self.func_stack.last()
                    && !self.descriptor.defined[*id].raises.contains(&exception)
                {
                    self.descriptor.defined[*id].raises.push(exception);
                }
            }

            if self.collect_usages {
                self.collect_line_usages(&blanked, line_no);
            }
        }

        ParseOutcome {
            descriptor: self.descriptor,
            diagnostics: Vec::new(),
        }
    }

    fn scan_imports(&mut self, blanked: &str, line_no: u32) {
        if let Some(caps) = IMPORT_RE.captures(blanked) {
            let clause = caps[1].to_string();
            let module = caps[2].to_string();
            self.record_import(&clause, &module, line_no);
        } else if let Some(caps) = BARE_IMPORT_RE.captures(blanked) {
            self.descriptor.imports.push(ImportRef {
                module: caps[1].to_string(),
                symbols: Vec::new(),
                line: line_no,
            });
        }
        let captured: Vec<(String, String)> = REQUIRE_RE
            .captures_iter(blanked)
            .map(|caps| (caps[1].to_string(), caps[2].to_string()))
            .collect();
        for (clause, module) in captured {
            self.record_import(&clause, &module, line_no);
        }
    }

    fn collect_line_usages(&mut self, blanked: &str, line_no: u32) {
        if let Some(caps) = NEW_BIND_RE.captures(blanked) {
            let mut usage = UsageRef::new(UsageKind::Instantiation, &caps[2], line_no);
            usage.binding = Some(caps[1].to_string());
            self.descriptor.usages.push(usage);
        }
        for caps in NEW_RE.captures_iter(blanked) {
            self.descriptor
                .usages
                .push(UsageRef::new(UsageKind::Instantiation, &caps[1], line_no));
        }
        for caps in TO_THROW_RE.captures_iter(blanked) {
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
                let receiver: String = blanked[..whole.start() - 1]
                    .chars()
                    .rev()
                    .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
                    .collect::<String>()
                    .chars()
                    .rev()
                    .collect();
                let mut usage = UsageRef::new(UsageKind::Call, name.as_str(), line_no);
                usage.receiver = (!receiver.is_empty()).then_some(receiver);
                self.descriptor.usages.push(usage);
            } else {
                self.descriptor
                    .usages
                    .push(UsageRef::new(UsageKind::Call, name.as_str(), line_no));
            }
        }
        for caps in DOTTED_RE.captures_iter(blanked) {
            let whole = caps.get(0).unwrap();
            let after = blanked[whole.end()..].trim_start().chars().next();
            if after != Some('(') {
                let mut usage = UsageRef::new(UsageKind::AttributeAccess, &caps[2], line_no);
                usage.receiver = Some(caps[1].to_string());
                self.descriptor.usages.push(usage);
            }
        }
    }
}

/// Split a `(...)` signature prefix into the parameter text and the tail
/// after the closing paren.
fn split_signature(from_paren: &str) -> (String, String) {
    let mut depth = 0i32;
    for (idx, ch) in from_paren.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return (
                        from_paren[1..idx].to_string(),
                        from_paren[idx + 1..].to_string(),
                    );
                }
            }
            _ => {}
        }
    }
    (from_paren.trim_start_matches('(').to_string(), String::new())
}

/// Return annotation from a signature tail (`: RetType {` / `: RetType;`).
fn return_annotation(tail: &str) -> Option<String> {
    let trimmed = tail.trim();
    let rest = trimmed.strip_prefix(':')?;
    let end = rest.find(['{', ';']).unwrap_or(rest.len());
    let annotation = rest[..end].trim();
    (!annotation.is_empty()).then(|| annotation.to_string())
}

impl LanguageAdapter for TypeScriptAdapter {
    fn language(&self) -> Language {
        Language::TypeScript
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["ts", "tsx", "js", "jsx"]
    }

    fn parse_source(&self, _path: &str, text: &str) -> ParseOutcome {
        Parser::new(false).run(text)
    }

    fn parse_tests(&self, _path: &str, text: &str) -> ParseOutcome {
        Parser::new(true).run(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> SourceDescriptor {
        TypeScriptAdapter
            .parse_source("src/auth.ts", text)
            .descriptor
    }

    fn find<'a>(d: &'a SourceDescriptor, name: &str) -> &'a Artifact {
        d.defined
            .iter()
            .find(|a| a.name == name)
            .unwrap_or_else(|| panic!("artifact {} not found in {:?}", name, d.defined))
    }

    #[test]
    fn test_exported_function() {
        let d = parse("export function authenticate(username: string, password: string): boolean {\n  return true;\n}\n");
        let f = find(&d, "authenticate");
        assert_eq!(f.kind, ArtifactKind::Function);
        assert!(f.is_public());
        assert_eq!(f.args.len(), 2);
        assert_eq!(f.args[0], ArgSpec::typed("username", "string"));
        assert_eq!(f.returns.as_deref(), Some("boolean"));
    }

    #[test]
    fn test_non_exported_function_is_private() {
        let d = parse("function helper(): void {}\n");
        assert!(!find(&d, "helper").is_public());
    }

    #[test]
    fn test_arrow_function_const() {
        let d = parse("export const sum = (a: number, b: number): number => a + b;\n");
        let f = find(&d, "sum");
        assert_eq!(f.kind, ArtifactKind::Function);
        assert_eq!(f.returns.as_deref(), Some("number"));
        assert!(f.is_public());
    }

    #[test]
    fn test_class_members() {
        let d = parse(
            "export class AuthService extends BaseService implements Service {\n  retries: number = 3;\n  private secret: string;\n  login(username: string): boolean {\n    throw new AuthError();\n  }\n  #hash(value: string): string {\n    return value;\n  }\n}\n",
        );
        let class = find(&d, "AuthService");
        assert_eq!(class.bases, vec!["BaseService", "Service"]);

        let login = find(&d, "login");
        assert_eq!(login.kind, ArtifactKind::Method);
        assert_eq!(login.class.as_deref(), Some("AuthService"));
        assert_eq!(login.raises, vec!["AuthError"]);
        assert!(login.is_public());

        assert!(!find(&d, "secret").is_public());
        assert!(!find(&d, "#hash").is_public());
        assert!(find(&d, "retries").is_public());
    }

    #[test]
    fn test_type_declarations() {
        let d = parse(
            "export interface User extends Entity {}\nexport type UserId = string;\nexport enum Role { Admin, Guest }\nexport namespace Auth {}\n",
        );
        assert_eq!(find(&d, "User").kind, ArtifactKind::Interface);
        assert_eq!(find(&d, "User").bases, vec!["Entity"]);
        assert_eq!(find(&d, "UserId").kind, ArtifactKind::TypeAlias);
        assert_eq!(find(&d, "Role").kind, ArtifactKind::Enum);
        assert_eq!(find(&d, "Auth").kind, ArtifactKind::Namespace);
    }

    #[test]
    fn test_module_constant() {
        let d = parse("export const MAX_RETRIES: number = 3;\nconst internal = 1;\n");
        let max = find(&d, "MAX_RETRIES");
        assert_eq!(max.kind, ArtifactKind::Attribute);
        assert_eq!(max.class, None);
        assert!(max.is_public());
        assert!(!find(&d, "internal").is_public());
    }

    #[test]
    fn test_imports() {
        let d = parse(
            "import { AuthService, login as doLogin } from './auth';\nimport * as helpers from './helpers';\nimport Config from './config';\nconst fs = require('fs');\n",
        );
        assert_eq!(d.imports.len(), 4);
        assert_eq!(d.imports[0].module, "./auth");
        assert_eq!(d.imports[0].symbols, vec!["AuthService", "login"]);
        assert_eq!(d.imports[1].symbols, vec!["helpers"]);
        assert_eq!(d.imports[2].symbols, vec!["Config"]);
        assert_eq!(d.imports[3].module, "fs");
    }

    #[test]
    fn test_usages_in_tests() {
        let d = TypeScriptAdapter
            .parse_tests(
                "src/auth.test.ts",
                "import { AuthService } from './auth';\n\ntest('login', () => {\n  const svc = new AuthService();\n  expect(svc.login('u')).toBe(true);\n  expect(() => svc.fail()).toThrow(AuthError);\n  expect(svc.retries).toBe(3);\n});\n",
            )
            .descriptor;
        let has = |kind: UsageKind, name: &str| {
            d.usages.iter().any(|u| u.kind == kind && u.name == name)
        };
        assert!(has(UsageKind::Instantiation, "AuthService"));
        assert!(has(UsageKind::Call, "login"));
        assert!(has(UsageKind::RaisesRef, "AuthError"));
        assert!(has(UsageKind::AttributeAccess, "retries"));
        let inst = d
            .usages
            .iter()
            .find(|u| u.kind == UsageKind::Instantiation && u.binding.is_some())
            .unwrap();
        assert_eq!(inst.binding.as_deref(), Some("svc"));
    }

    #[test]
    fn test_comments_ignored() {
        let d = parse(
            "// export function ghost() {}\n/*\nexport class Phantom {}\n*/\nexport function real(): void {}\n",
        );
        assert_eq!(d.defined.len(), 1);
        assert_eq!(d.defined[0].name, "real");
    }
}
