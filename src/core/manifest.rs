//! Manifest data model.
//!
//! A manifest is an immutable JSON contract describing, for one target source
//! file, the public artifacts the file must define and the tests that must
//! exercise them. The current state of a file is the merge, in chronological
//! order, of all non-superseded manifests that reference it.
//!
//! Wire format notes:
//! - Field names are camelCase on disk (`taskType`, `creatableFiles`, ...).
//! - `validationCommand` accepts either an argument vector or a single shell
//!   line; both normalise to a token vector.
//! - Method parameters are accepted either as bare strings or as
//!   `{name, type}` objects and normalise to [`ArgSpec`].
//! - Unknown top-level keys are preserved but ignored.

use crate::core::error::MaidError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Filename suffix every manifest must carry.
pub const MANIFEST_SUFFIX: &str = ".manifest.json";

static MANIFEST_NAME_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^task-(\d+)(?:-[A-Za-z0-9._-]+)?\.manifest\.json$").unwrap()
});

/// Extract the numeric task index from a manifest filename.
///
/// Filenames must match `task-<digits>(-<slug>)?.manifest.json`; anything else
/// returns `None` and is rejected at store load.
pub fn parse_task_index(file_name: &str) -> Option<u64> {
    MANIFEST_NAME_RE
        .captures(file_name)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
}

/// Normalise a manifest-relative path to canonical form: forward slashes, no
/// leading `./`, no redundant `.`/`..` segments.
pub fn normalize_rel_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let mut stack: Vec<&str> = Vec::new();
    for seg in unified.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                if stack.pop().is_none() {
                    // Escapes the project root; keep the segment so the
                    // offending path stays visible in diagnostics.
                    stack.push("..");
                }
            }
            other => stack.push(other),
        }
    }
    stack.join("/")
}

/// Task type discriminator. Absence on the wire means legacy snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Create,
    Edit,
    Refactor,
    Snapshot,
}

/// Validation regime for a target file, derived from which list names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    /// File is in `creatableFiles`: defined artifacts must equal the expected set.
    Strict,
    /// File is in `editableFiles`: extra public definitions are allowed.
    Permissive,
}

/// Artifact kind tags. The admissible set varies per language adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactKind {
    Function,
    Class,
    Method,
    Attribute,
    Interface,
    TypeAlias,
    Enum,
    Namespace,
}

impl ArtifactKind {
    /// Pure type declarations have no runtime presence and are exempt from
    /// behavioural coverage.
    pub fn is_type_only(&self) -> bool {
        matches!(self, Self::Interface | Self::TypeAlias | Self::Enum)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Method => "method",
            Self::Attribute => "attribute",
            Self::Interface => "interface",
            Self::TypeAlias => "type-alias",
            Self::Enum => "enum",
            Self::Namespace => "namespace",
        }
    }
}

/// Wire form for a single parameter: bare string or `{name, type}` object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ArgForm {
    Name(String),
    Typed {
        name: String,
        #[serde(default, rename = "type")]
        type_: Option<String>,
    },
}

/// A normalised parameter declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ArgForm")]
pub struct ArgSpec {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
}

impl From<ArgForm> for ArgSpec {
    fn from(form: ArgForm) -> Self {
        match form {
            ArgForm::Name(name) => ArgSpec { name, type_: None },
            ArgForm::Typed { name, type_ } => ArgSpec { name, type_ },
        }
    }
}

impl ArgSpec {
    pub fn named(name: &str) -> Self {
        ArgSpec {
            name: name.to_string(),
            type_: None,
        }
    }

    pub fn typed(name: &str, type_: &str) -> Self {
        ArgSpec {
            name: name.to_string(),
            type_: Some(type_.to_string()),
        }
    }
}

/// Identity key for artifact merging and lookup: `(kind, class, name, returns)`.
///
/// Because `returns` participates, overloads distinguished by return type do
/// not collide.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MergeKey {
    pub kind: ArtifactKind,
    pub class: Option<String>,
    pub name: String,
    pub returns: Option<String>,
}

/// Polymorphic artifact descriptor shared by manifests and source parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    pub name: String,
    /// Owning class for methods and class attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    /// Parent identifiers for classes (normalised to base identifiers).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bases: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<ArgSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raises: Vec<String>,
    /// Visibility observed by a language adapter where the convention is not
    /// underscore-based (TypeScript export / `private`). `None` on manifest
    /// declarations, which are public by construction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported: Option<bool>,
}

impl Artifact {
    pub fn new(kind: ArtifactKind, name: &str) -> Self {
        Artifact {
            kind,
            name: name.to_string(),
            class: None,
            bases: Vec::new(),
            args: Vec::new(),
            returns: None,
            raises: Vec::new(),
            exported: None,
        }
    }

    pub fn merge_key(&self) -> MergeKey {
        MergeKey {
            kind: self.kind,
            class: self.class.clone(),
            name: self.name.clone(),
            returns: self.returns.clone(),
        }
    }

    /// Public/private split: leading underscore marks a private identifier;
    /// adapters for export-based languages additionally set `exported`.
    pub fn is_public(&self) -> bool {
        !self.name.starts_with('_') && !self.name.starts_with('#') && self.exported.unwrap_or(true)
    }

    /// Human label, e.g. `method AuthService.login`.
    pub fn label(&self) -> String {
        match &self.class {
            Some(class) => format!("{} {}.{}", self.kind.as_str(), class, self.name),
            None => format!("{} {}", self.kind.as_str(), self.name),
        }
    }
}

/// Presence marker for an expected-artifact declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactStatus {
    #[default]
    Present,
    Absent,
}

/// The `expectedArtifacts` block of a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedArtifacts {
    pub file: String,
    #[serde(default)]
    pub contains: Vec<Artifact>,
    #[serde(default)]
    pub status: ArtifactStatus,
}

/// A validation command: argument vector or single shell line on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValidationCommand {
    Argv(Vec<String>),
    Shell(String),
}

impl ValidationCommand {
    /// Tokenise into an argument vector. Shell lines are split with
    /// shell-words so quoted paths survive intact.
    pub fn tokens(&self) -> Result<Vec<String>, MaidError> {
        match self {
            ValidationCommand::Argv(argv) => Ok(argv.clone()),
            ValidationCommand::Shell(line) => shell_words::split(line)
                .map_err(|e| MaidError::Manifest(format!("unparsable validation command: {}", e))),
        }
    }
}

/// Immutable manifest record.
///
/// `name` and `task_index` are not part of the wire format; the store fills
/// them from the filename at load time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub goal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<TaskType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub creatable_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub editable_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub readonly_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_artifacts: Option<ExpectedArtifacts>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supersedes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_command: Option<ValidationCommand>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_commands: Vec<ValidationCommand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
    /// Unknown top-level keys: preserved, never interpreted.
    #[serde(flatten)]
    pub extra: BTreeMap<String, JsonValue>,

    #[serde(skip)]
    pub name: String,
    #[serde(skip)]
    pub task_index: u64,
}

impl Manifest {
    /// Task type with legacy fallback: an unlabelled manifest is a snapshot.
    pub fn effective_task_type(&self) -> TaskType {
        self.task_type.unwrap_or(TaskType::Snapshot)
    }

    /// Snapshot manifests (labelled or legacy) are the only legal
    /// supersession targets.
    pub fn is_snapshot(&self) -> bool {
        self.effective_task_type() == TaskType::Snapshot
    }

    /// Target file of the expected-artifacts block, normalised.
    pub fn expected_file(&self) -> Option<String> {
        self.expected_artifacts
            .as_ref()
            .map(|e| normalize_rel_path(&e.file))
    }

    /// True when this manifest references `file` (already normalised) via any
    /// of its file lists or its expected-artifacts block.
    pub fn references_file(&self, file: &str) -> bool {
        let listed = |paths: &[String]| paths.iter().any(|p| normalize_rel_path(p) == file);
        listed(&self.creatable_files)
            || listed(&self.editable_files)
            || listed(&self.readonly_files)
            || self.expected_file().as_deref() == Some(file)
    }

    /// All files this manifest touches, normalised and deduplicated.
    pub fn affected_files(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let mut push = |p: String| {
            if !p.is_empty() && !out.contains(&p) {
                out.push(p);
            }
        };
        for p in self
            .creatable_files
            .iter()
            .chain(self.editable_files.iter())
            .chain(self.readonly_files.iter())
        {
            push(normalize_rel_path(p));
        }
        if let Some(f) = self.expected_file() {
            push(f);
        }
        out
    }

    /// Every validation command declared on this manifest.
    pub fn commands(&self) -> Vec<&ValidationCommand> {
        let mut out: Vec<&ValidationCommand> = Vec::new();
        if let Some(cmd) = &self.validation_command {
            out.push(cmd);
        }
        out.extend(self.validation_commands.iter());
        out
    }

    /// Strict when the file is creatable, permissive when editable. The later
    /// list wins when both name the file (which is itself a schema violation).
    pub fn mode_for(&self, file: &str) -> Option<ValidationMode> {
        let in_list = |paths: &[String]| paths.iter().any(|p| normalize_rel_path(p) == file);
        if in_list(&self.creatable_files) {
            Some(ValidationMode::Strict)
        } else if in_list(&self.editable_files) {
            Some(ValidationMode::Permissive)
        } else {
            None
        }
    }
}
