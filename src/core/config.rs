//! Project configuration loaded from `.maid.toml`.
//!
//! Every field has a default; a missing config file is not an error. The file
//! carries the tracker exclusion list, naming-convention patterns, constraint
//! rules, the behavioural import-follow depth, and directory overrides.

use crate::core::error::MaidError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const CONFIG_FILE: &str = ".maid.toml";

fn default_manifest_dir() -> String {
    "manifests".to_string()
}

fn default_cache_dir() -> String {
    ".maid-cache".to_string()
}

fn default_exclude() -> Vec<String> {
    [
        ".git",
        ".hg",
        "node_modules",
        "__pycache__",
        ".venv",
        "venv",
        "target",
        "dist",
        "build",
        ".maid-cache",
        ".pytest_cache",
        ".svelte-kit",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_import_depth() -> usize {
    crate::core::behaviour::DEFAULT_IMPORT_DEPTH
}

/// Naming-convention patterns, applied by the coherence validator. Each is an
/// anchored regex; `None` disables the check.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub function: Option<String>,
    pub class: Option<String>,
    pub method: Option<String>,
    pub attribute: Option<String>,
    /// Pattern for relative file paths.
    pub file: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BehaviourConfig {
    pub import_depth: usize,
}

impl Default for BehaviourConfig {
    fn default() -> Self {
        BehaviourConfig {
            import_depth: default_import_depth(),
        }
    }
}

/// A user-supplied constraint rule evaluated over the merged model.
#[derive(Debug, Clone, Deserialize)]
pub struct ConstraintRule {
    pub name: String,
    /// Regex over relative file paths selecting where the rule applies.
    pub applies_to: String,
    /// Regex over import module specifiers that must not appear.
    #[serde(default)]
    pub forbid_import: Option<String>,
    /// Required prefix on public artifact names in matching files.
    #[serde(default)]
    pub require_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MaidConfig {
    pub manifest_dir: String,
    pub cache_dir: String,
    /// Directory names excluded from source-tree walks.
    pub exclude: Vec<String>,
    pub naming: NamingConfig,
    pub behaviour: BehaviourConfig,
    #[serde(rename = "constraint")]
    pub constraints: Vec<ConstraintRule>,
}

impl Default for MaidConfig {
    fn default() -> Self {
        MaidConfig {
            manifest_dir: default_manifest_dir(),
            cache_dir: default_cache_dir(),
            exclude: default_exclude(),
            naming: NamingConfig::default(),
            behaviour: BehaviourConfig::default(),
            constraints: Vec::new(),
        }
    }
}

/// Load `.maid.toml` from the project root. Absent file yields defaults;
/// unparsable content is a configuration error.
pub fn load_config(project_root: &Path) -> Result<MaidConfig, MaidError> {
    let path = project_root.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(MaidConfig::default());
    }
    let raw = fs::read_to_string(&path)?;
    toml::from_str(&raw).map_err(|e| MaidError::Config(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MaidConfig::default();
        assert_eq!(config.manifest_dir, "manifests");
        assert_eq!(config.cache_dir, ".maid-cache");
        assert!(config.exclude.iter().any(|e| e == "node_modules"));
        assert_eq!(config.behaviour.import_depth, 3);
        assert!(config.constraints.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let raw = r#"
manifest_dir = "maid/manifests"
exclude = [".git", "vendor"]

[naming]
function = "^[a-z_][a-z0-9_]*$"
class = "^[A-Z][A-Za-z0-9]*$"

[behaviour]
import_depth = 5

[[constraint]]
name = "core-no-io"
applies_to = "^src/core/"
forbid_import = "^(fs|net|http)$"

[[constraint]]
name = "handlers-prefixed"
applies_to = "^src/handlers/"
require_prefix = "handle_"
"#;
        let config: MaidConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.manifest_dir, "maid/manifests");
        assert_eq!(config.exclude, vec![".git", "vendor"]);
        assert_eq!(config.behaviour.import_depth, 5);
        assert_eq!(config.constraints.len(), 2);
        assert_eq!(config.constraints[0].name, "core-no-io");
        assert!(config.naming.class.is_some());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let config = load_config(tmp.path()).expect("load");
        assert_eq!(config.manifest_dir, "manifests");
    }
}
