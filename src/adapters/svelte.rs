//! Svelte language adapter.
//!
//! Svelte components carry their logic inside `<script>` blocks (plain JS or
//! `lang="ts"`). The adapter extracts those blocks, blanks everything else so
//! line numbers survive, and delegates to the TypeScript adapter. In a
//! `<script context="module">` block `export` has its usual module meaning;
//! in an instance block exported bindings are component props, which still
//! form the public surface.

use crate::adapters::typescript::TypeScriptAdapter;
use crate::adapters::{Language, LanguageAdapter, ParseOutcome};

pub struct SvelteAdapter;

/// Replace markup lines with blanks, keeping only script-block bodies, so the
/// delegated parse reports correct line numbers.
fn script_only(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_script = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if in_script {
            if trimmed.starts_with("</script") {
                in_script = false;
                out.push('\n');
            } else {
                out.push_str(line);
                out.push('\n');
            }
        } else {
            if trimmed.starts_with("<script") && !trimmed.contains("</script") {
                in_script = true;
            }
            out.push('\n');
        }
    }
    out
}

impl LanguageAdapter for SvelteAdapter {
    fn language(&self) -> Language {
        Language::Svelte
    }

    fn extensions(&self) -> &'static [&'static str] {
        &["svelte"]
    }

    fn parse_source(&self, path: &str, text: &str) -> ParseOutcome {
        TypeScriptAdapter.parse_source(path, &script_only(text))
    }

    fn parse_tests(&self, path: &str, text: &str) -> ParseOutcome {
        TypeScriptAdapter.parse_tests(path, &script_only(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::ArtifactKind;

    #[test]
    fn test_script_block_extraction() {
        let component = "<script lang=\"ts\">\nexport function format(value: number): string {\n  return String(value);\n}\nexport const LABEL = 'total';\n</script>\n\n<div>{format(3)}</div>\n";
        let outcome = SvelteAdapter.parse_source("src/Total.svelte", component);
        let defined = outcome.descriptor.defined;
        assert_eq!(defined.len(), 2);
        assert_eq!(defined[0].name, "format");
        assert_eq!(defined[0].kind, ArtifactKind::Function);
        assert_eq!(defined[1].name, "LABEL");
    }

    #[test]
    fn test_markup_never_parsed() {
        let component = "<div on:click={() => count += 1}>\n  {count} clicks\n</div>\n";
        let outcome = SvelteAdapter.parse_source("src/Counter.svelte", component);
        assert!(outcome.descriptor.defined.is_empty());
    }
}
