//! The structured validation report: the sole machine-readable surface the
//! kernel exposes upward.

use crate::core::diagnostics::{Diagnostic, Severity};
use crate::core::graph::{GraphEdge, GraphFormat, GraphNode};
use crate::core::tracker::FileTracking;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportInputs {
    pub manifest_dir: String,
    /// Target granularity: `repo`, `directory` or `manifest`.
    pub mode: String,
    pub used_chain: bool,
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub errors: usize,
    pub warnings: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphExport {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub format: GraphFormat,
    /// Rendered text for the dot/flowchart formats.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rendered: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub run_id: String,
    pub inputs: ReportInputs,
    pub summary: ReportSummary,
    pub diagnostics: Vec<Diagnostic>,
    pub file_tracking: FileTracking,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_export: Option<GraphExport>,
}

impl ValidationReport {
    pub fn new(inputs: ReportInputs, diagnostics: Vec<Diagnostic>) -> Self {
        let summary = summarize(&diagnostics, 0);
        ValidationReport {
            run_id: ulid::Ulid::new().to_string(),
            inputs,
            summary,
            diagnostics,
            file_tracking: FileTracking::default(),
            graph_export: None,
        }
    }

    /// True when the run failed (any `error` or `fatal` diagnostic).
    pub fn failed(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_failure)
    }

    /// Process exit status for the CLI collaborator: 0 success, 1 validation
    /// failure. (Misuse exits with 2 before a report exists.)
    pub fn exit_code(&self) -> i32 {
        if self.failed() { 1 } else { 0 }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// Derive the summary block from a finalized diagnostic list.
pub fn summarize(diagnostics: &[Diagnostic], skipped: usize) -> ReportSummary {
    ReportSummary {
        total: diagnostics.len(),
        errors: diagnostics
            .iter()
            .filter(|d| d.severity >= Severity::Error)
            .count(),
        warnings: diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count(),
        skipped,
    }
}
