//! Human-readable rendering of validation reports.
//!
//! Diagnostics print grouped by file then severity, with bullet markers per
//! severity and a compact summary footer. The structured JSON surface lives
//! in `core::report`; this module is display only.

use crate::core::diagnostics::{Diagnostic, Severity};
use crate::core::report::ValidationReport;
use colored::Colorize;
use std::collections::BTreeMap;

fn bullet(severity: Severity) -> String {
    match severity {
        Severity::Fatal | Severity::Error => "●".bright_red().to_string(),
        Severity::Warning => "●".bright_yellow().to_string(),
        Severity::Info => "○".bright_cyan().to_string(),
    }
}

fn location_suffix(diagnostic: &Diagnostic) -> String {
    match (diagnostic.location.line, diagnostic.location.column) {
        (Some(line), Some(column)) => format!(":{}:{}", line, column),
        (Some(line), None) => format!(":{}", line),
        _ => String::new(),
    }
}

/// Diagnostic messages can embed long artifact labels and path lists; clip
/// them to one terminal line, preferring to break at a word edge so a merge
/// key or file path is dropped whole rather than cut mid-identifier.
fn clip(message: &str, budget: usize) -> String {
    let mut out = String::with_capacity(budget.min(message.len()));
    for word in message.split_whitespace() {
        if out.is_empty() {
            if word.chars().count() > budget {
                out.extend(word.chars().take(budget));
                out.push('…');
                return out;
            }
            out.push_str(word);
            continue;
        }
        if out.chars().count() + 1 + word.chars().count() > budget {
            out.push('…');
            return out;
        }
        out.push(' ');
        out.push_str(word);
    }
    out
}

/// Render a report to stdout, grouped by file then severity.
pub fn render_report(report: &ValidationReport) {
    let mut by_file: BTreeMap<&str, Vec<&Diagnostic>> = BTreeMap::new();
    for diagnostic in &report.diagnostics {
        by_file
            .entry(diagnostic.location.file.as_str())
            .or_default()
            .push(diagnostic);
    }

    for (file, diagnostics) in &by_file {
        let heading = if file.is_empty() { "<run>" } else { file };
        println!("{}", heading.bright_white().bold());
        for diagnostic in diagnostics {
            println!(
                "    {} [{}{}] {}",
                bullet(diagnostic.severity),
                format!("{}", diagnostic.kind).bright_black(),
                location_suffix(diagnostic),
                clip(&diagnostic.message, 160)
            );
            for hint in &diagnostic.hints {
                println!("      {} {}", "hint:".bright_black(), clip(hint, 140));
            }
        }
    }

    let tracking = &report.file_tracking;
    if !tracking.tracked.is_empty()
        || !tracking.registered.is_empty()
        || !tracking.undeclared.is_empty()
        || !tracking.untracked_tests.is_empty()
    {
        println!(
            "files: {} tracked, {} registered, {} undeclared, {} untracked test(s)",
            tracking.tracked.len(),
            tracking.registered.len(),
            tracking.undeclared.len(),
            tracking.untracked_tests.len()
        );
    }

    let verdict = if report.failed() {
        "FAIL".bright_red().bold().to_string()
    } else {
        "OK".bright_green().bold().to_string()
    };
    println!(
        "{} {} diagnostic(s): {} error(s), {} warning(s), {} skipped [run {}]",
        verdict,
        report.summary.total,
        report.summary.errors,
        report.summary.warnings,
        report.summary.skipped,
        report.run_id
    );
}
