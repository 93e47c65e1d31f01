//! Report rendering

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use super::{Diagnostic, DiagnosticKind, Report, ValueView};
use crate::profiles::link::describe_path;

/// Print the file header shown before each analysis.
pub fn print_header(target: &Path, template: &Path) {
    println!("Comparing files:");
    println!("  Target:  {}", describe_path(target));
    println!("  Example: {}", describe_path(template));
    println!();
}

/// Print a report for a terminal: syntax first, then certificate settings,
/// then the per-variable findings in iteration order.
pub fn print_report(report: &Report) {
    println!("=== ANALYSIS ===");
    println!();

    for kind in [DiagnosticKind::SyntaxError, DiagnosticKind::SslConfig] {
        let group: Vec<_> = report.of_kind(kind).collect();
        if group.is_empty() {
            continue;
        }
        for diagnostic in group {
            println!("{}", format_diagnostic(diagnostic));
        }
        println!();
    }

    for diagnostic in report.diagnostics.iter().filter(|d| {
        !matches!(
            d.kind,
            DiagnosticKind::SyntaxError | DiagnosticKind::SslConfig
        )
    }) {
        println!("{}", format_diagnostic(diagnostic));
    }

    if report.diagnostics.is_empty() {
        println!("✅ All variables match between files!");
    }
}

pub fn format_diagnostic(diagnostic: &Diagnostic) -> String {
    let name = &diagnostic.name;
    let label = diagnostic.kind;
    let message = diagnostic.message.as_deref().unwrap_or_default();

    match diagnostic.kind {
        DiagnosticKind::SyntaxError => format!("🚨 {label}: {message}"),
        DiagnosticKind::SslConfig => format!("🔒 {label}: {name}. {message}"),
        DiagnosticKind::Missing => {
            format!("❌ {label}: {name}. Example: {}", show(&diagnostic.template))
        }
        DiagnosticKind::DefinitionChanged => format!(
            "⚠️  {label}: {name}. Example: {}, Target: {}",
            show(&diagnostic.template),
            show(&diagnostic.target)
        ),
        DiagnosticKind::ValueChanged => format!(
            "📝 {label}: {name}. Example: {}, Target: {}",
            raw(&diagnostic.template),
            raw(&diagnostic.target)
        ),
        DiagnosticKind::ExposedSecret => format!(
            "🚨 {label}: {name}. Value: {}",
            diagnostic
                .target
                .as_ref()
                .map(|v| mask_value(&v.raw))
                .unwrap_or_default()
        ),
        DiagnosticKind::Extra => format!("ℹ️  {label}: {name}. Value: {}", show(&diagnostic.target)),
    }
}

fn show(view: &Option<ValueView>) -> String {
    match view {
        Some(v) if v.is_interpolated() => format!("{} -> {}", v.raw, v.resolved),
        Some(v) => v.raw.clone(),
        None => String::new(),
    }
}

fn raw(view: &Option<ValueView>) -> &str {
    view.as_ref().map(|v| v.raw.as_str()).unwrap_or_default()
}

/// Keep a leaked secret recognisable without printing it again.
fn mask_value(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 4 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..2].iter().collect();
        let tail: String = chars[chars.len() - 2..].iter().collect();
        format!("{head}...{tail}")
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    clean: bool,
    #[serde(flatten)]
    report: &'a Report,
}

/// Reports as a JSON array, one object per checked file.
pub fn to_json(reports: &[Report], strict: bool) -> Result<String> {
    let rendered: Vec<_> = reports
        .iter()
        .map(|report| JsonReport {
            clean: report.is_clean(strict),
            report,
        })
        .collect();
    Ok(serde_json::to_string_pretty(&rendered)?)
}
