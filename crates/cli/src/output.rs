//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};

use uiparity_common::{SectionResult, ValidationResult};
use uiparity_engine::extractor::PropertySet;
use uiparity_engine::report::RunAbort;
use uiparity_engine::{ParityGap, RunReport};

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable tables
    #[default]
    Table,
    /// JSON run outcomes and parity gap
    Json,
}

fn table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn percent(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

fn banner(title: &str) {
    println!();
    println!("{}", "━".repeat(60).dimmed());
    println!(" {}", title.bold());
    println!("{}", "━".repeat(60).dimmed());
}

fn status_cell(section: &SectionResult) -> Cell {
    if section.failed() == 0 {
        Cell::new("✓ pass").fg(Color::Green)
    } else {
        Cell::new("✗ fail").fg(Color::Red)
    }
}

/// Per-section summary, failure list and totals for one run
/// Viewport-scoped results already carry their viewport in the message
fn failure_line(section: &str, result: &ValidationResult) -> String {
    format!("[{}] {}", section, result.message)
}

pub fn print_report(report: &RunReport) {
    banner(&format!("{} - {}", report.implementation, report.url));

    let mut summary = table();
    summary.set_header(vec!["Section", "Status", "Tested", "Failed", "Suppressed", "Skipped"]);
    for section in &report.sections {
        summary.add_row(vec![
            Cell::new(&section.name),
            status_cell(section),
            Cell::new(section.tested()),
            Cell::new(section.failed()),
            Cell::new(section.suppressed.len()),
            Cell::new(section.skipped.len()),
        ]);
    }
    println!("{summary}");

    let failures: Vec<_> = report.failures().collect();
    if !failures.is_empty() {
        println!();
        println!("{}", "Failures:".red().bold());
        for (section, result) in failures {
            println!("  {} {}", "✗".red(), failure_line(section, result));
        }
    }

    let suppressed: Vec<_> = report
        .sections
        .iter()
        .flat_map(|s| s.suppressed.iter().map(move |f| (s.name.as_str(), f)))
        .collect();
    if !suppressed.is_empty() {
        println!();
        println!("{}", "Suppressed:".yellow());
        for (section, failure) in suppressed {
            println!(
                "  {} [{}] {} {}",
                "~".yellow(),
                section,
                failure.result.message,
                format!("(override {})", failure.override_id).dimmed()
            );
        }
    }

    let totals = &report.totals;
    let rate = percent(report.pass_rate);
    let rate = if totals.failed == 0 { rate.green() } else { rate.red() };
    println!();
    println!(
        "  Tested: {}  Failed: {}  Suppressed: {}  Skipped: {}  Pass rate: {}",
        totals.tested, totals.failed, totals.suppressed, totals.skipped, rate
    );
}

pub fn print_abort(abort: &RunAbort) {
    banner(&format!("{} - {}", abort.implementation, abort.url));
    println!(
        "  {} run aborted after {} navigation attempt(s): {}",
        "✗".red(),
        abort.attempts,
        abort.reason
    );
}

/// Pass-rate gap and the per-section failure differences
pub fn print_gap(gap: &ParityGap) {
    banner("Parity gap");
    println!(
        "  {}: {}  {}: {}  gap: {}",
        gap.a,
        percent(gap.pass_rate_a),
        gap.b,
        percent(gap.pass_rate_b),
        percent(gap.gap).bold()
    );

    if gap.is_identical() {
        println!("  {} both implementations fail the same checks", "✓".green());
        return;
    }

    let mut diff = table();
    diff.set_header(vec![
        "Section".to_string(),
        format!("Only in {}", gap.a),
        format!("Only in {}", gap.b),
    ]);
    for section in &gap.sections {
        diff.add_row(vec![
            section.name.clone(),
            section.only_in_a.join("\n"),
            section.only_in_b.join("\n"),
        ]);
    }
    println!("{diff}");
}

/// One row of `uiparity check`
pub struct ResolutionRow {
    pub role: String,
    pub baseline: Option<String>,
    pub candidate: Option<String>,
}

pub fn print_resolutions(rows: &[ResolutionRow]) {
    let mut resolved = table();
    resolved.set_header(vec!["Role", "Baseline", "Candidate"]);
    let cell = |selector: &Option<String>| match selector {
        Some(selector) => Cell::new(selector),
        None => Cell::new("n/a").fg(Color::DarkGrey),
    };
    for row in rows {
        resolved.add_row(vec![Cell::new(&row.role), cell(&row.baseline), cell(&row.candidate)]);
    }
    println!("{resolved}");
}

pub fn print_properties(set: &PropertySet) {
    let mut properties = table();
    properties.set_header(vec!["Property", "Value"]);
    for (property, value) in &set.values {
        properties.add_row(vec![property, value]);
    }
    println!("{} {}", set.role.to_string().bold(), format!("({})", set.selector).dimmed());
    println!("{properties}");
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("⚠️  {}", message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use uiparity_common::{FailureKind, Role};

    #[test]
    fn test_failure_line_names_viewport_once() {
        let result = ValidationResult::fail(
            &Role::from("heroTitle"),
            "fontSize",
            FailureKind::PropertyMismatch,
            "heroTitle.fontSize: expected \"36px\", got \"44px\"",
        )
        .with_viewport("mobile");
        let line = failure_line("responsive", &result);
        assert_eq!(line, "[responsive] [mobile] heroTitle.fontSize: expected \"36px\", got \"44px\"");
        assert_eq!(line.matches("mobile").count(), 1);
    }
}
