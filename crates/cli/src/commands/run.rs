//! `uiparity run` - the parity pipeline against one or both implementations

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use futures::future::join_all;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use serde::Serialize;
use tracing::info;

use uiparity_common::ImplementationId;
use uiparity_engine::{compare, HarnessResult, ParityGap, ParityRunner, RunOutcome};

use super::{load_config, Target, EXIT_FAILURES, EXIT_FATAL};
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct RunArgs {
    /// Implementation(s) to run
    #[arg(long, value_enum, default_value_t = Target::Both)]
    pub target: Target,

    /// Viewport override, NAME=WIDTHxHEIGHT (repeatable)
    #[arg(long = "viewport", value_name = "NAME=WxH")]
    pub viewports: Vec<String>,

    /// Failures tolerated per run [default: from config]
    #[arg(long)]
    pub tolerance: Option<usize>,

    /// Console output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Also write the JSON summary to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Everything a run produced, as written by `--format json` / `--output`
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub outcomes: Vec<RunOutcome>,
    pub errors: Vec<RunError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parity: Option<ParityGap>,
}

#[derive(Debug, Serialize)]
pub struct RunError {
    pub implementation: ImplementationId,
    pub error: String,
}

impl RunSummary {
    fn new(results: Vec<(ImplementationId, HarnessResult<RunOutcome>)>) -> Self {
        let mut outcomes = Vec::new();
        let mut errors = Vec::new();
        for (implementation, result) in results {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => errors.push(RunError {
                    implementation,
                    error: e.to_string(),
                }),
            }
        }

        let reports: Vec<_> = outcomes.iter().filter_map(RunOutcome::report).collect();
        let parity = match reports.as_slice() {
            [a, b] => Some(compare(a, b)),
            _ => None,
        };

        Self {
            outcomes,
            errors,
            parity,
        }
    }

    /// 2 on any fatal error or abort, 1 when a run exceeds `tolerance`
    pub fn exit_code(&self, tolerance: usize) -> u8 {
        let aborted = self.outcomes.iter().any(|o| o.report().is_none());
        if !self.errors.is_empty() || aborted {
            return EXIT_FATAL;
        }
        let over = self
            .outcomes
            .iter()
            .filter_map(RunOutcome::report)
            .any(|report| !report.within_tolerance(tolerance));
        if over {
            EXIT_FAILURES
        } else {
            0
        }
    }
}

pub async fn execute(args: RunArgs, config_path: &Path) -> anyhow::Result<ExitCode> {
    let mut config = load_config(config_path)?;
    for spec in &args.viewports {
        config.apply_viewport_override(spec)?;
    }
    let catalog = config.load_catalog().context("loading catalogs")?;
    let tolerance = args.tolerance.unwrap_or(config.failure_tolerance);

    let runner = ParityRunner::new(&config, &catalog);
    let progress = match args.format {
        OutputFormat::Table => MultiProgress::new(),
        OutputFormat::Json => MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
    };

    let implementations = args.target.implementations();
    let results = join_all(
        implementations
            .iter()
            .map(|&implementation| tracked(&progress, &runner, implementation)),
    )
    .await;
    let summary = RunSummary::new(implementations.into_iter().zip(results).collect());

    match args.format {
        OutputFormat::Table => render(&summary),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }

    if let Some(path) = &args.output {
        std::fs::write(path, serde_json::to_string_pretty(&summary)?)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    let code = summary.exit_code(tolerance);
    if code == EXIT_FAILURES && args.format == OutputFormat::Table {
        output::print_warning(&format!("failures exceed the tolerance of {}", tolerance));
    }
    Ok(ExitCode::from(code))
}

async fn tracked(
    progress: &MultiProgress,
    runner: &ParityRunner<'_>,
    implementation: ImplementationId,
) -> HarnessResult<RunOutcome> {
    let spinner = progress.add(ProgressBar::new_spinner());
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!("{}: running", implementation));

    let outcome = runner.run(implementation).await;
    let message = match &outcome {
        Ok(RunOutcome::Completed(report)) => format!(
            "{}: {} tested, {} failed",
            implementation, report.totals.tested, report.totals.failed
        ),
        Ok(RunOutcome::Aborted(_)) => format!("{}: aborted", implementation),
        Err(_) => format!("{}: error", implementation),
    };
    spinner.finish_with_message(message);
    outcome
}

fn render(summary: &RunSummary) {
    for outcome in &summary.outcomes {
        match outcome {
            RunOutcome::Completed(report) => output::print_report(report),
            RunOutcome::Aborted(abort) => output::print_abort(abort),
        }
    }
    for error in &summary.errors {
        output::print_error(&format!("{}: {}", error.implementation, error.error));
    }
    if let Some(gap) = &summary.parity {
        output::print_gap(gap);
    }
    if summary.errors.is_empty() && summary.outcomes.iter().all(|o| o.report().is_some_and(|r| r.totals.failed == 0)) {
        println!();
        output::print_success("no parity failures");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uiparity_common::{FailureKind, Role, SectionResult, ValidationResult};
    use uiparity_engine::report::{ReportBuilder, RunAbort};
    use uiparity_engine::HarnessError;

    fn completed(implementation: ImplementationId, failures: usize) -> RunOutcome {
        let role = Role::from("heroTitle");
        let mut section = SectionResult::new("hero");
        section.push(ValidationResult::pass(&role, "presence", "heroTitle: present"));
        for i in 0..failures {
            section.push(ValidationResult::fail(
                &role,
                "fontSize",
                FailureKind::PropertyMismatch,
                format!("heroTitle.fontSize: expected \"60px\", got \"{}px\"", 40 + i),
            ));
        }
        let mut builder = ReportBuilder::new(implementation, "http://127.0.0.1/");
        builder.record(section);
        RunOutcome::Completed(builder.finish())
    }

    #[test]
    fn test_exit_codes() {
        let clean = RunSummary::new(vec![(ImplementationId::Baseline, Ok(completed(ImplementationId::Baseline, 0)))]);
        assert_eq!(clean.exit_code(0), 0);

        let failing =
            RunSummary::new(vec![(ImplementationId::Candidate, Ok(completed(ImplementationId::Candidate, 2)))]);
        assert_eq!(failing.exit_code(0), EXIT_FAILURES);
        assert_eq!(failing.exit_code(2), 0);

        let broken = RunSummary::new(vec![(
            ImplementationId::Candidate,
            Err(HarnessError::PlaywrightNotFound),
        )]);
        assert_eq!(broken.exit_code(10), EXIT_FATAL);
    }

    #[test]
    fn test_aborted_run_is_fatal() {
        let abort = RunOutcome::Aborted(RunAbort {
            implementation: ImplementationId::Candidate,
            url: "http://127.0.0.1:3000/".to_string(),
            attempts: 2,
            reason: "net::ERR_CONNECTION_REFUSED".to_string(),
            at: chrono::Utc::now(),
        });
        let summary = RunSummary::new(vec![
            (ImplementationId::Baseline, Ok(completed(ImplementationId::Baseline, 0))),
            (ImplementationId::Candidate, Ok(abort)),
        ]);
        assert!(summary.parity.is_none());
        assert_eq!(summary.exit_code(0), EXIT_FATAL);
    }

    #[test]
    fn test_two_reports_get_a_parity_gap() {
        let summary = RunSummary::new(vec![
            (ImplementationId::Baseline, Ok(completed(ImplementationId::Baseline, 0))),
            (ImplementationId::Candidate, Ok(completed(ImplementationId::Candidate, 1))),
        ]);
        let gap = summary.parity.as_ref().unwrap();
        assert_eq!(gap.a, ImplementationId::Baseline);
        assert_eq!(gap.sections.len(), 1);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["outcomes"][1]["status"], "completed");
        assert!(json["parity"]["gap"].as_f64().unwrap() > 0.0);
    }
}
