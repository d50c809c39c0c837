//! Aggregation, run reports and the parity gap
//!
//! A [`ReportBuilder`] is owned by exactly one implementation's pipeline.
//! [`ReportBuilder::finish`] produces an immutable [`RunReport`];
//! [`compare`] is a pure function over two of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use uiparity_common::{ImplementationId, SectionResult, ValidationResult};

/// Counts across every section of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunTotals {
    /// Checks executed, override-suppressed ones included
    pub tested: usize,
    pub passed: usize,
    pub failed: usize,
    /// Failures removed by overrides
    pub suppressed: usize,
    /// Roles that do not exist on this implementation
    pub skipped: usize,
}

impl RunTotals {
    /// `(tested - failed) / tested`; an empty run passes
    pub fn pass_rate(&self) -> f64 {
        if self.tested == 0 {
            1.0
        } else {
            (self.tested - self.failed) as f64 / self.tested as f64
        }
    }
}

/// Sum the counts of `sections`; order does not matter
pub fn aggregate(sections: &[SectionResult]) -> RunTotals {
    sections.iter().fold(RunTotals::default(), |mut totals, section| {
        totals.tested += section.tested();
        totals.passed += section.passed();
        totals.failed += section.failed();
        totals.suppressed += section.suppressed.len();
        totals.skipped += section.skipped.len();
        totals
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub implementation: ImplementationId,
    pub url: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Sections in the order they ran
    pub sections: Vec<SectionResult>,
    pub totals: RunTotals,
    pub pass_rate: f64,
}

impl RunReport {
    pub fn section(&self, name: &str) -> Option<&SectionResult> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &ValidationResult)> {
        self.sections
            .iter()
            .flat_map(|s| s.failures().map(move |r| (s.name.as_str(), r)))
    }

    /// Whether the failure count is within `tolerance`
    pub fn within_tolerance(&self, tolerance: usize) -> bool {
        self.totals.failed <= tolerance
    }
}

/// Accumulates sections for one run
#[derive(Debug)]
pub struct ReportBuilder {
    run_id: Uuid,
    implementation: ImplementationId,
    url: String,
    started_at: DateTime<Utc>,
    sections: Vec<SectionResult>,
}

impl ReportBuilder {
    pub fn new(implementation: ImplementationId, url: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            implementation,
            url: url.into(),
            started_at: Utc::now(),
            sections: Vec::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Add a section; a repeated name is merged into the earlier one
    pub fn record(&mut self, section: SectionResult) {
        match self.sections.iter_mut().find(|s| s.name == section.name) {
            Some(existing) => existing.merge(section),
            None => self.sections.push(section),
        }
    }

    pub fn finish(self) -> RunReport {
        let totals = aggregate(&self.sections);
        RunReport {
            run_id: self.run_id,
            implementation: self.implementation,
            url: self.url,
            started_at: self.started_at,
            finished_at: Utc::now(),
            sections: self.sections,
            pass_rate: totals.pass_rate(),
            totals,
        }
    }
}

/// A fatal error that stopped a run before it produced a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunAbort {
    pub implementation: ImplementationId,
    pub url: String,
    pub attempts: u32,
    pub reason: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed(RunReport),
    Aborted(RunAbort),
}

impl RunOutcome {
    pub fn implementation(&self) -> ImplementationId {
        match self {
            RunOutcome::Completed(report) => report.implementation,
            RunOutcome::Aborted(abort) => abort.implementation,
        }
    }

    pub fn report(&self) -> Option<&RunReport> {
        match self {
            RunOutcome::Completed(report) => Some(report),
            RunOutcome::Aborted(_) => None,
        }
    }
}

/// Failures found in only one of two reports, for one section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDiff {
    pub name: String,
    pub only_in_a: Vec<String>,
    pub only_in_b: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParityGap {
    pub a: ImplementationId,
    pub b: ImplementationId,
    pub pass_rate_a: f64,
    pub pass_rate_b: f64,
    /// `|pass_rate_a - pass_rate_b|`
    pub gap: f64,
    /// Sections whose failure sets differ, by name
    pub sections: Vec<SectionDiff>,
}

impl ParityGap {
    pub fn is_identical(&self) -> bool {
        self.sections.is_empty()
    }
}

fn failure_messages(report: &RunReport) -> BTreeMap<&str, BTreeSet<&str>> {
    let mut by_section: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for section in &report.sections {
        let messages = by_section.entry(section.name.as_str()).or_default();
        messages.extend(section.failures().map(|r| r.message.as_str()));
    }
    by_section
}

/// Compare two reports: pass-rate gap plus per-section symmetric
/// difference of failure messages
pub fn compare(a: &RunReport, b: &RunReport) -> ParityGap {
    let failures_a = failure_messages(a);
    let failures_b = failure_messages(b);
    let empty = BTreeSet::new();

    let names: BTreeSet<&str> = failures_a.keys().chain(failures_b.keys()).copied().collect();
    let sections = names
        .into_iter()
        .filter_map(|name| {
            let in_a = failures_a.get(name).unwrap_or(&empty);
            let in_b = failures_b.get(name).unwrap_or(&empty);
            let only_in_a: Vec<String> = in_a.difference(in_b).map(|m| m.to_string()).collect();
            let only_in_b: Vec<String> = in_b.difference(in_a).map(|m| m.to_string()).collect();
            if only_in_a.is_empty() && only_in_b.is_empty() {
                None
            } else {
                Some(SectionDiff {
                    name: name.to_string(),
                    only_in_a,
                    only_in_b,
                })
            }
        })
        .collect();

    ParityGap {
        a: a.implementation,
        b: b.implementation,
        pass_rate_a: a.pass_rate,
        pass_rate_b: b.pass_rate,
        gap: (a.pass_rate - b.pass_rate).abs(),
        sections,
    }
}
