//! CLI Commands

pub mod capture;
pub mod check;
pub mod run;

use std::path::Path;

use anyhow::Context;
use clap::ValueEnum;

use uiparity_common::ImplementationId;
use uiparity_engine::HarnessConfig;

/// Failures exceeded the tolerance
pub const EXIT_FAILURES: u8 = 1;
/// Configuration error, unreachable site or browser failure
pub const EXIT_FATAL: u8 = 2;

/// Which implementation(s) a run targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Target {
    Baseline,
    Candidate,
    /// Both, concurrently, followed by the parity gap
    Both,
}

impl Target {
    pub fn implementations(self) -> Vec<ImplementationId> {
        match self {
            Target::Baseline => vec![ImplementationId::Baseline],
            Target::Candidate => vec![ImplementationId::Candidate],
            Target::Both => vec![ImplementationId::Baseline, ImplementationId::Candidate],
        }
    }
}

/// A single implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Implementation {
    Baseline,
    Candidate,
}

impl From<Implementation> for ImplementationId {
    fn from(value: Implementation) -> Self {
        match value {
            Implementation::Baseline => ImplementationId::Baseline,
            Implementation::Candidate => ImplementationId::Candidate,
        }
    }
}

pub fn load_config(path: &Path) -> anyhow::Result<HarnessConfig> {
    HarnessConfig::load(path).with_context(|| format!("loading {}", path.display()))
}
