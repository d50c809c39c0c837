//! `uiparity check` - offline validation of config and catalogs

use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;

use uiparity_common::{Catalog, ImplementationId};
use uiparity_engine::resolver::resolve_spec;

use super::load_config;
use crate::output::{self, ResolutionRow};

pub fn execute(config_path: &Path) -> anyhow::Result<ExitCode> {
    let config = load_config(config_path)?;
    let catalog = config.load_catalog().context("loading catalogs")?;

    output::print_resolutions(&resolution_rows(&catalog));

    let expectations = &catalog.expectations;
    output::print_success(&format!(
        "{} roles, {} sections, {} overrides, {} viewports: catalogs are valid",
        catalog.selectors.len(),
        expectations.sections.len(),
        catalog.overrides.len(),
        config.viewports.len()
    ));
    Ok(ExitCode::SUCCESS)
}

fn resolution_rows(catalog: &Catalog) -> Vec<ResolutionRow> {
    catalog
        .selectors
        .iter()
        .map(|(role, spec)| ResolutionRow {
            role: role.to_string(),
            baseline: resolve_spec(spec, ImplementationId::Baseline).selector().map(str::to_string),
            candidate: resolve_spec(spec, ImplementationId::Candidate).selector().map(str::to_string),
        })
        .collect()
}
