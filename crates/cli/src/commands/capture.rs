//! `uiparity capture` - dump a role's computed properties

use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use clap::Args;

use uiparity_common::{ImplementationId, Role};
use uiparity_engine::{Capture, ParityRunner};

use super::{load_config, Implementation, EXIT_FATAL};
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct CaptureArgs {
    /// Implementation to capture from
    #[arg(long, value_enum)]
    pub target: Implementation,

    /// Role to capture
    #[arg(long)]
    pub role: String,

    /// Named viewport [default: the configured default]
    #[arg(long)]
    pub viewport: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}

pub async fn execute(args: CaptureArgs, config_path: &Path) -> anyhow::Result<ExitCode> {
    let config = load_config(config_path)?;
    let catalog = config.load_catalog().context("loading catalogs")?;
    let implementation = ImplementationId::from(args.target);
    let role = Role::new(args.role);

    let capture = ParityRunner::new(&config, &catalog)
        .capture_in_browser(implementation, &role, args.viewport.as_deref())
        .await?;

    match capture {
        Capture::Captured(set) => {
            match args.format {
                OutputFormat::Table => output::print_properties(&set),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&set)?),
            }
            Ok(ExitCode::SUCCESS)
        }
        Capture::NotApplicable => {
            output::print_warning(&format!("{} does not exist on {}", role, implementation));
            Ok(ExitCode::SUCCESS)
        }
        Capture::NotFound { selector, waited_ms } => {
            output::print_error(&format!(
                "{}: no element matches '{}' on {} (waited {}ms)",
                role, selector, implementation, waited_ms
            ));
            Ok(ExitCode::from(EXIT_FATAL))
        }
    }
}
