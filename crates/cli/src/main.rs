//! uiparity CLI - Main Entry Point
//!
//! Runs the parity pipeline against the baseline and/or candidate
//! implementation, validates catalogs offline, and captures property sets
//! for authoring expectations.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{capture, check, run};

/// uiparity - element-by-element UI parity verification
#[derive(Parser)]
#[command(name = "uiparity")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Harness configuration file
    #[arg(
        short,
        long,
        default_value = "parity/uiparity.toml",
        env = "UIPARITY_CONFIG",
        global = true
    )]
    config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the parity checks against one or both implementations
    Run(run::RunArgs),

    /// Validate configuration and catalogs without a browser
    Check,

    /// Print every informative property of one role
    Capture(capture::CaptureArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::Run(args) => run::execute(args, &cli.config).await,
        Commands::Check => check::execute(&cli.config),
        Commands::Capture(args) => capture::execute(args, &cli.config).await,
        Commands::Version => {
            println!("uiparity v{}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(commands::EXIT_FATAL)
        }
    }
}
