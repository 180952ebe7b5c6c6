//! webperm CLI
//!
//! Reconciles a document root, checks it for drift, and replays repair
//! artifacts.

mod cli;
mod commands;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Commands};
use error::{CliError, Result};

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Tolerated failures and fingerprint mismatches log at WARN
    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(cli.verbose)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| CliError::user(format!("Failed to set tracing subscriber: {e}")))?;
    tracing::debug!("Verbose mode enabled");

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Apply {
            site,
            dry_run,
            json,
        } => commands::run_apply(&site.into_settings(config)?, dry_run, json),
        Commands::Check { site, json } => commands::run_check(&site.into_settings(config)?, json),
        Commands::Plan { site } => commands::run_plan(&site.into_settings(config)?),
        Commands::Replay {
            artifact,
            dry_run,
            json,
        } => commands::run_replay(&artifact, dry_run, json),
    }
}
