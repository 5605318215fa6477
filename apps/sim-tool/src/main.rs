//! Command line companion for API simulators.
//!
//! Works on state files written by `sim_core::persistence`:
//! - validate / minify / inspect state
//! - search a collection with any search strategy
//! - generate function-calling schemas from docstrings

mod cli;
mod commands;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use sim_core::SimConfig;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<SimConfig> {
    match &cli.config {
        Some(path) => SimConfig::from_toml_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(SimConfig::from_env()?),
    }
}

fn run(cli: Cli) -> Result<String> {
    let config = load_config(&cli)?;
    tracing::debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Validate { state, schema } => commands::validate(&config, &state, schema.as_deref()),
        Commands::Minify { state, output } => commands::minify(&config, &state, output.as_deref()),
        Commands::Inspect { state } => commands::inspect(&config, &state),
        Commands::Search {
            state,
            collection,
            query,
            strategy,
            fields,
            limit,
        } => commands::search(
            &config,
            &state,
            &collection,
            &query,
            strategy.into(),
            &fields,
            limit,
        ),
        Commands::Fcspec {
            docstring,
            name,
            defaults,
        } => commands::fcspec(&docstring, &name, &defaults),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match run(cli) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
