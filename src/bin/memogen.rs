//! Memogen CLI Binary
//!
//! Command-line interface for inspecting memoized artifacts.

use anyhow::{Context, Result};
use clap::Parser;
use memogen::cli::{map_error, Cli, RunContext};
use memogen::config::ConfigLoader;
use memogen::logging::{init_logging, LoggingConfig};
use tracing::{error, info};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let logging_config = build_logging_config(&cli);
    init_logging(Some(&logging_config)).context("Failed to initialize logging")?;

    info!("Memogen CLI starting");

    let context = RunContext::new(cli.workspace.clone(), cli.config.clone()).map_err(|e| {
        error!("Error initializing workspace: {}", e);
        anyhow::anyhow!(map_error(&e))
    })?;

    let output = context.execute(&cli.command).map_err(|e| {
        error!("Command failed: {}", e);
        anyhow::anyhow!(map_error(&e))
    })?;

    info!("Command completed successfully");
    println!("{}", output);
    Ok(())
}

/// Build logging configuration from CLI args and config file.
/// Precedence: CLI flags override config file override defaults.
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let mut config = match cli.config {
        Some(ref config_path) => ConfigLoader::load_from_file(config_path)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default(),
        None => ConfigLoader::load(&cli.workspace)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default(),
    };

    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }
    if let Some(ref format) = cli.log_format {
        config.format = format.clone();
    }
    if let Some(ref output) = cli.log_output {
        config.output = output.clone();
    }

    config
}
