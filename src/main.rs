//! ProbeX media inspector
//!
//! Prints container metadata for MP4, Matroska, MPEG-TS and MPEG-PS files.
//!
//! # Usage
//!
//! ```bash
//! probex inspect movie.mkv
//! probex inspect --output json --parse-speed 1 recordings/
//! probex inspect --continuous-file-names VTS_01_1.VOB
//! probex detect capture.m2ts
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

use probex_cli::adapters::TomlConfigAdapter;
use probex_cli::app::DefaultAppContainer;
use probex_cli::cli::{commands, Cli, Commands};
use probex_cli::config_initialization::initialize_configuration_hierarchy;
use probex_cli::utils::logging::LoggingSystem;

/// Main entry point for the ProbeX CLI application
#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    let config = initialize_configuration_hierarchy(&cli.overrides(), &TomlConfigAdapter::new())
        .context("Failed to load configuration")?;

    // Initialize logging
    LoggingSystem::new(config.logging.clone())
        .initialize()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
    debug!(version = %config.app.version, "starting ProbeX");

    let container = DefaultAppContainer::new();

    // Execute the requested command
    match &cli.command {
        Commands::Inspect(args) => commands::inspect(args, &config, &container).await?,
        Commands::Detect(args) => commands::detect(args, &container).await?,
    }

    Ok(())
}
