//! CLI module for ProbeX
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config_initialization::CliOverrides;
use crate::ports::FileSettings;

pub mod args;
pub mod commands;

pub use args::{DetectArgs, InspectArgs};

/// ProbeX media inspector
///
/// Reports container metadata (streams, codecs, duration, bit rates) for
/// MP4, Matroska, MPEG-TS and MPEG-PS files without decoding any payload.
#[derive(Parser, Debug)]
#[command(name = "probex")]
#[command(about = "ProbeX - Media container inspector")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Logging level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (pretty, compact, json)
    #[arg(long, global = true)]
    pub log_format: Option<String>,

    /// Configuration file (default: probex.toml in the working directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze files and print their reports
    Inspect(InspectArgs),
    /// Print the detected container family of each file
    Detect(DetectArgs),
}

impl Cli {
    /// Settings given on the command line, for the configuration hierarchy
    pub fn overrides(&self) -> CliOverrides {
        let mut settings = FileSettings {
            log_level: self.log_level.clone(),
            log_format: self.log_format.clone(),
            ..FileSettings::default()
        };
        if let Commands::Inspect(args) = &self.command {
            settings.parse_speed = args.parse_speed;
            settings.continuous_file_names = args.continuous_file_names.then_some(true);
            settings.max_files = args.max_files;
            settings.workers = args.jobs;
            settings.output = args.output.clone();
        }
        CliOverrides {
            config_path: self.config.clone(),
            settings,
        }
    }
}
