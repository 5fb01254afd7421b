//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;

/// Arguments for the inspect command
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Files or directories to analyze
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Output format (text, json, yaml)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Estimation depth from 0.0 (summaries only) to 1.0 (exact)
    #[arg(long)]
    pub parse_speed: Option<f64>,

    /// Merge sequentially numbered files (disc1.vob, disc2.vob, ...)
    #[arg(long)]
    pub continuous_file_names: bool,

    /// Analyze at most this many files or groups
    #[arg(long)]
    pub max_files: Option<usize>,

    /// Files analyzed in parallel (default: CPU count)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

/// Arguments for the detect command
#[derive(Args, Debug)]
pub struct DetectArgs {
    /// Files or directories to classify
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}
