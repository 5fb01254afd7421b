//! ProbeX media inspector library
//!
//! Reads MP4-family, Matroska-family, MPEG transport stream and MPEG program
//! stream containers and reports their streams, codecs, durations and bit
//! rates without decoding any media payload.
//!
//! ```no_run
//! # async fn run() -> probex_cli::ProbeXResult<()> {
//! use probex_cli::{analyze, AnalyzeOptions};
//!
//! let outcome = analyze(vec!["movie.mkv".into()], AnalyzeOptions::default()).await?;
//! for report in &outcome.reports {
//!     println!("{}: {} streams", report.path(), report.streams().len());
//! }
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

pub mod adapters;
pub mod app;
pub mod cli;
pub mod config_initialization;
pub mod domain;
pub mod engine;
pub mod error;
pub mod output;
pub mod planner;
pub mod ports;
pub mod probe;
pub mod utils;

// Re-export commonly used types
pub use app::{AnalyzeOutcome, UnitFailure};
pub use domain::model::{AnalyzeOptions, AppInfo, Field, Report, Stream, StreamKind};
pub use engine::{analyze_unit, AnalysisUnit};
pub use error::{ProbeXError, ProbeXResult};
pub use probe::{sniff_path, ContainerFormat};

use app::{AnalyzeRequest, AppContainer, DefaultAppContainer};

/// Analyze a batch of files with one worker per CPU
///
/// Reports come back in input order. Units that fail are listed in
/// [`AnalyzeOutcome::failures`]; the call itself fails only when no unit
/// could be analyzed.
pub async fn analyze(paths: Vec<PathBuf>, options: AnalyzeOptions) -> ProbeXResult<AnalyzeOutcome> {
    DefaultAppContainer::new()
        .analyze_interactor()
        .execute(AnalyzeRequest::new(paths, options))
        .await
}
