//! Unit planning: turns the input file list into analysis units

use std::path::PathBuf;

use tracing::debug;

use crate::domain::model::AnalyzeOptions;
use crate::engine::AnalysisUnit;

pub mod grouper;

pub use grouper::{next_in_sequence, ContinuousGrouper, DiskLookup, FileLookup};

/// Plan the units of a batch
///
/// Grouping runs over the whole list before any parsing starts; the
/// `max_files` limit applies to the resulting units.
pub fn plan_units<L: FileLookup>(
    paths: &[PathBuf],
    options: &AnalyzeOptions,
    lookup: L,
) -> Vec<AnalysisUnit> {
    let mut units = if options.test_continuous_file_names {
        ContinuousGrouper::new(lookup).group(paths)
    } else {
        paths.iter().cloned().map(AnalysisUnit::single).collect()
    };
    if let Some(limit) = options.max_files {
        if units.len() > limit {
            debug!(limit, planned = units.len(), "unit limit reached");
            units.truncate(limit);
        }
    }
    units
}
