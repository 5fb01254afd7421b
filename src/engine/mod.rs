//! Per-unit analysis engine
//!
//! A unit is one file, or a group of continuous files. Each file is sniffed
//! once, handed to the parser of its container family, and the resulting
//! facts are merged and assembled into a single [`Report`].

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::domain::model::{AnalyzeOptions, Report};
use crate::error::{ProbeXError, ProbeXResult};
use crate::probe::{self, sniff, ContainerFacts, ContainerFormat};

pub mod assembler;

pub use assembler::{ReportAssembler, SourceInfo};

/// Read buffer for parsers; they seek often, so it stays small
const READ_BUFFER: usize = 64 * 1024;

/// One logical analysis unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisUnit {
    /// Member files in sequence order; never empty
    paths: Vec<PathBuf>,
}

impl AnalysisUnit {
    pub fn single(path: impl Into<PathBuf>) -> Self {
        Self {
            paths: vec![path.into()],
        }
    }

    /// A group of continuous files; `None` when `paths` is empty
    pub fn group(paths: Vec<PathBuf>) -> Option<Self> {
        (!paths.is_empty()).then_some(Self { paths })
    }

    /// The file representing the unit in reports
    pub fn primary(&self) -> &Path {
        &self.paths[0]
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn is_group(&self) -> bool {
        self.paths.len() > 1
    }
}

/// What was read from one member file
#[derive(Debug)]
struct FileProbe {
    size: u64,
    modified: Option<DateTime<Utc>>,
    format: ContainerFormat,
    facts: ContainerFacts,
}

/// Analyze one unit: sniff, parse and assemble
///
/// Only I/O failures are errors. Unknown formats and structural faults
/// still produce a report with whatever could be extracted.
pub fn analyze_unit(unit: &AnalysisUnit, options: &AnalyzeOptions) -> ProbeXResult<Report> {
    let mut probes = Vec::with_capacity(unit.paths.len());
    for path in &unit.paths {
        probes.push(probe_file(path, options)?);
    }

    let size = probes.iter().map(|p| p.size).sum();
    let modified = probes[0].modified;
    let format = probes[0].format;
    let mut members = probes.into_iter().map(|p| p.facts);
    let first = members.next().unwrap_or_default();
    let facts = members.fold(first, merge_facts);

    info!(
        path = %unit.primary().display(),
        format = format.name(),
        files = unit.paths.len(),
        tracks = facts.tracks.len(),
        "analyzed unit"
    );

    let source = SourceInfo {
        complete_name: unit.primary().display().to_string(),
        file_size: size,
        modified,
    };
    Ok(ReportAssembler::new(source).assemble(&facts))
}

fn probe_file(path: &Path, options: &AnalyzeOptions) -> ProbeXResult<FileProbe> {
    let name = path.display().to_string();
    let file = File::open(path).map_err(|e| ProbeXError::io(name.clone(), e))?;
    let metadata = file
        .metadata()
        .map_err(|e| ProbeXError::io(name.clone(), e))?;
    let size = metadata.len();
    let modified = metadata.modified().ok().map(DateTime::<Utc>::from);

    let mut reader = BufReader::with_capacity(READ_BUFFER, file);
    let format = sniff(&mut reader).map_err(|e| ProbeXError::io(name.clone(), e))?;
    debug!(path = %name, format = format.name(), size, "parsing file");

    let facts = match format {
        ContainerFormat::Mp4 => probe::mp4::parse(&mut reader, size, options),
        ContainerFormat::Matroska => probe::matroska::parse(&mut reader, size, options),
        ContainerFormat::MpegTs {
            packet_size,
            offset,
        } => probe::mpegts::parse(&mut reader, size, packet_size, offset, options),
        ContainerFormat::MpegPs => probe::mpegps::parse(&mut reader, size, options),
        ContainerFormat::Unknown => Ok(ContainerFacts::default()),
    }
    .map_err(|e| ProbeXError::io(name, e))?;

    Ok(FileProbe {
        size,
        modified,
        format,
        facts,
    })
}

/// Fold a later member of a group into the facts of the first one
///
/// Durations, frame counts and stream sizes add up; tracks are paired by
/// position when their kinds agree.
fn merge_facts(mut merged: ContainerFacts, next: ContainerFacts) -> ContainerFacts {
    merged.duration = add(merged.duration, next.duration);
    // Recomputed from the summed size
    merged.overall_bit_rate = None;
    for (track, other) in merged.tracks.iter_mut().zip(&next.tracks) {
        if track.kind != other.kind {
            continue;
        }
        track.duration = add(track.duration, other.duration);
        track.frame_count = add(track.frame_count, other.frame_count);
        track.stream_size = add(track.stream_size, other.stream_size);
    }
    merged
}

fn add<T: std::ops::Add<Output = T>>(a: Option<T>, b: Option<T>) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a + b),
        (a, b) => a.or(b),
    }
}
