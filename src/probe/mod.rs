//! Container inspection: format sniffing and the per-format parsers
//!
//! Each parser turns a seekable byte source into [`ContainerFacts`], an
//! owned, format-neutral summary that the report assembler maps onto the
//! report model. Parsers never keep the input buffers they read.

use serde::{Deserialize, Serialize};

use crate::domain::model::StreamKind;

pub mod elementary;
pub mod matroska;
pub mod mp4;
pub mod mpegps;
pub mod mpegts;
pub mod pes;
pub mod reader;
pub mod sniffer;

pub use reader::{ParseError, ParseResult};
pub use sniffer::{sniff, sniff_path};

/// Container classification chosen once by the sniffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerFormat {
    /// Box-structured (MP4, MOV, 3GP, M4A)
    Mp4,
    /// EBML-structured (Matroska, WebM)
    Matroska,
    /// Transport packets; `packet_size` is 188 or 192, `offset` the first sync byte
    MpegTs { packet_size: usize, offset: usize },
    /// Packetized program stream (MPG, VOB)
    MpegPs,
    Unknown,
}

impl ContainerFormat {
    /// Short family name used by the `detect` command and in logs
    pub fn name(&self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "MPEG-4",
            ContainerFormat::Matroska => "Matroska",
            ContainerFormat::MpegTs { packet_size: 192, .. } => "BDAV",
            ContainerFormat::MpegTs { .. } => "MPEG-TS",
            ContainerFormat::MpegPs => "MPEG-PS",
            ContainerFormat::Unknown => "Unknown",
        }
    }
}

/// Frame rate mode of a video track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRateMode {
    Constant,
    Variable,
}

impl FrameRateMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameRateMode::Constant => "CFR",
            FrameRateMode::Variable => "VFR",
        }
    }
}

/// Facts extracted for one track
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackFacts {
    pub kind: StreamKind,
    pub id: Option<String>,
    pub menu_id: Option<String>,
    pub format: Option<String>,
    pub format_profile: Option<String>,
    pub codec_id: Option<String>,
    /// Seconds
    pub duration: Option<f64>,
    /// Bits per second
    pub bit_rate: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Display width / height when it differs from the coded geometry
    pub display_aspect: Option<f64>,
    pub frame_rate: Option<f64>,
    pub frame_rate_mode: Option<FrameRateMode>,
    pub frame_count: Option<u64>,
    pub scan_type: Option<String>,
    pub channels: Option<u32>,
    /// Hertz
    pub sample_rate: Option<f64>,
    pub bit_depth: Option<u32>,
    /// Bytes
    pub stream_size: Option<u64>,
    pub title: Option<String>,
    pub language: Option<String>,
    pub default: Option<bool>,
    pub forced: Option<bool>,
}

impl TrackFacts {
    pub fn new(kind: StreamKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }
}

/// A program, edition or chapter list surfaced as a Menu stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MenuFacts {
    pub id: Option<String>,
    pub menu_id: Option<String>,
    pub format: Option<String>,
    /// (start in seconds, chapter name)
    pub chapters: Vec<(f64, String)>,
}

/// Everything a parser extracted from one file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerFacts {
    pub format: Option<String>,
    pub format_version: Option<String>,
    pub format_profile: Option<String>,
    pub codec_id: Option<String>,
    /// Seconds
    pub duration: Option<f64>,
    pub overall_bit_rate: Option<f64>,
    pub title: Option<String>,
    pub recorded_date: Option<String>,
    pub encoded_date: Option<String>,
    pub tagged_date: Option<String>,
    pub writing_application: Option<String>,
    pub writing_library: Option<String>,
    pub attachments: Vec<String>,
    pub tracks: Vec<TrackFacts>,
    pub menus: Vec<MenuFacts>,
}

impl ContainerFacts {
    pub fn new(format: &str) -> Self {
        Self {
            format: Some(format.to_string()),
            ..Self::default()
        }
    }

    /// Longest track duration, used when the container has no global one
    pub fn longest_track_duration(&self) -> Option<f64> {
        self.tracks
            .iter()
            .filter_map(|t| t.duration)
            .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |a| a.max(d))))
    }
}

/// Format an elementary-stream or track identifier as `256 (0x100)`
pub fn hex_id(value: u64) -> String {
    format!("{} (0x{:X})", value, value)
}
