// Domain models - Report, stream and field types shared by parsers and renderers

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::rules::FieldOrder;
use crate::error::{ProbeXError, ProbeXResult};

/// Kind of a stream inside a report
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum StreamKind {
    #[default]
    General,
    Video,
    Audio,
    Text,
    Image,
    Menu,
}

impl StreamKind {
    /// Every kind in report order
    pub const ALL: [StreamKind; 6] = [
        StreamKind::General,
        StreamKind::Video,
        StreamKind::Audio,
        StreamKind::Text,
        StreamKind::Image,
        StreamKind::Menu,
    ];

    /// Display name used in headings and renderer tags
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::General => "General",
            StreamKind::Video => "Video",
            StreamKind::Audio => "Audio",
            StreamKind::Text => "Text",
            StreamKind::Image => "Image",
            StreamKind::Menu => "Menu",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One name/value pair of a stream
///
/// The value is always text; the rank drives display order and is
/// independent of insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: String,
    #[serde(skip)]
    pub rank: usize,
}

/// A logical track or the General pseudo-track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    kind: StreamKind,
    /// 1-based position among the streams of the same kind
    number: usize,
    fields: Vec<Field>,
}

impl Stream {
    /// Create an empty stream of the given kind
    pub fn new(kind: StreamKind) -> Self {
        Self {
            kind,
            number: 1,
            fields: Vec::new(),
        }
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn number(&self) -> usize {
        self.number
    }

    pub(crate) fn set_number(&mut self, number: usize) {
        self.number = number;
    }

    /// Set a field, replacing any previous value under the same name
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(existing) = self.fields.iter_mut().find(|f| f.name == name) {
            existing.value = value;
            return;
        }
        let rank = FieldOrder::rank(self.kind, name, self.fields.len());
        self.fields.push(Field {
            name: name.to_string(),
            value,
            rank,
        });
    }

    /// Set a field only when a value is present
    pub fn set_opt<T: ToString>(&mut self, name: &str, value: Option<T>) {
        if let Some(value) = value {
            self.set(name, value.to_string());
        }
    }

    /// Get a field value by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    /// Get a field value parsed as a number
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.parse::<f64>().ok())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.fields.iter().position(|f| f.name == name)?;
        Some(self.fields.remove(index).value)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Sort fields into canonical display order
    pub(crate) fn sort_fields(&mut self) {
        self.fields.sort_by_key(|f| f.rank);
    }
}

/// Metadata report for one analysis unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    path: String,
    streams: Vec<Stream>,
}

impl Report {
    /// Build a report; the first stream must be the General stream
    pub(crate) fn new(path: String, streams: Vec<Stream>) -> Self {
        Self { path, streams }
    }

    /// Path of the file (or of the first file of a group)
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn streams(&self) -> &[Stream] {
        &self.streams
    }

    /// The General stream
    pub fn general(&self) -> Option<&Stream> {
        self.streams.iter().find(|s| s.kind == StreamKind::General)
    }

    /// Streams of one kind in discovery order
    pub fn streams_of(&self, kind: StreamKind) -> impl Iterator<Item = &Stream> {
        self.streams.iter().filter(move |s| s.kind == kind)
    }

    /// Number of streams of one kind
    pub fn count(&self, kind: StreamKind) -> usize {
        self.streams_of(kind).count()
    }

    /// Heading such as `Video` or `Audio #2`
    pub fn heading(&self, stream: &Stream) -> String {
        if stream.kind != StreamKind::General && self.count(stream.kind) > 1 {
            format!("{} #{}", stream.kind, stream.number)
        } else {
            stream.kind.to_string()
        }
    }

    /// A report is non-empty when its General stream carries at least one field
    pub fn is_empty(&self) -> bool {
        self.general().map(|g| g.is_empty()).unwrap_or(true)
    }
}

/// Name and version of the tool producing reports
///
/// Passed explicitly to renderers; never read from process-wide state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
}

impl AppInfo {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl Default for AppInfo {
    fn default() -> Self {
        Self::new("ProbeX", env!("CARGO_PKG_VERSION"))
    }
}

/// Options consumed by every parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeOptions {
    /// 0.0 relies on container summaries only, 1.0 forces exact computation
    pub parse_speed: f64,
    /// Merge sequentially numbered files into one unit
    pub test_continuous_file_names: bool,
    /// Stop after this many units
    pub max_files: Option<usize>,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            parse_speed: 0.5,
            test_continuous_file_names: false,
            max_files: None,
        }
    }
}

impl AnalyzeOptions {
    /// Create options with a validated parse speed
    pub fn with_parse_speed(parse_speed: f64) -> ProbeXResult<Self> {
        let options = Self {
            parse_speed,
            ..Self::default()
        };
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> ProbeXResult<()> {
        if !(0.0..=1.0).contains(&self.parse_speed) {
            return Err(ProbeXError::InvalidParseSpeed {
                value: self.parse_speed,
            });
        }
        Ok(())
    }

    /// Whether per-sample tables (stts, stsz, PES counts) may be walked at all
    pub fn walks_tables(&self) -> bool {
        self.parse_speed > 0.0
    }

    /// Maximum table entries walked; unbounded at full speed
    pub fn table_entry_budget(&self) -> usize {
        if self.parse_speed >= 1.0 {
            usize::MAX
        } else {
            (self.parse_speed * 1_000_000.0) as usize
        }
    }

    /// Bytes scanned at each end of a streamed container
    pub fn scan_window(&self, file_size: u64) -> u64 {
        const MIN_WINDOW: u64 = 1 << 20;
        if self.parse_speed >= 1.0 {
            return file_size;
        }
        let scaled = (file_size as f64 * self.parse_speed / 2.0) as u64;
        scaled.max(MIN_WINDOW).min(file_size)
    }
}
