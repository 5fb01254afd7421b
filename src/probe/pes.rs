//! PES header decoding and presentation-time tracking
//!
//! Shared by the transport and program stream parsers. Only headers are
//! read; payloads are never decoded.

use crate::probe::reader::{ParseError, ParseResult};

/// PTS clock rate
pub const PTS_CLOCK: f64 = 90_000.0;

/// PTS values are 33 bits wide
const PTS_MODULO: u64 = 1 << 33;

/// A jump back by more than half the range is a wrap, not reordering
const WRAP_THRESHOLD: u64 = 1 << 32;

/// Decoded fields of a PES header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PesHeader {
    pub stream_id: u8,
    /// Value of the 16-bit length field (0 = unbounded)
    pub packet_length: u16,
    pub pts: Option<u64>,
    /// Offset of the first payload byte from the start code
    pub header_len: usize,
}

/// Stream ids that carry the optional PES header
pub fn has_optional_header(stream_id: u8) -> bool {
    !matches!(stream_id, 0xBC | 0xBE | 0xBF | 0xF0 | 0xF1 | 0xF2 | 0xF8 | 0xFF)
}

/// Parse a PES header starting at its `00 00 01` start code
///
/// Handles the MPEG-2 layout (`10` marker bits) and the MPEG-1 system
/// stream layout (stuffing, STD buffer, PTS/DTS markers).
pub fn parse_pes_header(data: &[u8]) -> ParseResult<PesHeader> {
    if data.len() < 6 {
        return Err(ParseError::Truncated {
            what: "PES header",
            needed: 6,
            available: data.len(),
        });
    }
    if data[0] != 0 || data[1] != 0 || data[2] != 1 {
        return Err(ParseError::malformed("PES header", "missing start code"));
    }
    let stream_id = data[3];
    let packet_length = u16::from_be_bytes([data[4], data[5]]);

    if !has_optional_header(stream_id) {
        return Ok(PesHeader {
            stream_id,
            packet_length,
            pts: None,
            header_len: 6,
        });
    }

    if data.len() > 6 && data[6] & 0xC0 == 0x80 {
        parse_mpeg2_header(data, stream_id, packet_length)
    } else {
        parse_mpeg1_header(data, stream_id, packet_length)
    }
}

fn parse_mpeg2_header(data: &[u8], stream_id: u8, packet_length: u16) -> ParseResult<PesHeader> {
    if data.len() < 9 {
        return Err(ParseError::Truncated {
            what: "PES optional header",
            needed: 9,
            available: data.len(),
        });
    }
    let pts_dts_flags = data[7] >> 6;
    let header_len = 9 + data[8] as usize;
    if header_len > data.len() {
        return Err(ParseError::Truncated {
            what: "PES optional header",
            needed: header_len,
            available: data.len(),
        });
    }
    let pts = if pts_dts_flags & 0b10 != 0 && header_len >= 14 {
        decode_timestamp(&data[9..14])
    } else {
        None
    };
    Ok(PesHeader {
        stream_id,
        packet_length,
        pts,
        header_len,
    })
}

fn parse_mpeg1_header(data: &[u8], stream_id: u8, packet_length: u16) -> ParseResult<PesHeader> {
    let truncated = |needed: usize| ParseError::Truncated {
        what: "MPEG-1 packet header",
        needed,
        available: data.len(),
    };

    let mut pos = 6;
    // Up to 16 stuffing bytes
    while pos < data.len() && data[pos] == 0xFF && pos < 6 + 16 {
        pos += 1;
    }
    if pos >= data.len() {
        return Err(truncated(pos + 1));
    }
    if data[pos] & 0xC0 == 0x40 {
        pos += 2;
    }
    if pos >= data.len() {
        return Err(truncated(pos + 1));
    }
    let marker = data[pos] & 0xF0;
    let (pts, consumed) = match marker {
        0x20 => {
            if data.len() < pos + 5 {
                return Err(truncated(pos + 5));
            }
            (decode_timestamp(&data[pos..pos + 5]), 5)
        }
        0x30 => {
            if data.len() < pos + 10 {
                return Err(truncated(pos + 10));
            }
            (decode_timestamp(&data[pos..pos + 5]), 10)
        }
        _ if data[pos] == 0x0F => (None, 1),
        _ => {
            return Err(ParseError::malformed(
                "MPEG-1 packet header",
                format!("unexpected marker byte 0x{:02X}", data[pos]),
            ))
        }
    };
    Ok(PesHeader {
        stream_id,
        packet_length,
        pts,
        header_len: pos + consumed,
    })
}

/// Decode a 33-bit timestamp from its 5-byte marker-bit layout
///
/// Returns `None` when a marker bit is cleared.
pub fn decode_timestamp(bytes: &[u8]) -> Option<u64> {
    if bytes.len() < 5 {
        return None;
    }
    if bytes[0] & 0x01 == 0 || bytes[2] & 0x01 == 0 || bytes[4] & 0x01 == 0 {
        return None;
    }
    let high = ((bytes[0] >> 1) & 0x07) as u64;
    let mid = (((bytes[1] as u64) << 8) | bytes[2] as u64) >> 1;
    let low = (((bytes[3] as u64) << 8) | bytes[4] as u64) >> 1;
    Some((high << 30) | (mid << 15) | low)
}

/// Encode a timestamp with the given 4-bit prefix; used by fixtures and tests
pub fn encode_timestamp(prefix: u8, pts: u64) -> [u8; 5] {
    let pts = pts % PTS_MODULO;
    [
        (prefix << 4) | (((pts >> 30) as u8 & 0x07) << 1) | 1,
        (pts >> 22) as u8,
        (((pts >> 15) as u8 & 0x7F) << 1) | 1,
        (pts >> 7) as u8,
        ((pts as u8 & 0x7F) << 1) | 1,
    ]
}

/// Running PTS extent and PES statistics for one elementary stream
#[derive(Debug, Clone, Default)]
pub struct PtsTimeline {
    wraps: u64,
    previous: Option<u64>,
    min: Option<u64>,
    max: Option<u64>,
    counted_min: Option<u64>,
    counted_max: Option<u64>,
    /// PES headers seen in the counted region
    pub pes_count: u64,
    /// Payload bytes seen in the counted region
    pub counted_bytes: u64,
    /// Any valid PES header seen at all
    pub headers: u64,
}

impl PtsTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one valid PES header; `counting` marks the contiguous region
    pub fn observe_header(&mut self, pts: Option<u64>, counting: bool) {
        self.headers += 1;
        if counting {
            self.pes_count += 1;
        }
        let Some(raw) = pts else {
            return;
        };
        let mut value = raw + self.wraps * PTS_MODULO;
        if let Some(previous) = self.previous {
            if value + WRAP_THRESHOLD < previous {
                self.wraps += 1;
                value += PTS_MODULO;
            }
        }
        self.previous = Some(value);
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
        if counting {
            self.counted_min = Some(self.counted_min.map_or(value, |m| m.min(value)));
            self.counted_max = Some(self.counted_max.map_or(value, |m| m.max(value)));
        }
    }

    /// Forget the previous value before jumping to a distant region
    pub fn mark_discontinuity(&mut self) {
        if let Some(previous) = self.previous {
            // Keep wrap detection working against the furthest point seen
            self.previous = Some(previous.max(self.max.unwrap_or(previous)));
        }
    }

    pub fn add_bytes(&mut self, bytes: usize, counting: bool) {
        if counting {
            self.counted_bytes += bytes as u64;
        }
    }

    pub fn first_pts(&self) -> Option<u64> {
        self.min
    }

    /// Seconds between the lowest and highest PTS
    pub fn duration(&self) -> Option<f64> {
        span(self.min, self.max)
    }

    /// Seconds covered by the counted region
    pub fn counted_duration(&self) -> Option<f64> {
        span(self.counted_min, self.counted_max)
    }

    /// Payload bit rate over the counted region
    pub fn bit_rate(&self) -> Option<f64> {
        let seconds = self.counted_duration()?;
        if self.counted_bytes == 0 {
            return None;
        }
        Some(self.counted_bytes as f64 * 8.0 / seconds)
    }

    /// PES count over PTS span; approximate because access units are not parsed
    pub fn estimated_frame_rate(&self) -> Option<f64> {
        let seconds = self.counted_duration()?;
        if self.pes_count < 2 {
            return None;
        }
        Some((self.pes_count - 1) as f64 / seconds)
    }
}

fn span(min: Option<u64>, max: Option<u64>) -> Option<f64> {
    match (min, max) {
        (Some(min), Some(max)) if max > min => Some((max - min) as f64 / PTS_CLOCK),
        _ => None,
    }
}

/// Payload bytes kept per stream for header peeks
pub const PEEK_LIMIT: usize = 64 * 1024;

/// Timeline and leading payload bytes of one elementary stream
#[derive(Debug, Clone, Default)]
pub struct StreamProbe {
    pub timeline: PtsTimeline,
    peek: Vec<u8>,
}

impl StreamProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// A PES header was read; `payload` is what follows it
    pub fn start_unit(&mut self, pts: Option<u64>, payload: &[u8], counting: bool) {
        self.timeline.observe_header(pts, counting);
        self.take_payload(payload, counting);
    }

    /// Continuation bytes of the current PES packet
    pub fn continue_unit(&mut self, payload: &[u8], counting: bool) {
        if self.has_headers() {
            self.take_payload(payload, counting);
        }
    }

    fn take_payload(&mut self, payload: &[u8], counting: bool) {
        self.timeline.add_bytes(payload.len(), counting);
        let room = PEEK_LIMIT.saturating_sub(self.peek.len());
        self.peek
            .extend_from_slice(&payload[..room.min(payload.len())]);
    }

    /// At least one valid PES header was seen
    pub fn has_headers(&self) -> bool {
        self.timeline.headers > 0
    }

    pub fn peek_bytes(&self) -> &[u8] {
        &self.peek
    }
}
