//! MPEG program stream parser (MPG, VOB)
//!
//! The stream is scanned for `00 00 01` start codes. Pack headers give the
//! MPEG version; PES packets on video, audio and private stream 1 feed one
//! [`StreamProbe`] per stream (or per DVD substream).

use std::collections::HashMap;
use std::io::{self, Read, Seek, SeekFrom};

use tracing::{debug, trace};

use crate::domain::model::{AnalyzeOptions, StreamKind};
use crate::probe::elementary::{apply_header, peek, HeaderKind};
use crate::probe::pes::{parse_pes_header, StreamProbe};
use crate::probe::{hex_id, ContainerFacts, TrackFacts};

const PACK_START: u8 = 0xBA;
const PROGRAM_END: u8 = 0xB9;
const PRIVATE_STREAM_1: u8 = 0xBD;
/// Start code plus the packet length field
const PES_PREFIX_LEN: usize = 6;
/// Longest PES header: prefix, flags and a 255-byte header data field
const MAX_PES_HEADER: usize = PES_PREFIX_LEN + 3 + 255;
/// Bytes read per refill
const CHUNK_SIZE: usize = 256 * 1024;

/// Stream id, plus the substream id for private stream 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct StreamKey {
    stream_id: u8,
    substream: Option<u8>,
}

impl StreamKey {
    fn id(&self) -> String {
        match self.substream {
            Some(sub) => format!("{}-{}", hex_id(self.stream_id as u64), hex_id(sub as u64)),
            None => hex_id(self.stream_id as u64),
        }
    }

    /// Kind, format and header peek for a stream, `None` for streams not reported
    fn classify(&self) -> Option<(StreamKind, &'static str, HeaderKind)> {
        let class = match (self.stream_id, self.substream) {
            (0xE0..=0xEF, None) => (StreamKind::Video, "MPEG Video", HeaderKind::MpegVideo),
            (0xC0..=0xDF, None) => (StreamKind::Audio, "MPEG Audio", HeaderKind::MpegAudio),
            (PRIVATE_STREAM_1, Some(0x80..=0x87)) => (StreamKind::Audio, "AC-3", HeaderKind::Ac3),
            (PRIVATE_STREAM_1, Some(0x88..=0x8F)) => (StreamKind::Audio, "DTS", HeaderKind::None),
            (PRIVATE_STREAM_1, Some(0xA0..=0xAF)) => {
                (StreamKind::Audio, "PCM", HeaderKind::DvdLpcm)
            }
            (PRIVATE_STREAM_1, Some(0x20..=0x3F)) => (StreamKind::Text, "RLE", HeaderKind::None),
            _ => return None,
        };
        Some(class)
    }
}

/// Parse a program stream into container facts
pub fn parse<R: Read + Seek>(
    reader: &mut R,
    file_size: u64,
    options: &AnalyzeOptions,
) -> io::Result<ContainerFacts> {
    let window = options.scan_window(file_size);
    let counting = options.walks_tables();
    let mut regions = vec![(0, window.min(file_size), counting)];
    if window < file_size {
        regions.push(((file_size - window).max(window), file_size, false));
    }

    let mut demux = Demux::default();
    for (index, (start, end, counting)) in regions.into_iter().enumerate() {
        if index > 0 {
            demux.discontinuity();
        }
        let mut scanner = Scanner::new(reader, start, end)?;
        demux.scan(&mut scanner, counting)?;
        debug!(start, end, "scanned program stream region");
    }
    Ok(demux.into_facts())
}

/// Buffered sequential reader over one region
struct Scanner<'r, R> {
    reader: &'r mut R,
    buf: Vec<u8>,
    cursor: usize,
    remaining: u64,
}

impl<'r, R: Read + Seek> Scanner<'r, R> {
    fn new(reader: &'r mut R, start: u64, end: u64) -> io::Result<Self> {
        reader.seek(SeekFrom::Start(start))?;
        Ok(Self {
            reader,
            buf: Vec::with_capacity(CHUNK_SIZE),
            cursor: 0,
            remaining: end.saturating_sub(start),
        })
    }

    fn available(&self) -> &[u8] {
        &self.buf[self.cursor..]
    }

    /// Make at least `wanted` bytes available; false at the end of the region
    fn fill(&mut self, wanted: usize) -> io::Result<bool> {
        while self.buf.len() - self.cursor < wanted && self.remaining > 0 {
            self.buf.drain(..self.cursor);
            self.cursor = 0;
            let want = (CHUNK_SIZE.max(wanted) as u64).min(self.remaining);
            let read = self.reader.by_ref().take(want).read_to_end(&mut self.buf)?;
            if read == 0 {
                self.remaining = 0;
            } else {
                self.remaining -= read as u64;
            }
        }
        Ok(self.buf.len() - self.cursor >= wanted)
    }

    fn skip(&mut self, count: usize) -> io::Result<()> {
        let available = self.buf.len() - self.cursor;
        if count <= available {
            self.cursor += count;
            return Ok(());
        }
        let beyond = ((count - available) as u64).min(self.remaining);
        self.buf.clear();
        self.cursor = 0;
        self.reader.seek(SeekFrom::Current(beyond as i64))?;
        self.remaining -= beyond;
        Ok(())
    }

    /// Move to the next `00 00 01 xx` and return `xx`
    fn next_start_code(&mut self) -> io::Result<Option<u8>> {
        loop {
            if !self.fill(4)? {
                return Ok(None);
            }
            let window = self.available();
            let searchable = &window[..window.len() - 1];
            match searchable.windows(3).position(|w| w == [0x00, 0x00, 0x01]) {
                Some(found) => {
                    self.cursor += found;
                    return Ok(Some(self.buf[self.cursor + 3]));
                }
                // Keep a possible partial start code for the next refill
                None => {
                    let keep_from = window.len() - 3;
                    self.cursor += keep_from;
                }
            }
        }
    }
}

enum Pack {
    Header { len: usize, version: u8 },
    Invalid,
    Incomplete,
}

/// Classify the pack header at the start of `data`
fn pack_header(data: &[u8]) -> Pack {
    match data.get(4) {
        // MPEG-2: 14 bytes plus up to 7 stuffing bytes
        Some(b) if b & 0xC0 == 0x40 => match data.get(13) {
            Some(stuffing) => Pack::Header {
                len: 14 + (stuffing & 0x07) as usize,
                version: 2,
            },
            None => Pack::Incomplete,
        },
        Some(b) if b & 0xF0 == 0x20 => Pack::Header { len: 12, version: 1 },
        Some(_) => Pack::Invalid,
        None => Pack::Incomplete,
    }
}

#[derive(Debug, Default)]
struct Demux {
    mpeg_version: Option<u8>,
    /// Discovery order
    order: Vec<StreamKey>,
    streams: HashMap<StreamKey, StreamProbe>,
    /// A pack header has been seen in the current region
    synced: bool,
}

impl Demux {
    fn scan<R: Read + Seek>(&mut self, scanner: &mut Scanner<'_, R>, counting: bool) -> io::Result<()> {
        while let Some(id) = scanner.next_start_code()? {
            match id {
                PACK_START => {
                    scanner.fill(14)?;
                    match pack_header(scanner.available()) {
                        Pack::Header { len, version } => {
                            self.mpeg_version.get_or_insert(version);
                            self.synced = true;
                            scanner.skip(len)?;
                        }
                        Pack::Invalid => scanner.skip(4)?,
                        Pack::Incomplete => break,
                    }
                }
                PROGRAM_END => scanner.skip(4)?,
                0xBB..=0xFF => {
                    if !scanner.fill(PES_PREFIX_LEN)? {
                        break;
                    }
                    let data = scanner.available();
                    let length = u16::from_be_bytes([data[4], data[5]]) as usize;
                    let is_media = matches!(id, PRIVATE_STREAM_1 | 0xC0..=0xEF);
                    let total = if length == 0 {
                        MAX_PES_HEADER
                    } else {
                        PES_PREFIX_LEN + length
                    };
                    if is_media && self.synced {
                        scanner.fill(total)?;
                        let data = scanner.available();
                        let packet = &data[..total.min(data.len())];
                        let consumed = self.pes(id, packet, length == 0, counting);
                        scanner.skip(consumed.unwrap_or(PES_PREFIX_LEN + length))?;
                    } else {
                        scanner.skip(PES_PREFIX_LEN + length)?;
                    }
                }
                // Start codes inside elementary payloads
                _ => scanner.skip(1)?,
            }
        }
        Ok(())
    }

    /// Record one PES packet; returns the bytes consumed when the packet is unbounded
    fn pes(&mut self, stream_id: u8, packet: &[u8], unbounded: bool, counting: bool) -> Option<usize> {
        let header = match parse_pes_header(packet) {
            Ok(header) => header,
            Err(error) => {
                trace!(stream_id, %error, "unreadable PES header");
                return None;
            }
        };
        let payload = if unbounded {
            &[][..]
        } else {
            packet.get(header.header_len..).unwrap_or_default()
        };
        let substream = if stream_id == PRIVATE_STREAM_1 {
            Some(*payload.first()?)
        } else {
            None
        };
        let key = StreamKey {
            stream_id,
            substream,
        };
        if key.classify().is_some() {
            if !self.streams.contains_key(&key) {
                self.order.push(key);
            }
            self.streams
                .entry(key)
                .or_default()
                .start_unit(header.pts, payload, counting);
        }
        unbounded.then_some(header.header_len)
    }

    fn discontinuity(&mut self) {
        self.synced = false;
        for probe in self.streams.values_mut() {
            probe.timeline.mark_discontinuity();
        }
    }

    fn into_facts(self) -> ContainerFacts {
        let mut facts = ContainerFacts::new("MPEG-PS");
        facts.format_version = self.mpeg_version.map(|v| format!("Version {}", v));

        for key in &self.order {
            let (Some(probe), Some((kind, format, header_kind))) =
                (self.streams.get(key), key.classify())
            else {
                continue;
            };
            let mut track = TrackFacts::new(kind);
            track.id = Some(key.id());
            track.format = Some(format.to_string());
            track.duration = probe.timeline.duration();
            if let Some(header) = peek(header_kind, probe.peek_bytes()) {
                apply_header(&mut track, &header);
            }
            let measured = probe.timeline.bit_rate();
            track.bit_rate = match kind {
                StreamKind::Video => measured.or(track.bit_rate),
                _ => track.bit_rate.or(measured),
            };
            if kind == StreamKind::Video && track.frame_rate.is_none() {
                track.frame_rate = probe.timeline.estimated_frame_rate();
            }
            facts.tracks.push(track);
        }

        facts.duration = facts.longest_track_duration();
        facts
    }
}

#[cfg(test)]
mod tests;
