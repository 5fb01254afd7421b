//! MPEG transport stream parser
//!
//! Packets are read from a head window and, on large files, a tail window
//! sized from the parse speed. PSI sections give the program layout; PES
//! headers on each elementary PID give the PTS extent. Payloads are only
//! peeked for well-known sequence and sync headers.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::{self, Read, Seek, SeekFrom};

use tracing::{debug, trace};

use crate::domain::model::{AnalyzeOptions, StreamKind};
use crate::probe::elementary::{apply_header, peek};
use crate::probe::pes::{parse_pes_header, StreamProbe};
use crate::probe::{hex_id, ContainerFacts, MenuFacts, TrackFacts};

pub mod psi;
pub mod stream_types;

use psi::{parse_pat, parse_pmt, parse_section, Pmt, PmtStream, SectionAssembler};
use stream_types::{classify, StreamClass};

pub const TS_PACKET_SIZE: usize = 188;
const SYNC_BYTE: u8 = 0x47;
const PAT_PID: u16 = 0x0000;
const NULL_PID: u16 = 0x1FFF;
/// PIDs below this carry tables, never elementary streams
const FIRST_ES_PID: u16 = 0x0020;
/// Packets read per chunk
const CHUNK_PACKETS: usize = 2048;

/// A byte range of the file scanned packet by packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub start: u64,
    pub end: u64,
    /// PES counts and byte totals are taken only in this region
    pub counting: bool,
}

/// Head and tail regions for a file whose first packet starts at `start`
pub fn scan_regions(
    start: u64,
    file_size: u64,
    packet_size: usize,
    options: &AnalyzeOptions,
) -> Vec<Region> {
    let span = file_size.saturating_sub(start);
    let window = options.scan_window(span);
    let counting = options.walks_tables();
    if window >= span {
        return vec![Region {
            start,
            end: file_size,
            counting,
        }];
    }
    let packet = packet_size as u64;
    let head_end = start + window / packet * packet;
    let tail_start = (start + (file_size - window - start) / packet * packet).max(head_end);
    vec![
        Region {
            start,
            end: head_end,
            counting,
        },
        Region {
            start: tail_start,
            end: file_size,
            counting: false,
        },
    ]
}

/// Parse a transport stream; `offset` is the first sync byte found by the sniffer
pub fn parse<R: Read + Seek>(
    reader: &mut R,
    file_size: u64,
    packet_size: usize,
    offset: usize,
    options: &AnalyzeOptions,
) -> io::Result<ContainerFacts> {
    let prefix = packet_size.saturating_sub(TS_PACKET_SIZE);
    let start = offset.saturating_sub(prefix) as u64;
    let mut demux = Demux::default();

    for (index, region) in scan_regions(start, file_size, packet_size, options)
        .into_iter()
        .enumerate()
    {
        if index > 0 {
            demux.discontinuity();
        }
        let skipped = scan_region(reader, region, packet_size, |packet| {
            demux.packet(packet, region.counting)
        })?;
        debug!(
            start = region.start,
            end = region.end,
            skipped,
            "scanned transport region"
        );
    }

    Ok(demux.into_facts(packet_size))
}

/// Visit every aligned 188-byte packet in `region`, resynchronising on lost sync
///
/// Returns the number of bytes skipped while searching for sync.
fn scan_region<R, F>(reader: &mut R, region: Region, packet_size: usize, mut visit: F) -> io::Result<u64>
where
    R: Read + Seek,
    F: FnMut(&[u8]),
{
    let prefix = packet_size - TS_PACKET_SIZE;
    reader.seek(SeekFrom::Start(region.start))?;
    let mut remaining = region.end.saturating_sub(region.start);
    let mut buf: Vec<u8> = Vec::with_capacity(packet_size * CHUNK_PACKETS);
    let mut cursor = 0usize;
    let mut locked = false;
    let mut skipped = 0u64;

    loop {
        if buf.len() - cursor < 2 * packet_size && remaining > 0 {
            buf.drain(..cursor);
            cursor = 0;
            let want = ((packet_size * CHUNK_PACKETS) as u64).min(remaining);
            let read = reader.by_ref().take(want).read_to_end(&mut buf)?;
            remaining = if read == 0 { 0 } else { remaining - read as u64 };
        }
        if buf.len() - cursor < packet_size {
            break;
        }
        let sync = cursor + prefix;
        let next_in_sync = buf
            .get(sync + packet_size)
            .map_or(true, |byte| *byte == SYNC_BYTE);
        if buf[sync] == SYNC_BYTE && (locked || next_in_sync) {
            locked = true;
            visit(&buf[sync..sync + TS_PACKET_SIZE]);
            cursor += packet_size;
        } else {
            if locked {
                trace!(position = region.start + skipped, "lost transport sync");
            }
            locked = false;
            cursor += 1;
            skipped += 1;
        }
    }
    Ok(skipped)
}

/// Demultiplexer state over all scanned packets
#[derive(Debug, Default)]
struct Demux {
    /// Program number to PMT PID
    programs: BTreeMap<u16, u16>,
    pmts: HashMap<u16, Pmt>,
    sections: HashMap<u16, SectionAssembler>,
    streams: HashMap<u16, StreamProbe>,
}

impl Demux {
    fn packet(&mut self, packet: &[u8], counting: bool) {
        // transport_error_indicator
        if packet[1] & 0x80 != 0 {
            return;
        }
        let unit_start = packet[1] & 0x40 != 0;
        let pid = u16::from_be_bytes([packet[1] & 0x1F, packet[2]]);
        let adaptation = (packet[3] >> 4) & 0x03;
        if adaptation & 0x01 == 0 {
            return;
        }
        let payload_start = if adaptation & 0x02 != 0 {
            5 + packet[4] as usize
        } else {
            4
        };
        let Some(payload) = packet.get(payload_start..).filter(|p| !p.is_empty()) else {
            return;
        };

        if pid == PAT_PID || self.is_pmt_pid(pid) {
            self.section_payload(pid, payload, unit_start);
        } else if self.programs.is_empty() {
            // Before the PAT a PMT PID cannot be told apart from a stream
            trace!(pid, "payload before PAT dropped");
        } else if pid >= FIRST_ES_PID && pid != NULL_PID {
            self.elementary_payload(pid, payload, unit_start, counting);
        }
    }

    fn is_pmt_pid(&self, pid: u16) -> bool {
        self.programs.values().any(|pmt_pid| *pmt_pid == pid)
    }

    fn section_payload(&mut self, pid: u16, payload: &[u8], unit_start: bool) {
        let sections = self.sections.entry(pid).or_default().push(payload, unit_start);
        for data in sections {
            match parse_section(&data) {
                Ok(section) if pid == PAT_PID => match parse_pat(&section) {
                    Ok(programs) => self.programs.extend(programs),
                    Err(error) => debug!(%error, "PAT skipped"),
                },
                Ok(section) => match parse_pmt(&section) {
                    Ok(pmt) if self.programs.get(&pmt.program_number) == Some(&pid) => {
                        self.pmts.insert(pmt.program_number, pmt);
                    }
                    Ok(pmt) => trace!(program = pmt.program_number, pid, "PMT on unexpected PID"),
                    Err(error) => debug!(pid, %error, "PMT skipped"),
                },
                Err(error) => debug!(pid, %error, "section skipped"),
            }
        }
    }

    fn elementary_payload(&mut self, pid: u16, payload: &[u8], unit_start: bool, counting: bool) {
        let probe = self.streams.entry(pid).or_default();
        if unit_start && payload.starts_with(&[0x00, 0x00, 0x01]) {
            match parse_pes_header(payload) {
                Ok(header) => {
                    let body = payload.get(header.header_len..).unwrap_or_default();
                    probe.start_unit(header.pts, body, counting);
                }
                Err(error) => trace!(pid, %error, "unreadable PES header"),
            }
        } else if !unit_start {
            probe.continue_unit(payload, counting);
        }
    }

    /// Reset per-region state before jumping to a distant part of the file
    fn discontinuity(&mut self) {
        self.sections.clear();
        for probe in self.streams.values_mut() {
            probe.timeline.mark_discontinuity();
        }
    }

    fn into_facts(self, packet_size: usize) -> ContainerFacts {
        let mut facts = ContainerFacts::new(if packet_size == 192 { "BDAV" } else { "MPEG-TS" });
        let mut reported = HashSet::new();

        for (&program_number, &pmt_pid) in &self.programs {
            let Some(pmt) = self.pmts.get(&program_number) else {
                debug!(program_number, "program without PMT");
                continue;
            };
            let hdmv = packet_size == 192 || pmt.registration == Some(*b"HDMV");
            let mut formats = Vec::new();
            for stream in &pmt.streams {
                let Some(probe) = self.streams.get(&stream.pid).filter(|p| p.has_headers()) else {
                    continue;
                };
                let Some(class) = classify(stream.stream_type, &stream.descriptors, hdmv) else {
                    trace!(pid = stream.pid, stream_type = stream.stream_type, "unclassified stream");
                    continue;
                };
                if !reported.insert(stream.pid) {
                    continue;
                }
                let track = track_facts(stream, class, probe, program_number);
                formats.extend(track.format.clone());
                facts.tracks.push(track);
            }
            if !formats.is_empty() {
                facts.menus.push(MenuFacts {
                    id: Some(hex_id(pmt_pid as u64)),
                    menu_id: Some(hex_id(program_number as u64)),
                    format: Some(formats.join(" / ")),
                    chapters: Vec::new(),
                });
            }
        }

        facts.duration = facts.longest_track_duration().or_else(|| {
            self.streams
                .values()
                .filter_map(|probe| probe.timeline.duration())
                .reduce(f64::max)
        });
        facts
    }
}

fn track_facts(
    stream: &PmtStream,
    class: StreamClass,
    probe: &StreamProbe,
    program_number: u16,
) -> TrackFacts {
    let mut track = TrackFacts::new(class.kind);
    track.id = Some(hex_id(stream.pid as u64));
    track.menu_id = Some(hex_id(program_number as u64));
    track.format = Some(class.format.to_string());
    track.format_profile = class.profile.map(str::to_string);
    track.language = stream.descriptors.language.clone();
    track.duration = probe.timeline.duration();

    if let Some(header) = peek(class.header, probe.peek_bytes()) {
        apply_header(&mut track, &header);
    }
    let measured = probe.timeline.bit_rate();
    track.bit_rate = match class.kind {
        // Sequence headers carry a ceiling, not the average
        StreamKind::Video => measured.or(track.bit_rate),
        _ => track.bit_rate.or(measured),
    };
    if class.kind == StreamKind::Video && track.frame_rate.is_none() {
        track.frame_rate = probe.timeline.estimated_frame_rate();
    }
    track
}

#[cfg(test)]
mod tests;
