//! MP4-family (ISO base media / QuickTime) parser
//!
//! Top-level boxes are visited by seeking so that `mdat` is never read. The
//! `moov` box is loaded into memory and descended with [`boxes::visit_children`],
//! which bounds every frame by its parent's slice and by [`boxes::MAX_DEPTH`].

use std::io::{self, Read, Seek, SeekFrom};

use tracing::{debug, warn};

use crate::domain::model::AnalyzeOptions;
use crate::probe::reader::{fourcc_to_string, CheckedBuf, ParseResult};
use crate::probe::ContainerFacts;
use crate::utils::time::mp4_timestamp;

pub mod boxes;
pub mod codec;
pub mod sample_table;
pub mod track;

use boxes::{children, full_box, read_versioned, visit_children, BoxHeader};

/// Largest `moov` payload loaded into memory
const MOOV_LIMIT: u64 = 256 << 20;

/// Largest `ftyp` payload read
const FTYP_LIMIT: u64 = 4096;

/// Parse an MP4-family file into container facts
///
/// Only I/O failures are returned; structural faults are logged and the
/// affected subtree is left out of the facts.
pub fn parse<R: Read + Seek>(
    reader: &mut R,
    file_size: u64,
    options: &AnalyzeOptions,
) -> io::Result<ContainerFacts> {
    let mut facts = ContainerFacts::new("MPEG-4");
    let mut position = 0u64;

    while position + 8 <= file_size {
        reader.seek(SeekFrom::Start(position))?;
        let mut head = [0u8; 16];
        let header_bytes = if file_size - position >= 16 { 16 } else { 8 };
        reader.read_exact(&mut head[..header_bytes])?;

        let header = match BoxHeader::parse(&mut &head[..header_bytes]) {
            Ok(header) => header,
            Err(error) => {
                debug!(position, %error, "unreadable top-level box");
                break;
            }
        };
        let total = header.total_size(file_size - position);
        let payload_len = total - header.header_len as u64;
        let truncated = position + total > file_size;
        let kind = fourcc_to_string(&header.kind);
        debug!(kind = %kind, position, size = total, truncated, "top-level box");

        match &header.kind {
            b"ftyp" => {
                reader.seek(SeekFrom::Start(position + header.header_len as u64))?;
                let payload = read_payload(reader, payload_len.min(FTYP_LIMIT))?;
                if let Err(error) = read_ftyp(&payload, &mut facts) {
                    debug!(%error, "skipped ftyp");
                }
            }
            b"moov" if payload_len > MOOV_LIMIT && !truncated => {
                warn!(size = payload_len, "moov box too large to load");
            }
            b"moov" => {
                let data_start = position + header.header_len as u64;
                let present = payload_len.min(file_size.saturating_sub(data_start));
                if truncated {
                    warn!(
                        declared = total,
                        available = file_size - position,
                        "moov box is truncated; only its complete children are described"
                    );
                }
                reader.seek(SeekFrom::Start(data_start))?;
                let payload = read_payload(reader, present.min(MOOV_LIMIT))?;
                read_moov(&payload, &mut facts, options);
            }
            _ => {}
        }

        if truncated {
            break;
        }
        position += total;
    }

    Ok(facts)
}

fn read_payload<R: Read>(reader: &mut R, len: u64) -> io::Result<Vec<u8>> {
    let mut payload = Vec::with_capacity(len as usize);
    reader.by_ref().take(len).read_to_end(&mut payload)?;
    Ok(payload)
}

fn brand(code: &[u8; 4]) -> String {
    fourcc_to_string(code).trim_end().to_string()
}

fn read_ftyp(payload: &[u8], facts: &mut ContainerFacts) -> ParseResult<()> {
    let mut cursor = payload;
    let major = cursor.read_fourcc("ftyp major brand")?;
    cursor.skip(4, "ftyp minor version")?;
    let mut compatible = Vec::new();
    while cursor.len() >= 4 {
        let code = cursor.read_fourcc("ftyp compatible brand")?;
        if code != [0; 4] {
            compatible.push(brand(&code));
        }
    }

    let major = brand(&major);
    facts.codec_id = Some(if compatible.is_empty() {
        major.clone()
    } else {
        format!("{} ({})", major, compatible.join("/"))
    });
    facts.format_profile = match major.as_str() {
        "qt" => Some("QuickTime".to_string()),
        "isom" => Some("Base Media".to_string()),
        "mp41" => Some("Base Media / Version 1".to_string()),
        "mp42" => Some("Base Media / Version 2".to_string()),
        "M4A" => Some("Apple audio with iTunes info".to_string()),
        "M4V" => Some("Apple video".to_string()),
        "dash" => Some("DASH".to_string()),
        other if other.starts_with("3gp") => Some("3GPP Media".to_string()),
        _ => None,
    };
    Ok(())
}

/// Movie-level timing gathered while walking `moov`
#[derive(Debug, Default)]
struct MovieTiming {
    timescale: Option<u32>,
    duration: Option<u64>,
    fragment_duration: Option<u64>,
}

impl MovieTiming {
    fn seconds(&self) -> Option<f64> {
        let timescale = self.timescale? as f64;
        self.duration
            .or(self.fragment_duration)
            .map(|ticks| ticks as f64 / timescale)
    }
}

fn read_moov(payload: &[u8], facts: &mut ContainerFacts, options: &AnalyzeOptions) {
    let mut timing = MovieTiming::default();
    let result = visit_children(payload, 1, |kind, body, depth| match &kind {
        b"mvhd" => read_mvhd(body, &mut timing, facts),
        b"trak" => {
            if let Some(track) = track::parse_trak(body, depth, timing.timescale, options)? {
                facts.tracks.push(track);
            }
            Ok(())
        }
        b"mvex" => visit_children(body, depth, |kind, body, _| {
            if &kind == b"mehd" {
                let (version, _, mut mehd) = full_box(body)?;
                let ticks = read_versioned(&mut mehd, version, "mehd fragment duration")?;
                timing.fragment_duration = (ticks > 0).then_some(ticks);
            }
            Ok(())
        }),
        b"udta" => read_udta(body, depth, facts),
        b"meta" => read_meta(body, depth, facts),
        _ => Ok(()),
    });
    if let Err(error) = result {
        debug!(%error, "moov walk aborted");
    }
    facts.duration = timing.seconds();
}

fn read_mvhd(payload: &[u8], timing: &mut MovieTiming, facts: &mut ContainerFacts) -> ParseResult<()> {
    let (version, _, mut body) = full_box(payload)?;
    let created = read_versioned(&mut body, version, "mvhd creation time")?;
    let modified = read_versioned(&mut body, version, "mvhd modification time")?;
    let timescale = body.read_u32("mvhd timescale")?;
    let duration = read_versioned(&mut body, version, "mvhd duration")?;

    let unset = if version == 1 { u64::MAX } else { u32::MAX as u64 };
    timing.timescale = (timescale > 0).then_some(timescale);
    timing.duration = (duration > 0 && duration != unset).then_some(duration);
    facts.encoded_date = mp4_timestamp(created);
    facts.tagged_date = mp4_timestamp(modified);
    Ok(())
}

fn read_udta(payload: &[u8], depth: usize, facts: &mut ContainerFacts) -> ParseResult<()> {
    visit_children(payload, depth, |kind, body, depth| {
        if &kind == b"meta" {
            return read_meta(body, depth, facts);
        }
        // QuickTime user data text: length, language, then the string
        if kind[0] == 0xA9 {
            let mut cursor = body;
            let len = cursor.read_u16("udta text length")? as usize;
            cursor.skip(2, "udta text language")?;
            cursor.ensure(len, "udta text")?;
            apply_tag(facts, &kind, &cursor[..len]);
        }
        Ok(())
    })
}

fn read_meta(payload: &[u8], depth: usize, facts: &mut ContainerFacts) -> ParseResult<()> {
    // ISO meta is a full box; QuickTime meta starts directly with its children
    let body = if payload.get(4..8) == Some(b"hdlr".as_slice()) {
        payload
    } else {
        full_box(payload)?.2
    };
    visit_children(body, depth, |kind, body, depth| {
        if &kind != b"ilst" {
            return Ok(());
        }
        visit_children(body, depth, |item, value, _| {
            for child in children(value) {
                let (kind, data) = child?;
                if &kind == b"data" {
                    let mut cursor = data;
                    cursor.skip(4 + 4, "ilst data type and locale")?;
                    apply_tag(facts, &item, cursor);
                }
            }
            Ok(())
        })
    })
}

fn apply_tag(facts: &mut ContainerFacts, key: &[u8; 4], value: &[u8]) {
    let text = String::from_utf8_lossy(value)
        .trim_end_matches('\0')
        .trim()
        .to_string();
    if text.is_empty() {
        return;
    }
    match key {
        b"\xA9nam" => facts.title = Some(text),
        b"\xA9too" | b"\xA9swr" => facts.writing_application = Some(text),
        b"\xA9day" => facts.recorded_date = Some(text),
        _ => {}
    }
}
