//! Container format detection from a bounded prefix

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use tracing::debug;

use crate::error::{ProbeXError, ProbeXResult};
use crate::probe::ContainerFormat;

/// Bytes read from the start of the file
const SNIFF_WINDOW: usize = 16 * 1024;

const EBML_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];
const PACK_START: [u8; 4] = [0x00, 0x00, 0x01, 0xBA];
const TS_SYNC_BYTE: u8 = 0x47;

/// Top-level box types accepted as an MP4-family signature
const MP4_TOP_LEVEL: &[&[u8; 4]] = &[
    b"ftyp", b"moov", b"mdat", b"free", b"skip", b"wide", b"pnot", b"styp", b"sidx", b"moof",
    b"uuid",
];

/// Packets that must line up before a transport stream is accepted
const TS_PROBE_PACKETS: usize = 5;

/// Classify a seekable source; the read position is restored to the start
pub fn sniff<R: Read + Seek>(reader: &mut R) -> std::io::Result<ContainerFormat> {
    reader.seek(SeekFrom::Start(0))?;
    let mut window = Vec::with_capacity(SNIFF_WINDOW);
    reader.by_ref().take(SNIFF_WINDOW as u64).read_to_end(&mut window)?;
    reader.seek(SeekFrom::Start(0))?;

    let format = classify(&window);
    debug!(format = format.name(), bytes = window.len(), "sniffed container");
    Ok(format)
}

/// Classify a file on disk
pub fn sniff_path(path: &Path) -> ProbeXResult<ContainerFormat> {
    let name = path.display().to_string();
    let mut file = File::open(path).map_err(|e| ProbeXError::io(name.clone(), e))?;
    sniff(&mut file).map_err(|e| ProbeXError::io(name, e))
}

/// Classify a prefix of the input, testing formats in a fixed order
pub fn classify(window: &[u8]) -> ContainerFormat {
    if is_mp4(window) {
        return ContainerFormat::Mp4;
    }
    if window.starts_with(&EBML_MAGIC) {
        return ContainerFormat::Matroska;
    }
    if let Some((packet_size, offset)) = find_ts_sync(window) {
        return ContainerFormat::MpegTs {
            packet_size,
            offset,
        };
    }
    if window.starts_with(&PACK_START) {
        return ContainerFormat::MpegPs;
    }
    ContainerFormat::Unknown
}

fn is_mp4(window: &[u8]) -> bool {
    if window.len() < 8 {
        return false;
    }
    let size = u32::from_be_bytes([window[0], window[1], window[2], window[3]]);
    let kind = [window[4], window[5], window[6], window[7]];
    let plausible_size = size == 0 || size == 1 || size >= 8;
    plausible_size && MP4_TOP_LEVEL.iter().any(|known| **known == kind)
}

/// Look for 0x47 repeating at a fixed stride; 192-byte packets carry a 4-byte prefix
fn find_ts_sync(window: &[u8]) -> Option<(usize, usize)> {
    for packet_size in [188usize, 192] {
        let prefix = packet_size - 188;
        for start in 0..packet_size {
            let sync_at = start + prefix;
            let available = window.len().saturating_sub(sync_at) / packet_size
                + usize::from(window.len().saturating_sub(sync_at) % packet_size > 0);
            let needed = available.min(TS_PROBE_PACKETS);
            if needed < 2 {
                break;
            }
            let aligned = (0..needed).all(|k| window[sync_at + k * packet_size] == TS_SYNC_BYTE);
            if aligned {
                return Some((packet_size, sync_at));
            }
        }
    }
    None
}
