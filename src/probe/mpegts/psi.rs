//! Program-specific information: section reassembly, PAT and PMT

use bytes::Buf;
use tracing::trace;

use crate::probe::reader::{take_slice, CheckedBuf, ParseError, ParseResult};

const CRC32_POLY: u32 = 0x04C1_1DB7;

static CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut j = 0;
        while j < 8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ CRC32_POLY
            } else {
                crc << 1
            };
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// CRC-32/MPEG-2; over a whole section including its CRC the result is zero
pub fn crc32_mpeg2(data: &[u8]) -> u32 {
    data.iter().fold(0xFFFF_FFFF, |crc, byte| {
        (crc << 8) ^ CRC32_TABLE[((crc >> 24) ^ *byte as u32) as usize]
    })
}

pub const PAT_TABLE_ID: u8 = 0x00;
pub const PMT_TABLE_ID: u8 = 0x02;

/// Largest section a PSI table may declare
const MAX_SECTION_LEN: usize = 4096;

/// Reassembles sections that span transport packets on one PID
#[derive(Debug, Default)]
pub struct SectionAssembler {
    buf: Vec<u8>,
    active: bool,
}

impl SectionAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one packet payload and return the sections it completes
    pub fn push(&mut self, payload: &[u8], unit_start: bool) -> Vec<Vec<u8>> {
        let mut sections = Vec::new();
        if unit_start {
            let Some((&pointer, rest)) = payload.split_first() else {
                return sections;
            };
            let pointer = (pointer as usize).min(rest.len());
            if self.active {
                self.buf.extend_from_slice(&rest[..pointer]);
                self.drain(&mut sections);
            }
            self.buf.clear();
            self.buf.extend_from_slice(&rest[pointer..]);
            self.active = true;
        } else if self.active {
            self.buf.extend_from_slice(payload);
        } else {
            return sections;
        }
        self.drain(&mut sections);
        sections
    }

    fn drain(&mut self, sections: &mut Vec<Vec<u8>>) {
        while self.buf.len() >= 3 {
            // 0xFF table id starts stuffing
            if self.buf[0] == 0xFF {
                self.buf.clear();
                self.active = false;
                return;
            }
            let len = 3 + ((((self.buf[1] & 0x0F) as usize) << 8) | self.buf[2] as usize);
            if len > MAX_SECTION_LEN {
                trace!(len, "discarding oversized section");
                self.buf.clear();
                self.active = false;
                return;
            }
            if self.buf.len() < len {
                return;
            }
            sections.push(self.buf.drain(..len).collect());
        }
    }
}

/// A long-form section with its CRC verified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Section<'a> {
    pub table_id: u8,
    pub table_id_extension: u16,
    pub version: u8,
    /// Bytes between the 8-byte header and the CRC
    pub body: &'a [u8],
}

pub fn parse_section(data: &[u8]) -> ParseResult<Section<'_>> {
    let mut buf = data;
    let table_id = buf.read_u8("section header")?;
    let flags_len = buf.read_u16("section header")?;
    if flags_len & 0x8000 == 0 {
        return Err(ParseError::malformed("section header", "short-form section"));
    }
    let section_length = (flags_len & 0x0FFF) as usize;
    if section_length < 9 {
        return Err(ParseError::malformed(
            "section header",
            format!("section length {} too small", section_length),
        ));
    }
    let section = &data[..3 + section_length.min(data.len() - 3)];
    if section.len() < 3 + section_length {
        return Err(ParseError::Truncated {
            what: "section",
            needed: 3 + section_length,
            available: data.len(),
        });
    }
    if crc32_mpeg2(section) != 0 {
        return Err(ParseError::malformed("section", "CRC mismatch"));
    }

    let table_id_extension = buf.read_u16("section header")?;
    let version = (buf.read_u8("section header")? >> 1) & 0x1F;
    buf.skip(2, "section numbers")?;
    let body = &section[8..section.len() - 4];
    Ok(Section {
        table_id,
        table_id_extension,
        version,
        body,
    })
}

/// Program number to PMT PID; network PIDs (program 0) are dropped
pub fn parse_pat(section: &Section<'_>) -> ParseResult<Vec<(u16, u16)>> {
    if section.table_id != PAT_TABLE_ID {
        return Err(ParseError::malformed(
            "PAT",
            format!("table id 0x{:02X}", section.table_id),
        ));
    }
    let mut programs = Vec::new();
    let mut body = section.body;
    while body.remaining() >= 4 {
        let program_number = body.get_u16();
        let pid = body.get_u16() & 0x1FFF;
        if program_number != 0 {
            programs.push((program_number, pid));
        }
    }
    Ok(programs)
}

/// Descriptor facts relevant to stream classification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Descriptors {
    pub language: Option<String>,
    pub registration: Option<[u8; 4]>,
    pub ac3: bool,
    pub eac3: bool,
    pub dvb_subtitle: bool,
    pub teletext: bool,
}

const REGISTRATION: u8 = 0x05;
const ISO_639_LANGUAGE: u8 = 0x0A;
const TELETEXT: u8 = 0x56;
const DVB_SUBTITLING: u8 = 0x59;
const AC3: u8 = 0x6A;
const ENHANCED_AC3: u8 = 0x7A;

fn language_code(bytes: &[u8]) -> Option<String> {
    let code = bytes.get(..3)?;
    if !code.iter().all(u8::is_ascii_alphabetic) {
        return None;
    }
    let code = String::from_utf8_lossy(code).to_ascii_lowercase();
    (code != "und").then_some(code)
}

pub fn parse_descriptors(mut data: &[u8]) -> ParseResult<Descriptors> {
    let mut found = Descriptors::default();
    while !data.is_empty() {
        let tag = data.read_u8("descriptor tag")?;
        let len = data.read_u8("descriptor length")? as usize;
        let body = take_slice(&mut data, len, "descriptor")?;
        match tag {
            REGISTRATION if body.len() >= 4 => {
                found.registration = Some([body[0], body[1], body[2], body[3]]);
            }
            ISO_639_LANGUAGE => found.language = found.language.take().or(language_code(body)),
            TELETEXT => {
                found.teletext = true;
                found.language = found.language.take().or(language_code(body));
            }
            DVB_SUBTITLING => {
                found.dvb_subtitle = true;
                found.language = found.language.take().or(language_code(body));
            }
            AC3 => found.ac3 = true,
            ENHANCED_AC3 => found.eac3 = true,
            _ => {}
        }
    }
    Ok(found)
}

/// One elementary stream entry of a PMT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PmtStream {
    pub stream_type: u8,
    pub pid: u16,
    pub descriptors: Descriptors,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pmt {
    pub program_number: u16,
    pub registration: Option<[u8; 4]>,
    pub streams: Vec<PmtStream>,
}

pub fn parse_pmt(section: &Section<'_>) -> ParseResult<Pmt> {
    if section.table_id != PMT_TABLE_ID {
        return Err(ParseError::malformed(
            "PMT",
            format!("table id 0x{:02X}", section.table_id),
        ));
    }
    let mut body = section.body;
    body.skip(2, "PCR PID")?;
    let info_len = (body.read_u16("program info length")? & 0x0FFF) as usize;
    let program_info = parse_descriptors(take_slice(&mut body, info_len, "program info")?)?;

    let mut streams = Vec::new();
    while !body.is_empty() {
        let stream_type = body.read_u8("stream type")?;
        let pid = body.read_u16("elementary PID")? & 0x1FFF;
        let es_info_len = (body.read_u16("ES info length")? & 0x0FFF) as usize;
        let es_info = take_slice(&mut body, es_info_len, "ES info")?;
        // A bad descriptor loop leaves the stream unrefined rather than dropped
        let descriptors = parse_descriptors(es_info).unwrap_or_default();
        streams.push(PmtStream {
            stream_type,
            pid,
            descriptors,
        });
    }

    Ok(Pmt {
        program_number: section.table_id_extension,
        registration: program_info.registration,
        streams,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Wrap a body in a long-form section with a valid CRC
    fn section(table_id: u8, extension: u16, body: &[u8]) -> Vec<u8> {
        let section_length = 5 + body.len() + 4;
        let mut data = vec![
            table_id,
            0xB0 | (section_length >> 8) as u8,
            section_length as u8,
            (extension >> 8) as u8,
            extension as u8,
            0xC1,
            0,
            0,
        ];
        data.extend_from_slice(body);
        let crc = crc32_mpeg2(&data);
        data.extend_from_slice(&crc.to_be_bytes());
        data
    }

    #[test]
    fn crc_of_known_vector() {
        assert_eq!(crc32_mpeg2(b"123456789"), 0x0376_E6E7);
    }

    #[test]
    fn parses_pat_and_skips_network_pid() {
        let data = section(PAT_TABLE_ID, 1, &[0, 0, 0xE0, 0x10, 0, 1, 0xF0, 0x00]);
        let parsed = parse_section(&data).unwrap();
        assert_eq!(parse_pat(&parsed).unwrap(), vec![(1, 0x1000)]);
    }

    #[test]
    fn rejects_bad_crc() {
        let mut data = section(PAT_TABLE_ID, 1, &[0, 1, 0xF0, 0x00]);
        let last = data.len() - 1;
        data[last] ^= 0xFF;
        assert!(parse_section(&data).is_err());
    }

    #[test]
    fn parses_pmt_with_language() {
        let body = [
            0xE1, 0x00, 0xF0, 0x00, // PCR PID, no program info
            0x1B, 0xE1, 0x00, 0xF0, 0x00, // AVC on 0x100
            0x06, 0xE1, 0x01, 0xF0, 0x09, // private data on 0x101
            0x6A, 0x01, 0x00, // AC-3 descriptor
            0x0A, 0x04, b'd', b'e', b'u', 0x00,
        ];
        let data = section(PMT_TABLE_ID, 7, &body);
        let pmt = parse_pmt(&parse_section(&data).unwrap()).unwrap();
        assert_eq!(pmt.program_number, 7);
        assert_eq!(pmt.streams.len(), 2);
        assert_eq!(pmt.streams[0].stream_type, 0x1B);
        assert_eq!(pmt.streams[1].pid, 0x101);
        assert!(pmt.streams[1].descriptors.ac3);
        assert_eq!(pmt.streams[1].descriptors.language.as_deref(), Some("deu"));
    }

    #[test]
    fn assembles_section_across_packets() {
        let data = section(PAT_TABLE_ID, 1, &[0, 1, 0xF0, 0x00]);
        let mut assembler = SectionAssembler::new();
        let mut first = vec![0u8];
        first.extend_from_slice(&data[..6]);
        assert!(assembler.push(&first, true).is_empty());
        let mut rest = data[6..].to_vec();
        rest.extend_from_slice(&[0xFF; 8]);
        let sections = assembler.push(&rest, false);
        assert_eq!(sections, vec![data]);
    }

    #[test]
    fn continuation_without_start_is_ignored() {
        let mut assembler = SectionAssembler::new();
        assert!(assembler.push(&[0x00, 0xB0, 0x0D], false).is_empty());
    }
}
