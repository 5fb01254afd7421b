//! EBML variable-length integers, element headers and typed payloads

use bytes::Buf;
use tracing::debug;

use crate::probe::reader::{be_uint, take_slice, CheckedBuf, ParseError, ParseResult};

/// Deepest element nesting that is descended
pub const MAX_DEPTH: usize = 16;

/// A decoded variable-length integer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vint {
    pub length: usize,
    /// Value with the length marker removed
    pub value: u64,
    /// Every value bit is set, which for sizes means "unknown"
    pub all_ones: bool,
}

/// Read a vint of up to `max_len` bytes; the marker bit is stripped
pub fn read_vint<B: Buf>(buf: &mut B, max_len: usize, what: &'static str) -> ParseResult<Vint> {
    let first = buf.read_u8(what)?;
    if first == 0 {
        return Err(ParseError::malformed(what, "vint longer than 8 bytes"));
    }
    let length = first.leading_zeros() as usize + 1;
    if length > max_len {
        return Err(ParseError::malformed(
            what,
            format!("{}-byte vint exceeds {} bytes", length, max_len),
        ));
    }
    let marker = 0x80u8 >> (length - 1);
    let mut value = (first & !marker) as u64;
    buf.ensure(length - 1, what)?;
    for _ in 1..length {
        value = (value << 8) | buf.get_u8() as u64;
    }
    let all_ones = value == (1u64 << (7 * length)) - 1;
    Ok(Vint {
        length,
        value,
        all_ones,
    })
}

/// Read an element ID; the marker bit is kept, as IDs are conventionally written
pub fn read_id<B: Buf>(buf: &mut B) -> ParseResult<(u32, usize)> {
    let vint = read_vint(buf, 4, "element id")?;
    let marker = 1u64 << (7 * vint.length);
    Ok(((vint.value | marker) as u32, vint.length))
}

/// Element header; `size` is `None` for unknown-size elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHeader {
    pub id: u32,
    pub size: Option<u64>,
    pub header_len: usize,
}

pub fn read_header<B: Buf>(buf: &mut B) -> ParseResult<ElementHeader> {
    let (id, id_len) = read_id(buf)?;
    let size = read_vint(buf, 8, "element size")?;
    Ok(ElementHeader {
        id,
        size: (!size.all_ones).then_some(size.value),
        header_len: id_len + size.length,
    })
}

/// Iterator over the child elements of an in-memory payload
///
/// Unknown-size children extend to the end of the payload. The first
/// structural fault is yielded once and ends the iteration.
pub struct Elements<'a> {
    data: &'a [u8],
    done: bool,
}

pub fn elements(data: &[u8]) -> Elements<'_> {
    Elements { data, done: false }
}

impl<'a> Iterator for Elements<'a> {
    type Item = ParseResult<(u32, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.data.is_empty() {
            return None;
        }
        let result = self.next_element();
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}

impl<'a> Elements<'a> {
    fn next_element(&mut self) -> ParseResult<(u32, &'a [u8])> {
        let mut cursor = self.data;
        let header = read_header(&mut cursor)?;
        let len = match header.size {
            Some(size) => usize::try_from(size).unwrap_or(usize::MAX),
            None => cursor.len(),
        };
        let payload = take_slice(&mut cursor, len, "element payload")?;
        self.data = cursor;
        Ok((header.id, payload))
    }
}

/// Visit each child element, skipping any whose visitor fails
pub fn visit_elements<F>(data: &[u8], depth: usize, mut visit: F) -> ParseResult<()>
where
    F: FnMut(u32, &[u8], usize) -> ParseResult<()>,
{
    if depth > MAX_DEPTH {
        return Err(ParseError::DepthExceeded { limit: MAX_DEPTH });
    }
    for element in elements(data) {
        match element {
            Ok((id, payload)) => {
                if let Err(error) = visit(id, payload, depth + 1) {
                    debug!(id = format_args!("0x{:X}", id), %error, "skipped element");
                }
            }
            Err(error) => {
                debug!(%error, "stopped element walk");
                break;
            }
        }
    }
    Ok(())
}

/// Unsigned integer payload (0 to 8 bytes)
pub fn read_uint(data: &[u8]) -> ParseResult<u64> {
    be_uint(data)
}

/// Signed integer payload (0 to 8 bytes)
pub fn read_int(data: &[u8]) -> ParseResult<i64> {
    let raw = be_uint(data)?;
    if data.is_empty() || data.len() == 8 {
        return Ok(raw as i64);
    }
    let shift = 64 - 8 * data.len() as u32;
    Ok(((raw << shift) as i64) >> shift)
}

/// Float payload (0, 4 or 8 bytes)
pub fn read_float(data: &[u8]) -> ParseResult<f64> {
    let mut cursor = data;
    match data.len() {
        0 => Ok(0.0),
        4 => Ok(f32::from_bits(cursor.read_u32("float")?) as f64),
        8 => Ok(f64::from_bits(cursor.read_u64("float")?)),
        other => Err(ParseError::malformed(
            "float",
            format!("{} bytes is not a float width", other),
        )),
    }
}

/// String payload with trailing NULs removed
pub fn read_string(data: &[u8]) -> String {
    String::from_utf8_lossy(data)
        .trim_end_matches('\0')
        .to_string()
}
