//! Box headers and bounded child iteration

use bytes::Buf;
use tracing::debug;

use crate::probe::reader::{fourcc_to_string, take_slice, CheckedBuf, ParseError, ParseResult};

/// Deepest box nesting that is descended
pub const MAX_DEPTH: usize = 16;

/// A parsed box header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxHeader {
    pub kind: [u8; 4],
    /// 8, or 16 when a 64-bit size follows the type
    pub header_len: usize,
    /// Declared total size; `None` means the box runs to the end of its parent
    pub size: Option<u64>,
}

impl BoxHeader {
    pub fn parse<B: Buf>(buf: &mut B) -> ParseResult<Self> {
        let size = buf.read_u32("box size")?;
        let kind = buf.read_fourcc("box type")?;
        let (size, header_len) = match size {
            0 => (None, 8),
            1 => (Some(buf.read_u64("box large size")?), 16),
            n => (Some(n as u64), 8),
        };
        if let Some(total) = size {
            if total < header_len as u64 {
                return Err(ParseError::malformed(
                    "box header",
                    format!(
                        "'{}' declares {} bytes, less than its header",
                        fourcc_to_string(&kind),
                        total
                    ),
                ));
            }
        }
        Ok(Self {
            kind,
            header_len,
            size,
        })
    }

    /// Total size given the bytes left in the parent, counted from the header start
    pub fn total_size(&self, available: u64) -> u64 {
        self.size.unwrap_or(available)
    }
}

/// Iterator over the child boxes of a payload
///
/// Yields an error once and stops when a child is malformed or declares more
/// bytes than its parent holds.
pub struct Children<'a> {
    data: &'a [u8],
    done: bool,
}

pub fn children(data: &[u8]) -> Children<'_> {
    Children { data, done: false }
}

impl<'a> Iterator for Children<'a> {
    type Item = ParseResult<([u8; 4], &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        // Trailing bytes shorter than a header are padding
        if self.done || self.data.len() < 8 {
            return None;
        }
        let result = self.next_child();
        if result.is_err() {
            self.done = true;
        }
        Some(result)
    }
}

impl<'a> Children<'a> {
    fn next_child(&mut self) -> ParseResult<([u8; 4], &'a [u8])> {
        let mut cursor = self.data;
        let header = BoxHeader::parse(&mut cursor)?;
        let total = header.total_size(self.data.len() as u64);
        if total > self.data.len() as u64 {
            return Err(ParseError::Truncated {
                what: "box",
                needed: total as usize,
                available: self.data.len(),
            });
        }
        let mut rest = self.data;
        let whole = take_slice(&mut rest, total as usize, "box")?;
        self.data = rest;
        Ok((header.kind, &whole[header.header_len..]))
    }
}

/// Visit each child of a container payload
///
/// A child whose visitor fails is skipped and its siblings still run; a
/// structural fault in the list ends the walk with what was visited so far.
pub fn visit_children<F>(data: &[u8], depth: usize, mut visit: F) -> ParseResult<()>
where
    F: FnMut([u8; 4], &[u8], usize) -> ParseResult<()>,
{
    if depth > MAX_DEPTH {
        return Err(ParseError::DepthExceeded { limit: MAX_DEPTH });
    }
    for child in children(data) {
        match child {
            Ok((kind, payload)) => {
                if let Err(error) = visit(kind, payload, depth + 1) {
                    debug!(kind = %fourcc_to_string(&kind), %error, "skipped box");
                }
            }
            Err(error) => {
                debug!(%error, "stopped box walk");
                break;
            }
        }
    }
    Ok(())
}

/// Split a full box payload into version, flags and body
pub fn full_box(data: &[u8]) -> ParseResult<(u8, u32, &[u8])> {
    let mut cursor = data;
    let version = cursor.read_u8("full box version")?;
    let flags = cursor.read_u24("full box flags")?;
    Ok((version, flags, cursor))
}

/// Read a version-dependent 32- or 64-bit field
pub fn read_versioned<B: Buf>(buf: &mut B, version: u8, what: &'static str) -> ParseResult<u64> {
    if version == 1 {
        buf.read_u64(what)
    } else {
        buf.read_u32(what).map(u64::from)
    }
}
