//! Bounds-checked big-endian reads over `bytes::Buf`
//!
//! Every container parser reads through these helpers so that a short
//! buffer turns into a [`ParseError`] instead of a panic.

use bytes::Buf;
use thiserror::Error;

/// Structural fault inside a container
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Fewer bytes remain than the structure declares
    #[error("truncated {what}: needed {needed} bytes, {available} available")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },

    /// Bytes are present but do not follow the grammar
    #[error("malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },

    /// Nesting deeper than the parser accepts
    #[error("nesting deeper than {limit} levels")]
    DepthExceeded { limit: usize },
}

impl ParseError {
    pub fn malformed(what: &'static str, reason: impl Into<String>) -> Self {
        ParseError::Malformed {
            what,
            reason: reason.into(),
        }
    }
}

pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// Checked reads for any [`Buf`]
pub trait CheckedBuf: Buf {
    fn ensure(&self, needed: usize, what: &'static str) -> ParseResult<()> {
        let available = self.remaining();
        if available < needed {
            return Err(ParseError::Truncated {
                what,
                needed,
                available,
            });
        }
        Ok(())
    }

    fn read_u8(&mut self, what: &'static str) -> ParseResult<u8> {
        self.ensure(1, what)?;
        Ok(self.get_u8())
    }

    fn read_u16(&mut self, what: &'static str) -> ParseResult<u16> {
        self.ensure(2, what)?;
        Ok(self.get_u16())
    }

    fn read_u24(&mut self, what: &'static str) -> ParseResult<u32> {
        self.ensure(3, what)?;
        Ok(self.get_uint(3) as u32)
    }

    fn read_u32(&mut self, what: &'static str) -> ParseResult<u32> {
        self.ensure(4, what)?;
        Ok(self.get_u32())
    }

    fn read_u64(&mut self, what: &'static str) -> ParseResult<u64> {
        self.ensure(8, what)?;
        Ok(self.get_u64())
    }

    fn read_fourcc(&mut self, what: &'static str) -> ParseResult<[u8; 4]> {
        self.ensure(4, what)?;
        let mut code = [0u8; 4];
        self.copy_to_slice(&mut code);
        Ok(code)
    }

    fn skip(&mut self, count: usize, what: &'static str) -> ParseResult<()> {
        self.ensure(count, what)?;
        self.advance(count);
        Ok(())
    }
}

impl<B: Buf + ?Sized> CheckedBuf for B {}

/// Render a four-character code, replacing non-printable bytes
pub fn fourcc_to_string(code: &[u8; 4]) -> String {
    code.iter()
        .map(|&b| if (0x20..0x7F).contains(&b) { b as char } else { '?' })
        .collect()
}

/// Big-endian unsigned integer of 1 to 8 bytes
pub fn be_uint(data: &[u8]) -> ParseResult<u64> {
    if data.len() > 8 {
        return Err(ParseError::malformed(
            "unsigned integer",
            format!("{} bytes is wider than 64 bits", data.len()),
        ));
    }
    Ok(data.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
}

/// Split `len` bytes off the front of a slice cursor
pub fn take_slice<'a>(data: &mut &'a [u8], len: usize, what: &'static str) -> ParseResult<&'a [u8]> {
    let current: &'a [u8] = *data;
    if current.len() < len {
        return Err(ParseError::Truncated {
            what,
            needed: len,
            available: current.len(),
        });
    }
    let (head, rest) = current.split_at(len);
    *data = rest;
    Ok(head)
}

/// Minimal MSB-first bit reader for header peeks
pub struct BitReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    pub fn read_bits(&mut self, count: usize) -> ParseResult<u32> {
        if count > 32 {
            return Err(ParseError::malformed("bit field", "wider than 32 bits"));
        }
        if self.position + count > self.data.len() * 8 {
            return Err(ParseError::Truncated {
                what: "bit field",
                needed: (self.position + count).div_ceil(8),
                available: self.data.len(),
            });
        }
        let mut value = 0u32;
        for _ in 0..count {
            let byte = self.data[self.position / 8];
            let bit = (byte >> (7 - (self.position % 8))) & 1;
            value = (value << 1) | bit as u32;
            self.position += 1;
        }
        Ok(value)
    }

    pub fn skip_bits(&mut self, count: usize) -> ParseResult<()> {
        let mut left = count;
        while left > 0 {
            let step = left.min(32);
            self.read_bits(step)?;
            left -= step;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian_fields() {
        let mut data = &[0x00, 0x01, 0x00, 0x00, 0x00, 0x02, 0xAA][..];
        assert_eq!(data.read_u16("a").unwrap(), 1);
        assert_eq!(data.read_u32("b").unwrap(), 2);
        assert_eq!(data.read_u8("c").unwrap(), 0xAA);
    }

    #[test]
    fn short_buffer_is_truncated_error() {
        let mut data = &[0x00, 0x01][..];
        let err = data.read_u32("size").unwrap_err();
        assert_eq!(
            err,
            ParseError::Truncated {
                what: "size",
                needed: 4,
                available: 2
            }
        );
    }

    #[test]
    fn bit_reader_crosses_bytes() {
        let data = [0b1010_1100, 0b0101_0000];
        let mut bits = BitReader::new(&data);
        assert_eq!(bits.read_bits(3).unwrap(), 0b101);
        assert_eq!(bits.read_bits(7).unwrap(), 0b0110001);
        assert!(bits.read_bits(7).is_err());
    }

    #[test]
    fn fourcc_rendering() {
        assert_eq!(fourcc_to_string(b"avc1"), "avc1");
        assert_eq!(fourcc_to_string(&[0xA9, b'n', b'a', b'm']), "?nam");
    }

    #[test]
    fn take_slice_advances_cursor() {
        let mut data = &[1u8, 2, 3, 4, 5][..];
        assert_eq!(take_slice(&mut data, 2, "head").unwrap(), &[1, 2]);
        assert_eq!(data, &[3, 4, 5]);
        assert!(take_slice(&mut data, 4, "tail").is_err());
        assert_eq!(data.len(), 3);
    }

    #[test]
    fn uint_widths() {
        assert_eq!(be_uint(&[0x01, 0x00]).unwrap(), 256);
        assert_eq!(be_uint(&[]).unwrap(), 0);
        assert!(be_uint(&[0; 9]).is_err());
    }
}
