//! Unsigned LEB128 variable-length integers.
//!
//! 7 data bits per byte, least significant group first, continuation bit set
//! on every byte but the last. A `u32` takes between 1 and 5 bytes.

use bytes::BufMut;
use byteorder::ReadBytesExt;
use std::io::{self, Read};

/// Longest encoding of a `u32`.
pub const MAX_LEN: usize = 5;

/// Append `value` to `buf`, returning the number of bytes written.
pub fn write_u32<B: BufMut>(buf: &mut B, value: u32) -> usize {
    let mut val = value;
    let mut written = 0;

    loop {
        let mut byte = (val & 0x7F) as u8;
        val >>= 7;

        if val != 0 {
            byte |= 0x80;
        }

        buf.put_u8(byte);
        written += 1;

        if val == 0 {
            return written;
        }
    }
}

/// Number of bytes `value` occupies once encoded.
pub fn encoded_len(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0x0FFF_FFFF => 4,
        _ => 5,
    }
}

/// Read one `u32` from `reader`.
///
/// Fails with `InvalidData` if the encoding runs past five bytes or carries
/// bits beyond 32, and with `UnexpectedEof` if the input ends mid-value.
pub fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut result = 0u32;
    let mut shift = 0;

    loop {
        let byte = reader.read_u8()?;

        if shift == 28 && byte & 0xF0 != 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "varint overflow"));
        }

        result |= ((byte & 0x7F) as u32) << shift;

        if byte & 0x80 == 0 {
            return Ok(result);
        }

        shift += 7;
    }
}
