//! Byte codec: fixed-width integers and length-prefixed strings.
//!
//! Every integer on the wire is a 4-byte big-endian `u32`. Strings are a
//! `u32` character count followed by one byte per character (Latin-1).
//!
//! ```text
//! int:    [b3 b2 b1 b0]                 big-endian
//! string: [count:u32][c0][c1]...[cN-1]  one byte per char
//! ```

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{ElevsimError, Result};

/// Width in bytes of every wire integer.
pub const INT_WIDTH: usize = 4;

/// Convert any integer into the wire width, rejecting values outside `u32`.
pub fn to_wire_int<T>(value: T) -> Result<u32>
where
    T: TryInto<u32> + Copy + std::fmt::Display,
{
    value
        .try_into()
        .map_err(|_| ElevsimError::NumberOutOfRange(value.to_string()))
}

/// Append a wire integer.
pub fn put_int(dst: &mut BytesMut, value: u32) {
    dst.put_u32(value);
}

/// Append a length-prefixed string.
///
/// Fails with an encoding error if a character does not fit one byte or the
/// string is longer than a wire integer can count. Nothing is written on
/// failure.
pub fn put_str(dst: &mut BytesMut, value: &str) -> Result<()> {
    let mut encoded = Vec::with_capacity(value.len());
    for c in value.chars() {
        let byte = u8::try_from(u32::from(c)).map_err(|_| ElevsimError::UnencodableChar(c))?;
        encoded.push(byte);
    }
    let count =
        u32::try_from(encoded.len()).map_err(|_| ElevsimError::StringTooLong(encoded.len()))?;

    dst.reserve(INT_WIDTH + encoded.len());
    dst.put_u32(count);
    dst.put_slice(&encoded);
    Ok(())
}

/// Read a wire integer, advancing `src`.
pub fn get_int(src: &mut &[u8]) -> Result<u32> {
    ensure_remaining(src, INT_WIDTH)?;
    Ok(src.get_u32())
}

/// Read a length-prefixed string, advancing `src`.
///
/// `src` is left untouched if the string is truncated.
pub fn get_str(src: &mut &[u8]) -> Result<String> {
    let mut cursor = *src;
    let count = get_int(&mut cursor)? as usize;
    ensure_remaining(cursor, count)?;

    let text = cursor[..count].iter().map(|&b| char::from(b)).collect();
    cursor.advance(count);
    *src = cursor;
    Ok(text)
}

fn ensure_remaining(src: &[u8], needed: usize) -> Result<()> {
    if src.len() < needed {
        return Err(ElevsimError::PayloadUnderrun {
            needed,
            remaining: src.len(),
        });
    }
    Ok(())
}
