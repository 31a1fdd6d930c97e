// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Variable-length integers.
//!
//! Two families are used throughout the formats:
//!
//! - **uvarint**: ULEB128, 7 data bits per byte with bit 7 as continuation.
//!   Used for tags, lengths, local type ids and every integer stream inside
//!   frames and segments.
//! - **counted**: the minimal little-endian byte string of a value, with the
//!   length carried by the surrounding tag. Zero is the empty string. Signed
//!   integers are zigzag-mapped first, so small magnitudes stay short.
//!
//! ```text
//! uvarint(300)          = [0xAC, 0x02]
//! counted_uvarint(300)  = [0x2C, 0x01]
//! counted_varint(-1)    = [0x01]        (zigzag(-1) = 1)
//! counted_varint(0)     = []
//! ```

use crate::error::{Error, Result};
use std::io::Read;

/// Maximum bytes needed to encode a u64 in ULEB128.
pub const MAX_VARINT_LEN: usize = 10;

const CONTINUATION_BIT: u8 = 0x80;
const DATA_MASK: u8 = 0x7F;

/// Append `value` as ULEB128.
#[inline]
pub fn append_uvarint(dst: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & u64::from(DATA_MASK)) as u8;
        value >>= 7;
        if value == 0 {
            dst.push(byte);
            return;
        }
        dst.push(byte | CONTINUATION_BIT);
    }
}

/// Number of bytes `value` occupies as ULEB128.
#[inline]
#[must_use]
pub const fn uvarint_len(value: u64) -> usize {
    if value == 0 {
        return 1;
    }
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Decode a ULEB128 value from the front of `buf`.
///
/// Returns `(value, bytes_consumed)`.
#[inline]
pub fn decode_uvarint(buf: &[u8]) -> Result<(u64, usize)> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    for (i, &byte) in buf.iter().enumerate() {
        if i >= MAX_VARINT_LEN {
            return Err(Error::bad_value("uvarint overflow"));
        }
        let data = u64::from(byte & DATA_MASK);
        // At shift 63 only bit 0 still fits in a u64.
        if shift == 63 && data > 1 {
            return Err(Error::bad_value("uvarint overflow"));
        }
        result |= data << shift;
        if byte & CONTINUATION_BIT == 0 {
            return Ok((result, i + 1));
        }
        shift += 7;
    }
    Err(Error::truncated("uvarint"))
}

/// Read a ULEB128 value from a byte stream.
///
/// Returns `Ok(None)` on a clean EOF before the first byte.
pub fn read_uvarint<R: Read + ?Sized>(r: &mut R) -> Result<Option<u64>> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    for i in 0..MAX_VARINT_LEN {
        let mut byte = [0u8; 1];
        let n = r.read(&mut byte)?;
        if n == 0 {
            if i == 0 {
                return Ok(None);
            }
            return Err(Error::truncated("uvarint"));
        }
        let data = u64::from(byte[0] & DATA_MASK);
        if shift == 63 && data > 1 {
            return Err(Error::bad_value("uvarint overflow"));
        }
        result |= data << shift;
        if byte[0] & CONTINUATION_BIT == 0 {
            return Ok(Some(result));
        }
        shift += 7;
    }
    Err(Error::bad_value("uvarint overflow"))
}

/// Map a signed integer onto the unsigned line (0, -1, 1, -2, ...).
#[inline]
#[must_use]
pub const fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`].
#[inline]
#[must_use]
pub const fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Append the minimal little-endian bytes of `value` (zero appends nothing).
#[inline]
pub fn append_counted_uvarint(dst: &mut Vec<u8>, mut value: u64) {
    while value != 0 {
        dst.push(value as u8);
        value >>= 8;
    }
}

/// Decode a counted unsigned integer; the whole slice is the integer.
#[inline]
pub fn decode_counted_uvarint(buf: &[u8]) -> Result<u64> {
    if buf.len() > 8 {
        return Err(Error::bad_value(format!(
            "counted integer of {} bytes",
            buf.len()
        )));
    }
    let mut value = 0u64;
    for (i, &b) in buf.iter().enumerate() {
        value |= u64::from(b) << (8 * i);
    }
    Ok(value)
}

/// Append a zigzag-mapped counted signed integer.
#[inline]
pub fn append_counted_varint(dst: &mut Vec<u8>, value: i64) {
    append_counted_uvarint(dst, zigzag_encode(value));
}

/// Decode a zigzag-mapped counted signed integer.
#[inline]
pub fn decode_counted_varint(buf: &[u8]) -> Result<i64> {
    decode_counted_uvarint(buf).map(zigzag_decode)
}

/// Bounds-checked reader over a byte slice that tracks its offset.
///
/// Errors carry the offset relative to the slice start.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    #[must_use]
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    #[inline]
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.offset)
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Unread tail of the buffer.
    #[must_use]
    pub fn rest(&self) -> &'a [u8] {
        &self.buffer[self.offset.min(self.buffer.len())..]
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        match self.buffer.get(self.offset) {
            Some(&b) => {
                self.offset += 1;
                Ok(b)
            }
            None => Err(Error::truncated("byte").at(self.offset as u64)),
        }
    }

    pub fn read_uvarint(&mut self) -> Result<u64> {
        let (value, n) =
            decode_uvarint(self.rest()).map_err(|e| e.at(self.offset as u64))?;
        self.offset += n;
        Ok(value)
    }

    /// Read a uvarint that must fit in `usize` and not exceed what is left.
    pub fn read_len(&mut self) -> Result<usize> {
        let start = self.offset;
        let len = self.read_uvarint()?;
        if len > self.remaining() as u64 {
            return Err(Error::truncated(format!("length {} exceeds input", len)).at(start as u64));
        }
        Ok(len as usize)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.remaining() {
            return Err(Error::truncated(format!("{} bytes", n)).at(self.offset as u64));
        }
        let out = &self.buffer[self.offset..self.offset + n];
        self.offset += n;
        Ok(out)
    }

    /// Read a uvarint length followed by that many bytes.
    pub fn read_prefixed(&mut self) -> Result<&'a [u8]> {
        let n = self.read_len()?;
        self.read_bytes(n)
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        let bytes = self.read_bytes(8)?;
        let mut arr = [0u8; 8];
        arr.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(arr))
    }
}
