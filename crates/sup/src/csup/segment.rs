// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Data-section segments and the integer streams stored in them.
//!
//! A segment is a byte range of the data section with its uncompressed length
//! and compression format. Encoders produce [`SegmentBuf`]s; the metadata
//! pass places them one after another and turns them into [`Segment`]s.

use crate::compress::{decompress, CompressConfig, Format};
use crate::encoding::varint::{append_uvarint, zigzag_decode, zigzag_encode, Cursor};
use crate::error::{Error, Result};

/// Location of one segment inside the data section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Segment {
    /// Offset from the start of the data section.
    pub offset: u64,
    /// Bytes on disk.
    pub mem_length: u64,
    /// Bytes after decompression.
    pub length: u64,
    pub format: Format,
}

impl Segment {
    /// Check that the segment lies inside a data section of `data_size`.
    pub fn check(&self, data_size: u64) -> Result<()> {
        let end = self.offset.checked_add(self.mem_length);
        if end.map_or(true, |end| end > data_size) {
            return Err(Error::MalformedMetadata(format!(
                "segment [{}+{}] outside data section of {} bytes",
                self.offset, self.mem_length, data_size
            )));
        }
        if self.format == Format::None && self.mem_length != self.length {
            return Err(Error::MalformedMetadata(format!(
                "uncompressed segment with lengths {} and {}",
                self.mem_length, self.length
            )));
        }
        Ok(())
    }

    /// Decode the on-disk bytes of this segment.
    pub fn decode(&self, raw: &[u8]) -> Result<Vec<u8>> {
        if raw.len() as u64 != self.mem_length {
            return Err(Error::truncated(format!(
                "segment at {} has {} of {} bytes",
                self.offset,
                raw.len(),
                self.mem_length
            )));
        }
        let size = usize::try_from(self.length)
            .map_err(|_| Error::MalformedMetadata(format!("segment length {}", self.length)))?;
        match self.format {
            Format::None => Ok(raw.to_vec()),
            f => decompress(f, raw, size),
        }
    }
}

/// An encoded segment waiting for its offset.
#[derive(Debug, Clone, Default)]
pub struct SegmentBuf {
    pub bytes: Vec<u8>,
    pub length: u64,
    pub format: Format,
}

impl SegmentBuf {
    /// Compress `raw` when it pays off.
    pub fn new(raw: Vec<u8>, compress: &CompressConfig) -> Result<Self> {
        let length = raw.len() as u64;
        Ok(match compress.compress(&raw)? {
            Some(bytes) => Self {
                bytes,
                length,
                format: compress.format,
            },
            None => Self {
                bytes: raw,
                length,
                format: Format::None,
            },
        })
    }

    /// Place at `offset`.
    #[must_use]
    pub fn at(&self, offset: u64) -> Segment {
        Segment {
            offset,
            mem_length: self.bytes.len() as u64,
            length: self.length,
            format: self.format,
        }
    }
}

pub fn encode_uvarints(values: &[u64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len());
    for &v in values {
        append_uvarint(&mut out, v);
    }
    out
}

pub fn encode_varints(values: &[i64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len());
    for &v in values {
        append_uvarint(&mut out, zigzag_encode(v));
    }
    out
}

/// Decode exactly `count` uvarints.
pub fn decode_uvarints(bytes: &[u8], count: usize) -> Result<Vec<u64>> {
    let mut c = Cursor::new(bytes);
    let mut out = Vec::with_capacity(count.min(bytes.len()));
    for _ in 0..count {
        out.push(c.read_uvarint()?);
    }
    if !c.is_empty() {
        return Err(Error::bad_value("trailing bytes after uvarint stream"));
    }
    Ok(out)
}

/// Decode every uvarint in `bytes`.
pub fn decode_all_uvarints(bytes: &[u8]) -> Result<Vec<u64>> {
    let mut c = Cursor::new(bytes);
    let mut out = Vec::new();
    while !c.is_empty() {
        out.push(c.read_uvarint()?);
    }
    Ok(out)
}

pub fn decode_varints(bytes: &[u8], count: usize) -> Result<Vec<i64>> {
    Ok(decode_uvarints(bytes, count)?
        .into_iter()
        .map(zigzag_decode)
        .collect())
}

pub fn encode_floats(values: &[f64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 8);
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

pub fn decode_floats(bytes: &[u8], count: usize) -> Result<Vec<f64>> {
    if bytes.len() as u64 != count as u64 * 8 {
        return Err(Error::bad_value(format!(
            "float segment of {} bytes for {} values",
            bytes.len(),
            count
        )));
    }
    Ok(bytes
        .chunks_exact(8)
        .map(|c| {
            let mut b = [0u8; 8];
            b.copy_from_slice(c);
            f64::from_le_bytes(b)
        })
        .collect())
}

/// Per-row lengths to `len + 1` offsets.
pub fn lengths_to_offsets(lengths: &[u64]) -> Result<Vec<u32>> {
    let mut out = Vec::with_capacity(lengths.len() + 1);
    out.push(0u32);
    let mut end = 0u64;
    for &n in lengths {
        end += n;
        let off = u32::try_from(end)
            .map_err(|_| Error::MalformedMetadata(format!("container offset {} overflows", end)))?;
        out.push(off);
    }
    Ok(out)
}
