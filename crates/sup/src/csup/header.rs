// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CSUP object header.
//!
//! ```text
//! +--------------------------------------------------------------+
//! | Magic "CSUP" (4) | Version (4) | MetaSize (8) | DataSize (8) |
//! | RootId (4)                                                   |
//! +--------------------------------------------------------------+
//! ```
//!
//! All integers are little-endian.

use crate::config::{Limits, CSUP_HEADER_SIZE, CSUP_MAGIC, CSUP_VERSION};
use crate::error::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

/// Fixed-size object header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u32,
    /// Metadata section length.
    pub meta_size: u64,
    /// Data section length.
    pub data_size: u64,
    /// Metadata node at the top of the tree.
    pub root: u32,
}

impl Header {
    pub const SIZE: usize = CSUP_HEADER_SIZE as usize;

    #[must_use]
    pub fn new(meta_size: u64, data_size: u64, root: u32) -> Self {
        Self {
            version: CSUP_VERSION,
            meta_size,
            data_size,
            root,
        }
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&CSUP_MAGIC)?;
        w.write_u32::<LittleEndian>(self.version)?;
        w.write_u64::<LittleEndian>(self.meta_size)?;
        w.write_u64::<LittleEndian>(self.data_size)?;
        w.write_u32::<LittleEndian>(self.root)?;
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        let mut w = &mut out[..];
        // Writing into a slice of exactly SIZE bytes cannot fail.
        let _ = self.write(&mut w);
        out
    }

    /// Parse and check a header against `limits`.
    pub fn parse(bytes: &[u8], limits: &Limits) -> Result<Self> {
        if bytes.len() < Self::SIZE {
            return Err(Error::truncated(format!(
                "header needs {} bytes, got {}",
                Self::SIZE,
                bytes.len()
            )));
        }
        let mut r = &bytes[..Self::SIZE];
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if magic != CSUP_MAGIC {
            return Err(Error::MalformedHeader(format!("bad magic {:02x?}", magic)));
        }
        let h = Self {
            version: r.read_u32::<LittleEndian>()?,
            meta_size: r.read_u64::<LittleEndian>()?,
            data_size: r.read_u64::<LittleEndian>()?,
            root: r.read_u32::<LittleEndian>()?,
        };
        if h.version != CSUP_VERSION {
            return Err(Error::MalformedHeader(format!(
                "version {} (expected {})",
                h.version, CSUP_VERSION
            )));
        }
        if h.meta_size > limits.max_meta_size {
            return Err(Error::MalformedHeader(format!(
                "metadata section of {} bytes exceeds {}",
                h.meta_size, limits.max_meta_size
            )));
        }
        if h.data_size > limits.max_data_size {
            return Err(Error::MalformedHeader(format!(
                "data section of {} bytes exceeds {}",
                h.data_size, limits.max_data_size
            )));
        }
        Ok(h)
    }

    /// Offset of the data section from the start of the object.
    #[must_use]
    pub fn data_offset(&self) -> u64 {
        CSUP_HEADER_SIZE + self.meta_size
    }

    /// Object size without the trailing section.
    #[must_use]
    pub fn sections_size(&self) -> u64 {
        self.data_offset() + self.data_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_header_roundtrip() {
        let h = Header::new(120, 4096, 7);
        let bytes = h.to_bytes();
        assert_eq!(&bytes[..4], b"CSUP");
        assert_eq!(Header::parse(&bytes, &Limits::default()).expect("parse"), h);
        assert_eq!(h.data_offset(), 148);
        assert_eq!(h.sections_size(), 148 + 4096);
    }

    #[test]
    fn test_header_rejects() {
        let limits = Limits::default();
        let mut bytes = Header::new(1, 1, 0).to_bytes();
        bytes[0] = b'X';
        let err = Header::parse(&bytes, &limits).expect_err("magic");
        assert_eq!(err.kind(), ErrorKind::MalformedHeader);

        let mut bad = Header::new(1, 1, 0);
        bad.version += 1;
        let err = Header::parse(&bad.to_bytes(), &limits).expect_err("version");
        assert_eq!(err.kind(), ErrorKind::MalformedHeader);

        let big = Header::new(limits.max_meta_size + 1, 0, 0);
        let err = Header::parse(&big.to_bytes(), &limits).expect_err("meta size");
        assert_eq!(err.kind(), ErrorKind::MalformedHeader);

        let big = Header::new(0, limits.max_data_size + 1, 0);
        let err = Header::parse(&big.to_bytes(), &limits).expect_err("data size");
        assert_eq!(err.kind(), ErrorKind::MalformedHeader);

        let err = Header::parse(&bytes[..10], &limits).expect_err("short");
        assert_eq!(err.kind(), ErrorKind::Truncated);
    }
}
