// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Compression for BSUP frames and CSUP segments.
//!
//! - **Threshold**: payloads below [`MIN_COMPRESS_SIZE`] are never compressed
//! - **Ratio gate**: compressed output is only used if it is smaller
//!
//! # Formats
//!
//! | Byte | Format |
//! |------|--------|
//! | 0 | none |
//! | 1 | LZ4 block (`lz4_flex`) |
//! | 2 | raw deflate (`flate2`) |
//!
//! Callers store the uncompressed length next to the compressed bytes;
//! decompression is bounded by that length and never allocates more.

use crate::config::MIN_COMPRESS_SIZE;
use crate::error::{Error, Result};
use std::io::{Read, Write};

/// Compression format selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Format {
    #[default]
    None = 0,
    Lz4 = 1,
    Deflate = 2,
}

impl Format {
    pub fn from_u8(b: u8) -> Result<Self> {
        match b {
            0 => Ok(Self::None),
            1 => Ok(Self::Lz4),
            2 => Ok(Self::Deflate),
            other => Err(Error::Compression(format!("unknown format {}", other))),
        }
    }

    #[inline]
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Compression configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompressConfig {
    pub format: Format,
    /// Minimum payload size to attempt compression.
    pub threshold: usize,
    /// Deflate level (1-9).
    pub deflate_level: u32,
}

impl Default for CompressConfig {
    fn default() -> Self {
        Self {
            format: Format::Lz4,
            threshold: MIN_COMPRESS_SIZE,
            deflate_level: 6,
        }
    }
}

impl CompressConfig {
    /// No compression at all.
    #[must_use]
    pub fn none() -> Self {
        Self {
            format: Format::None,
            ..Self::default()
        }
    }

    /// Compress `payload`; `None` when it is below the threshold or does not
    /// shrink.
    pub fn compress(&self, payload: &[u8]) -> Result<Option<Vec<u8>>> {
        if self.format == Format::None || payload.len() < self.threshold {
            return Ok(None);
        }
        let out = compress_raw(self.format, self.deflate_level, payload)?;
        if out.len() >= payload.len() {
            return Ok(None);
        }
        Ok(Some(out))
    }
}

/// Compression statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompressStats {
    pub compressed_count: u64,
    /// Payloads left uncompressed (threshold or ratio).
    pub skipped: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

impl CompressStats {
    /// Overall ratio (1.0 = no gain).
    #[must_use]
    pub fn ratio(&self) -> f32 {
        if self.bytes_in == 0 {
            1.0
        } else {
            self.bytes_out as f32 / self.bytes_in as f32
        }
    }
}

/// Stateful compressor that keeps statistics.
#[derive(Debug, Default)]
pub struct Compressor {
    config: CompressConfig,
    stats: CompressStats,
}

impl Compressor {
    #[must_use]
    pub fn new(config: CompressConfig) -> Self {
        Self {
            config,
            stats: CompressStats::default(),
        }
    }

    pub fn compress(&mut self, payload: &[u8]) -> Result<Option<Vec<u8>>> {
        let out = self.config.compress(payload)?;
        match &out {
            Some(c) => {
                self.stats.compressed_count += 1;
                self.stats.bytes_in += payload.len() as u64;
                self.stats.bytes_out += c.len() as u64;
            }
            None => self.stats.skipped += 1,
        }
        Ok(out)
    }

    #[must_use]
    pub fn config(&self) -> &CompressConfig {
        &self.config
    }

    #[must_use]
    pub fn stats(&self) -> &CompressStats {
        &self.stats
    }
}

fn compress_raw(format: Format, level: u32, payload: &[u8]) -> Result<Vec<u8>> {
    match format {
        Format::None => Ok(payload.to_vec()),
        Format::Lz4 => Ok(lz4_flex::block::compress(payload)),
        Format::Deflate => {
            use flate2::write::DeflateEncoder;
            use flate2::Compression;

            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(level));
            encoder
                .write_all(payload)
                .map_err(|e| Error::Compression(e.to_string()))?;
            encoder
                .finish()
                .map_err(|e| Error::Compression(e.to_string()))
        }
    }
}

/// Upper bound on the expansion of one compressed byte. LZ4 block literals
/// and match lengths cap out near 255:1, deflate near 1032:1.
const MAX_LZ4_RATIO: usize = 255;
const MAX_DEFLATE_RATIO: usize = 1032;
const RATIO_SLACK: usize = 64;

/// Largest `size` that `src.len()` compressed bytes can legitimately claim.
fn max_inflated(format: Format, src_len: usize) -> usize {
    let ratio = match format {
        Format::None => 1,
        Format::Lz4 => MAX_LZ4_RATIO,
        Format::Deflate => MAX_DEFLATE_RATIO,
    };
    src_len.saturating_mul(ratio).saturating_add(RATIO_SLACK)
}

/// Decompress `src` to exactly `size` bytes.
///
/// A `size` that `src` could not inflate to is rejected before any buffer is
/// reserved.
pub fn decompress(format: Format, src: &[u8], size: usize) -> Result<Vec<u8>> {
    if format != Format::None && size > max_inflated(format, src.len()) {
        return Err(Error::Compression(format!(
            "{} compressed bytes cannot inflate to {}",
            src.len(),
            size
        )));
    }
    let out = match format {
        Format::None => src.to_vec(),
        Format::Lz4 => lz4_flex::block::decompress(src, size)
            .map_err(|e| Error::Compression(e.to_string()))?,
        Format::Deflate => {
            use flate2::read::DeflateDecoder;

            let mut out = Vec::new();
            DeflateDecoder::new(src)
                .take(size as u64 + 1)
                .read_to_end(&mut out)
                .map_err(|e| Error::Compression(e.to_string()))?;
            out
        }
    };
    if out.len() != size {
        return Err(Error::Compression(format!(
            "expected {} bytes, got {}",
            size,
            out.len()
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn compressible() -> Vec<u8> {
        (0..4096).map(|i| (i % 16) as u8).collect()
    }

    #[test]
    fn test_skip_small_payload() {
        let mut c = Compressor::new(CompressConfig::default());
        assert!(c.compress(b"hello").expect("compress").is_none());
        assert_eq!(c.stats().skipped, 1);
    }

    #[test]
    fn test_lz4_and_deflate_roundtrip() {
        let data = compressible();
        for format in [Format::Lz4, Format::Deflate] {
            let cfg = CompressConfig {
                format,
                ..CompressConfig::default()
            };
            let packed = cfg.compress(&data).expect("compress").expect("shrinks");
            assert!(packed.len() < data.len());
            assert_eq!(decompress(format, &packed, data.len()).expect("decompress"), data);
        }
    }

    #[test]
    fn test_incompressible_is_skipped() {
        let mut rng = fastrand::Rng::with_seed(7);
        let data: Vec<u8> = (0..1024).map(|_| rng.u8(..)).collect();
        let cfg = CompressConfig::default();
        assert!(cfg.compress(&data).expect("compress").is_none());
    }

    #[test]
    fn test_size_mismatch_is_error() {
        let data = compressible();
        let cfg = CompressConfig {
            format: Format::Deflate,
            ..CompressConfig::default()
        };
        let packed = cfg.compress(&data).expect("compress").expect("shrinks");
        let err = decompress(Format::Deflate, &packed, 10).expect_err("short");
        assert_eq!(err.kind(), ErrorKind::Compression);
        assert!(decompress(Format::Lz4, &[0xff, 0xff], 100).is_err());
        assert!(Format::from_u8(9).is_err());
    }

    #[test]
    fn test_implausible_size_rejected() {
        // Two payload bytes cannot stand for a 2 GiB segment.
        for format in [Format::Lz4, Format::Deflate] {
            let err = decompress(format, &[0x00, 0x01], 2 << 30).expect_err("ratio");
            assert_eq!(err.kind(), ErrorKind::Compression);
        }
        // A long run of zeros is near the worst legitimate ratio.
        let zeros = vec![0u8; 1 << 20];
        for format in [Format::Lz4, Format::Deflate] {
            let cfg = CompressConfig {
                format,
                ..CompressConfig::default()
            };
            let packed = cfg.compress(&zeros).expect("compress").expect("shrinks");
            assert_eq!(decompress(format, &packed, zeros.len()).expect("inflate"), zeros);
        }
    }

    #[test]
    fn test_stats_ratio() {
        let mut c = Compressor::new(CompressConfig::default());
        c.compress(&compressible()).expect("compress");
        assert_eq!(c.stats().compressed_count, 1);
        assert!(c.stats().ratio() < 1.0);
    }
}
