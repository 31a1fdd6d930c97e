// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! BSUP frame codec.
//!
//! ```text
//! code byte:
//!   bit 7      version (must be 0)
//!   bit 6      compressed
//!   bits 5..4  kind: 0 types, 1 values, 2 control, 3 reserved
//!   bits 3..0  low 4 bits of the payload length
//! uvarint      length >> 4
//! payload      [format u8][uvarint size] compressed bytes   if compressed
//!              raw bytes                                    otherwise
//! ```
//!
//! The byte `0xff` is the end-of-stream frame and has no payload.

use crate::compress::{decompress, Compressor, Format};
use crate::config::{Limits, EOS, FRAME_COMPRESSED_BIT, FRAME_VERSION_BIT};
use crate::encoding::varint::{append_uvarint, read_uvarint, Cursor};
use crate::error::{Error, Result};
use std::io::{self, Read};

const KIND_SHIFT: u8 = 4;
const KIND_MASK: u8 = 0x30;
const LEN_LOW_MASK: u8 = 0x0f;

/// Frame kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Types,
    Values,
    Control,
    Eos,
}

impl FrameKind {
    fn bits(self) -> u8 {
        match self {
            Self::Types => 0,
            Self::Values => 1,
            Self::Control => 2,
            Self::Eos => 3,
        }
    }
}

/// One frame as read from the stream, payload still compressed.
#[derive(Debug, Clone)]
pub struct Frame {
    pub kind: FrameKind,
    /// Stream offset of the frame code.
    pub offset: u64,
    /// Stream offset of the first payload byte.
    pub payload_offset: u64,
    compressed: bool,
    payload: Vec<u8>,
}

impl Frame {
    #[inline]
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Payload length on the wire.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        self.payload.len()
    }

    /// Uncompressed payload. The advertised uncompressed size is checked
    /// against `limits` before anything is allocated.
    pub fn into_payload(self, limits: &Limits) -> Result<Vec<u8>> {
        if !self.compressed {
            return Ok(self.payload);
        }
        let offset = self.payload_offset;
        let mut cur = Cursor::new(&self.payload);
        let format = Format::from_u8(cur.read_u8().map_err(|e| e.at(offset))?)
            .map_err(|e| e.at(offset))?;
        let size = cur.read_uvarint().map_err(|e| e.at(offset))?;
        if size > limits.max_uncompressed_size {
            return Err(Error::FrameTooLarge {
                length: size,
                max: limits.max_uncompressed_size,
            }
            .at(offset));
        }
        decompress(format, cur.rest(), size as usize).map_err(|e| e.at(offset))
    }
}

/// Append one frame to `out`, compressing the payload when it pays off.
pub fn encode_frame(
    out: &mut Vec<u8>,
    kind: FrameKind,
    payload: &[u8],
    compressor: &mut Compressor,
) -> Result<()> {
    if kind == FrameKind::Eos {
        out.push(EOS);
        return Ok(());
    }
    let mut code = kind.bits() << KIND_SHIFT;
    let packed = compressor.compress(payload)?;
    let mut header = Vec::new();
    let body: &[u8] = match &packed {
        Some(c) => {
            code |= FRAME_COMPRESSED_BIT;
            header.push(compressor.config().format.as_u8());
            append_uvarint(&mut header, payload.len() as u64);
            c
        }
        None => payload,
    };
    let len = (header.len() + body.len()) as u64;
    code |= (len as u8) & LEN_LOW_MASK;
    out.push(code);
    append_uvarint(out, len >> 4);
    out.extend_from_slice(&header);
    out.extend_from_slice(body);
    Ok(())
}

struct Counting<R> {
    inner: R,
    count: u64,
}

impl<R: Read> Read for Counting<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

/// Reads frames from a byte stream.
pub struct FrameReader<R> {
    r: Counting<R>,
    limits: Limits,
}

impl<R: Read> FrameReader<R> {
    pub fn new(r: R, limits: Limits) -> Self {
        Self {
            r: Counting { inner: r, count: 0 },
            limits,
        }
    }

    /// Bytes consumed so far.
    #[inline]
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.r.count
    }

    #[must_use]
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn into_inner(self) -> R {
        self.r.inner
    }

    /// Next frame, `Ok(None)` on a clean end of input.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let offset = self.offset();
        self.read_frame(offset).map_err(|e| e.at(offset))
    }

    fn read_frame(&mut self, offset: u64) -> Result<Option<Frame>> {
        let mut code = [0u8; 1];
        loop {
            match self.r.read(&mut code) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        let code = code[0];
        if code == EOS {
            return Ok(Some(Frame {
                kind: FrameKind::Eos,
                offset,
                payload_offset: offset + 1,
                compressed: false,
                payload: Vec::new(),
            }));
        }
        if code & FRAME_VERSION_BIT != 0 {
            return Err(Error::MalformedFrame(format!(
                "version bit set in code {:#04x}",
                code
            )));
        }
        let kind = match (code & KIND_MASK) >> KIND_SHIFT {
            0 => FrameKind::Types,
            1 => FrameKind::Values,
            2 => FrameKind::Control,
            _ => {
                return Err(Error::MalformedFrame(format!(
                    "reserved frame kind in code {:#04x}",
                    code
                )))
            }
        };
        let hi = read_uvarint(&mut self.r)?.ok_or_else(|| Error::truncated("frame length"))?;
        if hi > u64::MAX >> 4 {
            return Err(Error::MalformedFrame("frame length overflow".into()));
        }
        let len = (hi << 4) | u64::from(code & LEN_LOW_MASK);
        if len > self.limits.max_frame_size {
            return Err(Error::FrameTooLarge {
                length: len,
                max: self.limits.max_frame_size,
            });
        }
        let payload_offset = self.offset();
        // Grows with the bytes actually present, not with the advertised length.
        let mut payload = Vec::new();
        (&mut self.r).take(len).read_to_end(&mut payload)?;
        if (payload.len() as u64) < len {
            return Err(Error::truncated(format!(
                "frame of {} bytes, {} available",
                len,
                payload.len()
            )));
        }
        log::trace!("[BROW] {:?} frame of {} bytes at {}", kind, len, offset);
        Ok(Some(Frame {
            kind,
            offset,
            payload_offset,
            compressed: code & FRAME_COMPRESSED_BIT != 0,
            payload,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::CompressConfig;
    use crate::error::ErrorKind;

    fn encode(kind: FrameKind, payload: &[u8], config: CompressConfig) -> Vec<u8> {
        let mut out = Vec::new();
        let mut c = Compressor::new(config);
        encode_frame(&mut out, kind, payload, &mut c).expect("encode");
        out
    }

    #[test]
    fn test_frame_roundtrip_uncompressed() {
        let payload: Vec<u8> = (0..100u8).collect();
        let mut buf = encode(FrameKind::Values, &payload, CompressConfig::none());
        buf.push(EOS);
        // 100 = 0x64: low nibble 4 in the code, 6 in length_hi.
        assert_eq!(buf[0], 0x14);
        assert_eq!(buf[1], 0x06);

        let mut r = FrameReader::new(buf.as_slice(), Limits::default());
        let f = r.next_frame().expect("read").expect("frame");
        assert_eq!(f.kind, FrameKind::Values);
        assert!(!f.is_compressed());
        assert_eq!(f.into_payload(&Limits::default()).expect("payload"), payload);
        let eos = r.next_frame().expect("read").expect("eos");
        assert_eq!(eos.kind, FrameKind::Eos);
        assert!(r.next_frame().expect("read").is_none());
    }

    #[test]
    fn test_frame_roundtrip_compressed() {
        let payload = vec![7u8; 4096];
        let buf = encode(FrameKind::Control, &payload, CompressConfig::default());
        assert_ne!(buf[0] & FRAME_COMPRESSED_BIT, 0);
        assert!(buf.len() < payload.len());

        let mut r = FrameReader::new(buf.as_slice(), Limits::default());
        let f = r.next_frame().expect("read").expect("frame");
        assert_eq!(f.kind, FrameKind::Control);
        assert_eq!(f.into_payload(&Limits::default()).expect("payload"), payload);
    }

    #[test]
    fn test_version_bit_and_reserved_kind() {
        let mut r = FrameReader::new(&[0x80u8, 0x00][..], Limits::default());
        let err = r.next_frame().expect_err("version");
        assert_eq!(err.kind(), ErrorKind::MalformedFrame);
        assert_eq!(err.offset(), Some(0));

        let mut r = FrameReader::new(&[0x30u8, 0x00][..], Limits::default());
        assert_eq!(
            r.next_frame().expect_err("reserved").kind(),
            ErrorKind::MalformedFrame
        );
    }

    #[test]
    fn test_frame_too_large_does_not_allocate() {
        // Advertises 2^40 bytes with only two bytes of input behind it.
        let mut buf = vec![0x10];
        append_uvarint(&mut buf, 1 << 36);
        buf.extend_from_slice(&[1, 2]);
        let mut r = FrameReader::new(buf.as_slice(), Limits::default());
        let err = r.next_frame().expect_err("too large");
        assert_eq!(err.kind(), ErrorKind::FrameTooLarge);

        let limits = Limits {
            max_frame_size: 64,
            ..Limits::default()
        };
        let buf = encode(FrameKind::Values, &[0u8; 100], CompressConfig::none());
        let mut r = FrameReader::new(buf.as_slice(), limits);
        assert_eq!(
            r.next_frame().expect_err("limit").kind(),
            ErrorKind::FrameTooLarge
        );
    }

    #[test]
    fn test_truncated_payload() {
        let buf = encode(FrameKind::Types, &[1u8; 40], CompressConfig::none());
        let mut r = FrameReader::new(&buf[..buf.len() - 1], Limits::default());
        assert_eq!(
            r.next_frame().expect_err("short").kind(),
            ErrorKind::Truncated
        );

        let mut r = FrameReader::new(&[0x10u8][..], Limits::default());
        assert_eq!(
            r.next_frame().expect_err("no length").kind(),
            ErrorKind::Truncated
        );
    }

    #[test]
    fn test_uncompressed_size_limit() {
        let buf = encode(FrameKind::Values, &vec![3u8; 8192], CompressConfig::default());
        let limits = Limits {
            max_uncompressed_size: 1024,
            ..Limits::default()
        };
        let mut r = FrameReader::new(buf.as_slice(), limits);
        let f = r.next_frame().expect("read").expect("frame");
        assert_eq!(
            f.into_payload(&limits).expect_err("limit").kind(),
            ErrorKind::FrameTooLarge
        );
    }
}
