// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Leaf encoders: one segment stream per primitive column.

use super::{EncodeContext, MetaBuilder};
use crate::csup::metadata::Node;
use crate::csup::segment::{encode_floats, encode_uvarints, encode_varints, SegmentBuf};
use crate::encoding::iter::primitive_tag;
use crate::encoding::primitive;
use crate::encoding::varint::append_uvarint;
use crate::error::Result;
use crate::types::{PrimitiveKind, Type};

/// Signed integers, durations and times as a zigzag uvarint stream.
#[derive(Debug)]
pub struct IntEncoder {
    typ: Type,
    values: Vec<i64>,
    min: i64,
    max: i64,
    out: Option<SegmentBuf>,
}

impl IntEncoder {
    #[must_use]
    pub fn new(typ: Type) -> Self {
        Self {
            typ,
            values: Vec::new(),
            min: i64::MAX,
            max: i64::MIN,
            out: None,
        }
    }

    pub fn write(&mut self, body: &[u8]) -> Result<()> {
        let v = primitive::decode_int(body)?;
        self.min = self.min.min(v);
        self.max = self.max.max(v);
        self.values.push(v);
        Ok(())
    }

    #[must_use]
    pub fn rows(&self) -> u64 {
        self.values.len() as u64
    }

    pub fn encode(&mut self, ctx: &EncodeContext) -> Result<()> {
        self.out = Some(SegmentBuf::new(encode_varints(&self.values), &ctx.compress)?);
        Ok(())
    }

    pub fn metadata(&mut self, m: &mut MetaBuilder) -> Result<u32> {
        let location = m.place(self.out.take())?;
        let empty = self.values.is_empty();
        Ok(m.push(Node::Int {
            typ: self.typ.clone(),
            location,
            min: if empty { 0 } else { self.min },
            max: if empty { 0 } else { self.max },
            count: self.rows(),
        }))
    }
}

/// Unsigned integers and enum indexes as a uvarint stream.
#[derive(Debug)]
pub struct UintEncoder {
    typ: Type,
    values: Vec<u64>,
    min: u64,
    max: u64,
    out: Option<SegmentBuf>,
}

impl UintEncoder {
    #[must_use]
    pub fn new(typ: Type) -> Self {
        Self {
            typ,
            values: Vec::new(),
            min: u64::MAX,
            max: 0,
            out: None,
        }
    }

    pub fn write(&mut self, body: &[u8]) -> Result<()> {
        let v = primitive::decode_uint(body)?;
        self.min = self.min.min(v);
        self.max = self.max.max(v);
        self.values.push(v);
        Ok(())
    }

    #[must_use]
    pub fn rows(&self) -> u64 {
        self.values.len() as u64
    }

    pub fn encode(&mut self, ctx: &EncodeContext) -> Result<()> {
        self.out = Some(SegmentBuf::new(encode_uvarints(&self.values), &ctx.compress)?);
        Ok(())
    }

    pub fn metadata(&mut self, m: &mut MetaBuilder) -> Result<u32> {
        let location = m.place(self.out.take())?;
        Ok(m.push(Node::Uint {
            typ: self.typ.clone(),
            location,
            min: if self.values.is_empty() { 0 } else { self.min },
            max: self.max,
            count: self.rows(),
        }))
    }
}

/// Floats of any width, widened to little-endian f64.
#[derive(Debug)]
pub struct FloatEncoder {
    typ: Type,
    kind: PrimitiveKind,
    values: Vec<f64>,
    out: Option<SegmentBuf>,
}

impl FloatEncoder {
    #[must_use]
    pub fn new(typ: Type) -> Self {
        let kind = typ.primitive_kind().unwrap_or(PrimitiveKind::Float64);
        Self {
            typ,
            kind,
            values: Vec::new(),
            out: None,
        }
    }

    pub fn write(&mut self, body: &[u8]) -> Result<()> {
        self.values.push(primitive::decode_float(self.kind, body)?);
        Ok(())
    }

    #[must_use]
    pub fn rows(&self) -> u64 {
        self.values.len() as u64
    }

    pub fn encode(&mut self, ctx: &EncodeContext) -> Result<()> {
        self.out = Some(SegmentBuf::new(encode_floats(&self.values), &ctx.compress)?);
        Ok(())
    }

    pub fn metadata(&mut self, m: &mut MetaBuilder) -> Result<u32> {
        let location = m.place(self.out.take())?;
        // NaN never wins a comparison, so it stays out of the range.
        let (min, max) = self
            .values
            .iter()
            .filter(|v| !v.is_nan())
            .fold(None, |acc: Option<(f64, f64)>, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
            .unwrap_or((0.0, 0.0));
        Ok(m.push(Node::Float {
            typ: self.typ.clone(),
            location,
            min,
            max,
            count: self.rows(),
        }))
    }
}

/// Bytes, strings and type-values: a uvarint length stream plus the
/// concatenated bodies.
#[derive(Debug)]
pub struct BytesEncoder {
    typ: Type,
    lengths: Vec<u64>,
    bytes: Vec<u8>,
    out: Option<(SegmentBuf, SegmentBuf)>,
}

impl BytesEncoder {
    #[must_use]
    pub fn new(typ: Type) -> Self {
        Self {
            typ,
            lengths: Vec::new(),
            bytes: Vec::new(),
            out: None,
        }
    }

    pub fn write(&mut self, body: &[u8]) -> Result<()> {
        if self.typ.primitive_kind() == Some(PrimitiveKind::String) {
            primitive::decode_string(body)?;
        }
        self.lengths.push(body.len() as u64);
        self.bytes.extend_from_slice(body);
        Ok(())
    }

    #[must_use]
    pub fn rows(&self) -> u64 {
        self.lengths.len() as u64
    }

    pub fn encode(&mut self, ctx: &EncodeContext) -> Result<()> {
        let offsets = SegmentBuf::new(encode_uvarints(&self.lengths), &ctx.compress)?;
        let bytes = SegmentBuf::new(std::mem::take(&mut self.bytes), &ctx.compress)?;
        self.out = Some((offsets, bytes));
        Ok(())
    }

    pub fn metadata(&mut self, m: &mut MetaBuilder) -> Result<u32> {
        let (offsets, bytes) = match self.out.take() {
            Some((o, b)) => (Some(o), Some(b)),
            None => (None, None),
        };
        let offsets = m.place(offsets)?;
        let bytes = m.place(bytes)?;
        Ok(m.push(Node::Bytes {
            typ: self.typ.clone(),
            offsets,
            bytes,
            count: self.rows(),
        }))
    }
}

/// Any other primitive (bool, ip, net) as a tagged element stream.
#[derive(Debug)]
pub struct PrimitiveEncoder {
    typ: Type,
    stream: Vec<u8>,
    count: u64,
    out: Option<SegmentBuf>,
}

impl PrimitiveEncoder {
    #[must_use]
    pub fn new(typ: Type) -> Self {
        Self {
            typ,
            stream: Vec::new(),
            count: 0,
            out: None,
        }
    }

    pub fn write(&mut self, body: &[u8]) -> Result<()> {
        if let Some(kind) = self.typ.primitive_kind() {
            primitive::check(kind, body)?;
        }
        append_uvarint(&mut self.stream, primitive_tag(body.len()));
        self.stream.extend_from_slice(body);
        self.count += 1;
        Ok(())
    }

    #[must_use]
    pub fn rows(&self) -> u64 {
        self.count
    }

    pub fn encode(&mut self, ctx: &EncodeContext) -> Result<()> {
        self.out = Some(SegmentBuf::new(std::mem::take(&mut self.stream), &ctx.compress)?);
        Ok(())
    }

    pub fn metadata(&mut self, m: &mut MetaBuilder) -> Result<u32> {
        let location = m.place(self.out.take())?;
        Ok(m.push(Node::Primitive {
            typ: self.typ.clone(),
            location,
            count: self.count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::CompressConfig;
    use crate::csup::segment::{decode_floats, decode_uvarints, decode_varints};

    fn ctx() -> EncodeContext {
        EncodeContext {
            compress: CompressConfig::none(),
            threads: 1,
        }
    }

    #[test]
    fn test_int_stats_and_stream() {
        let mut e = IntEncoder::new(Type::int64());
        for v in [5i64, -3, 12] {
            e.write(&primitive::encode_int(v)).expect("write");
        }
        e.encode(&ctx()).expect("encode");
        let mut m = MetaBuilder::new();
        let id = e.metadata(&mut m).expect("meta");
        let (nodes, chunks) = m.into_parts();
        let Node::Int { min, max, count, .. } = &nodes[id as usize] else {
            panic!("expected int node");
        };
        assert_eq!((*min, *max, *count), (-3, 12, 3));
        assert_eq!(decode_varints(&chunks[0], 3).expect("decode"), vec![5, -3, 12]);
    }

    #[test]
    fn test_uint_and_float_streams() {
        let mut u = UintEncoder::new(Type::uint64());
        u.write(&primitive::encode_uint(7)).expect("write");
        u.write(&primitive::encode_uint(300)).expect("write");
        u.encode(&ctx()).expect("encode");
        let mut f = FloatEncoder::new(Type::float64());
        f.write(&primitive::encode_float64(f64::NAN)).expect("write");
        f.write(&primitive::encode_float64(2.5)).expect("write");
        f.encode(&ctx()).expect("encode");

        let mut m = MetaBuilder::new();
        u.metadata(&mut m).expect("meta");
        let fid = f.metadata(&mut m).expect("meta");
        let (nodes, chunks) = m.into_parts();
        assert_eq!(decode_uvarints(&chunks[0], 2).expect("uints"), vec![7, 300]);
        let floats = decode_floats(&chunks[1], 2).expect("floats");
        assert!(floats[0].is_nan());
        let Node::Float { min, max, .. } = &nodes[fid as usize] else {
            panic!("expected float node");
        };
        assert_eq!((*min, *max), (2.5, 2.5));
    }

    #[test]
    fn test_bytes_rejects_bad_utf8() {
        let mut e = BytesEncoder::new(Type::string());
        e.write(b"ok").expect("valid");
        assert!(e.write(&[0xff, 0xfe]).is_err());
        assert_eq!(e.rows(), 1);
    }

    #[test]
    fn test_primitive_stream() {
        let mut e = PrimitiveEncoder::new(Type::bool());
        e.write(&primitive::encode_bool(true)).expect("write");
        e.write(&primitive::encode_bool(false)).expect("write");
        assert!(e.write(&[2]).is_err());
        e.encode(&ctx()).expect("encode");
        let mut m = MetaBuilder::new();
        e.metadata(&mut m).expect("meta");
        let (nodes, _) = m.into_parts();
        assert!(matches!(nodes[0], Node::Primitive { count: 2, .. }));
    }
}
