// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Container encoders: records, arrays and sets, maps, unions, and the thin
//! named and error wrappers.

use super::{encode_parallel, new_encoder, EncodeContext, Encoder, MetaBuilder, RunBuilder};
use crate::csup::metadata::{Node, NodeField};
use crate::csup::segment::{encode_uvarints, Segment, SegmentBuf};
use crate::encoding::iter::Iter;
use crate::encoding::varint::decode_counted_uvarint;
use crate::error::{Error, Result};
use crate::types::{Field, Type};

/// One record field: its values plus none runs for optional fields.
#[derive(Debug)]
pub struct FieldEncoder {
    name: String,
    opt: bool,
    values: Encoder,
    /// Value/none runs starting with values.
    nones: RunBuilder,
    out: Option<SegmentBuf>,
}

impl FieldEncoder {
    fn new(f: &Field) -> Result<Self> {
        Ok(Self {
            name: f.name.clone(),
            opt: f.opt,
            values: new_encoder(&f.typ)?,
            nones: RunBuilder::new(false),
            out: None,
        })
    }

    fn encode(&mut self, ctx: &EncodeContext) -> Result<()> {
        if self.nones.set() > 0 {
            self.out = Some(SegmentBuf::new(encode_uvarints(&self.nones.runs()), &ctx.compress)?);
        }
        self.values.encode(ctx)
    }
}

#[derive(Debug)]
pub struct RecordEncoder {
    typ: Type,
    len: u64,
    fields: Vec<FieldEncoder>,
}

impl RecordEncoder {
    pub fn new(typ: Type, fields: &[Field]) -> Result<Self> {
        Ok(Self {
            typ,
            len: 0,
            fields: fields.iter().map(FieldEncoder::new).collect::<Result<_>>()?,
        })
    }

    pub fn write(&mut self, body: &[u8]) -> Result<()> {
        let mut it = Iter::new(body);
        for f in &mut self.fields {
            if it.done() {
                return Err(Error::bad_value(format!("record body shorter than {}", self.typ)));
            }
            let e = it.next_elem()?;
            if e.is_none() {
                if !f.opt {
                    return Err(Error::bad_value(format!(
                        "none in required field {} of {}",
                        f.name, self.typ
                    )));
                }
                f.nones.push(true);
            } else {
                f.values
                    .write(e)
                    .map_err(|err| match err {
                        Error::BadValue(msg) => Error::BadValue(format!("field {}: {}", f.name, msg)),
                        other => other,
                    })?;
                f.nones.push(false);
            }
        }
        if !it.done() {
            return Err(Error::bad_value(format!("record body longer than {}", self.typ)));
        }
        self.len += 1;
        Ok(())
    }

    #[must_use]
    pub fn rows(&self) -> u64 {
        self.len
    }

    pub fn encode(&mut self, ctx: &EncodeContext) -> Result<()> {
        encode_parallel(&mut self.fields, ctx, FieldEncoder::encode)
    }

    pub fn metadata(&mut self, m: &mut MetaBuilder) -> Result<u32> {
        let mut fields = Vec::with_capacity(self.fields.len());
        for f in &mut self.fields {
            let values = f.values.metadata(m)?;
            let nones = if f.nones.set() > 0 {
                m.place(f.out.take())?
            } else {
                Segment::default()
            };
            fields.push(NodeField {
                name: f.name.clone(),
                values,
                opt: f.opt,
                nones,
            });
        }
        Ok(m.push(Node::Record {
            length: self.len,
            fields,
        }))
    }
}

/// Arrays and sets: per-row element counts plus one element column.
#[derive(Debug)]
pub struct ArrayEncoder {
    set: bool,
    lengths: Vec<u64>,
    values: Box<Encoder>,
    out: Option<SegmentBuf>,
}

impl ArrayEncoder {
    #[must_use]
    pub fn new(set: bool, values: Encoder) -> Self {
        Self {
            set,
            lengths: Vec::new(),
            values: Box::new(values),
            out: None,
        }
    }

    pub fn write(&mut self, body: &[u8]) -> Result<()> {
        let mut n = 0u64;
        for e in Iter::new(body) {
            self.values.write(e?)?;
            n += 1;
        }
        self.lengths.push(n);
        Ok(())
    }

    #[must_use]
    pub fn rows(&self) -> u64 {
        self.lengths.len() as u64
    }

    pub fn encode(&mut self, ctx: &EncodeContext) -> Result<()> {
        self.out = Some(SegmentBuf::new(encode_uvarints(&self.lengths), &ctx.compress)?);
        self.values.encode(ctx)
    }

    pub fn metadata(&mut self, m: &mut MetaBuilder) -> Result<u32> {
        let values = self.values.metadata(m)?;
        let lengths = m.place(self.out.take())?;
        let length = self.rows();
        Ok(m.push(if self.set {
            Node::Set {
                length,
                lengths,
                values,
            }
        } else {
            Node::Array {
                length,
                lengths,
                values,
            }
        }))
    }
}

#[derive(Debug)]
pub struct MapEncoder {
    lengths: Vec<u64>,
    keys: Box<Encoder>,
    values: Box<Encoder>,
    out: Option<SegmentBuf>,
}

impl MapEncoder {
    #[must_use]
    pub fn new(keys: Encoder, values: Encoder) -> Self {
        Self {
            lengths: Vec::new(),
            keys: Box::new(keys),
            values: Box::new(values),
            out: None,
        }
    }

    pub fn write(&mut self, body: &[u8]) -> Result<()> {
        let mut it = Iter::new(body);
        let mut n = 0u64;
        while !it.done() {
            self.keys.write(it.next_elem()?)?;
            if it.done() {
                return Err(Error::bad_value("map body with a dangling key"));
            }
            self.values.write(it.next_elem()?)?;
            n += 1;
        }
        self.lengths.push(n);
        Ok(())
    }

    #[must_use]
    pub fn rows(&self) -> u64 {
        self.lengths.len() as u64
    }

    pub fn encode(&mut self, ctx: &EncodeContext) -> Result<()> {
        self.out = Some(SegmentBuf::new(encode_uvarints(&self.lengths), &ctx.compress)?);
        self.keys.encode(ctx)?;
        self.values.encode(ctx)
    }

    pub fn metadata(&mut self, m: &mut MetaBuilder) -> Result<u32> {
        let keys = self.keys.metadata(m)?;
        let values = self.values.metadata(m)?;
        let lengths = m.place(self.out.take())?;
        Ok(m.push(Node::Map {
            length: self.rows(),
            lengths,
            keys,
            values,
        }))
    }
}

/// Unions: a tag stream plus one column per member.
#[derive(Debug)]
pub struct UnionEncoder {
    tags: Vec<u64>,
    members: Vec<Encoder>,
    out: Option<SegmentBuf>,
}

impl UnionEncoder {
    #[must_use]
    pub fn new(members: Vec<Encoder>) -> Self {
        Self {
            tags: Vec::new(),
            members,
            out: None,
        }
    }

    pub fn write(&mut self, body: &[u8]) -> Result<()> {
        let mut it = Iter::new(body);
        let tag = decode_counted_uvarint(it.next_body()?.unwrap_or_default())?;
        let member = usize::try_from(tag)
            .ok()
            .and_then(|t| self.members.get_mut(t))
            .ok_or_else(|| Error::bad_value(format!("union tag {} out of range", tag)))?;
        member.write(it.next_elem()?)?;
        if !it.done() {
            return Err(Error::bad_value("union body longer than tag and value"));
        }
        self.tags.push(tag);
        Ok(())
    }

    #[must_use]
    pub fn rows(&self) -> u64 {
        self.tags.len() as u64
    }

    pub fn encode(&mut self, ctx: &EncodeContext) -> Result<()> {
        self.out = Some(SegmentBuf::new(encode_uvarints(&self.tags), &ctx.compress)?);
        encode_parallel(&mut self.members, ctx, Encoder::encode)
    }

    pub fn metadata(&mut self, m: &mut MetaBuilder) -> Result<u32> {
        let values = self
            .members
            .iter_mut()
            .map(|e| e.metadata(m))
            .collect::<Result<Vec<_>>>()?;
        let tags = m.place(self.out.take())?;
        Ok(m.push(Node::Union {
            length: self.rows(),
            tags,
            values,
        }))
    }
}

/// Named wrapper; only adds a metadata node.
#[derive(Debug)]
pub struct NamedEncoder {
    pub(super) name: String,
    pub(super) inner: Box<Encoder>,
}

impl NamedEncoder {
    #[must_use]
    pub fn new(name: String, inner: Encoder) -> Self {
        Self {
            name,
            inner: Box::new(inner),
        }
    }
}

/// Error wrapper; only adds a metadata node.
#[derive(Debug)]
pub struct ErrorEncoder {
    pub(super) inner: Box<Encoder>,
}

impl ErrorEncoder {
    #[must_use]
    pub fn new(inner: Encoder) -> Self {
        Self {
            inner: Box::new(inner),
        }
    }
}
