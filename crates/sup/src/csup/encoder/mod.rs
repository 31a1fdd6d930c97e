// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Column encoders.
//!
//! One [`Encoder`] tree is built per distinct top-level type. Rows go in with
//! [`Encoder::write`]; at close the tree is finished in two passes:
//!
//! 1. [`Encoder::encode`] turns buffered rows into (possibly compressed)
//!    segment buffers. Independent subtrees run on separate threads.
//! 2. [`Encoder::metadata`] walks the tree in post-order, places every segment
//!    in the data section through a [`MetaBuilder`] and returns the node id of
//!    the subtree root.
//!
//! ```text
//! new_encoder(T) = Nulls(typed(T))
//! typed(record)  = Record(field: new_encoder(F)...)
//! typed(array)   = Array(new_encoder(E))         (sets too)
//! typed(map)     = Map(new_encoder(K), new_encoder(V))
//! typed(union)   = Union(new_encoder(M)...)
//! typed(named)   = Named(typed(U))
//! typed(error)   = Error(typed(U))
//! typed(leaf)    = Dict(Int | Uint | Float | Bytes | Primitive)
//! ```

pub mod dict;
pub mod dynamic;
pub mod leaf;
pub mod nulls;
pub mod record;

pub use dict::DictEncoder;
pub use dynamic::DynamicEncoder;
pub use leaf::{BytesEncoder, FloatEncoder, IntEncoder, PrimitiveEncoder, UintEncoder};
pub use nulls::NullsEncoder;
pub use record::{ArrayEncoder, ErrorEncoder, MapEncoder, NamedEncoder, RecordEncoder, UnionEncoder};

use super::metadata::Node;
use super::segment::{Segment, SegmentBuf};
use crate::compress::CompressConfig;
use crate::encoding::iter::Elem;
use crate::error::{Error, Result};
use crate::types::{PrimitiveKind, Type, TypeKind};

/// Settings shared by the encode pass.
#[derive(Debug, Clone, Copy)]
pub struct EncodeContext {
    pub compress: CompressConfig,
    /// Worker threads available to this subtree.
    pub threads: usize,
}

/// Collects metadata nodes and data-section chunks in emission order.
#[derive(Debug, Default)]
pub struct MetaBuilder {
    nodes: Vec<Node>,
    chunks: Vec<Vec<u8>>,
    offset: u64,
}

impl MetaBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `buf` to the data section.
    pub fn place(&mut self, buf: Option<SegmentBuf>) -> Result<Segment> {
        let buf = buf.ok_or_else(|| Error::bad_value("segment used before encode"))?;
        let seg = buf.at(self.offset);
        self.offset += seg.mem_length;
        if !buf.bytes.is_empty() {
            self.chunks.push(buf.bytes);
        }
        Ok(seg)
    }

    /// Append a node; returns its id.
    pub fn push(&mut self, node: Node) -> u32 {
        self.nodes.push(node);
        (self.nodes.len() - 1) as u32
    }

    #[must_use]
    pub fn data_size(&self) -> u64 {
        self.offset
    }

    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Nodes and data chunks, in file order.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Node>, Vec<Vec<u8>>) {
        (self.nodes, self.chunks)
    }
}

/// A column encoder for one type.
#[derive(Debug)]
pub enum Encoder {
    Int(IntEncoder),
    Uint(UintEncoder),
    Float(FloatEncoder),
    Bytes(BytesEncoder),
    Primitive(PrimitiveEncoder),
    Dict(DictEncoder),
    Nulls(NullsEncoder),
    Record(RecordEncoder),
    Array(ArrayEncoder),
    Map(MapEncoder),
    Union(UnionEncoder),
    Named(NamedEncoder),
    Error(ErrorEncoder),
}

/// Encoder for values of `typ` that may be null.
pub fn new_encoder(typ: &Type) -> Result<Encoder> {
    Ok(Encoder::Nulls(NullsEncoder::new(typ.clone(), typed(typ)?)))
}

/// Encoder for non-null values of `typ`.
pub fn typed(typ: &Type) -> Result<Encoder> {
    Ok(match typ.kind() {
        TypeKind::Named { name, typ: under } => {
            Encoder::Named(NamedEncoder::new(name.clone(), typed(under)?))
        }
        TypeKind::Record(fields) => Encoder::Record(RecordEncoder::new(typ.clone(), fields)?),
        TypeKind::Array(inner) => Encoder::Array(ArrayEncoder::new(false, new_encoder(inner)?)),
        TypeKind::Set(inner) => Encoder::Array(ArrayEncoder::new(true, new_encoder(inner)?)),
        TypeKind::Map(k, v) => Encoder::Map(MapEncoder::new(new_encoder(k)?, new_encoder(v)?)),
        TypeKind::Union(members) => Encoder::Union(UnionEncoder::new(
            members.iter().map(new_encoder).collect::<Result<_>>()?,
        )),
        TypeKind::Error(inner) => Encoder::Error(ErrorEncoder::new(typed(inner)?)),
        TypeKind::Enum(_) | TypeKind::Primitive(_) => {
            Encoder::Dict(DictEncoder::new(typ.clone(), leaf(typ)?))
        }
    })
}

/// Plain encoder for a primitive or enum type.
pub fn leaf(typ: &Type) -> Result<Encoder> {
    let t = typ.clone();
    Ok(match typ.kind() {
        TypeKind::Enum(_) => Encoder::Uint(UintEncoder::new(t)),
        TypeKind::Primitive(k) if k.is_int() => Encoder::Int(IntEncoder::new(t)),
        TypeKind::Primitive(k) if k.is_uint() => Encoder::Uint(UintEncoder::new(t)),
        TypeKind::Primitive(k) if k.is_float() => Encoder::Float(FloatEncoder::new(t)),
        TypeKind::Primitive(PrimitiveKind::Bytes | PrimitiveKind::String | PrimitiveKind::Type) => {
            Encoder::Bytes(BytesEncoder::new(t))
        }
        TypeKind::Primitive(
            PrimitiveKind::Bool | PrimitiveKind::Ip | PrimitiveKind::Net | PrimitiveKind::Null,
        ) => Encoder::Primitive(PrimitiveEncoder::new(t)),
        TypeKind::Primitive(k) => return Err(Error::UnsupportedPrimitive(k.id())),
        _ => return Err(Error::InvalidType(format!("{} is not a leaf type", typ))),
    })
}

impl Encoder {
    /// Append one row.
    pub fn write(&mut self, elem: Elem<'_>) -> Result<()> {
        match self {
            Self::Nulls(e) => return e.write(elem),
            _ if elem.is_none() => {
                return Err(Error::bad_value("none outside an optional field"));
            }
            _ => {}
        }
        let Some(body) = elem.body() else {
            return Err(Error::bad_value("null where a value is required"));
        };
        match self {
            Self::Int(e) => e.write(body),
            Self::Uint(e) => e.write(body),
            Self::Float(e) => e.write(body),
            Self::Bytes(e) => e.write(body),
            Self::Primitive(e) => e.write(body),
            Self::Dict(e) => e.write(body),
            Self::Record(e) => e.write(body),
            Self::Array(e) => e.write(body),
            Self::Map(e) => e.write(body),
            Self::Union(e) => e.write(body),
            Self::Named(e) => e.inner.write(elem),
            Self::Error(e) => e.inner.write(elem),
            Self::Nulls(_) => Ok(()),
        }
    }

    /// Rows written so far.
    #[must_use]
    pub fn rows(&self) -> u64 {
        match self {
            Self::Int(e) => e.rows(),
            Self::Uint(e) => e.rows(),
            Self::Float(e) => e.rows(),
            Self::Bytes(e) => e.rows(),
            Self::Primitive(e) => e.rows(),
            Self::Dict(e) => e.rows(),
            Self::Nulls(e) => e.rows(),
            Self::Record(e) => e.rows(),
            Self::Array(e) => e.rows(),
            Self::Map(e) => e.rows(),
            Self::Union(e) => e.rows(),
            Self::Named(e) => e.inner.rows(),
            Self::Error(e) => e.inner.rows(),
        }
    }

    /// Forbid a `Const` node for this column (a nulls node cannot spread over
    /// one).
    pub fn forbid_const(&mut self) {
        match self {
            Self::Dict(e) => e.forbid_const(),
            Self::Named(e) => e.inner.forbid_const(),
            Self::Error(e) => e.inner.forbid_const(),
            _ => {}
        }
    }

    /// Produce segment buffers.
    pub fn encode(&mut self, ctx: &EncodeContext) -> Result<()> {
        match self {
            Self::Int(e) => e.encode(ctx),
            Self::Uint(e) => e.encode(ctx),
            Self::Float(e) => e.encode(ctx),
            Self::Bytes(e) => e.encode(ctx),
            Self::Primitive(e) => e.encode(ctx),
            Self::Dict(e) => e.encode(ctx),
            Self::Nulls(e) => e.encode(ctx),
            Self::Record(e) => e.encode(ctx),
            Self::Array(e) => e.encode(ctx),
            Self::Map(e) => e.encode(ctx),
            Self::Union(e) => e.encode(ctx),
            Self::Named(e) => e.inner.encode(ctx),
            Self::Error(e) => e.inner.encode(ctx),
        }
    }

    /// Emit nodes and segments; returns the root node id of this subtree.
    pub fn metadata(&mut self, m: &mut MetaBuilder) -> Result<u32> {
        match self {
            Self::Int(e) => e.metadata(m),
            Self::Uint(e) => e.metadata(m),
            Self::Float(e) => e.metadata(m),
            Self::Bytes(e) => e.metadata(m),
            Self::Primitive(e) => e.metadata(m),
            Self::Dict(e) => e.metadata(m),
            Self::Nulls(e) => e.metadata(m),
            Self::Record(e) => e.metadata(m),
            Self::Array(e) => e.metadata(m),
            Self::Map(e) => e.metadata(m),
            Self::Union(e) => e.metadata(m),
            Self::Named(e) => {
                let values = e.inner.metadata(m)?;
                Ok(m.push(Node::Named {
                    name: e.name.clone(),
                    values,
                }))
            }
            Self::Error(e) => {
                let values = e.inner.metadata(m)?;
                Ok(m.push(Node::Error { values }))
            }
        }
    }
}

/// Run `f` over `items`, spreading them across `ctx.threads` scoped threads.
/// Returns the first error.
pub(crate) fn encode_parallel<T, F>(items: &mut [T], ctx: &EncodeContext, f: F) -> Result<()>
where
    T: Send,
    F: Fn(&mut T, &EncodeContext) -> Result<()> + Sync,
{
    if ctx.threads <= 1 || items.len() <= 1 {
        return items.iter_mut().try_for_each(|it| f(it, ctx));
    }
    let per = items.len().div_ceil(ctx.threads);
    let inner = EncodeContext {
        threads: 1,
        ..*ctx
    };
    std::thread::scope(|s| {
        let handles: Vec<_> = items
            .chunks_mut(per)
            .map(|chunk| {
                let f = &f;
                let inner = &inner;
                s.spawn(move || chunk.iter_mut().try_for_each(|it| f(it, inner)))
            })
            .collect();
        let mut first = Ok(());
        for h in handles {
            let res = h
                .join()
                .unwrap_or_else(|_| Err(Error::bad_value("encoder thread panicked")));
            if first.is_ok() {
                first = res;
            }
        }
        first
    })
}

/// Alternating run lengths, fed one row at a time.
#[derive(Debug, Clone)]
pub struct RunBuilder {
    runs: Vec<u64>,
    first: bool,
    in_first: bool,
    run: u64,
    set: u64,
    rows: u64,
}

impl RunBuilder {
    /// Runs start in state `first`.
    #[must_use]
    pub fn new(first: bool) -> Self {
        Self {
            runs: Vec::new(),
            first,
            in_first: true,
            run: 0,
            set: 0,
            rows: 0,
        }
    }

    /// Record one row; `bit` is the null or none flag.
    pub fn push(&mut self, bit: bool) {
        let in_first = bit == self.first;
        if in_first != self.in_first {
            self.runs.push(self.run);
            self.run = 0;
            self.in_first = in_first;
        }
        self.run += 1;
        self.rows += 1;
        if bit {
            self.set += 1;
        }
    }

    /// Rows flagged so far.
    #[must_use]
    pub fn set(&self) -> u64 {
        self.set
    }

    #[must_use]
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Completed run list.
    #[must_use]
    pub fn runs(&self) -> Vec<u64> {
        let mut out = self.runs.clone();
        out.push(self.run);
        out
    }
}
