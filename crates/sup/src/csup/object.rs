// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CSUP object handle and projection.
//!
//! [`Object::open_at`] reads the header and the metadata section, validates
//! the node tree and measures the trailing BSUP section so the next object's
//! offset is known. Nothing from the data section is read until
//! [`Object::project`] walks the tree:
//!
//! - records load only the projected fields; absent fields become missing
//!   columns of the record's length;
//! - leaf columns under a non-empty projection become records of missing
//!   fields without any I/O;
//! - unions, constants and BSUP columns are loaded whole and projected as
//!   vectors.
//!
//! Segments go through the object's [`PageCache`]; decoded auxiliary arrays
//! and leaf vectors stay in the [`Shadows`] of the nodes that loaded them.

use super::cache::{CacheStats, PageCache};
use super::header::Header;
use super::metadata::{self, Node, NodeField};
use super::reader_at::{ReaderAt, SectionReader};
use super::segment::{
    decode_all_uvarints, decode_floats, decode_uvarints, decode_varints, lengths_to_offsets,
    Segment,
};
use super::shadow::Shadows;
use crate::brow::parser::{DecodeOptions, Unit};
use crate::brow::Parser;
use crate::cancel::CancelToken;
use crate::config::{Limits, RuntimeConfig, DEFAULT_PAGE_CACHE_ENTRIES, MAX_TYPE_DEPTH};
use crate::encoding::iter::Iter;
use crate::error::{Error, Result};
use crate::projection::{project_type, Projection};
use crate::types::{Type, TypeMapper, TypeRegistry};
use crate::value::Value;
use crate::vector::{self, project::all_missing, Bitmap, BytesTable, Vector, VectorBuilder};
use parking_lot::Mutex;
use std::sync::Arc;

fn to_usize(n: u64, what: &str) -> Result<usize> {
    usize::try_from(n).map_err(|_| Error::MalformedMetadata(format!("{} of {}", what, n)))
}

/// Bitmap over `len` rows from alternating runs starting with `first`.
fn runs_bitmap(runs: &[u64], len: usize, first: bool) -> Result<Bitmap> {
    let total = runs
        .iter()
        .try_fold(0u64, |acc, &r| acc.checked_add(r))
        .ok_or_else(|| Error::MalformedMetadata("run lengths overflow".into()))?;
    if total != len as u64 {
        return Err(Error::MalformedMetadata(format!(
            "runs cover {} rows, node has {}",
            total, len
        )));
    }
    Ok(Bitmap::from_runs(runs, first))
}

/// One CSUP object inside a positional source.
pub struct Object {
    src: Arc<dyn ReaderAt>,
    base: u64,
    header: Header,
    limits: Limits,
    context: Arc<TypeRegistry>,
    nodes: Vec<Node>,
    types: Vec<Option<Type>>,
    /// First trailing value of each BSUP node.
    bsup_start: Vec<Option<usize>>,
    bsup_count: usize,
    trailing_size: u64,
    pages: PageCache,
    shadows: Shadows,
    bsup: Mutex<Option<Arc<Vec<Value>>>>,
    mapper: Mutex<Option<Arc<TypeMapper>>>,
}

impl Object {
    /// Open the object at the start of `src` with default limits.
    pub fn open(src: Arc<dyn ReaderAt>) -> Result<Self> {
        Self::open_at(
            src,
            0,
            RuntimeConfig::global().limits(),
            DEFAULT_PAGE_CACHE_ENTRIES,
        )
    }

    /// Open the object starting at byte `base` of `src`.
    pub fn open_at(
        src: Arc<dyn ReaderAt>,
        base: u64,
        limits: Limits,
        cache_pages: usize,
    ) -> Result<Self> {
        let mut hdr = [0u8; Header::SIZE];
        src.read_exact_at(&mut hdr, base).map_err(|e| Error::from(e).at(base))?;
        let header = Header::parse(&hdr, &limits).map_err(|e| e.at(base))?;
        let size = src.size()?;
        let end = base
            .checked_add(header.sections_size())
            .ok_or_else(|| Error::MalformedHeader("section sizes overflow".into()))?;
        if end > size {
            return Err(Error::truncated(format!(
                "object at {} needs {} bytes, source has {}",
                base,
                header.sections_size(),
                size.saturating_sub(base)
            )));
        }

        let mut meta = vec![0u8; to_usize(header.meta_size, "metadata bytes")?];
        src.read_exact_at(&mut meta, base + Header::SIZE as u64)?;
        let context = Arc::new(TypeRegistry::new());
        let nodes = metadata::decode(&context, &meta, limits)?;
        metadata::validate(&nodes, header.data_size)?;
        if header.root as usize >= nodes.len() {
            return Err(Error::MalformedMetadata(format!(
                "root {} outside {} nodes",
                header.root,
                nodes.len()
            )));
        }
        check_depth(&nodes)?;
        let types = metadata::node_types(&context, &nodes)?;

        let mut bsup_start = vec![None; nodes.len()];
        let mut bsup_count = 0usize;
        for (id, node) in nodes.iter().enumerate() {
            if let Node::Bsup { count } = node {
                bsup_start[id] = Some(bsup_count);
                bsup_count = bsup_count
                    .checked_add(to_usize(*count, "BSUP values")?)
                    .ok_or_else(|| Error::MalformedMetadata("BSUP counts overflow".into()))?;
            }
        }
        let trailing_size = if bsup_count > 0 {
            measure_trailing(&src, end, size, limits)?
        } else {
            0
        };
        // Every trailing value takes at least one byte.
        if bsup_count as u64 > trailing_size {
            return Err(Error::MalformedMetadata(format!(
                "{} BSUP values in a {} byte trailing section",
                bsup_count, trailing_size
            )));
        }

        log::debug!(
            "[CSUP] opened object at {}: {} nodes, root {}, meta {} B, data {} B, trailing {} B",
            base,
            nodes.len(),
            header.root,
            header.meta_size,
            header.data_size,
            trailing_size
        );
        Ok(Self {
            shadows: Shadows::new(nodes.len()),
            src,
            base,
            header,
            limits,
            context,
            nodes,
            types,
            bsup_start,
            bsup_count,
            trailing_size,
            pages: PageCache::new(cache_pages),
            bsup: Mutex::new(None),
            mapper: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn root_id(&self) -> u32 {
        self.header.root
    }

    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Registry holding the metadata's types.
    #[must_use]
    pub fn context(&self) -> &Arc<TypeRegistry> {
        &self.context
    }

    #[must_use]
    pub fn metadata(&self) -> &[Node] {
        &self.nodes
    }

    /// Rows in the object.
    pub fn len(&self) -> Result<u64> {
        Node::rows(&self.nodes, self.header.root)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Bytes from the header through the trailing section.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.header.sections_size() + self.trailing_size
    }

    fn data_start(&self) -> u64 {
        self.base + self.header.data_offset()
    }

    /// Sequential reader over the data section.
    #[must_use]
    pub fn data_reader(&self) -> SectionReader {
        let start = self.data_start();
        SectionReader::new(Arc::clone(&self.src), start, start + self.header.data_size)
    }

    /// Parser over the trailing BSUP section, if there is one. Types are
    /// interned in the object's context.
    #[must_use]
    pub fn brow_reader(&self) -> Option<Parser<SectionReader>> {
        if self.trailing_size == 0 {
            return None;
        }
        let start = self.base + self.header.sections_size();
        let r = SectionReader::new(Arc::clone(&self.src), start, start + self.trailing_size);
        Some(Parser::new(Arc::clone(&self.context), r, self.limits).stop_at_eos(true))
    }

    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.pages.stats()
    }

    /// Metadata nodes a projection has reached.
    #[must_use]
    pub fn shadows_touched(&self) -> usize {
        self.shadows.touched()
    }

    /// Project every row into `reg`.
    pub fn project(&self, reg: &Arc<TypeRegistry>, proj: &Projection) -> Result<Vector> {
        let mapper = self.mapper(reg);
        let load = Load {
            obj: self,
            reg,
            mapper: &mapper,
        };
        let v = load.project(self.header.root, proj)?;
        log::trace!(
            "[CSUP] projected {} rows ({}), cache {:?}",
            v.len(),
            proj,
            self.pages.stats()
        );
        Ok(v)
    }

    fn mapper(&self, reg: &Arc<TypeRegistry>) -> Arc<TypeMapper> {
        let mut slot = self.mapper.lock();
        match slot.as_ref() {
            Some(m) if Arc::ptr_eq(m.target(), reg) => Arc::clone(m),
            _ => {
                let m = Arc::new(TypeMapper::new(Arc::clone(reg)));
                *slot = Some(Arc::clone(&m));
                m
            }
        }
    }

    /// Decoded bytes of `seg`.
    fn segment(&self, seg: &Segment) -> Result<Arc<Vec<u8>>> {
        if seg.length > self.limits.max_data_size {
            return Err(Error::MalformedMetadata(format!(
                "segment at {} inflates to {} bytes",
                seg.offset, seg.length
            )));
        }
        // Empty segments may share an offset with the next one.
        if seg.mem_length == 0 {
            return Ok(Arc::new(seg.decode(&[])?));
        }
        self.pages.get_or_load(seg.offset, || {
            let mut raw = vec![0u8; to_usize(seg.mem_length, "segment bytes")?];
            let at = self.data_start() + seg.offset;
            self.src.read_exact_at(&mut raw, at).map_err(|e| Error::from(e).at(at))?;
            log::trace!(
                "[CSUP] loaded segment at {} ({} B on disk, {} B decoded)",
                seg.offset,
                seg.mem_length,
                seg.length
            );
            seg.decode(&raw).map_err(|e| e.at(at))
        })
    }

    /// Every value of the trailing section, in the context registry.
    fn bsup_values(&self) -> Result<Arc<Vec<Value>>> {
        let mut slot = self.bsup.lock();
        if let Some(v) = slot.as_ref() {
            return Ok(Arc::clone(v));
        }
        let mut p = self
            .brow_reader()
            .ok_or_else(|| Error::MalformedMetadata("BSUP node without trailing section".into()))?;
        let cancel = CancelToken::new();
        let mut values = Vec::new();
        while let Some(unit) = p.next_unit()? {
            match unit {
                Unit::Values(job) => {
                    let mut opts = DecodeOptions {
                        reg: &self.context,
                        limits: self.limits,
                        validate: true,
                        projector: None,
                        cancel: &cancel,
                    };
                    values.extend(job.decode(&mut opts)?);
                }
                Unit::Control(_) => {
                    return Err(Error::MalformedMetadata(
                        "control frame in trailing section".into(),
                    ));
                }
            }
        }
        if values.len() != self.bsup_count {
            return Err(Error::MalformedMetadata(format!(
                "trailing section holds {} values, BSUP nodes need {}",
                values.len(),
                self.bsup_count
            )));
        }
        let values = Arc::new(values);
        *slot = Some(Arc::clone(&values));
        Ok(values)
    }
}

impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("base", &self.base)
            .field("header", &self.header)
            .field("nodes", &self.nodes.len())
            .field("trailing_size", &self.trailing_size)
            .field("pages", &self.pages)
            .finish()
    }
}

/// Nesting of every node, bounded so projection recursion stays shallow.
fn check_depth(nodes: &[Node]) -> Result<()> {
    let mut depth = vec![0usize; nodes.len()];
    for (id, node) in nodes.iter().enumerate() {
        let d = 1 + node
            .children()
            .iter()
            .map(|&c| depth[c as usize])
            .max()
            .unwrap_or(0);
        if d > MAX_TYPE_DEPTH {
            return Err(Error::MalformedMetadata(format!(
                "node {} nested {} levels deep",
                id, d
            )));
        }
        depth[id] = d;
    }
    Ok(())
}

/// Size of the trailing BSUP stream starting at `start`.
fn measure_trailing(src: &Arc<dyn ReaderAt>, start: u64, end: u64, limits: Limits) -> Result<u64> {
    let r = SectionReader::new(Arc::clone(src), start, end);
    let mut p = Parser::new(Arc::new(TypeRegistry::new()), r, limits).stop_at_eos(true);
    while p.next_unit().map_err(|e| e.at(start))?.is_some() {}
    if !p.at_eos() {
        return Err(Error::truncated(format!(
            "trailing section at {} ends without end of stream",
            start
        )));
    }
    Ok(p.bytes_read())
}

/// Dict entry counts, which must fit the `u32` the vector stores.
fn dict_counts(id: u32, counts: &[u64]) -> Result<Vec<u32>> {
    counts
        .iter()
        .map(|&c| {
            u32::try_from(c).map_err(|_| {
                Error::MalformedMetadata(format!("dict node {} count {} out of range", id, c))
            })
        })
        .collect()
}

/// One projection pass into a query registry.
struct Load<'a> {
    obj: &'a Object,
    reg: &'a Arc<TypeRegistry>,
    mapper: &'a TypeMapper,
}

impl Load<'_> {
    fn node(&self, id: u32) -> Result<&Node> {
        self.obj
            .nodes
            .get(id as usize)
            .ok_or_else(|| Error::MalformedMetadata(format!("node id {} out of range", id)))
    }

    fn rows(&self, id: u32) -> Result<usize> {
        to_usize(Node::rows(&self.obj.nodes, id)?, "rows")
    }

    /// Type of node `id` in the query registry.
    fn typ(&self, id: u32) -> Result<Type> {
        let t = self
            .obj
            .types
            .get(id as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| Error::MalformedMetadata(format!("node {} has no type", id)))?;
        self.mapper.enter(t)
    }

    fn uvarints(&self, id: u32, seg: &Segment, count: Option<usize>) -> Result<Arc<Vec<u64>>> {
        self.obj.shadows.node(id).aux(seg, || {
            let bytes = self.obj.segment(seg)?;
            match count {
                Some(n) => decode_uvarints(&bytes, n),
                None => decode_all_uvarints(&bytes),
            }
        })
    }

    fn tags(&self, id: u32, seg: &Segment, n: usize) -> Result<Vec<u32>> {
        self.uvarints(id, seg, Some(n))?
            .iter()
            .map(|&t| {
                u32::try_from(t).map_err(|_| Error::MalformedMetadata(format!("tag {}", t)))
            })
            .collect()
    }

    fn is_record(&self, id: u32) -> Result<bool> {
        Ok(match self.node(id)? {
            Node::Record { .. } => true,
            Node::Named { values, .. } => self.is_record(*values)?,
            _ => false,
        })
    }

    /// Rows of node `id` under `proj`.
    fn project(&self, id: u32, proj: &Projection) -> Result<Vector> {
        if proj.is_all() {
            return self.full(id);
        }
        let n = self.rows(id)?;
        match self.node(id)? {
            Node::Record { fields, .. } => {
                let typ = project_type(self.reg, &self.typ(id)?, proj)?;
                let mut cols = Vec::with_capacity(proj.fields().len());
                for pf in proj.fields() {
                    match fields.iter().find(|f| f.name == pf.name) {
                        Some(f) => {
                            let col = self.project(f.values, &pf.sub)?;
                            cols.push(self.with_nones(id, f, col, n)?);
                        }
                        None => cols.push(Vector::missing(self.reg, n)),
                    }
                }
                Ok(Vector::Record {
                    typ,
                    len: n,
                    fields: cols,
                    nulls: Bitmap::new(),
                })
            }
            Node::Named { values, .. } => self.project(*values, proj),
            Node::Dynamic { tags, values, .. } => {
                let tags = self.tags(id, tags, n)?;
                let values = values
                    .iter()
                    .map(|&v| self.project(v, proj))
                    .collect::<Result<Vec<_>>>()?;
                Vector::dynamic(tags, values)
            }
            Node::Nulls { runs, values, .. } if self.is_record(*values)? => {
                let bm = runs_bitmap(&self.uvarints(id, runs, None)?, n, true)?;
                self.project(*values, proj)?.spread(&bm, n)
            }
            Node::Union { .. } | Node::Const { .. } | Node::Bsup { .. } | Node::Nulls { .. } => {
                vector::project(self.reg, &self.full(id)?, proj)
            }
            Node::Primitive { .. }
            | Node::Int { .. }
            | Node::Uint { .. }
            | Node::Float { .. }
            | Node::Bytes { .. }
            | Node::Array { .. }
            | Node::Set { .. }
            | Node::Map { .. }
            | Node::Dict { .. }
            | Node::Error { .. } => all_missing(self.reg, proj, n),
        }
    }

    /// Spread a field column over its none rows.
    fn with_nones(&self, id: u32, f: &NodeField, col: Vector, n: usize) -> Result<Vector> {
        if f.nones.mem_length == 0 {
            if col.len() != n {
                return Err(Error::MalformedMetadata(format!(
                    "field {} has {} of {} rows",
                    f.name,
                    col.len(),
                    n
                )));
            }
            return Ok(col);
        }
        if !f.opt {
            return Err(Error::MalformedMetadata(format!(
                "nones in required field {}",
                f.name
            )));
        }
        let bm = runs_bitmap(&self.uvarints(id, &f.nones, None)?, n, false)?;
        let nones = bm.count_ones();
        if col.len() + nones != n {
            return Err(Error::MalformedMetadata(format!(
                "field {}: {} values and {} nones over {} rows",
                f.name,
                col.len(),
                nones,
                n
            )));
        }
        let tags = bm.iter().take(n).map(u32::from).collect();
        Vector::dynamic(tags, vec![col, Vector::missing(self.reg, nones)])
    }

    /// Every row of node `id`.
    fn full(&self, id: u32) -> Result<Vector> {
        let n = self.rows(id)?;
        let shadow = self.obj.shadows.node(id);
        match self.node(id)? {
            Node::Int { typ, location, .. } => shadow.vector(self.reg, || {
                Ok(Vector::Int {
                    typ: self.mapper.enter(typ)?,
                    values: decode_varints(&self.obj.segment(location)?, n)?,
                    nulls: Bitmap::new(),
                })
            }),
            Node::Uint { typ, location, .. } => shadow.vector(self.reg, || {
                Ok(Vector::Uint {
                    typ: self.mapper.enter(typ)?,
                    values: decode_uvarints(&self.obj.segment(location)?, n)?,
                    nulls: Bitmap::new(),
                })
            }),
            Node::Float { typ, location, .. } => shadow.vector(self.reg, || {
                Ok(Vector::Float {
                    typ: self.mapper.enter(typ)?,
                    values: decode_floats(&self.obj.segment(location)?, n)?,
                    nulls: Bitmap::new(),
                })
            }),
            Node::Bytes {
                typ,
                offsets,
                bytes,
                ..
            } => shadow.vector(self.reg, || {
                let lengths = decode_uvarints(&self.obj.segment(offsets)?, n)?;
                let body = self.obj.segment(bytes)?;
                Ok(Vector::Bytes {
                    typ: self.mapper.enter(typ)?,
                    table: BytesTable::from_lengths(&lengths, body.to_vec())?,
                    nulls: Bitmap::new(),
                })
            }),
            Node::Primitive { typ, location, .. } => shadow.vector(self.reg, || {
                let mut v = Vector::empty(self.reg, &self.mapper.enter(typ)?)?;
                for e in Iter::new(&self.obj.segment(location)?) {
                    v.push(e?)?;
                }
                if v.len() != n {
                    return Err(Error::MalformedMetadata(format!(
                        "primitive node {} has {} of {} rows",
                        id,
                        v.len(),
                        n
                    )));
                }
                Ok(v.finish())
            }),
            Node::Const { value, .. } => Ok(Vector::Const {
                value: Value::new(
                    self.mapper.enter(value.typ())?,
                    value.bytes().map(<[u8]>::to_vec),
                ),
                len: n,
            }),
            Node::Dict {
                index,
                counts,
                values,
                ..
            } => {
                let index = self.obj.segment(index)?;
                let counts = self.uvarints(id, counts, None)?;
                let entries = self.full(*values)?;
                if index.len() != n
                    || counts.len() != entries.len()
                    || index.iter().any(|&i| usize::from(i) >= entries.len())
                {
                    return Err(Error::MalformedMetadata(format!(
                        "dict node {} does not match its {} entries",
                        id,
                        entries.len()
                    )));
                }
                Ok(Vector::Dict {
                    typ: self.typ(id)?,
                    index: index.to_vec(),
                    counts: dict_counts(id, &counts)?,
                    values: Box::new(entries),
                    nulls: Bitmap::new(),
                })
            }
            Node::Nulls { runs, values, .. } => {
                let bm = runs_bitmap(&self.uvarints(id, runs, None)?, n, true)?;
                self.full(*values)?.spread(&bm, n)
            }
            Node::Record { fields, .. } => {
                let typ = self.typ(id)?;
                let cols = fields
                    .iter()
                    .map(|f| {
                        let col = self.full(f.values)?;
                        self.with_nones(id, f, col, n)
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Vector::Record {
                    typ,
                    len: n,
                    fields: cols,
                    nulls: Bitmap::new(),
                })
            }
            Node::Array {
                lengths, values, ..
            }
            | Node::Set {
                lengths, values, ..
            } => {
                let offsets = lengths_to_offsets(&self.uvarints(id, lengths, Some(n))?)?;
                let inner = self.full(*values)?;
                check_offsets(id, &offsets, inner.len())?;
                Ok(Vector::Array {
                    typ: self.typ(id)?,
                    offsets,
                    inner: Box::new(inner),
                    nulls: Bitmap::new(),
                })
            }
            Node::Map {
                lengths,
                keys,
                values,
                ..
            } => {
                let offsets = lengths_to_offsets(&self.uvarints(id, lengths, Some(n))?)?;
                let keys = self.full(*keys)?;
                let values = self.full(*values)?;
                check_offsets(id, &offsets, keys.len())?;
                check_offsets(id, &offsets, values.len())?;
                Ok(Vector::Map {
                    typ: self.typ(id)?,
                    offsets,
                    keys: Box::new(keys),
                    values: Box::new(values),
                    nulls: Bitmap::new(),
                })
            }
            Node::Union { tags, values, .. } => {
                let tags = self.tags(id, tags, n)?;
                let members = values
                    .iter()
                    .map(|&v| self.full(v))
                    .collect::<Result<Vec<_>>>()?;
                Vector::union(self.typ(id)?, tags, members, Bitmap::new())
            }
            Node::Dynamic { tags, values, .. } => {
                let tags = self.tags(id, tags, n)?;
                let values = values
                    .iter()
                    .map(|&v| self.full(v))
                    .collect::<Result<Vec<_>>>()?;
                Vector::dynamic(tags, values)
            }
            Node::Named { values, .. } => self.full(*values)?.with_type(self.typ(id)?),
            Node::Error { values } => Ok(Vector::Error {
                typ: self.typ(id)?,
                inner: Box::new(self.full(*values)?),
                nulls: Bitmap::new(),
            }),
            Node::Bsup { .. } => {
                let start = self.obj.bsup_start[id as usize]
                    .ok_or_else(|| Error::MalformedMetadata(format!("node {} is not BSUP", id)))?;
                let all = self.obj.bsup_values()?;
                let rows = all.get(start..start + n).ok_or_else(|| {
                    Error::MalformedMetadata(format!("BSUP node {} past trailing values", id))
                })?;
                shadow.vector(self.reg, || {
                    let mut b = VectorBuilder::new(Arc::clone(self.reg));
                    for v in rows {
                        b.push(&self.mapper.enter(v.typ())?, v.elem())?;
                    }
                    b.finish()
                })
            }
        }
    }
}

fn check_offsets(id: u32, offsets: &[u32], inner: usize) -> Result<()> {
    match offsets.last() {
        Some(&end) if end as usize == inner => Ok(()),
        _ => Err(Error::MalformedMetadata(format!(
            "container node {} lengths do not cover its {} elements",
            id, inner
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::CompressConfig;
    use crate::csup::reader_at::CountingReaderAt;
    use crate::csup::writer::{Writer, WriterConfig};
    use crate::error::ErrorKind;
    use crate::types::Field;
    use crate::value::record;

    fn write(values: &[Value], config: WriterConfig) -> Vec<u8> {
        let mut w = Writer::with_config(Vec::new(), config);
        for v in values {
            w.write(v).expect("write");
        }
        w.close().expect("close")
    }

    fn config() -> WriterConfig {
        WriterConfig::default()
            .compress(CompressConfig::none())
            .threads(2)
    }

    fn open(bytes: Vec<u8>) -> Object {
        Object::open(Arc::new(bytes)).expect("open")
    }

    #[test]
    fn test_full_projection_roundtrip() {
        let reg = TypeRegistry::new();
        let rec = reg
            .lookup_record(vec![
                Field::new("a", Type::int64()),
                Field::opt("b", Type::string()),
                Field::new("c", reg.lookup_array(Type::float64())),
            ])
            .expect("record");
        let values: Vec<Value> = (0..40)
            .map(|i| {
                let b = (i % 4 != 0).then(|| Value::string(["x", "y"][i % 2]));
                let c = Value::array(
                    reg.lookup_array(Type::float64()),
                    &[Value::float64(i as f64), Value::float64(0.5)],
                )
                .expect("array");
                record(rec.clone(), &[Some(Value::int64(i as i64)), b, Some(c)]).expect("value")
            })
            .collect();
        let obj = open(write(&values, config().bsup_threshold(0)));
        let out = Arc::new(TypeRegistry::new());
        let rows = obj
            .project(&out, &Projection::all())
            .expect("project")
            .values()
            .expect("rows");
        assert_eq!(rows.len(), values.len());
        for (got, want) in rows.iter().zip(&values) {
            assert_eq!(got.to_string(), want.to_string());
            assert_eq!(got.bytes(), want.bytes());
        }
    }

    #[test]
    fn test_projection_reads_only_needed_segments() {
        let reg = TypeRegistry::new();
        let rec = reg
            .lookup_record(vec![Field::new("a", Type::int64()), Field::new("b", Type::string())])
            .expect("record");
        let values: Vec<Value> = (0..500)
            .map(|i| {
                record(
                    rec.clone(),
                    &[Some(Value::int64(i)), Some(Value::string(&format!("s{}", i)))],
                )
                .expect("value")
            })
            .collect();
        let bytes = write(&values, config().bsup_threshold(0));
        let src = Arc::new(CountingReaderAt::new(bytes));
        let obj = Object::open(Arc::clone(&src) as Arc<dyn ReaderAt>).expect("open");
        let opened = src.bytes_read();
        let v = obj
            .project(&Arc::new(TypeRegistry::new()), &Projection::from_paths(["a"]))
            .expect("project");
        assert_eq!(v.len(), 500);
        let Some(Node::Int { location, .. }) = obj
            .metadata()
            .iter()
            .find(|n| matches!(n, Node::Int { .. }))
        else {
            panic!("expected int column");
        };
        assert_eq!(src.bytes_read() - opened, location.mem_length);
    }

    #[test]
    fn test_bsup_children_in_trailing_section() {
        let values = vec![
            Value::int64(1),
            Value::string("a"),
            Value::int64(2),
            Value::bool(true),
        ];
        let bytes = write(&values, config());
        let obj = open(bytes.clone());
        assert!(obj.size() > obj.header().sections_size());
        assert_eq!(obj.size(), bytes.len() as u64);
        assert!(obj.brow_reader().is_some());
        let rows = obj
            .project(&Arc::new(TypeRegistry::new()), &Projection::all())
            .expect("project")
            .values()
            .expect("rows");
        let text: Vec<String> = rows.iter().map(ToString::to_string).collect();
        assert_eq!(text, ["1", r#""a""#, "2", "true"]);
    }

    #[test]
    fn test_truncated_object() {
        let bytes = write(&vec![Value::int64(1); 300], config());
        let short = bytes[..bytes.len() - 1].to_vec();
        let err = Object::open(Arc::new(short)).expect_err("truncated");
        assert_eq!(err.kind(), ErrorKind::Truncated);
    }

    #[test]
    fn test_root_out_of_range() {
        let mut bytes = write(&vec![Value::int64(1); 300], config());
        bytes[24..28].copy_from_slice(&99u32.to_le_bytes());
        let err = Object::open(Arc::new(bytes)).expect_err("bad root");
        assert_eq!(err.kind(), ErrorKind::MalformedMetadata);
    }

    #[test]
    fn test_dict_counts_must_fit_u32() {
        assert_eq!(dict_counts(3, &[1, 7]).expect("counts"), vec![1, 7]);
        let err = dict_counts(3, &[1, u64::from(u32::MAX) + 1]).expect_err("overflow");
        assert_eq!(err.kind(), ErrorKind::MalformedMetadata);
    }

    #[test]
    fn test_runs_bitmap_checks_total() {
        let bm = runs_bitmap(&[1, 2, 1], 4, true).expect("runs");
        assert!(bm.get(0) && !bm.get(1) && !bm.get(2) && bm.get(3));
        assert!(runs_bitmap(&[1, 2], 4, true).is_err());
        assert!(runs_bitmap(&[u64::MAX, 2], 4, true).is_err());
    }
}
