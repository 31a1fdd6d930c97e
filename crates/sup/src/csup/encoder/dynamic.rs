// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Top-level encoder of an object.
//!
//! Each distinct input type gets a child and a tag. A child keeps raw bodies
//! until it has seen the BSUP threshold of rows, then switches to a column
//! encoder. Children still below the threshold at close are written as BSUP
//! values into the trailing section.

use super::{encode_parallel, new_encoder, EncodeContext, Encoder, MetaBuilder};
use crate::csup::metadata::Node;
use crate::csup::segment::{encode_uvarints, SegmentBuf};
use crate::encoding::iter::Elem;
use crate::error::{Error, Result};
use crate::types::Type;
use crate::value::Value;
use std::collections::HashMap;

#[derive(Debug)]
struct Child {
    typ: Type,
    count: u64,
    pending: Vec<Option<Vec<u8>>>,
    encoder: Option<Encoder>,
}

impl Child {
    fn write(&mut self, elem: Elem<'_>, threshold: usize) -> Result<()> {
        if let Some(enc) = &mut self.encoder {
            enc.write(elem)?;
        } else {
            self.pending.push(elem.body().map(<[u8]>::to_vec));
            if self.pending.len() >= threshold {
                let mut enc = new_encoder(&self.typ)?;
                let container = self.typ.is_container();
                for body in std::mem::take(&mut self.pending) {
                    enc.write(Elem::from_body(body.as_deref(), container))?;
                }
                self.encoder = Some(enc);
            }
        }
        self.count += 1;
        Ok(())
    }
}

/// What the metadata pass hands back to the writer.
#[derive(Debug)]
pub struct Finished {
    pub root: u32,
    /// Values for the trailing BSUP section, in node order.
    pub bsup: Vec<Value>,
}

#[derive(Debug)]
pub struct DynamicEncoder {
    threshold: usize,
    tags: Vec<u64>,
    children: Vec<Child>,
    by_type: HashMap<u32, usize>,
    out: Option<SegmentBuf>,
}

impl DynamicEncoder {
    #[must_use]
    pub fn new(bsup_threshold: usize) -> Self {
        Self {
            threshold: bsup_threshold,
            tags: Vec::new(),
            children: Vec::new(),
            by_type: HashMap::new(),
            out: None,
        }
    }

    pub fn write(&mut self, typ: &Type, elem: Elem<'_>) -> Result<()> {
        if elem.is_none() {
            return Err(Error::bad_value("none at top level"));
        }
        let tag = match self.by_type.get(&typ.name_id()) {
            Some(&tag) => tag,
            None => {
                // Fails early on types no column can hold.
                new_encoder(typ)?;
                self.children.push(Child {
                    typ: typ.clone(),
                    count: 0,
                    pending: Vec::new(),
                    encoder: None,
                });
                let tag = self.children.len() - 1;
                self.by_type.insert(typ.name_id(), tag);
                tag
            }
        };
        self.children[tag].write(elem, self.threshold)?;
        self.tags.push(tag as u64);
        Ok(())
    }

    /// Rows written so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Distinct top-level types seen.
    #[must_use]
    pub fn types(&self) -> usize {
        self.children.len()
    }

    pub fn encode(&mut self, ctx: &EncodeContext) -> Result<()> {
        self.out = Some(SegmentBuf::new(encode_uvarints(&self.tags), &ctx.compress)?);
        encode_parallel(&mut self.children, ctx, |c, ctx| match &mut c.encoder {
            Some(enc) => enc.encode(ctx),
            None => Ok(()),
        })
    }

    pub fn metadata(&mut self, m: &mut MetaBuilder) -> Result<Finished> {
        let mut ids = Vec::with_capacity(self.children.len());
        let mut bsup = Vec::new();
        for c in &mut self.children {
            match &mut c.encoder {
                Some(enc) => ids.push(enc.metadata(m)?),
                None => {
                    bsup.extend(
                        c.pending
                            .drain(..)
                            .map(|body| Value::new(c.typ.clone(), body)),
                    );
                    ids.push(m.push(Node::Bsup { count: c.count }));
                }
            }
        }
        if let ([root], [child]) = (&ids[..], &self.children[..]) {
            if child.encoder.is_some() {
                return Ok(Finished { root: *root, bsup });
            }
        }
        let tags = m.place(self.out.take())?;
        let root = m.push(Node::Dynamic {
            length: self.tags.len() as u64,
            tags,
            values: ids,
        });
        Ok(Finished { root, bsup })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::CompressConfig;

    fn ctx() -> EncodeContext {
        EncodeContext {
            compress: CompressConfig::none(),
            threads: 2,
        }
    }

    #[test]
    fn test_single_type_has_no_dynamic() {
        let mut d = DynamicEncoder::new(2);
        for i in 0..4 {
            let v = Value::int64(i);
            d.write(v.typ(), v.elem()).expect("write");
        }
        d.encode(&ctx()).expect("encode");
        let mut m = MetaBuilder::new();
        let fin = d.metadata(&mut m).expect("meta");
        assert!(fin.bsup.is_empty());
        assert!(matches!(m.nodes()[fin.root as usize], Node::Int { count: 4, .. }));
    }

    #[test]
    fn test_small_children_become_bsup() {
        let mut d = DynamicEncoder::new(3);
        let values = [
            Value::int64(1),
            Value::string("a"),
            Value::int64(2),
            Value::int64(3),
            Value::null(Type::string()),
        ];
        for v in &values {
            d.write(v.typ(), v.elem()).expect("write");
        }
        assert_eq!(d.types(), 2);
        d.encode(&ctx()).expect("encode");
        let mut m = MetaBuilder::new();
        let fin = d.metadata(&mut m).expect("meta");
        let Node::Dynamic { length, values, .. } = &m.nodes()[fin.root as usize] else {
            panic!("expected dynamic root");
        };
        assert_eq!(*length, 5);
        assert!(matches!(m.nodes()[values[1] as usize], Node::Bsup { count: 2 }));
        assert_eq!(fin.bsup.len(), 2);
        assert_eq!(fin.bsup[0].to_string(), r#""a""#);
        assert!(fin.bsup[1].is_null());
    }

    #[test]
    fn test_top_level_none_rejected() {
        let mut d = DynamicEncoder::new(1);
        assert!(d.write(&Type::int64(), Elem::None).is_err());
    }
}
