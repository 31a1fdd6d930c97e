// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dictionary encoder for leaf columns.
//!
//! Rows go both to the plain leaf encoder and to a dictionary of distinct
//! bodies with one index byte per row. At encode time the cheaper form wins:
//!
//! - one distinct value: a `Const` node (unless a nulls node sits above);
//! - up to [`DICT_MAX_ENTRIES`] values, with repetition, smaller than the
//!   plain bodies: a `Dict` node over an encoder of the distinct entries;
//! - otherwise: the plain leaf node.

use super::{leaf, EncodeContext, Encoder, MetaBuilder};
use crate::config::DICT_MAX_ENTRIES;
use crate::csup::metadata::Node;
use crate::csup::segment::{encode_uvarints, SegmentBuf};
use crate::encoding::iter::Elem;
use crate::error::Result;
use crate::types::Type;
use crate::value::Value;
use std::collections::HashMap;

#[derive(Debug)]
enum Choice {
    Undecided,
    Plain,
    Const,
    Dict {
        entries: Box<Encoder>,
        index: Option<SegmentBuf>,
        counts: Option<SegmentBuf>,
    },
}

#[derive(Debug)]
pub struct DictEncoder {
    typ: Type,
    plain: Box<Encoder>,
    lookup: HashMap<Vec<u8>, u8>,
    entries: Vec<Vec<u8>>,
    counts: Vec<u32>,
    index: Vec<u8>,
    plain_bytes: u64,
    overflow: bool,
    allow_const: bool,
    choice: Choice,
}

impl DictEncoder {
    #[must_use]
    pub fn new(typ: Type, plain: Encoder) -> Self {
        Self {
            typ,
            plain: Box::new(plain),
            lookup: HashMap::new(),
            entries: Vec::new(),
            counts: Vec::new(),
            index: Vec::new(),
            plain_bytes: 0,
            overflow: false,
            allow_const: true,
            choice: Choice::Undecided,
        }
    }

    pub fn write(&mut self, body: &[u8]) -> Result<()> {
        self.plain.write(Elem::Primitive(body))?;
        self.plain_bytes += body.len() as u64 + 1;
        if self.overflow {
            return Ok(());
        }
        if let Some(&i) = self.lookup.get(body) {
            self.index.push(i);
            self.counts[usize::from(i)] += 1;
            return Ok(());
        }
        if self.entries.len() == DICT_MAX_ENTRIES {
            self.overflow = true;
            self.lookup = HashMap::new();
            self.entries = Vec::new();
            self.counts = Vec::new();
            self.index = Vec::new();
            return Ok(());
        }
        let i = self.entries.len() as u8;
        self.lookup.insert(body.to_vec(), i);
        self.entries.push(body.to_vec());
        self.counts.push(1);
        self.index.push(i);
        Ok(())
    }

    #[must_use]
    pub fn rows(&self) -> u64 {
        self.plain.rows()
    }

    pub fn forbid_const(&mut self) {
        self.allow_const = false;
    }

    fn dict_pays(&self) -> bool {
        let rows = self.index.len();
        if self.overflow || self.entries.len() >= rows {
            return false;
        }
        let entry_bytes: u64 = self.entries.iter().map(|e| e.len() as u64 + 1).sum();
        let cost = entry_bytes + rows as u64 + 4 * self.entries.len() as u64;
        cost < self.plain_bytes
    }

    pub fn encode(&mut self, ctx: &EncodeContext) -> Result<()> {
        self.choice = if !self.overflow && self.entries.len() == 1 && self.allow_const {
            Choice::Const
        } else if self.dict_pays() {
            let mut entries = leaf(&self.typ)?;
            for e in &self.entries {
                entries.write(Elem::Primitive(e))?;
            }
            entries.encode(ctx)?;
            let counts: Vec<u64> = self.counts.iter().map(|&c| u64::from(c)).collect();
            Choice::Dict {
                entries: Box::new(entries),
                index: Some(SegmentBuf::new(std::mem::take(&mut self.index), &ctx.compress)?),
                counts: Some(SegmentBuf::new(encode_uvarints(&counts), &ctx.compress)?),
            }
        } else {
            self.plain.encode(ctx)?;
            Choice::Plain
        };
        Ok(())
    }

    pub fn metadata(&mut self, m: &mut MetaBuilder) -> Result<u32> {
        let length = self.rows();
        match std::mem::replace(&mut self.choice, Choice::Undecided) {
            Choice::Const => Ok(m.push(Node::Const {
                length,
                value: Value::new(self.typ.clone(), self.entries.first().cloned()),
            })),
            Choice::Dict {
                mut entries,
                index,
                counts,
            } => {
                let values = entries.metadata(m)?;
                let index = m.place(index)?;
                let counts = m.place(counts)?;
                log::trace!(
                    "[CSUP] dict of {} entries over {} rows for {}",
                    self.entries.len(),
                    length,
                    self.typ
                );
                Ok(m.push(Node::Dict {
                    length,
                    index,
                    counts,
                    values,
                }))
            }
            Choice::Plain | Choice::Undecided => self.plain.metadata(m),
        }
    }
}
