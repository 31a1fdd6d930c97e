// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Null runs over another encoder.
//!
//! Non-null rows go to the inner encoder; null rows only extend the run list,
//! which alternates null/value runs starting with nulls. A column without
//! nulls emits just the inner node, and an all-null column emits a `Const`
//! null.

use super::{EncodeContext, Encoder, MetaBuilder, RunBuilder};
use crate::csup::metadata::Node;
use crate::csup::segment::{encode_uvarints, SegmentBuf};
use crate::encoding::iter::Elem;
use crate::error::{Error, Result};
use crate::types::Type;
use crate::value::Value;

#[derive(Debug)]
pub struct NullsEncoder {
    typ: Type,
    inner: Box<Encoder>,
    runs: RunBuilder,
    out: Option<SegmentBuf>,
}

impl NullsEncoder {
    #[must_use]
    pub fn new(typ: Type, inner: Encoder) -> Self {
        Self {
            typ,
            inner: Box::new(inner),
            runs: RunBuilder::new(true),
            out: None,
        }
    }

    pub fn write(&mut self, elem: Elem<'_>) -> Result<()> {
        match elem {
            Elem::None => Err(Error::bad_value("none outside an optional field")),
            Elem::Null => {
                self.runs.push(true);
                Ok(())
            }
            _ => {
                self.inner.write(elem)?;
                self.runs.push(false);
                Ok(())
            }
        }
    }

    #[must_use]
    pub fn rows(&self) -> u64 {
        self.runs.rows()
    }

    fn all_null(&self) -> bool {
        self.runs.rows() > 0 && self.runs.set() == self.runs.rows()
    }

    pub fn encode(&mut self, ctx: &EncodeContext) -> Result<()> {
        if self.all_null() {
            return Ok(());
        }
        if self.runs.set() > 0 {
            self.inner.forbid_const();
            self.out = Some(SegmentBuf::new(encode_uvarints(&self.runs.runs()), &ctx.compress)?);
        }
        self.inner.encode(ctx)
    }

    pub fn metadata(&mut self, m: &mut MetaBuilder) -> Result<u32> {
        if self.all_null() {
            return Ok(m.push(Node::Const {
                length: self.rows(),
                value: Value::null(self.typ.clone()),
            }));
        }
        let values = self.inner.metadata(m)?;
        if self.runs.set() == 0 {
            return Ok(values);
        }
        let runs = m.place(self.out.take())?;
        Ok(m.push(Node::Nulls {
            count: self.rows(),
            runs,
            values,
        }))
    }
}
