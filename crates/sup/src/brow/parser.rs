// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sequential frame parser.
//!
//! The [`Parser`] owns the stream's local type table. Types frames and
//! end-of-stream markers are consumed internally; values frames come out as
//! [`ValuesJob`]s that carry a snapshot of the table they were written
//! against, so they can be decoded on any thread in any order.

use super::frame::{Frame, FrameKind, FrameReader};
use super::types::{lookup_local, TypesDecoder};
use crate::cancel::CancelToken;
use crate::config::{Limits, CANCEL_CHECK_INTERVAL};
use crate::encoding::iter::{Elem, Iter};
use crate::encoding::varint::Cursor;
use crate::error::{Error, Result};
use crate::projection::Projector;
use crate::types::{Type, TypeRegistry};
use crate::value::{check_elem, Value};
use std::io::Read;
use std::sync::Arc;

/// A decoded batch of values from one values frame.
#[derive(Debug, Clone, Default)]
pub struct Batch {
    seq: u64,
    values: Vec<Value>,
}

impl Batch {
    #[must_use]
    pub fn new(seq: u64, values: Vec<Value>) -> Self {
        Self { seq, values }
    }

    /// Position of the batch in the stream.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// An application control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub format: u8,
    pub bytes: Vec<u8>,
}

/// What a reader hands to its consumer, in stream order.
#[derive(Debug)]
pub enum Item {
    Batch(Batch),
    Control(Control),
    /// A control frame that could not be decoded. The stream continues.
    ControlError(Error),
}

/// A values frame ready for decoding.
#[derive(Debug)]
pub struct ValuesJob {
    frame: Frame,
    table: Arc<[Type]>,
}

impl ValuesJob {
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.frame.offset
    }

    /// Decompress and decode the frame.
    pub fn decode(self, opts: &mut DecodeOptions<'_>) -> Result<Vec<Value>> {
        let base = self.frame.payload_offset;
        let payload = self.frame.into_payload(&opts.limits)?;
        decode_values(&payload, &self.table, opts).map_err(|e| match e.offset() {
            Some(rel) => rebase(e, base + rel),
            None => e.at(base),
        })
    }
}

fn rebase(e: Error, offset: u64) -> Error {
    match e {
        Error::At { source, .. } => Error::At { offset, source },
        other => other.at(offset),
    }
}

/// Knobs for [`decode_values`].
pub struct DecodeOptions<'a> {
    pub reg: &'a TypeRegistry,
    pub limits: Limits,
    /// Check each value body against its type.
    pub validate: bool,
    pub projector: Option<&'a mut Projector>,
    pub cancel: &'a CancelToken,
}

/// Decode a values frame payload against a local type table.
pub fn decode_values(
    payload: &[u8],
    table: &[Type],
    opts: &mut DecodeOptions<'_>,
) -> Result<Vec<Value>> {
    let mut out = Vec::new();
    let mut c = Cursor::new(payload);
    while !c.is_empty() {
        if out.len() % CANCEL_CHECK_INTERVAL == 0 {
            opts.cancel.check()?;
        }
        let start = c.offset() as u64;
        let id = c.read_uvarint()?;
        let typ = lookup_local(opts.reg, table, id).map_err(|e| e.at(start))?;
        let body_start = c.offset();
        let mut it = Iter::new(c.rest());
        let elem = it.next_elem().map_err(|e| match e.offset() {
            Some(rel) => rebase(e, body_start as u64 + rel),
            None => e.at(body_start as u64),
        })?;
        c.read_bytes(it.offset())?;
        match elem {
            Elem::None => {
                return Err(Error::bad_value("none at top level").at(start));
            }
            Elem::Primitive(_) | Elem::Container(_)
                if matches!(elem, Elem::Container(_)) != typ.is_container() =>
            {
                return Err(Error::bad_value(format!("tag mismatch for {}", typ)).at(start));
            }
            _ => {}
        }
        if opts.validate {
            check_elem(&typ, elem).map_err(|e| e.at(start))?;
        }
        let v = Value::from_elem(typ, elem);
        let v = match opts.projector.as_deref_mut() {
            Some(p) => p.project(&v).map_err(|e| e.at(start))?,
            None => v,
        };
        out.push(v);
    }
    Ok(out)
}

/// Next unit of work produced by the [`Parser`].
#[derive(Debug)]
pub enum Unit {
    Values(ValuesJob),
    /// A control frame, or the reason it could not be decoded.
    Control(Result<Control>),
}

/// Sequential BSUP parser over a byte stream.
pub struct Parser<R> {
    frames: FrameReader<R>,
    types: TypesDecoder,
    frames_read: u64,
    stop_at_eos: bool,
    stopped: bool,
}

impl<R: Read> Parser<R> {
    pub fn new(reg: Arc<TypeRegistry>, r: R, limits: Limits) -> Self {
        Self {
            frames: FrameReader::new(r, limits),
            types: TypesDecoder::new(reg),
            frames_read: 0,
            stop_at_eos: false,
            stopped: false,
        }
    }

    /// End the input at the first end-of-stream marker. Used for BSUP
    /// sections embedded in a larger file.
    #[must_use]
    pub fn stop_at_eos(mut self, stop: bool) -> Self {
        self.stop_at_eos = stop;
        self
    }

    /// True once an end-of-stream marker stopped the parser.
    #[must_use]
    pub fn at_eos(&self) -> bool {
        self.stopped
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        self.types.registry()
    }

    #[must_use]
    pub fn limits(&self) -> Limits {
        *self.frames.limits()
    }

    /// Bytes consumed from the input.
    #[must_use]
    pub fn bytes_read(&self) -> u64 {
        self.frames.offset()
    }

    #[must_use]
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Next values job or control message; `Ok(None)` at end of input.
    pub fn next_unit(&mut self) -> Result<Option<Unit>> {
        loop {
            if self.stopped {
                return Ok(None);
            }
            let Some(frame) = self.frames.next_frame()? else {
                return Ok(None);
            };
            self.frames_read += 1;
            match frame.kind {
                FrameKind::Eos => {
                    log::debug!("[BROW] end of stream at {}, type table reset", frame.offset);
                    self.types.reset();
                    self.stopped = self.stop_at_eos;
                }
                FrameKind::Types => {
                    let base = frame.payload_offset;
                    let payload = frame.into_payload(self.frames.limits())?;
                    self.types.decode_frame(&payload).map_err(|e| match e.offset() {
                        Some(rel) => rebase(e, base + rel),
                        None => e.at(base),
                    })?;
                }
                FrameKind::Values => {
                    return Ok(Some(Unit::Values(ValuesJob {
                        frame,
                        table: self.types.snapshot(),
                    })));
                }
                FrameKind::Control => {
                    let offset = frame.offset;
                    let res = frame
                        .into_payload(self.frames.limits())
                        .and_then(|payload| match payload.split_first() {
                            Some((&format, rest)) => Ok(Control {
                                format,
                                bytes: rest.to_vec(),
                            }),
                            None => Err(Error::MalformedFrame("empty control frame".into())),
                        })
                        .map_err(|e| e.at(offset));
                    return Ok(Some(Unit::Control(res)));
                }
            }
        }
    }
}
