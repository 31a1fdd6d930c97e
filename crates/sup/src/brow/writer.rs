// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! BSUP stream writer.
//!
//! Values are appended to one ordered buffer as `(local id, tagged body)`.
//! When the buffer reaches the frame threshold the writer emits a types frame
//! for every type introduced since the previous flush, then the values frame.
//! Control frames flush pending values first so stream order is preserved.
//! The first failed write poisons the writer; every later call reports it.

use super::frame::{encode_frame, FrameKind};
use super::types::TypesEncoder;
use crate::compress::{CompressConfig, CompressStats, Compressor};
use crate::config::DEFAULT_FRAME_THRESHOLD;
use crate::encoding::iter::{container_tag, primitive_tag, TAG_NULL};
use crate::encoding::varint::append_uvarint;
use crate::error::{Error, Result};
use crate::value::Value;
use std::io::Write;

/// Writer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WriterConfig {
    pub compress: CompressConfig,
    /// Buffered value bytes that trigger a frame flush.
    pub frame_threshold: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            compress: CompressConfig::default(),
            frame_threshold: DEFAULT_FRAME_THRESHOLD,
        }
    }
}

impl WriterConfig {
    #[must_use]
    pub fn compress(mut self, compress: CompressConfig) -> Self {
        self.compress = compress;
        self
    }

    #[must_use]
    pub fn frame_threshold(mut self, bytes: usize) -> Self {
        self.frame_threshold = bytes.max(1);
        self
    }
}

/// Streaming BSUP writer.
///
/// All values written between two end-of-stream markers must come from the
/// same registry.
pub struct Writer<W: Write> {
    w: W,
    threshold: usize,
    types: TypesEncoder,
    values: Vec<u8>,
    compressor: Compressor,
    scratch: Vec<u8>,
    values_written: u64,
    frames_written: u64,
    failed: Option<String>,
}

impl<W: Write> Writer<W> {
    pub fn new(w: W) -> Self {
        Self::with_config(w, WriterConfig::default())
    }

    pub fn with_config(w: W, config: WriterConfig) -> Self {
        Self {
            w,
            threshold: config.frame_threshold,
            types: TypesEncoder::new(),
            values: Vec::new(),
            compressor: Compressor::new(config.compress),
            scratch: Vec::new(),
            values_written: 0,
            frames_written: 0,
            failed: None,
        }
    }

    fn check(&self) -> Result<()> {
        match &self.failed {
            Some(msg) => Err(Error::BadValue(format!("writer aborted: {}", msg))),
            None => Ok(()),
        }
    }

    fn guard<T>(&mut self, res: Result<T>) -> Result<T> {
        if let Err(e) = &res {
            if self.failed.is_none() {
                log::debug!("[BROW] writer aborted: {}", e);
                self.failed = Some(e.to_string());
            }
        }
        res
    }

    /// Append one value.
    pub fn write(&mut self, v: &Value) -> Result<()> {
        self.check()?;
        let id = self.types.lookup(v.typ());
        append_uvarint(&mut self.values, u64::from(id));
        match v.bytes() {
            None => self.values.push(TAG_NULL as u8),
            Some(b) => {
                let tag = if v.typ().is_container() {
                    container_tag(b.len())
                } else {
                    primitive_tag(b.len())
                };
                append_uvarint(&mut self.values, tag);
                self.values.extend_from_slice(b);
            }
        }
        self.values_written += 1;
        if self.values.len() >= self.threshold {
            let res = self.flush_frames();
            self.guard(res)?;
        }
        Ok(())
    }

    fn emit(&mut self, kind: FrameKind, payload: &[u8]) -> Result<()> {
        self.scratch.clear();
        encode_frame(&mut self.scratch, kind, payload, &mut self.compressor)?;
        self.w.write_all(&self.scratch)?;
        self.frames_written += 1;
        Ok(())
    }

    fn flush_frames(&mut self) -> Result<()> {
        if let Some(types) = self.types.take_frame() {
            self.emit(FrameKind::Types, &types)?;
        }
        if !self.values.is_empty() {
            let values = std::mem::take(&mut self.values);
            let res = self.emit(FrameKind::Values, &values);
            self.values = values;
            self.values.clear();
            res?;
        }
        Ok(())
    }

    /// Write buffered frames and flush the underlying writer.
    pub fn flush(&mut self) -> Result<()> {
        self.check()?;
        let res = self
            .flush_frames()
            .and_then(|()| self.w.flush().map_err(Error::from));
        self.guard(res)
    }

    /// Emit a control frame after everything written so far.
    pub fn write_control(&mut self, format: u8, body: &[u8]) -> Result<()> {
        self.check()?;
        let mut payload = Vec::with_capacity(body.len() + 1);
        payload.push(format);
        payload.extend_from_slice(body);
        let res = self
            .flush_frames()
            .and_then(|()| self.emit(FrameKind::Control, &payload));
        self.guard(res)
    }

    /// Flush and emit an end-of-stream marker. The local type table starts
    /// over, so the writer can continue with a new logical stream.
    pub fn end_stream(&mut self) -> Result<()> {
        self.check()?;
        let res = self
            .flush_frames()
            .and_then(|()| self.emit(FrameKind::Eos, &[]));
        self.guard(res)?;
        self.types.reset();
        log::debug!(
            "[BROW] end of stream after {} values in {} frames",
            self.values_written,
            self.frames_written
        );
        Ok(())
    }

    #[must_use]
    pub fn values_written(&self) -> u64 {
        self.values_written
    }

    #[must_use]
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    #[must_use]
    pub fn compress_stats(&self) -> &CompressStats {
        self.compressor.stats()
    }

    pub fn get_ref(&self) -> &W {
        &self.w
    }

    /// End the stream and return the underlying writer.
    pub fn close(mut self) -> Result<W> {
        self.end_stream()?;
        let res = self.w.flush().map_err(Error::from);
        self.guard(res)?;
        Ok(self.w)
    }
}
