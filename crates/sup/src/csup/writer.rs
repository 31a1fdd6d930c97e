// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CSUP object writer.
//!
//! Values are shredded into a [`DynamicEncoder`] until the per-object value
//! budget is reached, then the object is finalized:
//!
//! ```text
//!  encode (parallel) ──> metadata (post-order) ──> header | meta | data | [BSUP]
//! ```
//!
//! Data chunks are written in the order the metadata pass placed them, so the
//! on-disk layout matches the segment offsets. Objects are appended back to
//! back on the same output.

use super::encoder::{DynamicEncoder, EncodeContext, MetaBuilder};
use super::header::Header;
use super::metadata;
use crate::brow;
use crate::compress::CompressConfig;
use crate::config::{
    default_threads, DEFAULT_BSUP_THRESHOLD, DEFAULT_OBJECT_VALUES, MAX_DATA_SIZE, MAX_META_SIZE,
};
use crate::error::{Error, Result};
use crate::value::Value;
use std::io::Write;

/// Writer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WriterConfig {
    /// Values per object before the writer finalizes it.
    pub object_values: usize,
    /// Types with fewer values than this in an object go to the trailing
    /// BSUP section.
    pub bsup_threshold: usize,
    pub compress: CompressConfig,
    /// Threads used by the encode pass.
    pub threads: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            object_values: DEFAULT_OBJECT_VALUES,
            bsup_threshold: DEFAULT_BSUP_THRESHOLD,
            compress: CompressConfig::default(),
            threads: default_threads(),
        }
    }
}

impl WriterConfig {
    #[must_use]
    pub fn object_values(mut self, n: usize) -> Self {
        self.object_values = n.max(1);
        self
    }

    #[must_use]
    pub fn bsup_threshold(mut self, n: usize) -> Self {
        self.bsup_threshold = n;
        self
    }

    #[must_use]
    pub fn compress(mut self, compress: CompressConfig) -> Self {
        self.compress = compress;
        self
    }

    #[must_use]
    pub fn threads(mut self, n: usize) -> Self {
        self.threads = n.max(1);
        self
    }
}

/// Streaming CSUP writer.
///
/// The first error aborts the writer: every later call, `close` included,
/// reports it.
pub struct Writer<W: Write> {
    w: W,
    config: WriterConfig,
    encoder: DynamicEncoder,
    objects_written: u64,
    values_written: u64,
    bytes_written: u64,
    failed: Option<String>,
}

impl<W: Write> Writer<W> {
    pub fn new(w: W) -> Self {
        Self::with_config(w, WriterConfig::default())
    }

    pub fn with_config(w: W, config: WriterConfig) -> Self {
        Self {
            w,
            encoder: DynamicEncoder::new(config.bsup_threshold),
            config,
            objects_written: 0,
            values_written: 0,
            bytes_written: 0,
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
                log::debug!("[CSUP] writer aborted: {}", e);
                self.failed = Some(e.to_string());
            }
        }
        res
    }

    /// Append one value.
    pub fn write(&mut self, v: &Value) -> Result<()> {
        self.check()?;
        let res = self.encoder.write(v.typ(), v.elem());
        self.guard(res)?;
        self.values_written += 1;
        if self.encoder.len() >= self.config.object_values {
            let res = self.finish_object();
            self.guard(res)?;
        }
        Ok(())
    }

    /// Finalize the current object, if it holds any value.
    pub fn flush(&mut self) -> Result<()> {
        self.check()?;
        let res = self.finish_object().and_then(|()| Ok(self.w.flush()?));
        self.guard(res)
    }

    fn finish_object(&mut self) -> Result<()> {
        if self.encoder.is_empty() {
            return Ok(());
        }
        let mut enc = std::mem::replace(
            &mut self.encoder,
            DynamicEncoder::new(self.config.bsup_threshold),
        );
        let ctx = EncodeContext {
            compress: self.config.compress,
            threads: self.config.threads.max(1),
        };
        enc.encode(&ctx)?;
        let mut m = MetaBuilder::new();
        let fin = enc.metadata(&mut m)?;
        let data_size = m.data_size();
        let (nodes, chunks) = m.into_parts();
        let meta = metadata::encode(&nodes, self.config.compress)?;
        let meta_size = meta.len() as u64;
        if meta_size > MAX_META_SIZE || data_size > MAX_DATA_SIZE {
            return Err(Error::bad_value(format!(
                "object sections too large (meta {} B, data {} B)",
                meta_size, data_size
            )));
        }

        let header = Header::new(meta_size, data_size, fin.root);
        header.write(&mut self.w)?;
        self.w.write_all(&meta)?;
        for chunk in &chunks {
            self.w.write_all(chunk)?;
        }
        let mut size = header.sections_size();
        if !fin.bsup.is_empty() {
            let mut tail = brow::Writer::with_config(
                Vec::new(),
                brow::WriterConfig::default().compress(self.config.compress),
            );
            for v in &fin.bsup {
                tail.write(v)?;
            }
            let tail = tail.close()?;
            self.w.write_all(&tail)?;
            size += tail.len() as u64;
        }

        self.objects_written += 1;
        self.bytes_written += size;
        log::debug!(
            "[CSUP] object {} finalized: {} values, {} types, {} nodes, meta {} B, data {} B, {} BSUP values",
            self.objects_written,
            enc.len(),
            enc.types(),
            nodes.len(),
            meta_size,
            data_size,
            fin.bsup.len()
        );
        Ok(())
    }

    #[must_use]
    pub fn objects_written(&self) -> u64 {
        self.objects_written
    }

    #[must_use]
    pub fn values_written(&self) -> u64 {
        self.values_written
    }

    /// Bytes of finalized objects.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn get_ref(&self) -> &W {
        &self.w
    }

    /// Finalize the last object and return the underlying writer.
    pub fn close(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.w)
    }
}
