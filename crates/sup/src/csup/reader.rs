// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Readers over a source of concatenated CSUP objects.
//!
//! [`VectorReader`] opens one object at a time and hands out its projected
//! rows as a single vector. [`Reader`] flattens those vectors back into
//! values.

use super::cache::CacheStats;
use super::object::Object;
use super::reader_at::ReaderAt;
use crate::cancel::CancelToken;
use crate::config::{Limits, RuntimeConfig, CANCEL_CHECK_INTERVAL, DEFAULT_PAGE_CACHE_ENTRIES};
use crate::error::Result;
use crate::projection::Projection;
use crate::types::TypeRegistry;
use crate::value::Value;
use crate::vector::Vector;
use std::sync::Arc;

/// Reader configuration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReaderConfig {
    /// Input bounds; `None` uses the process-wide defaults.
    pub limits: Option<Limits>,
    /// Segment pages cached per object; 0 disables the cache.
    pub cache_pages: usize,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub projection: Projection,
    #[cfg_attr(feature = "serde", serde(skip))]
    pub cancel: CancelToken,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            limits: None,
            cache_pages: DEFAULT_PAGE_CACHE_ENTRIES,
            projection: Projection::all(),
            cancel: CancelToken::new(),
        }
    }
}

impl ReaderConfig {
    #[must_use]
    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = Some(limits);
        self
    }

    #[must_use]
    pub fn cache_pages(mut self, n: usize) -> Self {
        self.cache_pages = n;
        self
    }

    #[must_use]
    pub fn projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    /// Use an externally owned cancellation token.
    #[must_use]
    pub fn cancel(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }
}

/// One vector per object.
pub struct VectorReader {
    src: Arc<dyn ReaderAt>,
    reg: Arc<TypeRegistry>,
    limits: Limits,
    config: ReaderConfig,
    offset: u64,
    end: u64,
    objects_read: u64,
    cache: CacheStats,
}

impl VectorReader {
    /// Read objects from `src`, projecting rows into `reg`.
    pub fn new(reg: Arc<TypeRegistry>, src: Arc<dyn ReaderAt>, config: ReaderConfig) -> Result<Self> {
        let end = src.size()?;
        Ok(Self {
            src,
            reg,
            limits: config.limits.unwrap_or_else(|| RuntimeConfig::global().limits()),
            config,
            offset: 0,
            end,
            objects_read: 0,
            cache: CacheStats::default(),
        })
    }

    /// Open the next object without projecting it; `Ok(None)` at end of input.
    pub fn next_object(&mut self) -> Result<Option<Object>> {
        self.config.cancel.check()?;
        if self.offset >= self.end {
            return Ok(None);
        }
        let obj = Object::open_at(
            Arc::clone(&self.src),
            self.offset,
            self.limits,
            self.config.cache_pages,
        )?;
        self.offset += obj.size();
        self.objects_read += 1;
        Ok(Some(obj))
    }

    /// Projected rows of the next object; `Ok(None)` at end of input.
    pub fn pull(&mut self) -> Result<Option<Vector>> {
        let Some(obj) = self.next_object()? else {
            return Ok(None);
        };
        let v = obj.project(&self.reg, &self.config.projection)?;
        let stats = obj.cache_stats();
        self.cache.hits += stats.hits;
        self.cache.misses += stats.misses;
        self.cache.bytes_loaded += stats.bytes_loaded;
        Ok(Some(v))
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.reg
    }

    #[must_use]
    pub fn objects_read(&self) -> u64 {
        self.objects_read
    }

    /// Byte offset of the next object.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Page cache counters summed over the objects pulled so far.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache
    }

    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.config.cancel
    }
}

/// Value stream over concatenated objects.
pub struct Reader {
    vectors: VectorReader,
    current: Option<Vector>,
    row: usize,
    values_read: u64,
}

impl Reader {
    pub fn new(reg: Arc<TypeRegistry>, src: Arc<dyn ReaderAt>, config: ReaderConfig) -> Result<Self> {
        Ok(Self {
            vectors: VectorReader::new(reg, src, config)?,
            current: None,
            row: 0,
            values_read: 0,
        })
    }

    /// Next value; `Ok(None)` at end of input.
    pub fn read(&mut self) -> Result<Option<Value>> {
        loop {
            if let Some(v) = &self.current {
                if self.row < v.len() {
                    if self.values_read % CANCEL_CHECK_INTERVAL as u64 == 0 {
                        self.vectors.cancel_token().check()?;
                    }
                    let value = v.value(self.row)?;
                    self.row += 1;
                    self.values_read += 1;
                    return Ok(Some(value));
                }
            }
            match self.vectors.pull()? {
                Some(v) => {
                    self.current = Some(v);
                    self.row = 0;
                }
                None => {
                    self.current = None;
                    return Ok(None);
                }
            }
        }
    }

    #[must_use]
    pub fn values_read(&self) -> u64 {
        self.values_read
    }

    #[must_use]
    pub fn objects_read(&self) -> u64 {
        self.vectors.objects_read()
    }

    /// Cancel and drop the buffered object.
    pub fn close(&mut self) {
        self.vectors.cancel_token().cancel();
        self.current = None;
    }
}

impl Iterator for Reader {
    type Item = Result<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::CompressConfig;
    use crate::csup::writer::{Writer, WriterConfig};
    use crate::error::ErrorKind;

    fn file(n: i64, per_object: usize) -> Arc<dyn ReaderAt> {
        let mut w = Writer::with_config(
            Vec::new(),
            WriterConfig::default()
                .object_values(per_object)
                .compress(CompressConfig::none())
                .threads(1),
        );
        for i in 0..n {
            w.write(&Value::int64(i)).expect("write");
        }
        Arc::new(w.close().expect("close"))
    }

    #[test]
    fn test_vector_per_object() {
        let reg = Arc::new(TypeRegistry::new());
        let mut r = VectorReader::new(reg, file(1000, 400), ReaderConfig::default()).expect("reader");
        let mut lens = Vec::new();
        while let Some(v) = r.pull().expect("pull") {
            lens.push(v.len());
        }
        assert_eq!(lens, vec![400, 400, 200]);
        assert_eq!(r.objects_read(), 3);
    }

    #[test]
    fn test_values_in_order_across_objects() {
        let reg = Arc::new(TypeRegistry::new());
        let r = Reader::new(reg, file(700, 300), ReaderConfig::default()).expect("reader");
        let got: Vec<i64> = r
            .map(|v| v.expect("value").as_int().expect("int"))
            .collect();
        assert_eq!(got, (0..700).collect::<Vec<_>>());
    }

    #[test]
    fn test_canceled_reader() {
        let reg = Arc::new(TypeRegistry::new());
        let token = CancelToken::new();
        let mut r = Reader::new(reg, file(10, 10), ReaderConfig::default().cancel(token.clone()))
            .expect("reader");
        assert!(r.read().expect("first").is_some());
        token.cancel();
        let mut err = None;
        for _ in 0..=CANCEL_CHECK_INTERVAL {
            match r.read() {
                Err(e) => {
                    err = Some(e);
                    break;
                }
                Ok(None) => break,
                Ok(Some(_)) => {}
            }
        }
        // Ten rows fit in one object; the next pull observes the token.
        assert_eq!(err.expect("canceled").kind(), ErrorKind::Canceled);
    }
}
