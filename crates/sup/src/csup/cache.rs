// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Segment page cache shared by the shadows of one object.
//!
//! Pages are decompressed segment bodies keyed by their data-section offset,
//! which is unique within an object. Eviction is LRU.

use crate::error::Result;
use lru::LruCache;
use parking_lot::RwLock;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Cache hit/miss statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Decompressed bytes loaded on misses.
    pub bytes_loaded: u64,
}

/// LRU cache of decoded segment pages.
pub struct PageCache {
    inner: Option<RwLock<LruCache<u64, Arc<Vec<u8>>>>>,
    stats: RwLock<CacheStats>,
}

impl PageCache {
    /// Cache holding up to `capacity` pages; 0 disables caching.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: NonZeroUsize::new(capacity).map(|n| RwLock::new(LruCache::new(n))),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Page at `offset`, loading it with `load` on a miss.
    ///
    /// The loader runs without the cache lock held; two threads missing on
    /// the same page both load it and the last insert wins.
    pub fn get_or_load<F>(&self, offset: u64, load: F) -> Result<Arc<Vec<u8>>>
    where
        F: FnOnce() -> Result<Vec<u8>>,
    {
        if let Some(inner) = &self.inner {
            // LruCache::get promotes the entry, so it needs the write lock.
            if let Some(page) = inner.write().get(&offset) {
                self.record_hit();
                return Ok(Arc::clone(page));
            }
        }
        let page = Arc::new(load()?);
        self.record_miss(page.len());
        if let Some(inner) = &self.inner {
            inner.write().put(offset, Arc::clone(&page));
        }
        Ok(page)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.as_ref().map_or(0, |c| c.read().len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Some(inner) = &self.inner {
            inner.write().clear();
        }
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        *self.stats.read()
    }

    fn record_hit(&self) {
        let mut stats = self.stats.write();
        stats.hits = stats.hits.saturating_add(1);
    }

    fn record_miss(&self, bytes: usize) {
        let mut stats = self.stats.write();
        stats.misses = stats.misses.saturating_add(1);
        stats.bytes_loaded = stats.bytes_loaded.saturating_add(bytes as u64);
    }
}

impl std::fmt::Debug for PageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageCache")
            .field("pages", &self.len())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_hit_after_miss() {
        let cache = PageCache::new(4);
        let page = cache.get_or_load(0, || Ok(vec![1, 2, 3])).expect("load");
        assert_eq!(page.as_slice(), &[1, 2, 3]);
        let again = cache
            .get_or_load(0, || panic!("cached page reloaded"))
            .expect("hit");
        assert!(Arc::ptr_eq(&page, &again));
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                bytes_loaded: 3
            }
        );
    }

    #[test]
    fn test_lru_eviction() {
        let cache = PageCache::new(2);
        for off in 0..3u64 {
            cache.get_or_load(off, || Ok(vec![off as u8])).expect("load");
        }
        assert_eq!(cache.len(), 2);
        cache.get_or_load(0, || Ok(vec![0])).expect("reload");
        assert_eq!(cache.stats().misses, 4);
    }

    #[test]
    fn test_disabled_cache_always_loads() {
        let cache = PageCache::new(0);
        cache.get_or_load(8, || Ok(vec![1])).expect("load");
        cache.get_or_load(8, || Ok(vec![1])).expect("load");
        assert_eq!(cache.stats().misses, 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_load_error_not_cached() {
        let cache = PageCache::new(2);
        let err = cache
            .get_or_load(0, || Err(Error::truncated("short segment")))
            .expect_err("error");
        assert_eq!(err.kind(), crate::error::ErrorKind::Truncated);
        assert!(cache.is_empty());
    }
}
