// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Global configuration - single source of truth for format constants.
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: compile-time constants (frame codes, CSUP magic and
//!   version, default thresholds).
//! - **Level 2 (Dynamic)**: [`RuntimeConfig`] holds the process-wide default
//!   [`Limits`] behind an `ArcSwap`, so readers created without explicit
//!   limits pick up the current value with a single atomic load.
//!
//! Per-reader and per-writer knobs live in the builder-style config structs of
//! [`crate::brow`] and [`crate::csup`]; they start from these defaults.

use arc_swap::ArcSwap;
use std::sync::{Arc, LazyLock};

// =======================================================================
// BSUP frame layout
// =======================================================================

/// End-of-stream byte. Resets the stream's local type table.
pub const EOS: u8 = 0xff;

/// Version bit of a frame code (must be zero).
pub const FRAME_VERSION_BIT: u8 = 0x80;

/// Compressed flag of a frame code.
pub const FRAME_COMPRESSED_BIT: u8 = 0x40;

/// Maximum frame payload length (1 GiB).
pub const MAX_FRAME_SIZE: u64 = 1 << 30;

/// Maximum uncompressed size of a compressed frame (1 GiB).
pub const MAX_UNCOMPRESSED_FRAME_SIZE: u64 = 1 << 30;

/// Value bytes buffered by a BSUP writer before it flushes a frame.
pub const DEFAULT_FRAME_THRESHOLD: usize = 512 * 1024;

/// Frames below this size are never compressed.
pub const MIN_COMPRESS_SIZE: usize = 256;

/// Values-frame batches allowed in flight between decode workers and the
/// consumer before the frame reader parks.
pub const DEFAULT_HIGH_WATER: usize = 16;

/// Values decoded between two cancellation checks inside a worker.
pub const CANCEL_CHECK_INTERVAL: usize = 1024;

// =======================================================================
// Type system
// =======================================================================

/// First id assigned to a complex type by a registry.
pub const ID_TYPE_COMPLEX: u32 = 30;

/// Maximum nesting accepted when decoding a type-value.
pub const MAX_TYPE_DEPTH: usize = 1024;

// =======================================================================
// CSUP objects
// =======================================================================

/// CSUP header magic.
pub const CSUP_MAGIC: [u8; 4] = *b"CSUP";

/// CSUP format version. Objects with another version are rejected.
pub const CSUP_VERSION: u32 = 15;

/// CSUP header size in bytes.
pub const CSUP_HEADER_SIZE: u64 = 28;

/// Maximum metadata section size (100 MiB).
pub const MAX_META_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum data section size (2 GiB).
pub const MAX_DATA_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Values written to one CSUP object before the writer starts another.
pub const DEFAULT_OBJECT_VALUES: usize = 1 << 20;

/// A dynamic child with fewer values than this at close time is written as
/// BSUP into the trailing section instead of being shredded.
pub const DEFAULT_BSUP_THRESHOLD: usize = 256;

/// Largest dictionary a dict encoder keeps (one index byte per row).
pub const DICT_MAX_ENTRIES: usize = 255;

/// Segment pages kept by an object's page cache.
pub const DEFAULT_PAGE_CACHE_ENTRIES: usize = 256;

/// Resource bounds applied to untrusted input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Limits {
    /// Maximum BSUP frame payload length.
    pub max_frame_size: u64,
    /// Maximum uncompressed length of a compressed BSUP frame.
    pub max_uncompressed_size: u64,
    /// Maximum CSUP metadata section size.
    pub max_meta_size: u64,
    /// Maximum CSUP data section size.
    pub max_data_size: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
            max_uncompressed_size: MAX_UNCOMPRESSED_FRAME_SIZE,
            max_meta_size: MAX_META_SIZE,
            max_data_size: MAX_DATA_SIZE,
        }
    }
}

/// Process-wide runtime configuration.
///
/// Clone is an `Arc` increment. Reads are a single atomic load.
#[derive(Clone)]
pub struct RuntimeConfig {
    limits: Arc<ArcSwap<Limits>>,
}

static GLOBAL: LazyLock<RuntimeConfig> = LazyLock::new(RuntimeConfig::new);

impl RuntimeConfig {
    /// Create a configuration holding the compiled defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            limits: Arc::new(ArcSwap::new(Arc::new(Limits::default()))),
        }
    }

    /// The process-wide configuration.
    #[must_use]
    pub fn global() -> &'static RuntimeConfig {
        &GLOBAL
    }

    /// Current default limits.
    #[inline]
    #[must_use]
    pub fn limits(&self) -> Limits {
        **self.limits.load()
    }

    /// Replace the default limits (atomic swap).
    pub fn set_limits(&self, limits: Limits) {
        log::debug!("[config] default limits set to {:?}", limits);
        self.limits.store(Arc::new(limits));
    }

    /// Restore the compiled defaults.
    pub fn reset_limits(&self) {
        self.limits.store(Arc::new(Limits::default()));
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Worker threads used when a config asks for "automatic" parallelism.
#[must_use]
pub fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_constants() {
        assert_eq!(CSUP_MAGIC.len() as u64 + 4 + 8 + 8 + 4, CSUP_HEADER_SIZE);
        assert_eq!(EOS & FRAME_VERSION_BIT, FRAME_VERSION_BIT);
    }

    #[test]
    fn test_runtime_limits_swap() {
        let config = RuntimeConfig::new();
        assert_eq!(config.limits(), Limits::default());

        let tight = Limits {
            max_frame_size: 1024,
            ..Limits::default()
        };
        config.set_limits(tight);
        assert_eq!(config.limits().max_frame_size, 1024);

        // Clones share the same cell.
        let clone = config.clone();
        clone.reset_limits();
        assert_eq!(config.limits(), Limits::default());
    }
}
