// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CSUP columnar objects.
//!
//! # Layout
//!
//! ```text
//! +--------+-----------------+-----------------+--------------------+
//! | header | metadata (BSUP) | data (segments) | trailing BSUP, opt |
//! |  28 B  |   meta_size     |   data_size     |  ends with EOS     |
//! +--------+-----------------+-----------------+--------------------+
//! ```
//!
//! - [`Writer`]: shreds values into encoder trees and appends one object per
//!   value budget.
//! - [`Object`]: metadata view of one object plus projection over it.
//! - [`VectorReader`] / [`Reader`]: walk a source of concatenated objects.
//!
//! Objects are read through [`ReaderAt`], so several columns of one object
//! may load concurrently.

pub mod cache;
pub mod encoder;
pub mod header;
pub mod metadata;
pub mod object;
pub mod reader;
pub mod reader_at;
pub mod segment;
pub mod shadow;
pub mod writer;

pub use cache::{CacheStats, PageCache};
pub use header::Header;
pub use metadata::{Node, NodeField};
pub use object::Object;
pub use reader::{Reader, ReaderConfig, VectorReader};
pub use reader_at::{CountingReaderAt, ReaderAt, SectionReader};
pub use segment::Segment;
pub use writer::{Writer, WriterConfig};
