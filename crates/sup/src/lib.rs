// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # sup - self-describing structured data
//!
//! A type registry for a rich structural type system, a row-oriented binary
//! stream format (BSUP frames), a columnar object format (CSUP) and the
//! in-memory vector layer that sits between them.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use sup::brow::{Reader, ReaderConfig, Writer};
//! use sup::{Field, Result, Type, TypeRegistry, Value};
//!
//! fn main() -> Result<()> {
//!     let reg = Arc::new(TypeRegistry::new());
//!     let rec = reg.lookup_record(vec![Field::new("a", Type::int64())])?;
//!
//!     let mut w = Writer::new(Vec::new());
//!     w.write(&sup::value::record(rec, &[Some(Value::int64(1))])?)?;
//!     let bytes = w.close()?;
//!
//!     let mut r = Reader::new(Arc::clone(&reg), std::io::Cursor::new(bytes), ReaderConfig::default())?;
//!     let v = r.read()?.expect("one value");
//!     assert_eq!(v.to_string(), "{a:1}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                         Consumers / Producers                       |
//! |   brow::Reader | brow::Writer | csup::Reader | csup::VectorReader   |
//! +---------------------------------------------------------------------+
//! |                    Values, Vectors, Projection                      |
//! |   Value | RecordBuilder | Vector | VectorBuilder | Projection       |
//! +---------------------------------------------------------------------+
//! |                            Type System                              |
//! |   TypeRegistry (interning) | type-values | TypeMapper               |
//! +---------------------------------------------------------------------+
//! |                          Byte Encoding                              |
//! |   uvarint | tag-length elements | Builder | compression             |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TypeRegistry`] | Interns types, assigns stable ids |
//! | [`Type`] | Shared handle to an interned type |
//! | [`Value`] | A type paired with its tagged body |
//! | [`TypeMapper`] | Cached translation between two registries |
//! | [`Projection`] | Field selection applied by readers |
//! | [`Vector`] | Columnar view of many values |
//! | [`CancelToken`] | Cooperative cancellation for readers |
//!
//! ## Modules Overview
//!
//! - [`encoding`] - varints, tags, builder and primitive bodies
//! - [`types`] - types, registry, type-values, mapper
//! - [`brow`] - BSUP row frames (writer, parser, parallel reader)
//! - [`csup`] - CSUP columnar objects (writer, object, readers)
//! - [`vector`] - columnar vectors, builder, materialization

/// Cooperative cancellation token.
pub mod cancel;
/// Global configuration (format constants, runtime limits).
pub mod config;
/// Compression of frames and segments (LZ4, deflate).
pub mod compress;
/// Tag-length byte encoding and primitive bodies.
pub mod encoding;
/// Crate error type.
pub mod error;
/// Field projections over types and values.
pub mod projection;
/// Type system: types, registry, type-values and mapping.
pub mod types;
/// Values and record construction.
pub mod value;

/// BSUP row-oriented frame streams.
pub mod brow;
/// CSUP columnar objects.
pub mod csup;
/// Columnar vectors.
pub mod vector;

pub use cancel::CancelToken;
pub use config::{Limits, RuntimeConfig};
pub use error::{Error, ErrorKind, Result};
pub use projection::Projection;
pub use types::{Field, MapperCache, PrimitiveKind, Type, TypeKind, TypeMapper, TypeRegistry};
pub use value::{RecordBuilder, Value};
pub use vector::{Vector, VectorBuilder};
