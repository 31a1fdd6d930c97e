// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! BSUP: the binary row-oriented stream format.
//!
//! A stream is a sequence of frames. Types frames grow a stream-local type
//! table, values frames carry `(local id, value)` pairs against it, control
//! frames carry opaque application messages, and the `0xff` end-of-stream
//! byte clears the table so a new logical stream can follow on the same
//! transport.
//!
//! - [`frame`]: frame code layout and the bounded frame reader
//! - [`types`]: local type tables on both sides
//! - [`writer`]: [`Writer`]
//! - [`parser`]: sequential [`Parser`] and values-frame decoding
//! - [`reader`]: concurrent [`Reader`] with ordered output

pub mod frame;
pub mod parser;
pub mod reader;
pub mod types;
pub mod writer;

pub use frame::{Frame, FrameKind, FrameReader};
pub use parser::{Batch, Control, Item, Parser};
pub use reader::{Progress, Reader, ReaderConfig};
pub use writer::{Writer, WriterConfig};
