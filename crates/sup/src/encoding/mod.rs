// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tag-length byte encoding shared by every format.
//!
//! - [`varint`]: ULEB128 and counted integers
//! - [`iter`]: zero-copy walk over container bodies
//! - [`builder`]: append-only builder with container nesting
//! - [`primitive`]: per-kind primitive bodies

pub mod builder;
pub mod iter;
pub mod primitive;
pub mod varint;

pub use builder::{normalize_map, normalize_set, Builder};
pub use iter::{container_tag, count_elems, primitive_tag, single_elem, Elem, Iter, TAG_NONE, TAG_NULL};
pub use primitive::IpNet;
