// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Append-only builder for tag-length encoded bytes.
//!
//! Containers nest: [`Builder::begin_container`] marks where a body starts and
//! [`Builder::end_container`] prefixes the finished body with its tag. The
//! body of an open container can be rewritten just before it closes with
//! [`Builder::transform_container`], which is how sets and maps are brought
//! into canonical order.
//!
//! ```
//! use sup::encoding::{Builder, Iter, Elem};
//!
//! let mut b = Builder::new();
//! b.begin_container();
//! b.append(Some(b"a"));
//! b.append(None);
//! b.end_container();
//!
//! let body = b.single_body().unwrap().unwrap();
//! let elems: Vec<_> = Iter::new(body).collect::<Result<_, _>>().unwrap();
//! assert_eq!(elems, vec![Elem::Primitive(b"a"), Elem::Null]);
//! ```

use super::iter::{container_tag, primitive_tag, single_elem, Elem, Iter, TAG_NONE, TAG_NULL};
use super::varint::append_uvarint;
use crate::error::{Error, Result};

/// Byte builder for tag-length encoded elements.
#[derive(Debug, Default, Clone)]
pub struct Builder {
    bytes: Vec<u8>,
    containers: Vec<usize>,
}

impl Builder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            containers: Vec::new(),
        }
    }

    /// Open a nested container.
    pub fn begin_container(&mut self) {
        self.containers.push(self.bytes.len());
    }

    /// Close the innermost container, prefixing its body with a tag.
    pub fn end_container(&mut self) {
        let Some(start) = self.containers.pop() else {
            debug_assert!(false, "end_container without begin_container");
            return;
        };
        let len = self.bytes.len() - start;
        let mut tag = Vec::with_capacity(4);
        append_uvarint(&mut tag, container_tag(len));
        self.bytes.splice(start..start, tag);
    }

    /// Rewrite the body of the innermost container with `f`, then close it.
    pub fn transform_container<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&[u8]) -> Result<Vec<u8>>,
    {
        let Some(&start) = self.containers.last() else {
            return Err(Error::bad_value("transform without open container"));
        };
        let body = f(&self.bytes[start..])?;
        self.bytes.truncate(start);
        self.bytes.extend_from_slice(&body);
        self.end_container();
        Ok(())
    }

    /// Close the innermost container as a set (sorted, deduplicated).
    pub fn end_set(&mut self) -> Result<()> {
        self.transform_container(normalize_set)
    }

    /// Close the innermost container as a map (sorted by key, unique keys).
    pub fn end_map(&mut self) -> Result<()> {
        self.transform_container(normalize_map)
    }

    /// Append a primitive body, or null.
    pub fn append(&mut self, body: Option<&[u8]>) {
        match body {
            Some(b) => {
                append_uvarint(&mut self.bytes, primitive_tag(b.len()));
                self.bytes.extend_from_slice(b);
            }
            None => self.bytes.push(TAG_NULL as u8),
        }
    }

    /// Append a complete container body, or null.
    pub fn append_container(&mut self, body: Option<&[u8]>) {
        match body {
            Some(b) => {
                append_uvarint(&mut self.bytes, container_tag(b.len()));
                self.bytes.extend_from_slice(b);
            }
            None => self.bytes.push(TAG_NULL as u8),
        }
    }

    /// Append a body with the container flag chosen by the caller.
    #[inline]
    pub fn append_body(&mut self, body: Option<&[u8]>, container: bool) {
        if container {
            self.append_container(body);
        } else {
            self.append(body);
        }
    }

    /// Append a none marker (absent optional record field).
    pub fn append_none(&mut self) {
        self.bytes.push(TAG_NONE as u8);
    }

    /// Append a decoded element.
    pub fn append_elem(&mut self, elem: Elem<'_>) {
        match elem {
            Elem::Null => self.append(None),
            Elem::None => self.append_none(),
            Elem::Primitive(b) => self.append(Some(b)),
            Elem::Container(b) => self.append_container(Some(b)),
        }
    }

    /// Append already tagged bytes verbatim.
    pub fn append_raw(&mut self, tagged: &[u8]) {
        self.bytes.extend_from_slice(tagged);
    }

    /// Drop bytes beyond `len`, closing any container opened after it.
    pub fn truncate(&mut self, len: usize) {
        self.bytes.truncate(len);
        self.containers.retain(|&start| start <= len);
    }

    /// Clear all bytes and open containers.
    pub fn reset(&mut self) {
        self.bytes.clear();
        self.containers.clear();
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of containers currently open.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.containers.len()
    }

    /// Encoded bytes so far (a run of tagged elements).
    #[inline]
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Body of the single element the builder holds.
    pub fn single_body(&self) -> Result<Option<&[u8]>> {
        single_elem(&self.bytes).map(|e| e.body())
    }
}

/// Sort the elements of a set body by their tagged bytes and drop duplicates.
pub fn normalize_set(body: &[u8]) -> Result<Vec<u8>> {
    let mut elems = Vec::new();
    let mut it = Iter::new(body);
    while !it.done() {
        let (_, raw) = it.next_raw()?;
        elems.push(raw);
    }
    elems.sort_unstable();
    elems.dedup();
    let mut out = Vec::with_capacity(body.len());
    for raw in elems {
        out.extend_from_slice(raw);
    }
    Ok(out)
}

/// Sort map entries by tagged key bytes, keeping the first entry per key.
pub fn normalize_map(body: &[u8]) -> Result<Vec<u8>> {
    let mut entries: Vec<(&[u8], &[u8])> = Vec::new();
    let mut it = Iter::new(body);
    while !it.done() {
        let (_, key) = it.next_raw()?;
        if it.done() {
            return Err(Error::bad_value("map entry without value"));
        }
        let (_, val) = it.next_raw()?;
        entries.push((key, val));
    }
    // Stable so that the first of equal keys survives dedup.
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries.dedup_by(|later, earlier| later.0 == earlier.0);
    let mut out = Vec::with_capacity(body.len());
    for (k, v) in entries {
        out.extend_from_slice(k);
        out.extend_from_slice(v);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::varint::append_counted_varint;

    fn int(v: i64) -> Vec<u8> {
        let mut out = Vec::new();
        append_counted_varint(&mut out, v);
        out
    }

    #[test]
    fn test_nested_containers() {
        let mut b = Builder::new();
        b.begin_container();
        b.append(Some(b"x"));
        b.begin_container();
        b.append(Some(b"yz"));
        b.end_container();
        b.end_container();
        assert_eq!(b.depth(), 0);

        let outer = b.single_body().expect("decode").expect("not null");
        let mut it = Iter::new(outer);
        assert_eq!(it.next_elem().expect("x"), Elem::Primitive(b"x"));
        let inner = match it.next_elem().expect("inner") {
            Elem::Container(body) => body,
            other => panic!("expected container, got {:?}", other),
        };
        assert_eq!(Iter::new(inner).next_elem().expect("yz"), Elem::Primitive(b"yz"));
        assert!(it.done());
    }

    #[test]
    fn test_empty_container_is_not_null() {
        let mut b = Builder::new();
        b.begin_container();
        b.end_container();
        assert_eq!(b.single_body().expect("decode"), Some(&b""[..]));

        b.reset();
        b.append_container(None);
        assert_eq!(b.single_body().expect("decode"), None);
    }

    #[test]
    fn test_set_canonicalization() {
        let mut b = Builder::new();
        b.begin_container();
        for v in [3, 1, 2, 1] {
            b.append(Some(&int(v)));
        }
        b.end_set().expect("set");
        let unordered = b.single_body().expect("decode").expect("body").to_vec();

        let mut b = Builder::new();
        b.begin_container();
        for v in [1, 2, 3] {
            b.append(Some(&int(v)));
        }
        b.end_set().expect("set");
        let ordered = b.single_body().expect("decode").expect("body").to_vec();

        // Sorted by tagged bytes: [4,2] [4,4] [4,6].
        assert_eq!(unordered, ordered);
        assert_eq!(normalize_set(&ordered).expect("normalize"), ordered);
    }

    #[test]
    fn test_map_canonicalization_keeps_first() {
        let mut b = Builder::new();
        b.begin_container();
        b.append(Some(b"b"));
        b.append(Some(&int(1)));
        b.append(Some(b"a"));
        b.append(Some(&int(2)));
        b.append(Some(b"b"));
        b.append(Some(&int(3)));
        b.end_map().expect("map");

        let body = b.single_body().expect("decode").expect("body");
        let elems: Vec<_> = Iter::new(body).collect::<Result<_>>().expect("iterate");
        assert_eq!(elems.len(), 4);
        assert_eq!(elems[0], Elem::Primitive(b"a"));
        assert_eq!(elems[2], Elem::Primitive(b"b"));
        assert_eq!(elems[3], Elem::Primitive(&int(1)));
    }

    #[test]
    fn test_truncate_drops_open_containers() {
        let mut b = Builder::new();
        b.append(Some(b"keep"));
        let mark = b.len();
        b.begin_container();
        b.append(Some(b"drop"));
        b.truncate(mark);
        assert_eq!(b.len(), mark);
        // The container opened at `mark` is still considered open.
        assert_eq!(b.depth(), 1);
        b.end_container();
        assert_eq!(Iter::new(b.bytes()).count(), 2);
    }
}
