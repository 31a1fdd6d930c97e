// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Tag-length iterator over container bodies.
//!
//! A body is a run of elements, each a uvarint tag followed by its bytes:
//!
//! ```text
//! tag = 0            null
//! tag = 1            none (absent optional field)
//! tag = 2*(n+1)      primitive, n body bytes follow
//! tag = 2*(n+1) + 1  container, n body bytes follow
//! ```
//!
//! [`Iter`] hands out borrowed slices and never allocates.

use super::varint::decode_uvarint;
use crate::error::{Error, Result};

/// Tag of a null element.
pub const TAG_NULL: u64 = 0;
/// Tag of an absent optional field.
pub const TAG_NONE: u64 = 1;

/// Tag for a primitive body of `len` bytes.
#[inline]
#[must_use]
pub const fn primitive_tag(len: usize) -> u64 {
    (len as u64 + 1) << 1
}

/// Tag for a container body of `len` bytes.
#[inline]
#[must_use]
pub const fn container_tag(len: usize) -> u64 {
    ((len as u64 + 1) << 1) | 1
}

/// One decoded element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Elem<'a> {
    Null,
    None,
    Primitive(&'a [u8]),
    Container(&'a [u8]),
}

impl<'a> Elem<'a> {
    /// Body bytes; `None` for null and none.
    #[inline]
    #[must_use]
    pub fn body(&self) -> Option<&'a [u8]> {
        match *self {
            Self::Primitive(b) | Self::Container(b) => Some(b),
            Self::Null | Self::None => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Build the element for a body, choosing the container flag.
    #[inline]
    #[must_use]
    pub fn from_body(body: Option<&'a [u8]>, container: bool) -> Self {
        match body {
            None => Self::Null,
            Some(b) if container => Self::Container(b),
            Some(b) => Self::Primitive(b),
        }
    }
}

/// Iterator over the elements of a container body.
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    buf: &'a [u8],
    off: usize,
}

impl<'a> Iter<'a> {
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, off: 0 }
    }

    /// True once every element has been consumed.
    #[inline]
    #[must_use]
    pub fn done(&self) -> bool {
        self.off >= self.buf.len()
    }

    #[inline]
    #[must_use]
    pub fn offset(&self) -> usize {
        self.off
    }

    /// Next element together with its raw tagged bytes.
    pub fn next_raw(&mut self) -> Result<(Elem<'a>, &'a [u8])> {
        let start = self.off;
        let (tag, n) = decode_uvarint(&self.buf[self.off..]).map_err(|e| e.at(start as u64))?;
        self.off += n;
        let elem = match tag {
            TAG_NULL => Elem::Null,
            TAG_NONE => Elem::None,
            _ => {
                let len = (tag >> 1) - 1;
                let remaining = (self.buf.len() - self.off) as u64;
                if len > remaining {
                    return Err(Error::truncated(format!(
                        "element of {} bytes with {} remaining",
                        len, remaining
                    ))
                    .at(start as u64));
                }
                let body = &self.buf[self.off..self.off + len as usize];
                self.off += len as usize;
                if tag & 1 == 1 {
                    Elem::Container(body)
                } else {
                    Elem::Primitive(body)
                }
            }
        };
        Ok((elem, &self.buf[start..self.off]))
    }

    /// Next element.
    #[inline]
    pub fn next_elem(&mut self) -> Result<Elem<'a>> {
        self.next_raw().map(|(e, _)| e)
    }

    /// Next element body, failing at the end of input.
    pub fn next_body(&mut self) -> Result<Option<&'a [u8]>> {
        if self.done() {
            return Err(Error::truncated("container body").at(self.off as u64));
        }
        self.next_elem().map(|e| e.body())
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = Result<Elem<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done() {
            return None;
        }
        let item = self.next_elem();
        if item.is_err() {
            // Stop after the first error.
            self.off = self.buf.len();
        }
        Some(item)
    }
}

/// Decode a buffer holding exactly one tagged element.
pub fn single_elem(tagged: &[u8]) -> Result<Elem<'_>> {
    let mut it = Iter::new(tagged);
    if it.done() {
        return Err(Error::truncated("empty element"));
    }
    let elem = it.next_elem()?;
    if !it.done() {
        return Err(Error::bad_value("trailing bytes after element"));
    }
    Ok(elem)
}

/// Count the elements of a body.
pub fn count_elems(body: &[u8]) -> Result<usize> {
    let mut it = Iter::new(body);
    let mut n = 0;
    while !it.done() {
        it.next_elem()?;
        n += 1;
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::varint::append_uvarint;
    use crate::error::ErrorKind;

    fn tagged(tag: u64, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        append_uvarint(&mut out, tag);
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn test_tags() {
        assert_eq!(primitive_tag(0), 2);
        assert_eq!(container_tag(0), 3);
        assert_eq!(primitive_tag(5), 12);
        assert_eq!(container_tag(5), 13);
    }

    #[test]
    fn test_iterate_mixed_body() {
        let mut body = tagged(primitive_tag(2), b"hi");
        body.extend(tagged(TAG_NULL, b""));
        body.extend(tagged(container_tag(0), b""));
        body.extend(tagged(TAG_NONE, b""));
        body.extend(tagged(primitive_tag(0), b""));

        let elems: Vec<_> = Iter::new(&body).collect::<Result<_>>().expect("iterate");
        assert_eq!(
            elems,
            vec![
                Elem::Primitive(b"hi"),
                Elem::Null,
                Elem::Container(b""),
                Elem::None,
                Elem::Primitive(b""),
            ]
        );
        assert_eq!(count_elems(&body).expect("count"), 5);
    }

    #[test]
    fn test_null_distinct_from_empty() {
        assert_eq!(single_elem(&[0]).expect("null").body(), None);
        assert_eq!(single_elem(&[2]).expect("empty").body(), Some(&b""[..]));
        assert_eq!(single_elem(&[3]).expect("empty").body(), Some(&b""[..]));
    }

    #[test]
    fn test_truncated_element() {
        let mut body = tagged(primitive_tag(4), b"ab");
        body.truncate(3);
        let mut it = Iter::new(&body);
        let err = it.next_elem().expect_err("truncated");
        assert_eq!(err.kind(), ErrorKind::Truncated);
        assert_eq!(err.offset(), Some(0));
    }

    #[test]
    fn test_next_raw_returns_tagged_bytes() {
        let mut body = tagged(primitive_tag(1), b"x");
        body.extend(tagged(primitive_tag(1), b"y"));
        let mut it = Iter::new(&body);
        let (_, raw) = it.next_raw().expect("first");
        assert_eq!(raw, &[4, b'x']);
        let (elem, _) = it.next_raw().expect("second");
        assert_eq!(elem, Elem::Primitive(b"y"));
        assert!(it.done());
    }
}
