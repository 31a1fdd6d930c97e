// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Columnar vectors.
//!
//! A [`Vector`] holds `len` rows of one type (or, for [`Vector::Dynamic`], of
//! several types) in kind-specific storage plus a null bitmap. Rows that are
//! null keep a placeholder in the storage so that every column stays indexed
//! by row.
//!
//! | Kind | Storage |
//! |------|---------|
//! | `Int` / `Uint` / `Float` | native slice |
//! | `Bool` | bitmap |
//! | `Bytes` | offsets + concatenated bodies |
//! | `Ip` / `Net` | native slices |
//! | `Array` (also sets) | offsets + inner vector |
//! | `Map` | offsets + key and value vectors |
//! | `Record` | one vector per field |
//! | `Union` / `Dynamic` | tags + per-member row index + member vectors |
//! | `Dict` | one index byte per row + counts + entries vector |
//! | `Const` | one value repeated |
//! | `Missing` | length only |
//!
//! - [`builder`]: [`VectorBuilder`] from `(type, body)` pairs
//! - [`materialize`]: rows back to [`Value`]s
//! - [`project`]: projections over vectors

pub mod bitmap;
pub mod builder;
pub mod materialize;
pub mod project;

pub use bitmap::Bitmap;
pub use builder::VectorBuilder;
pub use project::project;

use crate::encoding::primitive::IpNet;
use crate::error::{Error, Result};
use crate::projection::missing_type;
use crate::types::{Type, TypeRegistry};
use crate::value::Value;
use std::net::{IpAddr, Ipv4Addr};

/// Variable-length bodies stored back to back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BytesTable {
    /// `len + 1` offsets into `bytes`.
    offsets: Vec<u32>,
    bytes: Vec<u8>,
}

impl Default for BytesTable {
    fn default() -> Self {
        Self {
            offsets: vec![0],
            bytes: Vec::new(),
        }
    }
}

impl BytesTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from per-row lengths and the concatenated bodies.
    pub fn from_lengths(lengths: &[u64], bytes: Vec<u8>) -> Result<Self> {
        let mut offsets = Vec::with_capacity(lengths.len() + 1);
        offsets.push(0u32);
        let mut end = 0u64;
        for &n in lengths {
            end += n;
            if end > bytes.len() as u64 {
                return Err(Error::truncated("bytes table shorter than its lengths"));
            }
            offsets.push(end as u32);
        }
        if end != bytes.len() as u64 {
            return Err(Error::bad_value("bytes table longer than its lengths"));
        }
        Ok(Self { offsets, bytes })
    }

    pub fn push(&mut self, body: &[u8]) {
        self.bytes.extend_from_slice(body);
        self.offsets.push(self.bytes.len() as u32);
    }

    #[inline]
    #[must_use]
    pub fn get(&self, i: usize) -> &[u8] {
        &self.bytes[self.offsets[i] as usize..self.offsets[i + 1] as usize]
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total body bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }
}

/// A column of values.
#[derive(Debug, Clone)]
pub enum Vector {
    /// Signed integers, durations and times.
    Int {
        typ: Type,
        values: Vec<i64>,
        nulls: Bitmap,
    },
    /// Unsigned integers and enums.
    Uint {
        typ: Type,
        values: Vec<u64>,
        nulls: Bitmap,
    },
    Float {
        typ: Type,
        values: Vec<f64>,
        nulls: Bitmap,
    },
    Bool {
        typ: Type,
        values: Bitmap,
        len: usize,
        nulls: Bitmap,
    },
    /// Bytes, strings and type-values.
    Bytes {
        typ: Type,
        table: BytesTable,
        nulls: Bitmap,
    },
    Ip {
        typ: Type,
        values: Vec<IpAddr>,
        nulls: Bitmap,
    },
    Net {
        typ: Type,
        values: Vec<IpNet>,
        nulls: Bitmap,
    },
    /// Arrays and sets; `offsets` has `len + 1` entries into `inner`.
    Array {
        typ: Type,
        offsets: Vec<u32>,
        inner: Box<Vector>,
        nulls: Bitmap,
    },
    Map {
        typ: Type,
        offsets: Vec<u32>,
        keys: Box<Vector>,
        values: Box<Vector>,
        nulls: Bitmap,
    },
    /// Field vectors in the order of the record type's fields. An optional
    /// field whose rows are missing materializes as none.
    Record {
        typ: Type,
        len: usize,
        fields: Vec<Vector>,
        nulls: Bitmap,
    },
    /// `tags[i]` picks the member, `index[i]` the row inside it.
    Union {
        typ: Type,
        tags: Vec<u32>,
        index: Vec<u32>,
        members: Vec<Vector>,
        nulls: Bitmap,
    },
    Error {
        typ: Type,
        inner: Box<Vector>,
        nulls: Bitmap,
    },
    /// Heterogeneous rows; each value vector has its own type.
    Dynamic {
        tags: Vec<u32>,
        index: Vec<u32>,
        values: Vec<Vector>,
    },
    /// Row `i` is `values[index[i]]`.
    Dict {
        typ: Type,
        index: Vec<u8>,
        counts: Vec<u32>,
        values: Box<Vector>,
        nulls: Bitmap,
    },
    Const {
        value: Value,
        len: usize,
    },
    /// `error("missing")` repeated.
    Missing {
        typ: Type,
        len: usize,
    },
}

/// Per-row position inside the member a tag selects.
pub(crate) fn member_index(tags: &[u32], members: usize) -> Result<Vec<u32>> {
    let mut counts = vec![0u32; members];
    let mut index = Vec::with_capacity(tags.len());
    for &t in tags {
        let slot = counts
            .get_mut(t as usize)
            .ok_or_else(|| Error::bad_value(format!("tag {} out of range", t)))?;
        index.push(*slot);
        *slot += 1;
    }
    Ok(index)
}

impl Vector {
    /// Union vector; member positions are derived from the tags.
    pub fn union(typ: Type, tags: Vec<u32>, members: Vec<Vector>, nulls: Bitmap) -> Result<Self> {
        let index = member_index(&tags, members.len())?;
        check_member_lengths(&index, &tags, &members)?;
        Ok(Self::Union {
            typ,
            tags,
            index,
            members,
            nulls,
        })
    }

    /// Dynamic vector; value positions are derived from the tags.
    pub fn dynamic(tags: Vec<u32>, values: Vec<Vector>) -> Result<Self> {
        let index = member_index(&tags, values.len())?;
        check_member_lengths(&index, &tags, &values)?;
        Ok(Self::Dynamic {
            tags,
            index,
            values,
        })
    }

    /// `len` missing rows.
    #[must_use]
    pub fn missing(reg: &TypeRegistry, len: usize) -> Self {
        Self::Missing {
            typ: missing_type(reg),
            len,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int { values, .. } => values.len(),
            Self::Uint { values, .. } => values.len(),
            Self::Float { values, .. } => values.len(),
            Self::Bool { len, .. } => *len,
            Self::Bytes { table, .. } => table.len(),
            Self::Ip { values, .. } => values.len(),
            Self::Net { values, .. } => values.len(),
            Self::Array { offsets, .. } | Self::Map { offsets, .. } => offsets.len() - 1,
            Self::Record { len, .. } | Self::Const { len, .. } | Self::Missing { len, .. } => *len,
            Self::Union { tags, .. } | Self::Dynamic { tags, .. } => tags.len(),
            Self::Error { inner, .. } => inner.len(),
            Self::Dict { index, .. } => index.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Type shared by every row; `None` for dynamic vectors.
    #[must_use]
    pub fn typ(&self) -> Option<&Type> {
        match self {
            Self::Int { typ, .. }
            | Self::Uint { typ, .. }
            | Self::Float { typ, .. }
            | Self::Bool { typ, .. }
            | Self::Bytes { typ, .. }
            | Self::Ip { typ, .. }
            | Self::Net { typ, .. }
            | Self::Array { typ, .. }
            | Self::Map { typ, .. }
            | Self::Record { typ, .. }
            | Self::Union { typ, .. }
            | Self::Error { typ, .. }
            | Self::Dict { typ, .. }
            | Self::Missing { typ, .. } => Some(typ),
            Self::Const { value, .. } => Some(value.typ()),
            Self::Dynamic { .. } => None,
        }
    }

    /// Type of row `i`.
    #[must_use]
    pub fn type_at(&self, i: usize) -> &Type {
        match self {
            Self::Dynamic {
                tags,
                index,
                values,
            } => values[tags[i] as usize].type_at(index[i] as usize),
            Self::Const { value, .. } => value.typ(),
            Self::Int { typ, .. }
            | Self::Uint { typ, .. }
            | Self::Float { typ, .. }
            | Self::Bool { typ, .. }
            | Self::Bytes { typ, .. }
            | Self::Ip { typ, .. }
            | Self::Net { typ, .. }
            | Self::Array { typ, .. }
            | Self::Map { typ, .. }
            | Self::Record { typ, .. }
            | Self::Union { typ, .. }
            | Self::Error { typ, .. }
            | Self::Dict { typ, .. }
            | Self::Missing { typ, .. } => typ,
        }
    }

    /// Null bitmap; `None` for kinds that cannot hold nulls themselves.
    #[must_use]
    pub fn nulls(&self) -> Option<&Bitmap> {
        match self {
            Self::Int { nulls, .. }
            | Self::Uint { nulls, .. }
            | Self::Float { nulls, .. }
            | Self::Bool { nulls, .. }
            | Self::Bytes { nulls, .. }
            | Self::Ip { nulls, .. }
            | Self::Net { nulls, .. }
            | Self::Array { nulls, .. }
            | Self::Map { nulls, .. }
            | Self::Record { nulls, .. }
            | Self::Union { nulls, .. }
            | Self::Error { nulls, .. }
            | Self::Dict { nulls, .. } => Some(nulls),
            Self::Const { .. } | Self::Missing { .. } | Self::Dynamic { .. } => None,
        }
    }

    #[must_use]
    pub fn is_null_at(&self, i: usize) -> bool {
        match self {
            Self::Const { value, .. } => value.is_null(),
            Self::Dynamic {
                tags,
                index,
                values,
            } => values[tags[i] as usize].is_null_at(index[i] as usize),
            _ => self.nulls().is_some_and(|n| n.get(i)),
        }
    }

    /// True when row `i` is `error("missing")`.
    #[must_use]
    pub fn is_missing_at(&self, i: usize) -> bool {
        match self {
            Self::Missing { .. } => true,
            Self::Const { value, .. } => value.is_missing(),
            Self::Dynamic {
                tags,
                index,
                values,
            } => values[tags[i] as usize].is_missing_at(index[i] as usize),
            _ => false,
        }
    }

    /// Record field vector by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Vector> {
        match self {
            Self::Record { typ, fields, .. } => fields.get(typ.field_index(name)?),
            _ => None,
        }
    }

    /// Short kind name for diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Int { .. } => "int",
            Self::Uint { .. } => "uint",
            Self::Float { .. } => "float",
            Self::Bool { .. } => "bool",
            Self::Bytes { .. } => "bytes",
            Self::Ip { .. } => "ip",
            Self::Net { .. } => "net",
            Self::Array { .. } => "array",
            Self::Map { .. } => "map",
            Self::Record { .. } => "record",
            Self::Union { .. } => "union",
            Self::Error { .. } => "error",
            Self::Dynamic { .. } => "dynamic",
            Self::Dict { .. } => "dict",
            Self::Const { .. } => "const",
            Self::Missing { .. } => "missing",
        }
    }

    /// Replace the type of every row with `typ`, which must share this
    /// vector's underlying type (used to put a name back on a column).
    pub fn with_type(self, typ: Type) -> Result<Self> {
        let same = self
            .typ()
            .is_some_and(|t| t.under().name_id() == typ.under().name_id());
        if !same {
            return Err(Error::InvalidType(format!(
                "cannot retype {} vector as {}",
                self.kind_name(),
                typ
            )));
        }
        Ok(match self {
            Self::Int { values, nulls, .. } => Self::Int { typ, values, nulls },
            Self::Uint { values, nulls, .. } => Self::Uint { typ, values, nulls },
            Self::Float { values, nulls, .. } => Self::Float { typ, values, nulls },
            Self::Bool {
                values, len, nulls, ..
            } => Self::Bool {
                typ,
                values,
                len,
                nulls,
            },
            Self::Bytes { table, nulls, .. } => Self::Bytes { typ, table, nulls },
            Self::Ip { values, nulls, .. } => Self::Ip { typ, values, nulls },
            Self::Net { values, nulls, .. } => Self::Net { typ, values, nulls },
            Self::Array {
                offsets,
                inner,
                nulls,
                ..
            } => Self::Array {
                typ,
                offsets,
                inner,
                nulls,
            },
            Self::Map {
                offsets,
                keys,
                values,
                nulls,
                ..
            } => Self::Map {
                typ,
                offsets,
                keys,
                values,
                nulls,
            },
            Self::Record {
                len, fields, nulls, ..
            } => Self::Record {
                typ,
                len,
                fields,
                nulls,
            },
            Self::Union {
                tags,
                index,
                members,
                nulls,
                ..
            } => Self::Union {
                typ,
                tags,
                index,
                members,
                nulls,
            },
            Self::Error { inner, nulls, .. } => Self::Error { typ, inner, nulls },
            Self::Dict {
                index,
                counts,
                values,
                nulls,
                ..
            } => Self::Dict {
                typ,
                index,
                counts,
                values,
                nulls,
            },
            Self::Const { value, len } => Self::Const {
                value: Value::new(typ, value.into_parts().1),
                len,
            },
            Self::Missing { len, .. } => Self::Missing { typ, len },
            dynamic @ Self::Dynamic { .. } => dynamic,
        })
    }

    /// Insert null rows. `nulls` covers the widened vector; its clear bits
    /// take this vector's rows in order.
    pub fn spread(self, nulls: &Bitmap, len: usize) -> Result<Self> {
        let set = (0..len).filter(|&i| nulls.get(i)).count();
        if self.len() + set != len {
            return Err(Error::MalformedMetadata(format!(
                "{} values under {} nulls do not fill {} rows",
                self.len(),
                set,
                len
            )));
        }
        if set == 0 {
            return Ok(self);
        }
        // Source row for each non-null destination row.
        let rows: Vec<Option<usize>> = {
            let mut next = 0usize;
            (0..len)
                .map(|i| {
                    if nulls.get(i) {
                        None
                    } else {
                        next += 1;
                        Some(next - 1)
                    }
                })
                .collect()
        };
        let merged = |own: &Bitmap| -> Bitmap {
            let mut out = Bitmap::with_len(len);
            for (i, r) in rows.iter().enumerate() {
                out.set(i, r.map_or(true, |r| own.get(r)));
            }
            out
        };
        Ok(match self {
            Self::Int { typ, values, nulls } => Self::Int {
                typ,
                values: gather(&values, &rows, 0),
                nulls: merged(&nulls),
            },
            Self::Uint { typ, values, nulls } => Self::Uint {
                typ,
                values: gather(&values, &rows, 0),
                nulls: merged(&nulls),
            },
            Self::Float { typ, values, nulls } => Self::Float {
                typ,
                values: gather(&values, &rows, 0.0),
                nulls: merged(&nulls),
            },
            Self::Bool {
                typ, values, nulls, ..
            } => Self::Bool {
                typ,
                values: Bitmap::from_bools(rows.iter().map(|r| r.is_some_and(|r| values.get(r)))),
                len,
                nulls: merged(&nulls),
            },
            Self::Bytes { typ, table, nulls } => {
                let mut out = BytesTable::new();
                for r in &rows {
                    out.push(r.map_or(&[][..], |r| table.get(r)));
                }
                Self::Bytes {
                    typ,
                    table: out,
                    nulls: merged(&nulls),
                }
            }
            Self::Ip { typ, values, nulls } => Self::Ip {
                typ,
                values: gather(&values, &rows, IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
                nulls: merged(&nulls),
            },
            Self::Net { typ, values, nulls } => Self::Net {
                typ,
                values: gather(&values, &rows, IpNet::default()),
                nulls: merged(&nulls),
            },
            Self::Array {
                typ,
                offsets,
                inner,
                nulls,
            } => Self::Array {
                typ,
                offsets: spread_offsets(&offsets, &rows),
                inner,
                nulls: merged(&nulls),
            },
            Self::Map {
                typ,
                offsets,
                keys,
                values,
                nulls,
            } => Self::Map {
                typ,
                offsets: spread_offsets(&offsets, &rows),
                keys,
                values,
                nulls: merged(&nulls),
            },
            Self::Record {
                typ,
                fields,
                nulls: own,
                ..
            } => {
                let nulls_out = merged(&own);
                let fields = fields
                    .into_iter()
                    .map(|f| f.spread(nulls, len))
                    .collect::<Result<Vec<_>>>()?;
                Self::Record {
                    typ,
                    len,
                    fields,
                    nulls: nulls_out,
                }
            }
            Self::Union {
                typ,
                tags,
                index,
                members,
                nulls,
            } => Self::Union {
                typ,
                tags: gather(&tags, &rows, 0),
                index: gather(&index, &rows, 0),
                members,
                nulls: merged(&nulls),
            },
            Self::Error {
                typ,
                inner,
                nulls: own,
            } => Self::Error {
                typ,
                inner: Box::new(inner.spread(nulls, len)?),
                nulls: merged(&own),
            },
            Self::Dict {
                typ,
                index,
                counts,
                values,
                nulls,
            } => Self::Dict {
                typ,
                index: gather(&index, &rows, 0),
                counts,
                values,
                nulls: merged(&nulls),
            },
            // Columns without their own null bitmap take a null member.
            Self::Const { value, len: n } => {
                let null = Value::null(value.typ().clone());
                Self::dynamic(
                    rows.iter().map(|r| u32::from(r.is_none())).collect(),
                    vec![Self::Const { value, len: n }, Self::Const { value: null, len: set }],
                )?
            }
            Self::Missing { typ, .. } => Self::Missing { typ, len },
            Self::Dynamic {
                tags, mut values, ..
            } => {
                let Some(filler) = values.iter().find_map(|v| v.typ().cloned()) else {
                    return Err(Error::MalformedMetadata(
                        "nulls over an untyped dynamic vector".into(),
                    ));
                };
                let extra = values.len() as u32;
                values.push(Self::Const {
                    value: Value::null(filler),
                    len: set,
                });
                Self::dynamic(rows.iter().map(|r| r.map_or(extra, |r| tags[r])).collect(), values)?
            }
        })
    }
}

fn check_member_lengths(index: &[u32], tags: &[u32], members: &[Vector]) -> Result<()> {
    for (m, v) in members.iter().enumerate() {
        let used = tags.iter().filter(|&&t| t as usize == m).count();
        if used > v.len() {
            return Err(Error::bad_value(format!(
                "member {} has {} rows, tags need {}",
                m,
                v.len(),
                used
            )));
        }
    }
    debug_assert_eq!(index.len(), tags.len());
    Ok(())
}

fn gather<T: Clone>(src: &[T], rows: &[Option<usize>], fill: T) -> Vec<T> {
    rows.iter()
        .map(|r| r.map_or_else(|| fill.clone(), |r| src[r].clone()))
        .collect()
}

fn spread_offsets(offsets: &[u32], rows: &[Option<usize>]) -> Vec<u32> {
    let mut out = Vec::with_capacity(rows.len() + 1);
    out.push(0);
    let mut end = 0u32;
    for r in rows {
        if let Some(r) = r {
            end += offsets[r + 1] - offsets[*r];
        }
        out.push(end);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: Vec<i64>) -> Vector {
        Vector::Int {
            typ: Type::int64(),
            values,
            nulls: Bitmap::new(),
        }
    }

    #[test]
    fn test_member_index() {
        let idx = member_index(&[0, 1, 0, 0, 1], 2).expect("index");
        assert_eq!(idx, vec![0, 0, 1, 2, 1]);
        assert!(member_index(&[2], 2).is_err());
    }

    #[test]
    fn test_dynamic_type_at() {
        let reg = TypeRegistry::new();
        let v = Vector::dynamic(vec![0, 1, 0], vec![ints(vec![1, 2]), Vector::missing(&reg, 1)])
            .expect("dynamic");
        assert_eq!(v.len(), 3);
        assert!(v.typ().is_none());
        assert_eq!(v.type_at(0).name_id(), Type::int64().name_id());
        assert!(v.is_missing_at(1));
        assert!(!v.is_missing_at(2));
    }

    #[test]
    fn test_dynamic_rejects_short_member() {
        let err = Vector::dynamic(vec![0, 0, 0], vec![ints(vec![1])]).expect_err("short");
        assert_eq!(err.kind(), crate::error::ErrorKind::BadValue);
    }

    #[test]
    fn test_spread_ints() {
        let nulls = Bitmap::from_bools([true, false, false, true]);
        let v = ints(vec![7, 8]).spread(&nulls, 4).expect("spread");
        let Vector::Int { values, nulls, .. } = &v else {
            panic!("expected int vector");
        };
        assert_eq!(values, &vec![0, 7, 8, 0]);
        assert!(nulls.get(0) && nulls.get(3));
        assert!(!nulls.get(1));
    }

    #[test]
    fn test_spread_length_mismatch() {
        let nulls = Bitmap::from_bools([true, false]);
        let err = ints(vec![1, 2]).spread(&nulls, 2).expect_err("mismatch");
        assert_eq!(err.kind(), crate::error::ErrorKind::MalformedMetadata);
    }

    #[test]
    fn test_spread_array_offsets() {
        let reg = TypeRegistry::new();
        let v = Vector::Array {
            typ: reg.lookup_array(Type::int64()),
            offsets: vec![0, 2, 3],
            inner: Box::new(ints(vec![1, 2, 3])),
            nulls: Bitmap::new(),
        };
        let v = v
            .spread(&Bitmap::from_bools([false, true, false]), 3)
            .expect("spread");
        let Vector::Array { offsets, .. } = &v else {
            panic!("expected array");
        };
        assert_eq!(offsets, &vec![0, 2, 2, 3]);
        assert!(v.is_null_at(1));
    }

    #[test]
    fn test_spread_const_takes_null_member() {
        let v = Vector::Const {
            value: Value::int64(4),
            len: 2,
        };
        let v = v
            .spread(&Bitmap::from_bools([false, true, false]), 3)
            .expect("spread");
        assert_eq!(v.len(), 3);
        assert!(v.is_null_at(1));
        assert!(!v.is_null_at(2));
    }
}
