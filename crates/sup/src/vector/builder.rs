// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Building vectors from row-oriented values.
//!
//! [`VectorBuilder`] splits a heterogeneous sequence of `(type, body)` pairs
//! into one typed column per distinct type and a tag stream, the same way the
//! CSUP writer's dynamic encoder does. Each typed column grows in place; an
//! optional record field grows as a dynamic of `[values, missing]` and
//! collapses back to the plain column when no row was none.

use super::{member_index, Bitmap, BytesTable, Vector};
use crate::encoding::iter::{Elem, Iter};
use crate::encoding::primitive::{self, IpNet};
use crate::encoding::varint::decode_counted_uvarint;
use crate::error::{Error, Result};
use crate::types::{PrimitiveKind, Type, TypeKind, TypeRegistry};
use crate::value::Value;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

impl Vector {
    /// An empty column of type `typ` ready for [`push`](Self::push).
    pub fn empty(reg: &TypeRegistry, typ: &Type) -> Result<Self> {
        let t = typ.clone();
        let nulls = Bitmap::new();
        Ok(match typ.under().kind() {
            TypeKind::Primitive(k) if k.is_int() => Self::Int {
                typ: t,
                values: Vec::new(),
                nulls,
            },
            TypeKind::Primitive(k) if k.is_uint() => Self::Uint {
                typ: t,
                values: Vec::new(),
                nulls,
            },
            TypeKind::Enum(_) => Self::Uint {
                typ: t,
                values: Vec::new(),
                nulls,
            },
            TypeKind::Primitive(k) if k.is_float() => Self::Float {
                typ: t,
                values: Vec::new(),
                nulls,
            },
            TypeKind::Primitive(PrimitiveKind::Bool) => Self::Bool {
                typ: t,
                values: Bitmap::new(),
                len: 0,
                nulls,
            },
            TypeKind::Primitive(PrimitiveKind::Bytes | PrimitiveKind::String | PrimitiveKind::Type) => {
                Self::Bytes {
                    typ: t,
                    table: BytesTable::new(),
                    nulls,
                }
            }
            TypeKind::Primitive(PrimitiveKind::Ip) => Self::Ip {
                typ: t,
                values: Vec::new(),
                nulls,
            },
            TypeKind::Primitive(PrimitiveKind::Net) => Self::Net {
                typ: t,
                values: Vec::new(),
                nulls,
            },
            TypeKind::Primitive(PrimitiveKind::Null) => Self::Const {
                value: Value::null(t),
                len: 0,
            },
            TypeKind::Primitive(k) => return Err(Error::UnsupportedPrimitive(k.id())),
            TypeKind::Array(inner) | TypeKind::Set(inner) => Self::Array {
                typ: t,
                offsets: vec![0],
                inner: Box::new(Self::empty(reg, inner)?),
                nulls,
            },
            TypeKind::Map(k, v) => Self::Map {
                typ: t,
                offsets: vec![0],
                keys: Box::new(Self::empty(reg, k)?),
                values: Box::new(Self::empty(reg, v)?),
                nulls,
            },
            TypeKind::Record(fields) => {
                let mut cols = Vec::with_capacity(fields.len());
                for f in fields {
                    let col = Self::empty(reg, &f.typ)?;
                    cols.push(if f.opt {
                        Self::Dynamic {
                            tags: Vec::new(),
                            index: Vec::new(),
                            values: vec![col, Self::missing(reg, 0)],
                        }
                    } else {
                        col
                    });
                }
                Self::Record {
                    typ: t,
                    len: 0,
                    fields: cols,
                    nulls,
                }
            }
            TypeKind::Union(members) => Self::Union {
                typ: t,
                tags: Vec::new(),
                index: Vec::new(),
                members: members
                    .iter()
                    .map(|m| Self::empty(reg, m))
                    .collect::<Result<_>>()?,
                nulls,
            },
            TypeKind::Error(inner) => Self::Error {
                typ: t,
                inner: Box::new(Self::empty(reg, inner)?),
                nulls,
            },
            TypeKind::Named { .. } => {
                return Err(Error::InvalidType(format!("{} has no underlying type", typ)));
            }
        })
    }

    /// Append one element. Null elements set the null bit and push a
    /// placeholder.
    pub fn push(&mut self, elem: Elem<'_>) -> Result<()> {
        if elem.is_none() {
            return Err(Error::bad_value("none outside an optional field"));
        }
        let row = self.len();
        let Some(body) = elem.body() else {
            self.push_default();
            match self {
                Self::Const { .. } => {}
                other => {
                    if let Some(n) = other.nulls_mut() {
                        n.set(row, true);
                    }
                }
            }
            return Ok(());
        };
        match self {
            Self::Int { values, .. } => values.push(primitive::decode_int(body)?),
            Self::Uint { typ, values, .. } => {
                let v = primitive::decode_uint(body)?;
                if let TypeKind::Enum(symbols) = typ.under().kind() {
                    if v >= symbols.len() as u64 {
                        return Err(Error::InvalidType(format!("bad enum index {}", v)));
                    }
                }
                values.push(v);
            }
            Self::Float { typ, values, .. } => {
                let kind = typ.primitive_kind().unwrap_or(PrimitiveKind::Float64);
                values.push(primitive::decode_float(kind, body)?);
            }
            Self::Bool { values, len, .. } => {
                values.set(*len, primitive::decode_bool(body)?);
                *len += 1;
            }
            Self::Bytes { typ, table, .. } => {
                if typ.primitive_kind() == Some(PrimitiveKind::String) {
                    primitive::decode_string(body)?;
                }
                table.push(body);
            }
            Self::Ip { values, .. } => values.push(primitive::decode_ip(body)?),
            Self::Net { values, .. } => values.push(primitive::decode_net(body)?),
            Self::Const { value, len } => {
                if value.bytes() != Some(body) {
                    return Err(Error::bad_value("const column given another value"));
                }
                *len += 1;
            }
            Self::Array {
                offsets, inner, ..
            } => {
                for e in Iter::new(body) {
                    inner.push(e?)?;
                }
                offsets.push(inner.len() as u32);
            }
            Self::Map {
                offsets,
                keys,
                values,
                ..
            } => {
                let mut it = Iter::new(body);
                while !it.done() {
                    keys.push(it.next_elem()?)?;
                    if it.done() {
                        return Err(Error::bad_value("map body with a dangling key"));
                    }
                    values.push(it.next_elem()?)?;
                }
                offsets.push(keys.len() as u32);
            }
            Self::Record {
                typ, len, fields, ..
            } => {
                let mut it = Iter::new(body);
                for (i, col) in fields.iter_mut().enumerate() {
                    if it.done() {
                        return Err(Error::bad_value(format!("record body shorter than {}", typ)));
                    }
                    let e = it.next_elem()?;
                    push_field(col, e)
                        .map_err(|err| annotate(err, typ.fields().map(|f| f[i].name.as_str())))?;
                }
                if !it.done() {
                    return Err(Error::bad_value(format!("record body longer than {}", typ)));
                }
                *len += 1;
            }
            Self::Union {
                typ,
                tags,
                index,
                members,
                ..
            } => {
                let mut it = Iter::new(body);
                let tag = decode_counted_uvarint(it.next_body()?.unwrap_or_default())?;
                let member = members
                    .get_mut(tag as usize)
                    .ok_or_else(|| Error::bad_value(format!("union tag {} out of range for {}", tag, typ)))?;
                index.push(member.len() as u32);
                member.push(it.next_elem()?)?;
                tags.push(tag as u32);
            }
            Self::Error { inner, .. } => inner.push(elem)?,
            Self::Dynamic { .. } | Self::Dict { .. } | Self::Missing { .. } => {
                return Err(Error::bad_value(format!(
                    "cannot append to a {} vector",
                    self.kind_name()
                )));
            }
        }
        Ok(())
    }

    /// Append a placeholder row (zero, empty, or placeholders all the way
    /// down for containers).
    pub(crate) fn push_default(&mut self) {
        match self {
            Self::Int { values, .. } => values.push(0),
            Self::Uint { values, .. } => values.push(0),
            Self::Float { values, .. } => values.push(0.0),
            Self::Bool { len, .. } => *len += 1,
            Self::Bytes { table, .. } => table.push(&[]),
            Self::Ip { values, .. } => values.push(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
            Self::Net { values, .. } => values.push(IpNet::default()),
            Self::Array {
                offsets, inner, ..
            } => offsets.push(inner.len() as u32),
            Self::Map { offsets, keys, .. } => offsets.push(keys.len() as u32),
            Self::Record { len, fields, .. } => {
                for f in fields.iter_mut() {
                    match f {
                        Self::Dynamic {
                            tags,
                            index,
                            values,
                        } => {
                            index.push(values[0].len() as u32);
                            tags.push(0);
                            values[0].push_default();
                        }
                        other => other.push_default(),
                    }
                }
                *len += 1;
            }
            Self::Union {
                tags,
                index,
                members,
                ..
            } => {
                tags.push(0);
                index.push(0);
                if members.is_empty() {
                    return;
                }
                // Index 0 may not exist yet; give it a row.
                if members[0].is_empty() {
                    members[0].push_default();
                }
            }
            Self::Error { inner, .. } => inner.push_default(),
            Self::Dict { index, .. } => index.push(0),
            Self::Const { len, .. } | Self::Missing { len, .. } => *len += 1,
            Self::Dynamic { .. } => {}
        }
    }

    fn nulls_mut(&mut self) -> Option<&mut Bitmap> {
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

    /// Collapse optional-field dynamics that never saw a none.
    #[must_use]
    pub fn finish(self) -> Self {
        match self {
            Self::Record {
                typ,
                len,
                fields,
                nulls,
            } => Self::Record {
                typ,
                len,
                fields: fields.into_iter().map(finish_field).collect(),
                nulls,
            },
            Self::Array {
                typ,
                offsets,
                inner,
                nulls,
            } => Self::Array {
                typ,
                offsets,
                inner: Box::new(inner.finish()),
                nulls,
            },
            Self::Map {
                typ,
                offsets,
                keys,
                values,
                nulls,
            } => Self::Map {
                typ,
                offsets,
                keys: Box::new(keys.finish()),
                values: Box::new(values.finish()),
                nulls,
            },
            Self::Union {
                typ,
                tags,
                index,
                members,
                nulls,
            } => Self::Union {
                typ,
                tags,
                index,
                members: members.into_iter().map(Self::finish).collect(),
                nulls,
            },
            Self::Error { typ, inner, nulls } => Self::Error {
                typ,
                inner: Box::new(inner.finish()),
                nulls,
            },
            Self::Dynamic {
                tags,
                index,
                values,
            } => Self::Dynamic {
                tags,
                index,
                values: values.into_iter().map(Self::finish).collect(),
            },
            other => other,
        }
    }
}

fn push_field(col: &mut Vector, e: Elem<'_>) -> Result<()> {
    match col {
        Vector::Dynamic {
            tags,
            index,
            values,
        } if values.len() == 2 => {
            let slot = usize::from(e.is_none());
            index.push(values[slot].len() as u32);
            tags.push(slot as u32);
            if e.is_none() {
                values[1].push_default();
                Ok(())
            } else {
                values[0].push(e)
            }
        }
        other => other.push(e),
    }
}

fn finish_field(col: Vector) -> Vector {
    match col {
        Vector::Dynamic {
            tags,
            index,
            mut values,
        } if values.len() == 2 && matches!(values[1], Vector::Missing { .. }) => {
            if values[1].is_empty() {
                values.swap_remove(0).finish()
            } else {
                Vector::Dynamic {
                    tags,
                    index,
                    values: values.into_iter().map(Vector::finish).collect(),
                }
            }
        }
        other => other.finish(),
    }
}

fn annotate(err: Error, field: Option<&str>) -> Error {
    match (err, field) {
        (Error::BadValue(msg), Some(name)) => Error::BadValue(format!("field {}: {}", name, msg)),
        (err, _) => err,
    }
}

/// Builds a vector from a heterogeneous sequence of values.
pub struct VectorBuilder {
    reg: Arc<TypeRegistry>,
    tags: Vec<u32>,
    columns: Vec<Vector>,
    by_type: HashMap<u32, u32>,
}

impl VectorBuilder {
    /// Values pushed must use types of `reg`.
    #[must_use]
    pub fn new(reg: Arc<TypeRegistry>) -> Self {
        Self {
            reg,
            tags: Vec::new(),
            columns: Vec::new(),
            by_type: HashMap::new(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.reg
    }

    /// Rows pushed so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Append one row given as a type and its element.
    pub fn push(&mut self, typ: &Type, elem: Elem<'_>) -> Result<()> {
        let tag = match self.by_type.get(&typ.name_id()) {
            Some(&tag) => tag,
            None => {
                let tag = self.columns.len() as u32;
                self.columns.push(Vector::empty(&self.reg, typ)?);
                self.by_type.insert(typ.name_id(), tag);
                tag
            }
        };
        self.columns[tag as usize].push(elem)?;
        self.tags.push(tag);
        Ok(())
    }

    pub fn push_value(&mut self, v: &Value) -> Result<()> {
        self.push(v.typ(), v.elem())
    }

    /// The finished vector: the single column when every row had the same
    /// type, a dynamic vector otherwise.
    pub fn finish(self) -> Result<Vector> {
        let mut columns: Vec<Vector> = self.columns.into_iter().map(Vector::finish).collect();
        if columns.len() == 1 {
            if let Some(col) = columns.pop() {
                log::trace!("[VECTOR] built {} vector of {} rows", col.kind_name(), col.len());
                return Ok(col);
            }
        }
        let index = member_index(&self.tags, columns.len())?;
        log::trace!(
            "[VECTOR] built dynamic vector of {} rows over {} types",
            self.tags.len(),
            columns.len()
        );
        Ok(Vector::Dynamic {
            tags: self.tags,
            index,
            values: columns,
        })
    }
}

/// Build a vector from owned values.
pub fn from_values(reg: Arc<TypeRegistry>, values: &[Value]) -> Result<Vector> {
    let mut b = VectorBuilder::new(reg);
    for v in values {
        b.push_value(v)?;
    }
    b.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Field;
    use crate::value::record;

    #[test]
    fn test_single_type_column() {
        let reg = Arc::new(TypeRegistry::new());
        let values: Vec<Value> = (0..5).map(Value::int64).collect();
        let v = from_values(reg, &values).expect("build");
        let Vector::Int { values, .. } = &v else {
            panic!("expected int vector, got {}", v.kind_name());
        };
        assert_eq!(values, &vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_heterogeneous_rows() {
        let reg = Arc::new(TypeRegistry::new());
        let values = vec![Value::int64(1), Value::string("a"), Value::int64(2)];
        let v = from_values(reg, &values).expect("build");
        let Vector::Dynamic { tags, index, values } = &v else {
            panic!("expected dynamic vector");
        };
        assert_eq!(tags, &vec![0, 1, 0]);
        assert_eq!(index, &vec![0, 0, 1]);
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_optional_field_nones() {
        let reg = Arc::new(TypeRegistry::new());
        let rec = reg
            .lookup_record(vec![
                Field::new("a", Type::int64()),
                Field::opt("b", Type::int64()),
            ])
            .expect("record");
        let values: Vec<Value> = (0..6)
            .map(|i| {
                let b = (i % 3 != 2).then(|| Value::int64(i));
                record(rec.clone(), &[Some(Value::int64(i)), b]).expect("value")
            })
            .collect();
        let v = from_values(Arc::clone(&reg), &values).expect("build");
        let b = v.field("b").expect("field b");
        assert!(matches!(b, Vector::Dynamic { .. }));
        let missing: Vec<usize> = (0..6).filter(|&i| b.is_missing_at(i)).collect();
        assert_eq!(missing, vec![2, 5]);
        assert!(matches!(v.field("a"), Some(Vector::Int { .. })));
    }

    #[test]
    fn test_optional_field_without_nones_collapses() {
        let reg = Arc::new(TypeRegistry::new());
        let rec = reg
            .lookup_record(vec![Field::opt("b", Type::string())])
            .expect("record");
        let values = vec![
            record(rec.clone(), &[Some(Value::string("x"))]).expect("value"),
            record(rec, &[Some(Value::string("y"))]).expect("value"),
        ];
        let v = from_values(reg, &values).expect("build");
        assert!(matches!(v.field("b"), Some(Vector::Bytes { .. })));
    }

    #[test]
    fn test_nulls_and_unions() {
        let reg = Arc::new(TypeRegistry::new());
        let u = reg
            .lookup_union(vec![Type::int64(), Type::string()])
            .expect("union");
        let values = vec![
            Value::union(u.clone(), &Value::string("s")).expect("u"),
            Value::null(u.clone()),
            Value::union(u, &Value::int64(3)).expect("u"),
        ];
        let v = from_values(reg, &values).expect("build");
        let Vector::Union { tags, index, nulls, .. } = &v else {
            panic!("expected union vector");
        };
        assert!(nulls.get(1));
        assert_eq!(tags, &vec![1, 0, 0]);
        // The null row holds a placeholder in member 0.
        assert_eq!(index, &vec![0, 0, 1]);
    }

    #[test]
    fn test_none_at_top_level_rejected() {
        let reg = Arc::new(TypeRegistry::new());
        let mut b = VectorBuilder::new(reg);
        let err = b.push(&Type::int64(), Elem::None).expect_err("none");
        assert_eq!(err.kind(), crate::error::ErrorKind::BadValue);
    }
}
