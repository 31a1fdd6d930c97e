// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Turning vector rows back into values.
//!
//! Rows are re-encoded with the same tag-length rules the row formats use, so
//! a value that went through a vector has the bytes it came in with. Inside a
//! record, a field row whose type differs from the field type is wrapped into
//! the field's union type, and a missing row under an optional field becomes
//! none.

use super::Vector;
use crate::encoding::iter::single_elem;
use crate::encoding::primitive;
use crate::encoding::varint::append_counted_uvarint;
use crate::encoding::Builder;
use crate::error::{Error, Result};
use crate::types::{Field, PrimitiveKind};
use crate::value::{Value, MISSING};

impl Vector {
    /// Append row `i` as one tagged element.
    pub fn append(&self, i: usize, b: &mut Builder) -> Result<()> {
        if i >= self.len() {
            return Err(Error::bad_value(format!(
                "row {} out of range for {} vector of {} rows",
                i,
                self.kind_name(),
                self.len()
            )));
        }
        if self.is_null_at(i) && !matches!(self, Self::Dynamic { .. }) {
            b.append_body(None, false);
            return Ok(());
        }
        match self {
            Self::Int { values, .. } => b.append(Some(&primitive::encode_int(values[i]))),
            Self::Uint { values, .. } => b.append(Some(&primitive::encode_uint(values[i]))),
            Self::Float { typ, values, .. } => {
                let kind = typ.primitive_kind().unwrap_or(PrimitiveKind::Float64);
                b.append(Some(&primitive::encode_float(kind, values[i])?));
            }
            Self::Bool { values, .. } => b.append(Some(&primitive::encode_bool(values.get(i)))),
            Self::Bytes { table, .. } => b.append(Some(table.get(i))),
            Self::Ip { values, .. } => b.append(Some(&primitive::encode_ip(values[i]))),
            Self::Net { values, .. } => b.append(Some(&primitive::encode_net(values[i]))),
            Self::Array { offsets, inner, .. } => {
                b.begin_container();
                for j in offsets[i]..offsets[i + 1] {
                    inner.append(j as usize, b)?;
                }
                b.end_container();
            }
            Self::Map {
                offsets,
                keys,
                values,
                ..
            } => {
                b.begin_container();
                for j in offsets[i]..offsets[i + 1] {
                    keys.append(j as usize, b)?;
                    values.append(j as usize, b)?;
                }
                b.end_container();
            }
            Self::Record { typ, fields, .. } => {
                let decl = typ
                    .fields()
                    .ok_or_else(|| Error::InvalidType(format!("{} is not a record", typ)))?;
                b.begin_container();
                for (f, col) in decl.iter().zip(fields) {
                    append_field(f, col, i, b)?;
                }
                b.end_container();
            }
            Self::Union {
                tags,
                index,
                members,
                ..
            } => {
                let tag = tags[i] as usize;
                let member = members
                    .get(tag)
                    .ok_or_else(|| Error::bad_value(format!("union tag {} out of range", tag)))?;
                b.begin_container();
                let mut idx = Vec::new();
                append_counted_uvarint(&mut idx, tag as u64);
                b.append(Some(&idx));
                member.append(index[i] as usize, b)?;
                b.end_container();
            }
            Self::Error { inner, .. } => inner.append(i, b)?,
            Self::Dynamic {
                tags,
                index,
                values,
            } => values[tags[i] as usize].append(index[i] as usize, b)?,
            Self::Dict { index, values, .. } => values.append(usize::from(index[i]), b)?,
            Self::Const { value, .. } => value.append_to(b),
            Self::Missing { .. } => b.append(Some(MISSING.as_bytes())),
        }
        Ok(())
    }

    /// Row `i` as a value.
    pub fn value(&self, i: usize) -> Result<Value> {
        let mut b = Builder::new();
        self.append(i, &mut b)?;
        let elem = single_elem(b.bytes())?;
        Ok(Value::from_elem(self.type_at(i).clone(), elem))
    }

    /// Every row, in order.
    pub fn values(&self) -> Result<Vec<Value>> {
        (0..self.len()).map(|i| self.value(i)).collect()
    }
}

fn append_field(f: &Field, col: &Vector, i: usize, b: &mut Builder) -> Result<()> {
    if f.opt && col.is_missing_at(i) {
        b.append_none();
        return Ok(());
    }
    let rt = col.type_at(i);
    if rt.name_id() == f.typ.name_id() {
        return col.append(i, b);
    }
    match f.typ.member_index(rt) {
        Some(tag) => {
            b.begin_container();
            let mut idx = Vec::new();
            append_counted_uvarint(&mut idx, tag as u64);
            b.append(Some(&idx));
            col.append(i, b)?;
            b.end_container();
            Ok(())
        }
        None => Err(Error::bad_value(format!(
            "field {} row of type {} does not fit {}",
            f.name, rt, f.typ
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::super::builder::from_values;
    use super::super::Bitmap;
    use super::*;
    use crate::types::{Type, TypeRegistry};
    use crate::value::record;
    use std::sync::Arc;

    fn roundtrip(reg: &Arc<TypeRegistry>, values: &[Value]) {
        let v = from_values(Arc::clone(reg), values).expect("build");
        let out = v.values().expect("materialize");
        assert_eq!(out.len(), values.len());
        for (a, b) in values.iter().zip(&out) {
            assert_eq!(a.typ().name_id(), b.typ().name_id());
            assert_eq!(a.bytes(), b.bytes(), "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_primitive_rows() {
        let reg = Arc::new(TypeRegistry::new());
        roundtrip(
            &reg,
            &[
                Value::int64(-5),
                Value::null(Type::int64()),
                Value::int64(i64::MAX),
            ],
        );
        roundtrip(
            &reg,
            &[Value::float64(1.5), Value::float64(f64::INFINITY)],
        );
        roundtrip(&reg, &[Value::bool(true), Value::bool(false)]);
        roundtrip(&reg, &[Value::string(""), Value::string("abc")]);
    }

    #[test]
    fn test_nested_rows() {
        let reg = Arc::new(TypeRegistry::new());
        let arr = reg.lookup_array(Type::string());
        let map = reg.lookup_map(Type::string(), Type::int64());
        let rec = reg
            .lookup_record(vec![
                Field::new("tags", arr.clone()),
                Field::opt("n", Type::int64()),
                Field::new("m", map.clone()),
            ])
            .expect("record");
        let a = Value::array(arr.clone(), &[Value::string("x"), Value::string("y")]).expect("a");
        let m = Value::map(map.clone(), &[(Value::string("k"), Value::int64(1))]).expect("m");
        let values = vec![
            record(rec.clone(), &[Some(a), Some(Value::int64(3)), Some(m.clone())]).expect("r"),
            record(rec.clone(), &[Some(Value::null(arr)), None, Some(m)]).expect("r"),
            Value::null(rec),
        ];
        roundtrip(&reg, &values);
    }

    #[test]
    fn test_mixed_types() {
        let reg = Arc::new(TypeRegistry::new());
        let err = reg.lookup_error(Type::string());
        roundtrip(
            &reg,
            &[
                Value::int64(1),
                Value::string("a"),
                Value::error(err, &Value::string("boom")).expect("error"),
                Value::int64(2),
            ],
        );
    }

    #[test]
    fn test_union_field_wraps_member_rows() {
        let reg = Arc::new(TypeRegistry::new());
        let u = reg
            .union_of(vec![Type::int64(), Type::string()])
            .expect("union");
        let rec = reg
            .lookup_record(vec![Field::new("a", u.clone())])
            .expect("record");
        // A dynamic column holding bare members, as projection produces.
        let col = Vector::dynamic(
            vec![0, 1],
            vec![
                Vector::Int {
                    typ: Type::int64(),
                    values: vec![7],
                    nulls: Bitmap::new(),
                },
                from_values(Arc::clone(&reg), &[Value::string("s")]).expect("strings"),
            ],
        )
        .expect("dynamic");
        let v = Vector::Record {
            typ: rec.clone(),
            len: 2,
            fields: vec![col],
            nulls: Bitmap::new(),
        };
        let rows = v.values().expect("rows");
        let want = record(rec, &[Some(Value::union(u, &Value::int64(7)).expect("u"))])
            .expect("want");
        assert_eq!(rows[0], want);
    }

    #[test]
    fn test_row_out_of_range() {
        let reg = Arc::new(TypeRegistry::new());
        let v = from_values(reg, &[Value::int64(1)]).expect("build");
        assert!(v.value(1).is_err());
    }
}
