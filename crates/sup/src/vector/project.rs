// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Projections over vectors.
//!
//! Follows [`project_value`](crate::projection::project_value) row for row:
//! records keep the projected fields in projection order, absent fields become
//! missing columns, unions become dynamic vectors of their projected members,
//! and everything else becomes a record of missing columns.

use super::{Bitmap, Vector};
use crate::error::Result;
use crate::projection::{all_missing_type, project_type, project_value, Projection};
use crate::types::TypeRegistry;
use crate::value::Value;

/// Apply `proj` to every row of `v`. Types are interned in `reg`, which must
/// be the registry `v`'s types come from.
pub fn project(reg: &TypeRegistry, v: &Vector, proj: &Projection) -> Result<Vector> {
    if proj.is_all() {
        return Ok(v.clone());
    }
    match v {
        Vector::Record {
            typ,
            len,
            fields,
            nulls,
        } => {
            let out_typ = project_type(reg, typ, proj)?;
            let mut out = Vec::with_capacity(proj.fields().len());
            for pf in proj.fields() {
                match typ.field_index(&pf.name) {
                    Some(idx) => out.push(project_field(reg, &fields[idx], &pf.sub)?),
                    None => out.push(Vector::missing(reg, *len)),
                }
            }
            Ok(Vector::Record {
                typ: out_typ,
                len: *len,
                fields: out,
                nulls: nulls.clone(),
            })
        }
        Vector::Union {
            typ,
            tags,
            index,
            members,
            nulls,
        } => {
            let mut values = members
                .iter()
                .map(|m| project(reg, m, proj))
                .collect::<Result<Vec<_>>>()?;
            let mut tags = tags.clone();
            let mut index = index.clone();
            if nulls.any() {
                // Null unions project to null of the projected union type.
                let null_tag = values.len() as u32;
                let mut count = 0u32;
                for (i, (t, x)) in tags.iter_mut().zip(index.iter_mut()).enumerate() {
                    if nulls.get(i) {
                        *t = null_tag;
                        *x = count;
                        count += 1;
                    }
                }
                values.push(Vector::Const {
                    value: Value::null(project_type(reg, typ, proj)?),
                    len: count as usize,
                });
            }
            Ok(Vector::Dynamic {
                tags,
                index,
                values,
            })
        }
        Vector::Dynamic {
            tags,
            index,
            values,
        } => Ok(Vector::Dynamic {
            tags: tags.clone(),
            index: index.clone(),
            values: values
                .iter()
                .map(|x| project(reg, x, proj))
                .collect::<Result<_>>()?,
        }),
        Vector::Const { value, len } => Ok(Vector::Const {
            value: project_value(reg, proj, value)?,
            len: *len,
        }),
        other => all_missing(reg, proj, other.len()),
    }
}

/// Field columns keep their none rows: only the value member of an optional
/// field's `[values, missing]` dynamic is projected.
fn project_field(reg: &TypeRegistry, v: &Vector, proj: &Projection) -> Result<Vector> {
    match v {
        Vector::Dynamic {
            tags,
            index,
            values,
        } if values.len() == 2 && matches!(values[1], Vector::Missing { .. }) => {
            Ok(Vector::Dynamic {
                tags: tags.clone(),
                index: index.clone(),
                values: vec![project(reg, &values[0], proj)?, values[1].clone()],
            })
        }
        other => project(reg, other, proj),
    }
}

/// `len` records whose projected fields are all missing.
pub fn all_missing(reg: &TypeRegistry, proj: &Projection, len: usize) -> Result<Vector> {
    Ok(Vector::Record {
        typ: all_missing_type(reg, proj)?,
        len,
        fields: proj
            .fields()
            .iter()
            .map(|_| Vector::missing(reg, len))
            .collect(),
        nulls: Bitmap::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::super::builder::from_values;
    use super::*;
    use crate::types::{Field, Type};
    use crate::value::record;
    use std::sync::Arc;

    #[test]
    fn test_project_matches_row_projection() {
        let reg = Arc::new(TypeRegistry::new());
        let inner = reg
            .lookup_record(vec![Field::new("y", Type::int64()), Field::new("z", Type::string())])
            .expect("inner");
        let rec = reg
            .lookup_record(vec![
                Field::new("a", Type::int64()),
                Field::new("x", inner.clone()),
            ])
            .expect("record");
        let values: Vec<Value> = (0..4)
            .map(|i| {
                let x = record(inner.clone(), &[Some(Value::int64(i * 10)), Some(Value::string("s"))])
                    .expect("x");
                record(rec.clone(), &[Some(Value::int64(i)), Some(x)]).expect("rec")
            })
            .collect();
        let proj = Projection::from_paths(["x.y", "nope"]);
        let v = from_values(Arc::clone(&reg), &values).expect("build");
        let projected = project(&reg, &v, &proj).expect("project");
        let rows = projected.values().expect("rows");
        for (row, orig) in rows.iter().zip(&values) {
            let want = project_value(&reg, &proj, orig).expect("row projection");
            assert_eq!(row, &want);
        }
        assert!(projected.field("nope").expect("nope").is_missing_at(0));
    }

    #[test]
    fn test_project_non_record_is_all_missing() {
        let reg = Arc::new(TypeRegistry::new());
        let v = from_values(Arc::clone(&reg), &[Value::int64(1), Value::int64(2)]).expect("build");
        let proj = Projection::from_paths(["a"]);
        let out = project(&reg, &v, &proj).expect("project");
        assert_eq!(out.len(), 2);
        let rows = out.values().expect("rows");
        assert_eq!(rows[0].to_string(), r#"{a:error("missing")}"#);
    }

    #[test]
    fn test_project_union_is_dynamic() {
        let reg = Arc::new(TypeRegistry::new());
        let r1 = reg
            .lookup_record(vec![Field::new("a", Type::int64())])
            .expect("r1");
        let r2 = reg
            .lookup_record(vec![Field::new("a", Type::string()), Field::new("b", Type::bool())])
            .expect("r2");
        let u = reg.union_of(vec![r1.clone(), r2.clone()]).expect("union");
        let values = vec![
            Value::union(u.clone(), &record(r1, &[Some(Value::int64(1))]).expect("v")).expect("u"),
            Value::null(u.clone()),
            Value::union(
                u,
                &record(r2, &[Some(Value::string("x")), Some(Value::bool(true))]).expect("v"),
            )
            .expect("u"),
        ];
        let v = from_values(Arc::clone(&reg), &values).expect("build");
        let proj = Projection::from_paths(["a"]);
        let out = project(&reg, &v, &proj).expect("project");
        assert!(matches!(out, Vector::Dynamic { .. }));
        let rows = out.values().expect("rows");
        assert_eq!(rows[0].to_string(), "{a:1}");
        assert!(rows[1].is_null());
        assert_eq!(rows[2].to_string(), r#"{a:"x"}"#);
    }
}
