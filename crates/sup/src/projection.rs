// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Field projections.
//!
//! A [`Projection`] is a tree of field names. The empty projection selects
//! everything. Applied to a record, a projection yields a new record with
//! exactly the projected fields in projection order; fields the input lacks
//! become `error("missing")`. Applied to anything that is not a record, a
//! non-empty projection yields a record whose fields are all missing. Unions
//! are projected member by member.

use crate::encoding::iter::Iter;
use crate::encoding::Builder;
use crate::error::{Error, Result};
use crate::types::{Field, Type, TypeKind, TypeRegistry};
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// One projected field and what to keep below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectField {
    pub name: String,
    pub sub: Projection,
}

/// A projection tree; empty means "all fields".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    fields: Vec<ProjectField>,
}

impl Projection {
    /// Select everything.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new(fields: Vec<ProjectField>) -> Self {
        Self { fields }
    }

    /// Build from dotted paths such as `"a"` and `"x.y"`. A shorter path
    /// selects the whole field and absorbs longer paths below it.
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out = Self::all();
        for p in paths {
            let parts: Vec<&str> = p.as_ref().split('.').collect();
            out.insert(&parts);
        }
        out
    }

    fn insert(&mut self, path: &[&str]) {
        let Some((head, rest)) = path.split_first() else {
            return;
        };
        match self.fields.iter_mut().find(|f| f.name == *head) {
            Some(f) => {
                if f.sub.is_all() {
                    return;
                }
                if rest.is_empty() {
                    f.sub = Self::all();
                } else {
                    f.sub.insert(rest);
                }
            }
            None => {
                let mut sub = Self::all();
                sub.insert(rest);
                self.fields.push(ProjectField {
                    name: (*head).to_string(),
                    sub,
                });
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn is_all(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn fields(&self) -> &[ProjectField] {
        &self.fields
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Projection> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.sub)
    }

    /// True when no field carries a sub-projection.
    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.fields.iter().all(|f| f.sub.is_all())
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            return f.write_str("*");
        }
        for (i, pf) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(&pf.name)?;
            if !pf.sub.is_all() {
                write!(f, "{{{}}}", pf.sub)?;
            }
        }
        Ok(())
    }
}

/// Type of `typ` after projection.
pub fn project_type(reg: &TypeRegistry, typ: &Type, proj: &Projection) -> Result<Type> {
    if proj.is_all() {
        return Ok(typ.clone());
    }
    match typ.under().kind() {
        TypeKind::Record(fields) => {
            let mut out = Vec::with_capacity(proj.fields().len());
            for pf in proj.fields() {
                match fields.iter().find(|f| f.name == pf.name) {
                    Some(f) => out.push(Field {
                        name: pf.name.clone(),
                        typ: project_type(reg, &f.typ, &pf.sub)?,
                        opt: f.opt,
                    }),
                    None => out.push(Field::new(pf.name.clone(), missing_type(reg))),
                }
            }
            reg.lookup_record(out)
        }
        TypeKind::Union(members) => {
            let mut out = Vec::with_capacity(members.len());
            for m in members {
                out.push(project_type(reg, m, proj)?);
            }
            reg.union_of(out)
        }
        _ => all_missing_type(reg, proj),
    }
}

/// `error(string)`.
#[must_use]
pub fn missing_type(reg: &TypeRegistry) -> Type {
    reg.lookup_error(Type::string())
}

pub(crate) fn all_missing_type(reg: &TypeRegistry, proj: &Projection) -> Result<Type> {
    let m = missing_type(reg);
    reg.lookup_record(
        proj.fields()
            .iter()
            .map(|pf| Field::new(pf.name.clone(), m.clone()))
            .collect(),
    )
}

fn all_missing_value(reg: &TypeRegistry, proj: &Projection) -> Result<Value> {
    let typ = all_missing_type(reg, proj)?;
    let missing = Value::missing(reg);
    let mut b = Builder::new();
    b.begin_container();
    for _ in proj.fields() {
        missing.append_to(&mut b);
    }
    b.end_container();
    Ok(Value::new(typ, b.single_body()?.map(<[u8]>::to_vec)))
}

/// Apply `proj` to one value.
pub fn project_value(reg: &TypeRegistry, proj: &Projection, v: &Value) -> Result<Value> {
    if proj.is_all() {
        return Ok(v.clone());
    }
    match v.typ().under().kind() {
        TypeKind::Record(fields) => {
            let Some(body) = v.bytes() else {
                return Ok(Value::null(project_type(reg, v.typ(), proj)?));
            };
            let elems: Vec<_> = Iter::new(body).collect::<Result<_>>()?;
            let mut out_fields = Vec::with_capacity(proj.fields().len());
            let mut b = Builder::new();
            b.begin_container();
            for pf in proj.fields() {
                let Some(idx) = fields.iter().position(|f| f.name == pf.name) else {
                    let m = Value::missing(reg);
                    m.append_to(&mut b);
                    out_fields.push(Field::new(pf.name.clone(), m.typ().clone()));
                    continue;
                };
                let f = &fields[idx];
                let elem = elems.get(idx).copied().ok_or_else(|| {
                    Error::bad_value("record body shorter than its type")
                })?;
                if elem.is_none() {
                    b.append_none();
                    out_fields.push(Field {
                        name: pf.name.clone(),
                        typ: project_type(reg, &f.typ, &pf.sub)?,
                        opt: true,
                    });
                    continue;
                }
                let mut child =
                    project_value(reg, &pf.sub, &Value::from_elem(f.typ.clone(), elem))?;
                if f.typ.members().is_some() && !pf.sub.is_all() {
                    // Keep union fields union-typed so every row of a record
                    // type projects to the same output type.
                    let want = project_type(reg, &f.typ, &pf.sub)?;
                    if want.name_id() != child.typ().name_id() && !child.is_null() {
                        child = Value::union(want, &child)?;
                    }
                }
                child.append_to(&mut b);
                out_fields.push(Field {
                    name: pf.name.clone(),
                    typ: child.typ().clone(),
                    opt: f.opt,
                });
            }
            b.end_container();
            let typ = reg.lookup_record(out_fields)?;
            Ok(Value::new(typ, b.single_body()?.map(<[u8]>::to_vec)))
        }
        TypeKind::Union(_) => {
            if v.is_null() {
                return Ok(Value::null(project_type(reg, v.typ(), proj)?));
            }
            project_value(reg, proj, &v.union_member()?)
        }
        _ => all_missing_value(reg, proj),
    }
}

/// Cached projector for a stream of values.
///
/// For flat projections over records the field mapping and output type are
/// computed once per input type.
pub struct Projector {
    reg: Arc<TypeRegistry>,
    projection: Projection,
    plans: HashMap<u32, Arc<Plan>>,
}

struct Plan {
    out: Type,
    /// Input field index per projected field; `None` is missing.
    take: Vec<Option<usize>>,
}

impl Projector {
    #[must_use]
    pub fn new(reg: Arc<TypeRegistry>, projection: Projection) -> Self {
        Self {
            reg,
            projection,
            plans: HashMap::new(),
        }
    }

    #[must_use]
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    fn plan(&mut self, typ: &Type) -> Result<Arc<Plan>> {
        if let Some(p) = self.plans.get(&typ.name_id()) {
            return Ok(Arc::clone(p));
        }
        let fields = typ.fields().unwrap_or_default();
        let take = self
            .projection
            .fields()
            .iter()
            .map(|pf| fields.iter().position(|f| f.name == pf.name))
            .collect();
        let plan = Arc::new(Plan {
            out: project_type(&self.reg, typ, &self.projection)?,
            take,
        });
        self.plans.insert(typ.name_id(), Arc::clone(&plan));
        Ok(plan)
    }

    /// Project one value.
    pub fn project(&mut self, v: &Value) -> Result<Value> {
        if self.projection.is_all() {
            return Ok(v.clone());
        }
        if !self.projection.is_flat() || !v.typ().is_record() || v.is_null() {
            return project_value(&self.reg, &self.projection, v);
        }
        let plan = self.plan(v.typ())?;
        let Some(body) = v.bytes() else {
            return Ok(Value::null(plan.out.clone()));
        };
        let elems: Vec<_> = Iter::new(body).collect::<Result<_>>()?;
        let missing = Value::missing(&self.reg);
        let mut b = Builder::with_capacity(body.len());
        b.begin_container();
        for take in &plan.take {
            match take.and_then(|i| elems.get(i)) {
                Some(e) => b.append_elem(*e),
                None => missing.append_to(&mut b),
            }
        }
        b.end_container();
        Ok(Value::new(
            plan.out.clone(),
            b.single_body()?.map(<[u8]>::to_vec),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::record;

    #[test]
    fn test_from_paths_merges() {
        let p = Projection::from_paths(["a.b", "a.c", "d", "d.e"]);
        assert_eq!(p.to_string(), "a{b,c},d");
        let p = Projection::from_paths(["x.y", "x"]);
        assert_eq!(p.to_string(), "x");
        assert!(Projection::all().is_all());
    }

    #[test]
    fn test_project_record() {
        let reg = Arc::new(TypeRegistry::new());
        let t = reg
            .lookup_record(vec![
                Field::new("ts", Type::time()),
                Field::new("load", Type::float64()),
            ])
            .expect("record");
        let v = record(t, &[Some(Value::time(5)), Some(Value::float64(0.5))]).expect("value");

        let mut p = Projector::new(Arc::clone(&reg), Projection::from_paths(["load", "nope"]));
        let out = p.project(&v).expect("project");
        assert_eq!(out.typ().to_string(), "{load:float64,nope:error(string)}");
        assert_eq!(out.deref("load").expect("load"), Some(Value::float64(0.5)));
        assert!(out.deref("nope").expect("nope").expect("present").is_missing());

        // The same through the uncached path.
        let slow = project_value(&reg, p.projection(), &v).expect("slow");
        assert_eq!(slow, out);
    }

    #[test]
    fn test_project_non_record() {
        let reg = TypeRegistry::new();
        let out = project_value(&reg, &Projection::from_paths(["a"]), &Value::int64(1))
            .expect("project");
        assert_eq!(out.to_string(), "{a:error(\"missing\")}");
    }

    #[test]
    fn test_project_nested_and_union() {
        let reg = TypeRegistry::new();
        let inner = reg
            .lookup_record(vec![
                Field::new("y", Type::int64()),
                Field::new("z", Type::string()),
            ])
            .expect("inner");
        let outer = reg
            .lookup_record(vec![Field::new("x", inner.clone())])
            .expect("outer");
        let u = reg.union_of(vec![outer.clone(), Type::int64()]).expect("union");
        let iv = record(inner, &[Some(Value::int64(7)), Some(Value::string("s"))]).expect("inner");
        let ov = record(outer, &[Some(iv)]).expect("outer");
        let uv = Value::union(u, &ov).expect("union value");

        let out = project_value(&reg, &Projection::from_paths(["x.y"]), &uv).expect("project");
        assert_eq!(out.to_string(), "{x:{y:7}}");
    }

    #[test]
    fn test_project_keeps_none() {
        let reg = TypeRegistry::new();
        let t = reg
            .lookup_record(vec![
                Field::new("a", Type::int64()),
                Field::opt("b", Type::int64()),
            ])
            .expect("record");
        let v = record(t, &[Some(Value::int64(1)), None]).expect("value");
        let out = project_value(&reg, &Projection::from_paths(["b"]), &v).expect("project");
        assert_eq!(out.typ().to_string(), "{b?:int64}");
        assert_eq!(out.deref("b").expect("b"), None);
    }
}
