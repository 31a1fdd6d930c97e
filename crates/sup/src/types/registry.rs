// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type registry: interns structurally-equal types under one id.
//!
//! Reads of already-interned types go through a `DashMap` and never take the
//! allocation lock. Interning a new type takes a coarse mutex so that ids are
//! assigned densely and monotonically from
//! [`ID_TYPE_COMPLEX`](crate::config::ID_TYPE_COMPLEX).
//!
//! The registry owns its types; callers share it as `Arc<TypeRegistry>`.

use super::{typevalue, Field, PrimitiveKind, Type, TypeKey, TypeKind};
use crate::config::ID_TYPE_COMPLEX;
use crate::error::{Error, Result};
use crate::value::Value;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};

/// Per-process (or per-reader) type store.
pub struct TypeRegistry {
    by_key: DashMap<TypeKey, Type>,
    /// Complex types indexed by `id - ID_TYPE_COMPLEX`.
    by_id: RwLock<Vec<Type>>,
    /// Most recent binding of each name.
    named: DashMap<String, Type>,
    alloc: Mutex<()>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.len())
            .finish()
    }
}

impl TypeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_key: DashMap::new(),
            by_id: RwLock::new(Vec::new()),
            named: DashMap::new(),
            alloc: Mutex::new(()),
        }
    }

    /// Number of complex types interned so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn intern(&self, kind: TypeKind) -> Type {
        // Primitives are singletons and never reach the table.
        if let TypeKind::Primitive(k) = kind {
            return Type::primitive(k);
        }
        let key = TypeKey::of(&kind);
        if let Some(hit) = self.by_key.get(&key) {
            return hit.value().clone();
        }
        let _guard = self.alloc.lock();
        if let Some(hit) = self.by_key.get(&key) {
            return hit.value().clone();
        }
        let mut by_id = self.by_id.write();
        let id = ID_TYPE_COMPLEX + by_id.len() as u32;
        let typ = Type::new(id, kind);
        by_id.push(typ.clone());
        drop(by_id);
        self.by_key.insert(key, typ.clone());
        log::trace!("[REGISTRY] interned {} as {}", typ, id);
        typ
    }

    /// Singleton for a primitive name.
    pub fn lookup_primitive(&self, name: &str) -> Result<Type> {
        let kind = PrimitiveKind::from_name(name)
            .ok_or_else(|| Error::InvalidType(format!("no primitive named {:?}", name)))?;
        if !kind.is_supported() {
            return Err(Error::UnsupportedPrimitive(kind.id()));
        }
        Ok(Type::primitive(kind))
    }

    /// Singleton for a primitive id (below 30).
    pub fn lookup_primitive_by_id(&self, id: u32) -> Result<Type> {
        let kind = PrimitiveKind::from_id(id).ok_or(Error::UnknownType(id))?;
        if !kind.is_supported() {
            return Err(Error::UnsupportedPrimitive(id));
        }
        Ok(Type::primitive(kind))
    }

    /// Any type by id.
    pub fn lookup_type(&self, id: u32) -> Result<Type> {
        if id < ID_TYPE_COMPLEX {
            return self.lookup_primitive_by_id(id);
        }
        self.by_id
            .read()
            .get((id - ID_TYPE_COMPLEX) as usize)
            .cloned()
            .ok_or(Error::UnknownType(id))
    }

    /// Intern a record type. Field names must be unique.
    pub fn lookup_record(&self, fields: Vec<Field>) -> Result<Type> {
        let mut seen = HashSet::with_capacity(fields.len());
        for f in &fields {
            if !seen.insert(f.name.as_str()) {
                return Err(Error::InvalidField(format!("duplicate field {:?}", f.name)));
            }
        }
        Ok(self.intern(TypeKind::Record(fields)))
    }

    pub fn lookup_array(&self, inner: Type) -> Type {
        self.intern(TypeKind::Array(inner))
    }

    pub fn lookup_set(&self, inner: Type) -> Type {
        self.intern(TypeKind::Set(inner))
    }

    pub fn lookup_map(&self, key: Type, val: Type) -> Type {
        self.intern(TypeKind::Map(key, val))
    }

    /// Intern a union with members in the given order. Members must be
    /// distinct; use [`union_of`](Self::union_of) to sort and dedup.
    pub fn lookup_union(&self, members: Vec<Type>) -> Result<Type> {
        if members.is_empty() {
            return Err(Error::InvalidType("union with no members".into()));
        }
        let mut seen = HashSet::with_capacity(members.len());
        for m in &members {
            if !seen.insert(m.name_id()) {
                return Err(Error::InvalidType(format!("duplicate union member {}", m)));
            }
        }
        Ok(self.intern(TypeKind::Union(members)))
    }

    /// Sort `types` by id, drop duplicates, and return the single survivor or
    /// the union of the rest.
    pub fn union_of(&self, mut types: Vec<Type>) -> Result<Type> {
        types.sort_by_key(Type::name_id);
        types.dedup_by_key(|t| t.name_id());
        if types.len() == 1 {
            return Ok(types.remove(0));
        }
        self.lookup_union(types)
    }

    pub fn lookup_enum(&self, symbols: Vec<String>) -> Result<Type> {
        let mut seen = HashSet::with_capacity(symbols.len());
        for s in &symbols {
            if !seen.insert(s.as_str()) {
                return Err(Error::InvalidType(format!("duplicate enum symbol {:?}", s)));
            }
        }
        Ok(self.intern(TypeKind::Enum(symbols)))
    }

    pub fn lookup_error(&self, inner: Type) -> Type {
        self.intern(TypeKind::Error(inner))
    }

    /// Bind `name` to `under`. Rebinding a name to another type yields a new
    /// named type; earlier bindings stay valid.
    pub fn lookup_named(&self, name: &str, under: Type) -> Result<Type> {
        check_type_name(name)?;
        let typ = self.intern(TypeKind::Named {
            name: name.to_string(),
            typ: under,
        });
        self.named.insert(name.to_string(), typ.clone());
        Ok(typ)
    }

    /// Most recent binding of `name`.
    #[must_use]
    pub fn lookup_type_def(&self, name: &str) -> Option<Type> {
        self.named.get(name).map(|t| t.value().clone())
    }

    /// A value of type `type` whose bytes serialize `t`.
    #[must_use]
    pub fn lookup_type_value(&self, t: &Type) -> Value {
        Value::new(Type::type_value(), Some(typevalue::encode(t)))
    }

    /// Parse a type-value into a type of this registry.
    pub fn lookup_by_value(&self, bytes: &[u8]) -> Result<Type> {
        typevalue::decode(self, bytes)
    }

    /// Re-intern `ext` (typically from another registry) in this one.
    pub fn translate_type(&self, ext: &Type) -> Result<Type> {
        let mut memo = HashMap::new();
        self.translate(ext, &mut memo)
    }

    fn translate(&self, ext: &Type, memo: &mut HashMap<u32, Type>) -> Result<Type> {
        if let Some(hit) = memo.get(&ext.name_id()) {
            return Ok(hit.clone());
        }
        let out = match ext.kind() {
            TypeKind::Primitive(k) => Type::primitive(*k),
            TypeKind::Record(fields) => {
                let mut out = Vec::with_capacity(fields.len());
                for f in fields {
                    out.push(Field {
                        name: f.name.clone(),
                        typ: self.translate(&f.typ, memo)?,
                        opt: f.opt,
                    });
                }
                self.lookup_record(out)?
            }
            TypeKind::Array(t) => {
                let t = self.translate(t, memo)?;
                self.lookup_array(t)
            }
            TypeKind::Set(t) => {
                let t = self.translate(t, memo)?;
                self.lookup_set(t)
            }
            TypeKind::Map(k, v) => {
                let k = self.translate(k, memo)?;
                let v = self.translate(v, memo)?;
                self.lookup_map(k, v)
            }
            TypeKind::Union(members) => {
                let mut out = Vec::with_capacity(members.len());
                for m in members {
                    out.push(self.translate(m, memo)?);
                }
                self.lookup_union(out)?
            }
            TypeKind::Enum(symbols) => self.lookup_enum(symbols.clone())?,
            TypeKind::Error(t) => {
                let t = self.translate(t, memo)?;
                self.lookup_error(t)
            }
            TypeKind::Named { name, typ } => {
                let t = self.translate(typ, memo)?;
                self.lookup_named(name, t)?
            }
        };
        memo.insert(ext.name_id(), out.clone());
        Ok(out)
    }
}

/// Reject empty names and names of primitives.
pub fn check_type_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidTypeName(name.to_string()));
    }
    if PrimitiveKind::from_name(name).is_some() {
        return Err(Error::InvalidTypeName(name.to_string()));
    }
    Ok(())
}
