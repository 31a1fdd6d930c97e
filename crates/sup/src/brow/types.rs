// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Stream-local type tables.
//!
//! A types frame is a run of entries, each a type-value tag followed by a
//! body whose child types are referenced by local uvarint id. Ids below 30
//! are the primitives; every entry assigns the next local id starting at 30.
//!
//! ```text
//! 30 record       n, n * (name, id)
//! 39 record-opt   n, n * (name, flag, id)
//! 31 array        id          32 set    id          36 error  id
//! 33 map          key, val    34 union  n, n * id
//! 35 enum         n, n * symbol
//! 37 named        name, id
//! ```

use crate::config::ID_TYPE_COMPLEX;
use crate::encoding::varint::{append_uvarint, Cursor};
use crate::error::{Error, Result};
use crate::types::typevalue::{
    TAG_ARRAY, TAG_ENUM, TAG_ERROR, TAG_MAP, TAG_NAME_DEF, TAG_RECORD, TAG_RECORD_OPT, TAG_SET,
    TAG_UNION,
};
use crate::types::{Field, Type, TypeKind, TypeRegistry};
use std::collections::HashMap;
use std::sync::Arc;

/// Writer side: assigns local ids and accumulates pending definitions.
#[derive(Debug)]
pub struct TypesEncoder {
    local: HashMap<u32, u32>,
    next: u32,
    pending: Vec<u8>,
}

impl Default for TypesEncoder {
    fn default() -> Self {
        Self::new()
    }
}

fn append_str(out: &mut Vec<u8>, s: &str) {
    append_uvarint(out, s.len() as u64);
    out.extend_from_slice(s.as_bytes());
}

impl TypesEncoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            local: HashMap::new(),
            next: ID_TYPE_COMPLEX,
            pending: Vec::new(),
        }
    }

    /// Local id of `t`, defining it (and its children) on first sight.
    pub fn lookup(&mut self, t: &Type) -> u32 {
        if let TypeKind::Primitive(k) = t.kind() {
            return k.id();
        }
        if let Some(&id) = self.local.get(&t.name_id()) {
            return id;
        }
        let mut entry = Vec::new();
        match t.kind() {
            TypeKind::Primitive(_) => {}
            TypeKind::Record(fields) => {
                let ids: Vec<u32> = fields.iter().map(|f| self.lookup(&f.typ)).collect();
                let opt = fields.iter().any(|f| f.opt);
                entry.push(if opt { TAG_RECORD_OPT } else { TAG_RECORD });
                append_uvarint(&mut entry, fields.len() as u64);
                for (f, id) in fields.iter().zip(ids) {
                    append_str(&mut entry, &f.name);
                    if opt {
                        entry.push(u8::from(f.opt));
                    }
                    append_uvarint(&mut entry, u64::from(id));
                }
            }
            TypeKind::Array(inner) => {
                let id = self.lookup(inner);
                entry.push(TAG_ARRAY);
                append_uvarint(&mut entry, u64::from(id));
            }
            TypeKind::Set(inner) => {
                let id = self.lookup(inner);
                entry.push(TAG_SET);
                append_uvarint(&mut entry, u64::from(id));
            }
            TypeKind::Error(inner) => {
                let id = self.lookup(inner);
                entry.push(TAG_ERROR);
                append_uvarint(&mut entry, u64::from(id));
            }
            TypeKind::Map(k, v) => {
                let k = self.lookup(k);
                let v = self.lookup(v);
                entry.push(TAG_MAP);
                append_uvarint(&mut entry, u64::from(k));
                append_uvarint(&mut entry, u64::from(v));
            }
            TypeKind::Union(members) => {
                let ids: Vec<u32> = members.iter().map(|m| self.lookup(m)).collect();
                entry.push(TAG_UNION);
                append_uvarint(&mut entry, ids.len() as u64);
                for id in ids {
                    append_uvarint(&mut entry, u64::from(id));
                }
            }
            TypeKind::Enum(symbols) => {
                entry.push(TAG_ENUM);
                append_uvarint(&mut entry, symbols.len() as u64);
                for s in symbols {
                    append_str(&mut entry, s);
                }
            }
            TypeKind::Named { name, typ } => {
                let id = self.lookup(typ);
                entry.push(TAG_NAME_DEF);
                append_str(&mut entry, name);
                append_uvarint(&mut entry, u64::from(id));
            }
        }
        let id = self.next;
        self.next += 1;
        self.local.insert(t.name_id(), id);
        self.pending.extend_from_slice(&entry);
        id
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Definitions added since the last call, if any.
    pub fn take_frame(&mut self) -> Option<Vec<u8>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    /// Forget every local id (after an end-of-stream).
    pub fn reset(&mut self) {
        self.local.clear();
        self.next = ID_TYPE_COMPLEX;
        self.pending.clear();
    }
}

/// Resolve a local id against a table of complex types.
pub fn lookup_local(reg: &TypeRegistry, table: &[Type], id: u64) -> Result<Type> {
    let id = u32::try_from(id).map_err(|_| Error::UnknownType(u32::MAX))?;
    if id < ID_TYPE_COMPLEX {
        return reg.lookup_primitive_by_id(id);
    }
    table
        .get((id - ID_TYPE_COMPLEX) as usize)
        .cloned()
        .ok_or(Error::UnknownType(id))
}

/// Reader side: the stream's local table, interned into a shared registry.
#[derive(Debug)]
pub struct TypesDecoder {
    reg: Arc<TypeRegistry>,
    table: Vec<Type>,
    snapshot: Option<Arc<[Type]>>,
}

impl TypesDecoder {
    #[must_use]
    pub fn new(reg: Arc<TypeRegistry>) -> Self {
        Self {
            reg,
            table: Vec::new(),
            snapshot: None,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.reg
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn lookup(&self, id: u64) -> Result<Type> {
        lookup_local(&self.reg, &self.table, id)
    }

    /// Immutable copy of the current table for decode workers.
    pub fn snapshot(&mut self) -> Arc<[Type]> {
        if let Some(s) = &self.snapshot {
            return Arc::clone(s);
        }
        let s: Arc<[Type]> = self.table.clone().into();
        self.snapshot = Some(Arc::clone(&s));
        s
    }

    pub fn reset(&mut self) {
        self.table.clear();
        self.snapshot = None;
    }

    /// Decode every entry of a types frame payload.
    pub fn decode_frame(&mut self, payload: &[u8]) -> Result<()> {
        let mut c = Cursor::new(payload);
        while !c.is_empty() {
            let start = c.offset();
            let t = self.decode_entry(&mut c).map_err(|e| e.at(start as u64))?;
            self.table.push(t);
        }
        self.snapshot = None;
        log::debug!(
            "[BROW] types frame decoded, local table has {} entries",
            self.table.len()
        );
        Ok(())
    }

    fn child(&self, c: &mut Cursor<'_>) -> Result<Type> {
        let id = c.read_uvarint()?;
        self.lookup(id)
    }

    fn decode_entry(&self, c: &mut Cursor<'_>) -> Result<Type> {
        let tag = c.read_u8()?;
        match tag {
            TAG_RECORD | TAG_RECORD_OPT => {
                let n = c.read_len()?;
                let mut fields = Vec::with_capacity(n.min(64));
                for _ in 0..n {
                    let raw = c.read_prefixed()?;
                    let name = std::str::from_utf8(raw)
                        .map_err(|_| Error::InvalidField("field name is not UTF-8".into()))?;
                    let opt = if tag == TAG_RECORD_OPT {
                        match c.read_u8()? {
                            0 => false,
                            1 => true,
                            b => return Err(Error::bad_value(format!("optional flag {}", b))),
                        }
                    } else {
                        false
                    };
                    fields.push(Field {
                        name: name.to_string(),
                        typ: self.child(c)?,
                        opt,
                    });
                }
                self.reg.lookup_record(fields)
            }
            TAG_ARRAY => Ok(self.reg.lookup_array(self.child(c)?)),
            TAG_SET => Ok(self.reg.lookup_set(self.child(c)?)),
            TAG_ERROR => Ok(self.reg.lookup_error(self.child(c)?)),
            TAG_MAP => {
                let k = self.child(c)?;
                let v = self.child(c)?;
                Ok(self.reg.lookup_map(k, v))
            }
            TAG_UNION => {
                let n = c.read_len()?;
                let mut members = Vec::with_capacity(n.min(64));
                for _ in 0..n {
                    members.push(self.child(c)?);
                }
                self.reg.lookup_union(members)
            }
            TAG_ENUM => {
                let n = c.read_len()?;
                let mut symbols = Vec::with_capacity(n.min(64));
                for _ in 0..n {
                    let raw = c.read_prefixed()?;
                    let s = std::str::from_utf8(raw)
                        .map_err(|_| Error::InvalidType("enum symbol is not UTF-8".into()))?;
                    symbols.push(s.to_string());
                }
                self.reg.lookup_enum(symbols)
            }
            TAG_NAME_DEF => {
                let raw = c.read_prefixed()?;
                let name = std::str::from_utf8(raw).map_err(|_| {
                    Error::InvalidTypeName(String::from_utf8_lossy(raw).into_owned())
                })?;
                let under = self.child(c)?;
                self.reg.lookup_named(name, under)
            }
            other => Err(Error::InvalidType(format!(
                "unknown types frame tag {}",
                other
            ))),
        }
    }
}
