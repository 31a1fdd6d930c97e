// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type-value codec: types serialized as self-describing byte strings.
//!
//! ```text
//! 0..=29   primitive (the tag is the id)
//! 30       record      uvarint n, n x (uvarint len, name, type)
//! 31       array       type
//! 32       set         type
//! 33       map         key type, value type
//! 34       union       uvarint n, n x type
//! 35       enum        uvarint n, n x (uvarint len, symbol)
//! 36       error       type
//! 37       name-def    uvarint len, name, underlying type
//! 38       name-ref    uvarint len, name
//! 39       record?     as 30, with a 0/1 optional flag after each name
//! ```
//!
//! A name is bound after its underlying type has been written (post-order),
//! in one table for the whole type-value. A `name-ref` therefore refers to
//! the most recently *completed* definition, and a rebinding nested inside a
//! definition never leaks into the enclosing scope's siblings.

use super::registry::TypeRegistry;
use super::{Field, PrimitiveKind, Type, TypeKind};
use crate::config::MAX_TYPE_DEPTH;
use crate::encoding::varint::{append_uvarint, Cursor};
use crate::error::{Error, Result};
use std::collections::HashMap;

pub const TAG_RECORD: u8 = 30;
pub const TAG_ARRAY: u8 = 31;
pub const TAG_SET: u8 = 32;
pub const TAG_MAP: u8 = 33;
pub const TAG_UNION: u8 = 34;
pub const TAG_ENUM: u8 = 35;
pub const TAG_ERROR: u8 = 36;
pub const TAG_NAME_DEF: u8 = 37;
pub const TAG_NAME_REF: u8 = 38;
pub const TAG_RECORD_OPT: u8 = 39;

/// Serialize `t`.
#[must_use]
pub fn encode(t: &Type) -> Vec<u8> {
    let mut out = Vec::new();
    let mut defs = HashMap::new();
    append(&mut out, t, &mut defs);
    out
}

fn append_str(out: &mut Vec<u8>, s: &str) {
    append_uvarint(out, s.len() as u64);
    out.extend_from_slice(s.as_bytes());
}

/// Append `t` using the name bindings in `defs` (name to name id).
pub fn append(out: &mut Vec<u8>, t: &Type, defs: &mut HashMap<String, u32>) {
    match t.kind() {
        TypeKind::Primitive(k) => out.push(k.id() as u8),
        TypeKind::Record(fields) => {
            let opt = fields.iter().any(|f| f.opt);
            out.push(if opt { TAG_RECORD_OPT } else { TAG_RECORD });
            append_uvarint(out, fields.len() as u64);
            for f in fields {
                append_str(out, &f.name);
                if opt {
                    out.push(u8::from(f.opt));
                }
                append(out, &f.typ, defs);
            }
        }
        TypeKind::Array(inner) => {
            out.push(TAG_ARRAY);
            append(out, inner, defs);
        }
        TypeKind::Set(inner) => {
            out.push(TAG_SET);
            append(out, inner, defs);
        }
        TypeKind::Map(k, v) => {
            out.push(TAG_MAP);
            append(out, k, defs);
            append(out, v, defs);
        }
        TypeKind::Union(members) => {
            out.push(TAG_UNION);
            append_uvarint(out, members.len() as u64);
            for m in members {
                append(out, m, defs);
            }
        }
        TypeKind::Enum(symbols) => {
            out.push(TAG_ENUM);
            append_uvarint(out, symbols.len() as u64);
            for s in symbols {
                append_str(out, s);
            }
        }
        TypeKind::Error(inner) => {
            out.push(TAG_ERROR);
            append(out, inner, defs);
        }
        TypeKind::Named { name, typ } => {
            if defs.get(name) == Some(&t.name_id()) {
                out.push(TAG_NAME_REF);
                append_str(out, name);
                return;
            }
            out.push(TAG_NAME_DEF);
            append_str(out, name);
            append(out, typ, defs);
            defs.insert(name.clone(), t.name_id());
        }
    }
}

/// Parse a complete type-value into `reg`.
pub fn decode(reg: &TypeRegistry, bytes: &[u8]) -> Result<Type> {
    let mut c = Cursor::new(bytes);
    let mut defs = HashMap::new();
    let t = decode_node(reg, &mut c, &mut defs, 0)?;
    if !c.is_empty() {
        return Err(Error::bad_value("trailing bytes after type-value").at(c.offset() as u64));
    }
    Ok(t)
}

fn read_name<'a>(c: &mut Cursor<'a>) -> Result<&'a str> {
    let start = c.offset();
    let raw = c.read_prefixed()?;
    std::str::from_utf8(raw).map_err(|_| {
        Error::InvalidTypeName(String::from_utf8_lossy(raw).into_owned()).at(start as u64)
    })
}

fn decode_node(
    reg: &TypeRegistry,
    c: &mut Cursor<'_>,
    defs: &mut HashMap<String, Type>,
    depth: usize,
) -> Result<Type> {
    if depth > MAX_TYPE_DEPTH {
        return Err(Error::bad_value("type-value nested too deeply").at(c.offset() as u64));
    }
    let tag = c.read_u8()?;
    let t = match tag {
        0..=29 => reg.lookup_primitive_by_id(u32::from(tag))?,
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
                let typ = decode_node(reg, c, defs, depth + 1)?;
                fields.push(Field {
                    name: name.to_string(),
                    typ,
                    opt,
                });
            }
            reg.lookup_record(fields)?
        }
        TAG_ARRAY => reg.lookup_array(decode_node(reg, c, defs, depth + 1)?),
        TAG_SET => reg.lookup_set(decode_node(reg, c, defs, depth + 1)?),
        TAG_MAP => {
            let k = decode_node(reg, c, defs, depth + 1)?;
            let v = decode_node(reg, c, defs, depth + 1)?;
            reg.lookup_map(k, v)
        }
        TAG_UNION => {
            let n = c.read_len()?;
            let mut members = Vec::with_capacity(n.min(64));
            for _ in 0..n {
                members.push(decode_node(reg, c, defs, depth + 1)?);
            }
            reg.lookup_union(members)?
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
            reg.lookup_enum(symbols)?
        }
        TAG_ERROR => reg.lookup_error(decode_node(reg, c, defs, depth + 1)?),
        TAG_NAME_DEF => {
            let name = read_name(c)?;
            let under = decode_node(reg, c, defs, depth + 1)?;
            let t = reg.lookup_named(name, under)?;
            defs.insert(name.to_string(), t.clone());
            t
        }
        TAG_NAME_REF => {
            let name = read_name(c)?;
            match defs.get(name) {
                Some(t) => t.clone(),
                None => reg.lookup_type_def(name).ok_or_else(|| {
                    Error::InvalidType(format!("reference to undefined name {:?}", name))
                })?,
            }
        }
        other => {
            return Err(Error::InvalidType(format!("unknown type-value tag {}", other)))
        }
    };
    Ok(t)
}

/// Primitive kind of a type-value made of a single primitive tag.
#[must_use]
pub fn primitive_of(bytes: &[u8]) -> Option<PrimitiveKind> {
    match bytes {
        [id] => PrimitiveKind::from_id(u32::from(*id)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_primitive_type_values() {
        let reg = TypeRegistry::new();
        for k in PrimitiveKind::ALL.iter().filter(|k| k.is_supported()) {
            let t = Type::primitive(*k);
            let bytes = encode(&t);
            assert_eq!(bytes, [k.id() as u8]);
            assert_eq!(primitive_of(&bytes), Some(*k));
            assert_eq!(decode(&reg, &bytes).expect("decode"), t);
        }
    }

    #[test]
    fn test_record_layout() {
        let reg = TypeRegistry::new();
        let rec = reg
            .lookup_record(vec![Field::new("a", Type::int64())])
            .expect("record");
        assert_eq!(encode(&rec), [TAG_RECORD, 1, 1, b'a', 9]);

        let opt = reg
            .lookup_record(vec![Field::opt("b", Type::string())])
            .expect("record");
        assert_eq!(encode(&opt), [TAG_RECORD_OPT, 1, 1, b'b', 1, 25]);
        assert_eq!(decode(&reg, &encode(&opt)).expect("decode"), opt);
    }

    #[test]
    fn test_complex_round_trip() {
        let reg = TypeRegistry::new();
        let e = reg
            .lookup_enum(vec!["red".into(), "green".into()])
            .expect("enum");
        let u = reg.union_of(vec![Type::ip(), Type::net(), e]).expect("union");
        let m = reg.lookup_map(Type::string(), reg.lookup_set(u));
        let t = reg.lookup_error(reg.lookup_array(m));
        let bytes = encode(&t);
        assert_eq!(decode(&reg, &bytes).expect("decode"), t);

        let other = TypeRegistry::new();
        let out = decode(&other, &bytes).expect("decode");
        assert_eq!(encode(&out), bytes);
    }

    #[test]
    fn test_named_reference_reuses_binding() {
        let reg = TypeRegistry::new();
        let foo = reg.lookup_named("foo", Type::int64()).expect("foo");
        let rec = reg
            .lookup_record(vec![Field::new("a", foo.clone()), Field::new("b", foo)])
            .expect("record");
        let bytes = encode(&rec);
        // Second use is a reference, not a second definition.
        assert_eq!(bytes.iter().filter(|&&b| b == TAG_NAME_DEF).count(), 1);
        assert_eq!(bytes.iter().filter(|&&b| b == TAG_NAME_REF).count(), 1);
        let fresh = TypeRegistry::new();
        let out = decode(&fresh, &bytes).expect("decode");
        assert_eq!(encode(&out), bytes);
    }

    #[test]
    fn test_inner_rebinding_does_not_clobber_outer() {
        let reg = TypeRegistry::new();
        let y = reg
            .lookup_record(vec![Field::new("y", Type::int64())])
            .expect("record");
        let foo1 = reg
            .lookup_named(
                "foo",
                reg.lookup_record(vec![Field::new("x", y)]).expect("record"),
            )
            .expect("foo1");
        let inner = reg
            .lookup_record(vec![Field::new("abcdef", foo1.clone())])
            .expect("record");
        let foo2 = reg
            .lookup_named(
                "foo",
                reg.lookup_record(vec![Field::new("x", inner)]).expect("record"),
            )
            .expect("foo2");
        let pair = reg
            .lookup_union(vec![foo1.clone(), foo2.clone()])
            .expect("union");
        let t = reg.lookup_array(pair);

        let fresh = TypeRegistry::new();
        let out = decode(&fresh, &encode(&t)).expect("decode");
        let members = out.inner().and_then(Type::members).expect("members");
        assert_eq!(members.len(), 2);
        assert_ne!(members[0].name_id(), members[1].name_id());
        assert_eq!(encode(&members[0]), encode(&foo1));
        assert_eq!(encode(&members[1]), encode(&foo2));
    }

    #[test]
    fn test_decode_errors() {
        let reg = TypeRegistry::new();
        let err = decode(&reg, &[TAG_ARRAY]).expect_err("truncated");
        assert_eq!(err.kind(), ErrorKind::Truncated);
        let err = decode(&reg, &[77]).expect_err("tag");
        assert_eq!(err.kind(), ErrorKind::InvalidType);
        let err = decode(&reg, &[4]).expect_err("reserved");
        assert_eq!(err.kind(), ErrorKind::UnsupportedPrimitive);
        let err = decode(&reg, &[TAG_NAME_REF, 3, b'z', b'z', b'z']).expect_err("undefined");
        assert_eq!(err.kind(), ErrorKind::InvalidType);
        let err = decode(&reg, &[TAG_NAME_DEF, 1, 0xff, 9]).expect_err("utf8");
        assert_eq!(err.kind(), ErrorKind::InvalidType);
        let err = decode(&reg, &[TAG_RECORD, 1, 1, b'a', 9, 9]).expect_err("trailing");
        assert_eq!(err.kind(), ErrorKind::BadValue);
    }

    #[test]
    fn test_depth_is_bounded() {
        let reg = TypeRegistry::new();
        let mut bytes = vec![TAG_ARRAY; MAX_TYPE_DEPTH + 2];
        bytes.push(9);
        let err = decode(&reg, &bytes).expect_err("deep");
        assert_eq!(err.kind(), ErrorKind::BadValue);
    }
}
