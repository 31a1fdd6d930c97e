// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Values: a type paired with its (possibly null) body.
//!
//! A value is null iff its body is `None`. An empty but present container is
//! `Some(vec![])`. Bodies are owned; readers hand out values that stay valid
//! after the next pull.

use crate::encoding::iter::{Elem, Iter};
use crate::encoding::primitive::{self, IpNet};
use crate::encoding::varint::{append_counted_uvarint, decode_counted_uvarint};
use crate::encoding::Builder;
use crate::error::{Error, Result};
use crate::types::{typevalue, PrimitiveKind, Type, TypeKind, TypeRegistry};
use std::fmt;
use std::net::IpAddr;

/// Body of the error value that stands in for an absent field.
pub const MISSING: &str = "missing";

/// A typed value.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Value {
    typ: Type,
    bytes: Option<Vec<u8>>,
}

impl Value {
    #[must_use]
    pub fn new(typ: Type, bytes: Option<Vec<u8>>) -> Self {
        Self { typ, bytes }
    }

    /// Null of type `typ`.
    #[must_use]
    pub fn null(typ: Type) -> Self {
        Self { typ, bytes: None }
    }

    /// Value for a decoded element (`None` elements become null).
    #[must_use]
    pub fn from_elem(typ: Type, elem: Elem<'_>) -> Self {
        Self::new(typ, elem.body().map(<[u8]>::to_vec))
    }

    #[must_use]
    pub fn int64(v: i64) -> Self {
        Self::new(Type::int64(), Some(primitive::encode_int(v)))
    }

    #[must_use]
    pub fn uint64(v: u64) -> Self {
        Self::new(Type::uint64(), Some(primitive::encode_uint(v)))
    }

    #[must_use]
    pub fn float64(v: f64) -> Self {
        Self::new(Type::float64(), Some(primitive::encode_float64(v)))
    }

    #[must_use]
    pub fn bool(v: bool) -> Self {
        Self::new(Type::bool(), Some(primitive::encode_bool(v)))
    }

    #[must_use]
    pub fn string(s: &str) -> Self {
        Self::new(Type::string(), Some(primitive::encode_string(s)))
    }

    #[must_use]
    pub fn bytes_value(b: &[u8]) -> Self {
        Self::new(Type::bytes(), Some(b.to_vec()))
    }

    /// Nanoseconds since the Unix epoch.
    #[must_use]
    pub fn time(ns: i64) -> Self {
        Self::new(Type::time(), Some(primitive::encode_int(ns)))
    }

    #[must_use]
    pub fn duration(ns: i64) -> Self {
        Self::new(Type::duration(), Some(primitive::encode_int(ns)))
    }

    #[must_use]
    pub fn ip(addr: IpAddr) -> Self {
        Self::new(Type::ip(), Some(primitive::encode_ip(addr)))
    }

    #[must_use]
    pub fn net(net: IpNet) -> Self {
        Self::new(Type::net(), Some(primitive::encode_net(net)))
    }

    /// The `error("missing")` value.
    #[must_use]
    pub fn missing(reg: &TypeRegistry) -> Self {
        Self::new(
            reg.lookup_error(Type::string()),
            Some(MISSING.as_bytes().to_vec()),
        )
    }

    /// Array of `typ` holding `items` (each must have the element type).
    pub fn array(typ: Type, items: &[Value]) -> Result<Self> {
        Self::sequence(typ, items, false)
    }

    /// Set of `typ`; elements are sorted and deduplicated.
    pub fn set(typ: Type, items: &[Value]) -> Result<Self> {
        Self::sequence(typ, items, true)
    }

    fn sequence(typ: Type, items: &[Value], set: bool) -> Result<Self> {
        let inner = typ
            .inner()
            .ok_or_else(|| Error::bad_value(format!("{} is not an array or set", typ)))?
            .clone();
        let mut b = Builder::new();
        b.begin_container();
        for item in items {
            check_same(&inner, item)?;
            item.append_to(&mut b);
        }
        if set {
            b.end_set()?;
        } else {
            b.end_container();
        }
        Self::from_builder(typ, &b)
    }

    /// Map of `typ`; entries are sorted by key and keys deduplicated.
    pub fn map(typ: Type, entries: &[(Value, Value)]) -> Result<Self> {
        let (kt, vt) = match typ.under().kind() {
            TypeKind::Map(k, v) => (k.clone(), v.clone()),
            _ => return Err(Error::bad_value(format!("{} is not a map", typ))),
        };
        let mut b = Builder::new();
        b.begin_container();
        for (k, v) in entries {
            check_same(&kt, k)?;
            check_same(&vt, v)?;
            k.append_to(&mut b);
            v.append_to(&mut b);
        }
        b.end_map()?;
        Self::from_builder(typ, &b)
    }

    /// Wrap `member` in union type `typ`.
    pub fn union(typ: Type, member: &Value) -> Result<Self> {
        let tag = typ.member_index(&member.typ).ok_or_else(|| {
            Error::bad_value(format!("{} is not a member of {}", member.typ, typ))
        })?;
        let mut b = Builder::new();
        b.begin_container();
        let mut idx = Vec::new();
        append_counted_uvarint(&mut idx, tag as u64);
        b.append(Some(&idx));
        member.append_to(&mut b);
        b.end_container();
        Self::from_builder(typ, &b)
    }

    /// Enum value by symbol index.
    pub fn enum_index(typ: Type, index: usize) -> Result<Self> {
        match typ.under().kind() {
            TypeKind::Enum(symbols) if index < symbols.len() => {
                Ok(Self::new(typ, Some(primitive::encode_uint(index as u64))))
            }
            TypeKind::Enum(_) => Err(Error::InvalidType(format!("bad enum index {}", index))),
            _ => Err(Error::bad_value(format!("{} is not an enum", typ))),
        }
    }

    /// Error value of type `typ` wrapping `inner`.
    pub fn error(typ: Type, inner: &Value) -> Result<Self> {
        match typ.under().kind() {
            TypeKind::Error(t) if t.name_id() == inner.typ.name_id() => {
                Ok(Self::new(typ, inner.bytes.clone()))
            }
            _ => Err(Error::bad_value(format!("{} cannot wrap {}", typ, inner.typ))),
        }
    }

    fn from_builder(typ: Type, b: &Builder) -> Result<Self> {
        let body = b.single_body()?.map(<[u8]>::to_vec);
        Ok(Self::new(typ, body))
    }

    #[inline]
    #[must_use]
    pub fn typ(&self) -> &Type {
        &self.typ
    }

    /// Body bytes, `None` for null.
    #[inline]
    #[must_use]
    pub fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.bytes.is_none()
    }

    #[must_use]
    pub fn into_parts(self) -> (Type, Option<Vec<u8>>) {
        (self.typ, self.bytes)
    }

    /// Element view of the body with the container flag of the type.
    #[must_use]
    pub fn elem(&self) -> Elem<'_> {
        Elem::from_body(self.bytes(), self.typ.is_container())
    }

    /// Append the tagged body to `b`.
    pub fn append_to(&self, b: &mut Builder) {
        b.append_body(self.bytes(), self.typ.is_container());
    }

    /// The body as one tagged element.
    #[must_use]
    pub fn tagged(&self) -> Vec<u8> {
        let mut b = Builder::new();
        self.append_to(&mut b);
        b.into_bytes()
    }

    /// True for `error("missing")`.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        match self.typ.under().kind() {
            TypeKind::Error(inner) => {
                inner.primitive_kind() == Some(PrimitiveKind::String)
                    && self.bytes() == Some(MISSING.as_bytes())
            }
            _ => false,
        }
    }

    fn body(&self) -> Result<&[u8]> {
        self.bytes()
            .ok_or_else(|| Error::bad_value(format!("null {}", self.typ)))
    }

    fn kind(&self) -> Result<PrimitiveKind> {
        self.typ
            .primitive_kind()
            .ok_or_else(|| Error::bad_value(format!("{} is not a primitive", self.typ)))
    }

    /// Signed integer, duration or time.
    pub fn as_int(&self) -> Result<i64> {
        if !self.kind()?.is_int() {
            return Err(Error::bad_value(format!("{} is not signed", self.typ)));
        }
        primitive::decode_int(self.body()?)
    }

    pub fn as_uint(&self) -> Result<u64> {
        if !self.kind()?.is_uint() {
            return Err(Error::bad_value(format!("{} is not unsigned", self.typ)));
        }
        primitive::decode_uint(self.body()?)
    }

    pub fn as_float(&self) -> Result<f64> {
        primitive::decode_float(self.kind()?, self.body()?)
    }

    pub fn as_bool(&self) -> Result<bool> {
        if self.kind()? != PrimitiveKind::Bool {
            return Err(Error::bad_value(format!("{} is not bool", self.typ)));
        }
        primitive::decode_bool(self.body()?)
    }

    pub fn as_str(&self) -> Result<&str> {
        if self.kind()? != PrimitiveKind::String {
            return Err(Error::bad_value(format!("{} is not string", self.typ)));
        }
        primitive::decode_string(self.body()?)
    }

    pub fn as_ip(&self) -> Result<IpAddr> {
        if self.kind()? != PrimitiveKind::Ip {
            return Err(Error::bad_value(format!("{} is not ip", self.typ)));
        }
        primitive::decode_ip(self.body()?)
    }

    pub fn as_net(&self) -> Result<IpNet> {
        if self.kind()? != PrimitiveKind::Net {
            return Err(Error::bad_value(format!("{} is not net", self.typ)));
        }
        primitive::decode_net(self.body()?)
    }

    /// Field elements of a record value, in declaration order.
    pub fn record_elems(&self) -> Result<Vec<Elem<'_>>> {
        if !self.typ.is_record() {
            return Err(Error::bad_value(format!("{} is not a record", self.typ)));
        }
        Iter::new(self.body()?).collect()
    }

    /// Field `name` of a record value. `Ok(None)` when the type has no such
    /// field or the field is absent (none).
    pub fn deref(&self, name: &str) -> Result<Option<Value>> {
        let Some(fields) = self.typ.fields() else {
            return Ok(None);
        };
        let Some(idx) = fields.iter().position(|f| f.name == name) else {
            return Ok(None);
        };
        let Some(body) = self.bytes() else {
            return Ok(Some(Value::null(fields[idx].typ.clone())));
        };
        let mut it = Iter::new(body);
        for _ in 0..idx {
            it.next_body()?;
        }
        if it.done() {
            return Err(Error::bad_value("record body shorter than its type"));
        }
        let elem = it.next_elem()?;
        if elem.is_none() {
            return Ok(None);
        }
        Ok(Some(Value::from_elem(fields[idx].typ.clone(), elem)))
    }

    /// Follow a field path through nested records.
    pub fn deref_path(&self, path: &[&str]) -> Result<Option<Value>> {
        let mut cur = self.clone();
        for name in path {
            match cur.deref(name)? {
                Some(v) => cur = v,
                None => return Ok(None),
            }
        }
        Ok(Some(cur))
    }

    /// Elements of an array or set value.
    pub fn elements(&self) -> Result<Vec<Value>> {
        let inner = self
            .typ
            .inner()
            .ok_or_else(|| Error::bad_value(format!("{} is not an array or set", self.typ)))?;
        let Some(body) = self.bytes() else {
            return Ok(Vec::new());
        };
        Iter::new(body)
            .map(|e| e.map(|e| Value::from_elem(inner.clone(), e)))
            .collect()
    }

    /// Member value of a union value.
    pub fn union_member(&self) -> Result<Value> {
        let members = self
            .typ
            .members()
            .ok_or_else(|| Error::bad_value(format!("{} is not a union", self.typ)))?;
        let Some(body) = self.bytes() else {
            return Ok(self.clone());
        };
        let mut it = Iter::new(body);
        let tag = decode_counted_uvarint(it.next_body()?.unwrap_or_default())?;
        let member = members
            .get(tag as usize)
            .ok_or_else(|| Error::bad_value(format!("union tag {} out of range", tag)))?;
        let elem = it.next_elem()?;
        Ok(Value::from_elem(member.clone(), elem))
    }

    /// Check the body against the type.
    pub fn validate(&self) -> Result<()> {
        check_elem(&self.typ, self.elem())
    }
}

fn check_same(want: &Type, v: &Value) -> Result<()> {
    if want.name_id() != v.typ.name_id() {
        return Err(Error::bad_value(format!(
            "expected {}, got {}",
            want, v.typ
        )));
    }
    Ok(())
}

/// Check that `elem` is a well-formed element of type `typ`.
pub fn check_elem(typ: &Type, elem: Elem<'_>) -> Result<()> {
    let body = match elem {
        Elem::Null => return Ok(()),
        Elem::None => return Err(Error::bad_value("none outside an optional field")),
        Elem::Primitive(b) | Elem::Container(b) => b,
    };
    if matches!(elem, Elem::Container(_)) != typ.is_container() {
        return Err(Error::bad_value(format!("tag mismatch for {}", typ)));
    }
    match typ.under().kind() {
        TypeKind::Primitive(k) => primitive::check(*k, body),
        TypeKind::Enum(symbols) => {
            let idx = decode_counted_uvarint(body)?;
            if idx >= symbols.len() as u64 {
                return Err(Error::InvalidType(format!("bad enum index {}", idx)));
            }
            Ok(())
        }
        TypeKind::Record(fields) => {
            let mut it = Iter::new(body);
            for f in fields {
                if it.done() {
                    return Err(Error::bad_value("record body shorter than its type"));
                }
                let e = it.next_elem()?;
                if e.is_none() {
                    if !f.opt {
                        return Err(Error::bad_value(format!(
                            "field {:?} is not optional",
                            f.name
                        )));
                    }
                    continue;
                }
                check_elem(&f.typ, e)?;
            }
            if !it.done() {
                return Err(Error::bad_value("record body longer than its type"));
            }
            Ok(())
        }
        TypeKind::Array(inner) | TypeKind::Set(inner) => {
            for e in Iter::new(body) {
                check_elem(inner, e?)?;
            }
            Ok(())
        }
        TypeKind::Map(k, v) => {
            let mut it = Iter::new(body);
            while !it.done() {
                check_elem(k, it.next_elem()?)?;
                if it.done() {
                    return Err(Error::bad_value("map entry without value"));
                }
                check_elem(v, it.next_elem()?)?;
            }
            Ok(())
        }
        TypeKind::Union(members) => {
            let mut it = Iter::new(body);
            let tag = decode_counted_uvarint(it.next_body()?.unwrap_or_default())?;
            let member = members
                .get(tag as usize)
                .ok_or_else(|| Error::bad_value(format!("union tag {} out of range", tag)))?;
            if it.done() {
                return Err(Error::bad_value("union body without value"));
            }
            check_elem(member, it.next_elem()?)?;
            if !it.done() {
                return Err(Error::bad_value("trailing bytes in union body"));
            }
            Ok(())
        }
        TypeKind::Error(inner) => check_elem(inner, elem),
        TypeKind::Named { .. } => Ok(()),
    }
}

/// Builds a record value field by field.
#[derive(Debug)]
pub struct RecordBuilder {
    typ: Type,
    builder: Builder,
    next: usize,
}

impl RecordBuilder {
    pub fn new(typ: Type) -> Result<Self> {
        if !typ.is_record() {
            return Err(Error::bad_value(format!("{} is not a record", typ)));
        }
        let mut builder = Builder::new();
        builder.begin_container();
        Ok(Self {
            typ,
            builder,
            next: 0,
        })
    }

    fn next_field(&mut self) -> Result<crate::types::Field> {
        let fields = self.typ.fields().unwrap_or_default();
        let f = fields
            .get(self.next)
            .cloned()
            .ok_or_else(|| Error::bad_value("too many fields for record"))?;
        self.next += 1;
        Ok(f)
    }

    /// Append the next field's value.
    pub fn field(mut self, v: &Value) -> Result<Self> {
        let f = self.next_field()?;
        check_same(&f.typ, v)?;
        v.append_to(&mut self.builder);
        Ok(self)
    }

    /// Mark the next (optional) field absent.
    pub fn none(mut self) -> Result<Self> {
        let f = self.next_field()?;
        if !f.opt {
            return Err(Error::bad_value(format!("field {:?} is not optional", f.name)));
        }
        self.builder.append_none();
        Ok(self)
    }

    pub fn finish(mut self) -> Result<Value> {
        if self.next != self.typ.fields().map_or(0, <[_]>::len) {
            return Err(Error::bad_value("record has unset fields"));
        }
        self.builder.end_container();
        Value::from_builder(self.typ, &self.builder)
    }
}

/// Build a record value from field values; `None` marks an absent optional field.
pub fn record(typ: Type, fields: &[Option<Value>]) -> Result<Value> {
    let mut b = RecordBuilder::new(typ)?;
    for f in fields {
        b = match f {
            Some(v) => b.field(v)?,
            None => b.none()?,
        };
    }
    b.finish()
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({}: {})", self.typ, self)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match render_elem(f, &self.typ, self.elem()) {
            Ok(()) => Ok(()),
            Err(Render::Fmt(e)) => Err(e),
            Err(Render::Malformed) => f.write_str("<malformed>"),
        }
    }
}

enum Render {
    Fmt(fmt::Error),
    Malformed,
}

impl From<fmt::Error> for Render {
    fn from(e: fmt::Error) -> Self {
        Self::Fmt(e)
    }
}

impl From<Error> for Render {
    fn from(_: Error) -> Self {
        Self::Malformed
    }
}

type Rendered = std::result::Result<(), Render>;

fn render_elem(f: &mut fmt::Formatter<'_>, typ: &Type, elem: Elem<'_>) -> Rendered {
    match elem.body() {
        Some(body) => render_body(f, typ, body),
        None => Ok(f.write_str("null")?),
    }
}

fn render_body(f: &mut fmt::Formatter<'_>, typ: &Type, body: &[u8]) -> Rendered {
    match typ.under().kind() {
        TypeKind::Primitive(k) => render_primitive(f, *k, body),
        TypeKind::Enum(symbols) => {
            let idx = decode_counted_uvarint(body)?;
            let sym = symbols.get(idx as usize).ok_or(Render::Malformed)?;
            Ok(f.write_str(sym)?)
        }
        TypeKind::Record(fields) => {
            let mut it = Iter::new(body);
            let mut first = true;
            f.write_str("{")?;
            for field in fields {
                let e = it.next_elem()?;
                if e.is_none() {
                    continue;
                }
                if !first {
                    f.write_str(",")?;
                }
                first = false;
                write!(f, "{}:", field.name)?;
                render_elem(f, &field.typ, e)?;
            }
            Ok(f.write_str("}")?)
        }
        TypeKind::Array(inner) | TypeKind::Set(inner) => {
            let set = matches!(typ.under().kind(), TypeKind::Set(_));
            f.write_str(if set { "|[" } else { "[" })?;
            for (i, e) in Iter::new(body).enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                render_elem(f, inner, e?)?;
            }
            Ok(f.write_str(if set { "]|" } else { "]" })?)
        }
        TypeKind::Map(k, v) => {
            let mut it = Iter::new(body);
            f.write_str("|{")?;
            let mut first = true;
            while !it.done() {
                if !first {
                    f.write_str(",")?;
                }
                first = false;
                render_elem(f, k, it.next_elem()?)?;
                f.write_str(":")?;
                render_elem(f, v, it.next_elem()?)?;
            }
            Ok(f.write_str("}|")?)
        }
        TypeKind::Union(members) => {
            let mut it = Iter::new(body);
            let tag = decode_counted_uvarint(it.next_body()?.unwrap_or_default())?;
            let member = members.get(tag as usize).ok_or(Render::Malformed)?;
            render_elem(f, member, it.next_elem()?)
        }
        TypeKind::Error(inner) => {
            f.write_str("error(")?;
            render_elem(f, inner, Elem::from_body(Some(body), inner.is_container()))?;
            Ok(f.write_str(")")?)
        }
        TypeKind::Named { .. } => Err(Render::Malformed),
    }
}

fn render_primitive(f: &mut fmt::Formatter<'_>, kind: PrimitiveKind, body: &[u8]) -> Rendered {
    use PrimitiveKind as K;
    match kind {
        k if k.is_uint() => write!(f, "{}", primitive::decode_uint(body)?)?,
        K::Duration => f.write_str(&primitive::format_duration(primitive::decode_int(body)?))?,
        K::Time => f.write_str(&primitive::format_time(primitive::decode_int(body)?))?,
        k if k.is_int() => write!(f, "{}", primitive::decode_int(body)?)?,
        k if k.is_float() => {
            let v = primitive::decode_float(k, body)?;
            if v.is_infinite() {
                f.write_str(if v > 0.0 { "+Inf" } else { "-Inf" })?;
            } else {
                write!(f, "{:?}", v)?;
            }
        }
        K::Bool => write!(f, "{}", primitive::decode_bool(body)?)?,
        K::String => write!(f, "{:?}", primitive::decode_string(body)?)?,
        K::Bytes => {
            f.write_str("0x")?;
            for b in body {
                write!(f, "{:02x}", b)?;
            }
        }
        K::Ip => write!(f, "{}", primitive::decode_ip(body)?)?,
        K::Net => write!(f, "{}", primitive::decode_net(body)?)?,
        K::Type => {
            let scratch = TypeRegistry::new();
            write!(f, "<{}>", typevalue::decode(&scratch, body)?)?;
        }
        _ => return Err(Render::Malformed),
    }
    Ok(())
}
