// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type system.
//!
//! A [`Type`] is an immutable, reference-counted node owned by a
//! [`TypeRegistry`]. Primitives are process-wide singletons with fixed ids
//! below [`ID_TYPE_COMPLEX`](crate::config::ID_TYPE_COMPLEX); every complex
//! type gets a registry-assigned id at or above it.
//!
//! Named types wrap another type. [`Type::id`] looks through the name so a
//! named type compares equal to its underlying type under value semantics,
//! while [`Type::name_id`] exposes the named type's own identity.

pub mod mapper;
pub mod registry;
pub mod typevalue;

pub use mapper::{MapperCache, TypeMapper};
pub use registry::TypeRegistry;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};

/// Primitive kinds with their fixed ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PrimitiveKind {
    Uint8 = 0,
    Uint16 = 1,
    Uint32 = 2,
    Uint64 = 3,
    Uint128 = 4,
    Uint256 = 5,
    Int8 = 6,
    Int16 = 7,
    Int32 = 8,
    Int64 = 9,
    Int128 = 10,
    Int256 = 11,
    Duration = 12,
    Time = 13,
    Float16 = 14,
    Float32 = 15,
    Float64 = 16,
    Float128 = 17,
    Float256 = 18,
    Decimal32 = 19,
    Decimal64 = 20,
    Decimal128 = 21,
    Decimal256 = 22,
    Bool = 23,
    Bytes = 24,
    String = 25,
    Ip = 26,
    Net = 27,
    Type = 28,
    Null = 29,
}

impl PrimitiveKind {
    /// Every primitive in id order.
    pub const ALL: [PrimitiveKind; 30] = [
        Self::Uint8,
        Self::Uint16,
        Self::Uint32,
        Self::Uint64,
        Self::Uint128,
        Self::Uint256,
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::Int128,
        Self::Int256,
        Self::Duration,
        Self::Time,
        Self::Float16,
        Self::Float32,
        Self::Float64,
        Self::Float128,
        Self::Float256,
        Self::Decimal32,
        Self::Decimal64,
        Self::Decimal128,
        Self::Decimal256,
        Self::Bool,
        Self::Bytes,
        Self::String,
        Self::Ip,
        Self::Net,
        Self::Type,
        Self::Null,
    ];

    #[inline]
    #[must_use]
    pub const fn id(self) -> u32 {
        self as u32
    }

    #[must_use]
    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Uint128 => "uint128",
            Self::Uint256 => "uint256",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Int128 => "int128",
            Self::Int256 => "int256",
            Self::Duration => "duration",
            Self::Time => "time",
            Self::Float16 => "float16",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Float128 => "float128",
            Self::Float256 => "float256",
            Self::Decimal32 => "decimal32",
            Self::Decimal64 => "decimal64",
            Self::Decimal128 => "decimal128",
            Self::Decimal256 => "decimal256",
            Self::Bool => "bool",
            Self::Bytes => "bytes",
            Self::String => "string",
            Self::Ip => "ip",
            Self::Net => "net",
            Self::Type => "type",
            Self::Null => "null",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// False for the reserved wide integers, wide floats and decimals.
    #[must_use]
    pub const fn is_supported(self) -> bool {
        !matches!(
            self,
            Self::Uint128
                | Self::Uint256
                | Self::Int128
                | Self::Int256
                | Self::Float128
                | Self::Float256
                | Self::Decimal32
                | Self::Decimal64
                | Self::Decimal128
                | Self::Decimal256
        )
    }

    /// Unsigned integers stored as counted uvarints.
    #[must_use]
    pub const fn is_uint(self) -> bool {
        matches!(self, Self::Uint8 | Self::Uint16 | Self::Uint32 | Self::Uint64)
    }

    /// Signed integers, durations and times (counted zigzag varints).
    #[must_use]
    pub const fn is_int(self) -> bool {
        matches!(
            self,
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64 | Self::Duration | Self::Time
        )
    }

    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float16 | Self::Float32 | Self::Float64)
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A record field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub typ: Type,
    /// Optional fields may be absent ("none") in a value.
    pub opt: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, typ: Type) -> Self {
        Self {
            name: name.into(),
            typ,
            opt: false,
        }
    }

    /// An optional field.
    pub fn opt(name: impl Into<String>, typ: Type) -> Self {
        Self {
            name: name.into(),
            typ,
            opt: true,
        }
    }
}

/// Structural payload of a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Primitive(PrimitiveKind),
    Record(Vec<Field>),
    Array(Type),
    Set(Type),
    Map(Type, Type),
    /// Members in tag order.
    Union(Vec<Type>),
    /// Symbols in index order.
    Enum(Vec<String>),
    Error(Type),
    Named { name: String, typ: Type },
}

#[derive(Debug)]
struct TypeInner {
    id: u32,
    kind: TypeKind,
}

/// Shared handle to an interned type. Clone is an `Arc` increment.
#[derive(Clone)]
pub struct Type(Arc<TypeInner>);

static PRIMITIVES: LazyLock<Vec<Type>> = LazyLock::new(|| {
    PrimitiveKind::ALL
        .iter()
        .map(|&k| Type::new(k.id(), TypeKind::Primitive(k)))
        .collect()
});

impl Type {
    pub(crate) fn new(id: u32, kind: TypeKind) -> Self {
        Self(Arc::new(TypeInner { id, kind }))
    }

    /// Singleton for a primitive kind.
    #[must_use]
    pub fn primitive(kind: PrimitiveKind) -> Type {
        PRIMITIVES[kind as usize].clone()
    }

    #[must_use]
    pub fn int64() -> Type {
        Self::primitive(PrimitiveKind::Int64)
    }

    #[must_use]
    pub fn uint64() -> Type {
        Self::primitive(PrimitiveKind::Uint64)
    }

    #[must_use]
    pub fn float64() -> Type {
        Self::primitive(PrimitiveKind::Float64)
    }

    #[must_use]
    pub fn string() -> Type {
        Self::primitive(PrimitiveKind::String)
    }

    #[must_use]
    pub fn bytes() -> Type {
        Self::primitive(PrimitiveKind::Bytes)
    }

    #[must_use]
    pub fn bool() -> Type {
        Self::primitive(PrimitiveKind::Bool)
    }

    #[must_use]
    pub fn time() -> Type {
        Self::primitive(PrimitiveKind::Time)
    }

    #[must_use]
    pub fn duration() -> Type {
        Self::primitive(PrimitiveKind::Duration)
    }

    #[must_use]
    pub fn ip() -> Type {
        Self::primitive(PrimitiveKind::Ip)
    }

    #[must_use]
    pub fn net() -> Type {
        Self::primitive(PrimitiveKind::Net)
    }

    #[must_use]
    pub fn null() -> Type {
        Self::primitive(PrimitiveKind::Null)
    }

    /// The `type` primitive (values are type-values).
    #[must_use]
    pub fn type_value() -> Type {
        Self::primitive(PrimitiveKind::Type)
    }

    /// Id used for value semantics; looks through named types.
    #[must_use]
    pub fn id(&self) -> u32 {
        match &self.0.kind {
            TypeKind::Named { typ, .. } => typ.id(),
            _ => self.0.id,
        }
    }

    /// This type's own id (differs from [`id`](Self::id) only for named types).
    #[inline]
    #[must_use]
    pub fn name_id(&self) -> u32 {
        self.0.id
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> &TypeKind {
        &self.0.kind
    }

    /// The type with every outer name stripped.
    #[must_use]
    pub fn under(&self) -> &Type {
        match &self.0.kind {
            TypeKind::Named { typ, .. } => typ.under(),
            _ => self,
        }
    }

    #[must_use]
    pub fn is_named(&self) -> bool {
        matches!(self.0.kind, TypeKind::Named { .. })
    }

    /// Name of a named type.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match &self.0.kind {
            TypeKind::Named { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Primitive kind of the underlying type.
    #[must_use]
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        match self.under().kind() {
            TypeKind::Primitive(k) => Some(*k),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_primitive(&self) -> bool {
        self.primitive_kind().is_some()
    }

    /// Fields of the underlying record type.
    #[must_use]
    pub fn fields(&self) -> Option<&[Field]> {
        match self.under().kind() {
            TypeKind::Record(fields) => Some(fields),
            _ => None,
        }
    }

    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields()?.iter().position(|f| f.name == name)
    }

    #[must_use]
    pub fn is_record(&self) -> bool {
        self.fields().is_some()
    }

    /// Element type of an array or set.
    #[must_use]
    pub fn inner(&self) -> Option<&Type> {
        match self.under().kind() {
            TypeKind::Array(t) | TypeKind::Set(t) => Some(t),
            _ => None,
        }
    }

    /// Members of the underlying union type.
    #[must_use]
    pub fn members(&self) -> Option<&[Type]> {
        match self.under().kind() {
            TypeKind::Union(m) => Some(m),
            _ => None,
        }
    }

    /// Union tag of a member, matched on name identity.
    #[must_use]
    pub fn member_index(&self, member: &Type) -> Option<usize> {
        self.members()?
            .iter()
            .position(|m| m.name_id() == member.name_id())
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self.under().kind(), TypeKind::Error(_))
    }

    /// True when values of this type are encoded with the container tag.
    #[must_use]
    pub fn is_container(&self) -> bool {
        match self.under().kind() {
            TypeKind::Primitive(_) | TypeKind::Enum(_) => false,
            TypeKind::Error(inner) => inner.is_container(),
            _ => true,
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.id == other.0.id && self.0.kind == other.0.kind)
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Type({}: {})", self.0.id, self)
    }
}

fn write_name(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    let plain = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if plain {
        f.write_str(name)
    } else {
        write!(f, "{:?}", name)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            TypeKind::Primitive(k) => f.write_str(k.name()),
            TypeKind::Record(fields) => {
                f.write_str("{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write_name(f, &field.name)?;
                    if field.opt {
                        f.write_str("?")?;
                    }
                    write!(f, ":{}", field.typ)?;
                }
                f.write_str("}")
            }
            TypeKind::Array(t) => write!(f, "[{}]", t),
            TypeKind::Set(t) => write!(f, "|[{}]|", t),
            TypeKind::Map(k, v) => write!(f, "|{{{}:{}}}|", k, v),
            TypeKind::Union(members) => {
                f.write_str("(")?;
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", m)?;
                }
                f.write_str(")")
            }
            TypeKind::Enum(symbols) => {
                f.write_str("enum(")?;
                for (i, s) in symbols.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write_name(f, s)?;
                }
                f.write_str(")")
            }
            TypeKind::Error(t) => write!(f, "error({})", t),
            TypeKind::Named { name, typ } => {
                write_name(f, name)?;
                write!(f, "={}", typ)
            }
        }
    }
}

/// Interning key: kind plus the name ids of the children.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum TypeKey {
    Primitive(u32),
    Record(Vec<(String, u32, bool)>),
    Array(u32),
    Set(u32),
    Map(u32, u32),
    Union(Vec<u32>),
    Enum(Vec<String>),
    Error(u32),
    Named(String, u32),
}

impl TypeKey {
    pub(crate) fn of(kind: &TypeKind) -> Self {
        match kind {
            TypeKind::Primitive(k) => Self::Primitive(k.id()),
            TypeKind::Record(fields) => Self::Record(
                fields
                    .iter()
                    .map(|f| (f.name.clone(), f.typ.name_id(), f.opt))
                    .collect(),
            ),
            TypeKind::Array(t) => Self::Array(t.name_id()),
            TypeKind::Set(t) => Self::Set(t.name_id()),
            TypeKind::Map(k, v) => Self::Map(k.name_id(), v.name_id()),
            TypeKind::Union(m) => Self::Union(m.iter().map(Type::name_id).collect()),
            TypeKind::Enum(s) => Self::Enum(s.clone()),
            TypeKind::Error(t) => Self::Error(t.name_id()),
            TypeKind::Named { name, typ } => Self::Named(name.clone(), typ.name_id()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_table() {
        for (i, k) in PrimitiveKind::ALL.iter().enumerate() {
            assert_eq!(k.id() as usize, i);
            assert_eq!(PrimitiveKind::from_name(k.name()), Some(*k));
            assert_eq!(Type::primitive(*k).name_id(), k.id());
        }
        assert_eq!(PrimitiveKind::from_id(30), None);
        assert!(!PrimitiveKind::Uint128.is_supported());
        assert!(PrimitiveKind::Time.is_int());
    }

    #[test]
    fn test_primitive_singletons() {
        let a = Type::int64();
        let b = Type::primitive(PrimitiveKind::Int64);
        assert!(Arc::ptr_eq(&a.0, &b.0));
        assert!(!a.is_container());
    }

    #[test]
    fn test_named_id_delegates() {
        let under = Type::new(31, TypeKind::Array(Type::int64()));
        let named = Type::new(
            32,
            TypeKind::Named {
                name: "ints".into(),
                typ: under.clone(),
            },
        );
        assert_eq!(named.id(), 31);
        assert_eq!(named.name_id(), 32);
        assert_eq!(named.inner(), Some(&Type::int64()));
        assert_eq!(named.to_string(), "ints=[int64]");
    }

    #[test]
    fn test_display() {
        let rec = Type::new(
            30,
            TypeKind::Record(vec![
                Field::new("a", Type::int64()),
                Field::opt("b c", Type::string()),
            ]),
        );
        assert_eq!(rec.to_string(), "{a:int64,\"b c\"?:string}");
    }
}
