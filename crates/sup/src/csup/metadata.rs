// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! CSUP metadata tree.
//!
//! The metadata section is a BSUP stream holding one value: an array whose
//! elements are named records, one name per node kind. Readers dispatch on
//! the name, so the union position of a kind does not matter. Child ids
//! always point at earlier elements.
//!
//! | Name | Fields |
//! |------|--------|
//! | `Primitive` | typ, location, count |
//! | `Int` / `Uint` / `Float` | typ, location, min, max, count |
//! | `Bytes` | typ, offsets, bytes, count |
//! | `Record` | length, fields[{name, values, opt, nones}] |
//! | `Array` / `Set` | length, lengths, values |
//! | `Map` | length, lengths, keys, values |
//! | `Union` / `Dynamic` | length, tags, values[] |
//! | `Dict` | length, index, counts, values |
//! | `Const` | length, typ, value |
//! | `Named` | name, values |
//! | `Error` | values |
//! | `Nulls` | count, runs, values |
//! | `BSUP` | count |

use super::segment::Segment;
use crate::brow::parser::{DecodeOptions, Unit};
use crate::brow::{Parser, Writer, WriterConfig};
use crate::cancel::CancelToken;
use crate::compress::{CompressConfig, Format};
use crate::config::Limits;
use crate::encoding::primitive;
use crate::error::{Error, ErrorKind, Result};
use crate::types::{Field, PrimitiveKind, Type, TypeRegistry};
use crate::value::{record, Value};
use std::sync::Arc;

/// One field of a record node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeField {
    pub name: String,
    pub values: u32,
    pub opt: bool,
    /// Alternating value/none runs starting with values; empty when the
    /// field never was none.
    pub nones: Segment,
}

/// One metadata node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Tagged element stream.
    Primitive {
        typ: Type,
        location: Segment,
        count: u64,
    },
    Int {
        typ: Type,
        location: Segment,
        min: i64,
        max: i64,
        count: u64,
    },
    Uint {
        typ: Type,
        location: Segment,
        min: u64,
        max: u64,
        count: u64,
    },
    Float {
        typ: Type,
        location: Segment,
        min: f64,
        max: f64,
        count: u64,
    },
    Bytes {
        typ: Type,
        offsets: Segment,
        bytes: Segment,
        count: u64,
    },
    Record {
        length: u64,
        fields: Vec<NodeField>,
    },
    Array {
        length: u64,
        lengths: Segment,
        values: u32,
    },
    Set {
        length: u64,
        lengths: Segment,
        values: u32,
    },
    Map {
        length: u64,
        lengths: Segment,
        keys: u32,
        values: u32,
    },
    Union {
        length: u64,
        tags: Segment,
        values: Vec<u32>,
    },
    Dynamic {
        length: u64,
        tags: Segment,
        values: Vec<u32>,
    },
    Dict {
        length: u64,
        index: Segment,
        counts: Segment,
        values: u32,
    },
    Const {
        length: u64,
        value: Value,
    },
    Named {
        name: String,
        values: u32,
    },
    Error {
        values: u32,
    },
    Nulls {
        count: u64,
        runs: Segment,
        values: u32,
    },
    Bsup {
        count: u64,
    },
}

impl Node {
    /// Metadata record name of this kind.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Primitive { .. } => "Primitive",
            Self::Int { .. } => "Int",
            Self::Uint { .. } => "Uint",
            Self::Float { .. } => "Float",
            Self::Bytes { .. } => "Bytes",
            Self::Record { .. } => "Record",
            Self::Array { .. } => "Array",
            Self::Set { .. } => "Set",
            Self::Map { .. } => "Map",
            Self::Union { .. } => "Union",
            Self::Dynamic { .. } => "Dynamic",
            Self::Dict { .. } => "Dict",
            Self::Const { .. } => "Const",
            Self::Named { .. } => "Named",
            Self::Error { .. } => "Error",
            Self::Nulls { .. } => "Nulls",
            Self::Bsup { .. } => "BSUP",
        }
    }

    /// Child node ids.
    #[must_use]
    pub fn children(&self) -> Vec<u32> {
        match self {
            Self::Record { fields, .. } => fields.iter().map(|f| f.values).collect(),
            Self::Array { values, .. }
            | Self::Set { values, .. }
            | Self::Dict { values, .. }
            | Self::Named { values, .. }
            | Self::Error { values }
            | Self::Nulls { values, .. } => vec![*values],
            Self::Map { keys, values, .. } => vec![*keys, *values],
            Self::Union { values, .. } | Self::Dynamic { values, .. } => values.clone(),
            _ => Vec::new(),
        }
    }

    /// Every segment this node owns.
    #[must_use]
    pub fn segments(&self) -> Vec<Segment> {
        match self {
            Self::Primitive { location, .. }
            | Self::Int { location, .. }
            | Self::Uint { location, .. }
            | Self::Float { location, .. } => vec![*location],
            Self::Bytes { offsets, bytes, .. } => vec![*offsets, *bytes],
            Self::Record { fields, .. } => fields.iter().map(|f| f.nones).collect(),
            Self::Array { lengths, .. } | Self::Set { lengths, .. } | Self::Map { lengths, .. } => {
                vec![*lengths]
            }
            Self::Union { tags, .. } | Self::Dynamic { tags, .. } => vec![*tags],
            Self::Dict { index, counts, .. } => vec![*index, *counts],
            Self::Nulls { runs, .. } => vec![*runs],
            _ => Vec::new(),
        }
    }

    /// Rows described by node `id`.
    pub fn rows(nodes: &[Node], id: u32) -> Result<u64> {
        let node = nodes
            .get(id as usize)
            .ok_or_else(|| Error::MalformedMetadata(format!("node id {} out of range", id)))?;
        Ok(match node {
            Self::Primitive { count, .. }
            | Self::Int { count, .. }
            | Self::Uint { count, .. }
            | Self::Float { count, .. }
            | Self::Bytes { count, .. }
            | Self::Nulls { count, .. }
            | Self::Bsup { count } => *count,
            Self::Record { length, .. }
            | Self::Array { length, .. }
            | Self::Set { length, .. }
            | Self::Map { length, .. }
            | Self::Union { length, .. }
            | Self::Dynamic { length, .. }
            | Self::Dict { length, .. }
            | Self::Const { length, .. } => *length,
            Self::Named { values, .. } | Self::Error { values } => Self::rows(nodes, *values)?,
        })
    }
}

/// Check child ordering and segment bounds.
pub fn validate(nodes: &[Node], data_size: u64) -> Result<()> {
    for (id, node) in nodes.iter().enumerate() {
        for child in node.children() {
            if child as usize >= id {
                return Err(Error::MalformedMetadata(format!(
                    "node {} ({}) refers to node {}",
                    id,
                    node.kind_name(),
                    child
                )));
            }
        }
        for seg in node.segments() {
            seg.check(data_size)?;
        }
        // BSUP children may only sit directly under a dynamic node.
        if !matches!(node, Node::Dynamic { .. })
            && node
                .children()
                .iter()
                .any(|&c| matches!(nodes[c as usize], Node::Bsup { .. }))
        {
            return Err(Error::MalformedMetadata(format!(
                "BSUP node under {} node {}",
                node.kind_name(),
                id
            )));
        }
    }
    Ok(())
}

/// Type of every node in `ctx`; `None` for dynamic and BSUP nodes, whose rows
/// carry their own types.
pub fn node_types(ctx: &TypeRegistry, nodes: &[Node]) -> Result<Vec<Option<Type>>> {
    let mut out: Vec<Option<Type>> = Vec::with_capacity(nodes.len());
    for (id, node) in nodes.iter().enumerate() {
        let child = |c: u32| -> Result<Type> {
            out.get(c as usize).cloned().flatten().ok_or_else(|| {
                Error::MalformedMetadata(format!("node {} needs the type of untyped node {}", id, c))
            })
        };
        let t = match node {
            Node::Primitive { typ, .. }
            | Node::Int { typ, .. }
            | Node::Uint { typ, .. }
            | Node::Float { typ, .. }
            | Node::Bytes { typ, .. } => Some(typ.clone()),
            Node::Const { value, .. } => Some(value.typ().clone()),
            Node::Dict { values, .. } | Node::Nulls { values, .. } => Some(child(*values)?),
            Node::Named { name, values } => Some(ctx.lookup_named(name, child(*values)?)?),
            Node::Error { values } => Some(ctx.lookup_error(child(*values)?)),
            Node::Record { fields, .. } => {
                let mut out_fields = Vec::with_capacity(fields.len());
                for f in fields {
                    out_fields.push(Field {
                        name: f.name.clone(),
                        typ: child(f.values)?,
                        opt: f.opt,
                    });
                }
                Some(ctx.lookup_record(out_fields)?)
            }
            Node::Array { values, .. } => Some(ctx.lookup_array(child(*values)?)),
            Node::Set { values, .. } => Some(ctx.lookup_set(child(*values)?)),
            Node::Map { keys, values, .. } => Some(ctx.lookup_map(child(*keys)?, child(*values)?)),
            Node::Union { values, .. } => {
                let members = values.iter().map(|&v| child(v)).collect::<Result<Vec<_>>>()?;
                Some(ctx.lookup_union(members)?)
            }
            Node::Dynamic { .. } | Node::Bsup { .. } => None,
        };
        out.push(t);
    }
    Ok(out)
}

// =======================================================================
// Encoding
// =======================================================================

struct Enc<'a> {
    reg: &'a TypeRegistry,
}

impl Enc<'_> {
    fn node(&self, name: &str, fields: Vec<(&str, Value)>) -> Result<Value> {
        let typ = self.reg.lookup_record(
            fields
                .iter()
                .map(|(n, v)| Field::new(*n, v.typ().clone()))
                .collect(),
        )?;
        let named = self.reg.lookup_named(name, typ)?;
        let vals: Vec<Option<Value>> = fields.into_iter().map(|(_, v)| Some(v)).collect();
        record(named, &vals)
    }

    fn seg(&self, s: &Segment) -> Result<Value> {
        let format = Value::new(
            Type::primitive(PrimitiveKind::Uint8),
            Some(primitive::encode_uint(u64::from(s.format.as_u8()))),
        );
        self.node(
            "Segment",
            vec![
                ("offset", Value::uint64(s.offset)),
                ("mem_length", Value::uint64(s.mem_length)),
                ("length", Value::uint64(s.length)),
                ("format", format),
            ],
        )
    }

    fn id(id: u32) -> Value {
        Value::uint64(u64::from(id))
    }

    fn ids(&self, ids: &[u32]) -> Result<Value> {
        let items: Vec<Value> = ids.iter().map(|&i| Self::id(i)).collect();
        Value::array(self.reg.lookup_array(Type::uint64()), &items)
    }

    fn typ(&self, t: &Type) -> Value {
        self.reg.lookup_type_value(t)
    }

    fn fields(&self, fields: &[NodeField]) -> Result<Value> {
        let mut items = Vec::with_capacity(fields.len());
        for f in fields {
            items.push(self.node(
                "Field",
                vec![
                    ("name", Value::string(&f.name)),
                    ("values", Self::id(f.values)),
                    ("opt", Value::bool(f.opt)),
                    ("nones", self.seg(&f.nones)?),
                ],
            )?);
        }
        let field_typ = match items.first() {
            Some(v) => v.typ().clone(),
            None => {
                // Shape of an empty field list.
                let seg = self.seg(&Segment::default())?;
                self.node(
                    "Field",
                    vec![
                        ("name", Value::string("")),
                        ("values", Self::id(0)),
                        ("opt", Value::bool(false)),
                        ("nones", seg),
                    ],
                )?
                .typ()
                .clone()
            }
        };
        Value::array(self.reg.lookup_array(field_typ), &items)
    }

    fn encode(&self, node: &Node) -> Result<Value> {
        let name = node.kind_name();
        match node {
            Node::Primitive {
                typ,
                location,
                count,
            } => self.node(
                name,
                vec![
                    ("typ", self.typ(typ)),
                    ("location", self.seg(location)?),
                    ("count", Value::uint64(*count)),
                ],
            ),
            Node::Int {
                typ,
                location,
                min,
                max,
                count,
            } => self.node(
                name,
                vec![
                    ("typ", self.typ(typ)),
                    ("location", self.seg(location)?),
                    ("min", Value::int64(*min)),
                    ("max", Value::int64(*max)),
                    ("count", Value::uint64(*count)),
                ],
            ),
            Node::Uint {
                typ,
                location,
                min,
                max,
                count,
            } => self.node(
                name,
                vec![
                    ("typ", self.typ(typ)),
                    ("location", self.seg(location)?),
                    ("min", Value::uint64(*min)),
                    ("max", Value::uint64(*max)),
                    ("count", Value::uint64(*count)),
                ],
            ),
            Node::Float {
                typ,
                location,
                min,
                max,
                count,
            } => self.node(
                name,
                vec![
                    ("typ", self.typ(typ)),
                    ("location", self.seg(location)?),
                    ("min", Value::float64(*min)),
                    ("max", Value::float64(*max)),
                    ("count", Value::uint64(*count)),
                ],
            ),
            Node::Bytes {
                typ,
                offsets,
                bytes,
                count,
            } => self.node(
                name,
                vec![
                    ("typ", self.typ(typ)),
                    ("offsets", self.seg(offsets)?),
                    ("bytes", self.seg(bytes)?),
                    ("count", Value::uint64(*count)),
                ],
            ),
            Node::Record { length, fields } => self.node(
                name,
                vec![
                    ("length", Value::uint64(*length)),
                    ("fields", self.fields(fields)?),
                ],
            ),
            Node::Array {
                length,
                lengths,
                values,
            }
            | Node::Set {
                length,
                lengths,
                values,
            } => self.node(
                name,
                vec![
                    ("length", Value::uint64(*length)),
                    ("lengths", self.seg(lengths)?),
                    ("values", Self::id(*values)),
                ],
            ),
            Node::Map {
                length,
                lengths,
                keys,
                values,
            } => self.node(
                name,
                vec![
                    ("length", Value::uint64(*length)),
                    ("lengths", self.seg(lengths)?),
                    ("keys", Self::id(*keys)),
                    ("values", Self::id(*values)),
                ],
            ),
            Node::Union {
                length,
                tags,
                values,
            }
            | Node::Dynamic {
                length,
                tags,
                values,
            } => self.node(
                name,
                vec![
                    ("length", Value::uint64(*length)),
                    ("tags", self.seg(tags)?),
                    ("values", self.ids(values)?),
                ],
            ),
            Node::Dict {
                length,
                index,
                counts,
                values,
            } => self.node(
                name,
                vec![
                    ("length", Value::uint64(*length)),
                    ("index", self.seg(index)?),
                    ("counts", self.seg(counts)?),
                    ("values", Self::id(*values)),
                ],
            ),
            Node::Const { length, value } => {
                let body = match value.bytes() {
                    Some(b) => Value::bytes_value(b),
                    None => Value::null(Type::bytes()),
                };
                self.node(
                    name,
                    vec![
                        ("length", Value::uint64(*length)),
                        ("typ", self.typ(value.typ())),
                        ("value", body),
                    ],
                )
            }
            Node::Named { name: n, values } => self.node(
                name,
                vec![("name", Value::string(n)), ("values", Self::id(*values))],
            ),
            Node::Error { values } => self.node(name, vec![("values", Self::id(*values))]),
            Node::Nulls {
                count,
                runs,
                values,
            } => self.node(
                name,
                vec![
                    ("count", Value::uint64(*count)),
                    ("runs", self.seg(runs)?),
                    ("values", Self::id(*values)),
                ],
            ),
            Node::Bsup { count } => self.node(name, vec![("count", Value::uint64(*count))]),
        }
    }
}

/// Serialize `nodes` as a metadata section.
pub fn encode(nodes: &[Node], compress: CompressConfig) -> Result<Vec<u8>> {
    let reg = TypeRegistry::new();
    let enc = Enc { reg: &reg };
    let values = nodes
        .iter()
        .map(|n| enc.encode(n))
        .collect::<Result<Vec<_>>>()?;
    let elem_typ = reg.union_of(values.iter().map(|v| v.typ().clone()).collect())?;
    let elems = if elem_typ.members().is_some() {
        values
            .iter()
            .map(|v| Value::union(elem_typ.clone(), v))
            .collect::<Result<Vec<_>>>()?
    } else {
        values
    };
    let tree = Value::array(reg.lookup_array(elem_typ), &elems)?;
    let mut w = Writer::with_config(Vec::new(), WriterConfig::default().compress(compress));
    w.write(&tree)?;
    w.close()
}

// =======================================================================
// Decoding
// =======================================================================

fn malformed(e: Error) -> Error {
    match e.kind() {
        ErrorKind::MalformedMetadata | ErrorKind::Canceled | ErrorKind::Io => e,
        _ => Error::MalformedMetadata(e.to_string()),
    }
}

fn field(v: &Value, name: &str) -> Result<Value> {
    v.deref(name)?.ok_or_else(|| {
        Error::MalformedMetadata(format!(
            "{} node without field {}",
            v.typ().name().unwrap_or("?"),
            name
        ))
    })
}

fn get_u64(v: &Value, name: &str) -> Result<u64> {
    field(v, name)?.as_uint()
}

fn get_id(v: &Value, name: &str) -> Result<u32> {
    let id = get_u64(v, name)?;
    u32::try_from(id).map_err(|_| Error::MalformedMetadata(format!("node id {}", id)))
}

fn get_ids(v: &Value, name: &str) -> Result<Vec<u32>> {
    field(v, name)?
        .elements()?
        .iter()
        .map(|e| {
            let id = e.as_uint()?;
            u32::try_from(id).map_err(|_| Error::MalformedMetadata(format!("node id {}", id)))
        })
        .collect()
}

fn get_seg(v: &Value, name: &str) -> Result<Segment> {
    let s = field(v, name)?;
    let format = get_u64(&s, "format")?;
    Ok(Segment {
        offset: get_u64(&s, "offset")?,
        mem_length: get_u64(&s, "mem_length")?,
        length: get_u64(&s, "length")?,
        format: Format::from_u8(u8::try_from(format).unwrap_or(u8::MAX))?,
    })
}

fn get_type(ctx: &TypeRegistry, v: &Value, name: &str) -> Result<Type> {
    let tv = field(v, name)?;
    let bytes = tv
        .bytes()
        .ok_or_else(|| Error::MalformedMetadata(format!("null {}", name)))?;
    ctx.lookup_by_value(bytes)
}

fn decode_node(ctx: &TypeRegistry, v: &Value) -> Result<Node> {
    let kind = v
        .typ()
        .name()
        .ok_or_else(|| Error::MalformedMetadata(format!("unnamed node type {}", v.typ())))?;
    Ok(match kind {
        "Primitive" => Node::Primitive {
            typ: get_type(ctx, v, "typ")?,
            location: get_seg(v, "location")?,
            count: get_u64(v, "count")?,
        },
        "Int" => Node::Int {
            typ: get_type(ctx, v, "typ")?,
            location: get_seg(v, "location")?,
            min: field(v, "min")?.as_int()?,
            max: field(v, "max")?.as_int()?,
            count: get_u64(v, "count")?,
        },
        "Uint" => Node::Uint {
            typ: get_type(ctx, v, "typ")?,
            location: get_seg(v, "location")?,
            min: get_u64(v, "min")?,
            max: get_u64(v, "max")?,
            count: get_u64(v, "count")?,
        },
        "Float" => Node::Float {
            typ: get_type(ctx, v, "typ")?,
            location: get_seg(v, "location")?,
            min: field(v, "min")?.as_float()?,
            max: field(v, "max")?.as_float()?,
            count: get_u64(v, "count")?,
        },
        "Bytes" => Node::Bytes {
            typ: get_type(ctx, v, "typ")?,
            offsets: get_seg(v, "offsets")?,
            bytes: get_seg(v, "bytes")?,
            count: get_u64(v, "count")?,
        },
        "Record" => {
            let mut fields = Vec::new();
            for f in field(v, "fields")?.elements()? {
                fields.push(NodeField {
                    name: field(&f, "name")?.as_str()?.to_string(),
                    values: get_id(&f, "values")?,
                    opt: field(&f, "opt")?.as_bool()?,
                    nones: get_seg(&f, "nones")?,
                });
            }
            Node::Record {
                length: get_u64(v, "length")?,
                fields,
            }
        }
        "Array" => Node::Array {
            length: get_u64(v, "length")?,
            lengths: get_seg(v, "lengths")?,
            values: get_id(v, "values")?,
        },
        "Set" => Node::Set {
            length: get_u64(v, "length")?,
            lengths: get_seg(v, "lengths")?,
            values: get_id(v, "values")?,
        },
        "Map" => Node::Map {
            length: get_u64(v, "length")?,
            lengths: get_seg(v, "lengths")?,
            keys: get_id(v, "keys")?,
            values: get_id(v, "values")?,
        },
        "Union" => Node::Union {
            length: get_u64(v, "length")?,
            tags: get_seg(v, "tags")?,
            values: get_ids(v, "values")?,
        },
        "Dynamic" => Node::Dynamic {
            length: get_u64(v, "length")?,
            tags: get_seg(v, "tags")?,
            values: get_ids(v, "values")?,
        },
        "Dict" => Node::Dict {
            length: get_u64(v, "length")?,
            index: get_seg(v, "index")?,
            counts: get_seg(v, "counts")?,
            values: get_id(v, "values")?,
        },
        "Const" => {
            let typ = get_type(ctx, v, "typ")?;
            let body = field(v, "value")?.bytes().map(<[u8]>::to_vec);
            Node::Const {
                length: get_u64(v, "length")?,
                value: Value::new(typ, body),
            }
        }
        "Named" => Node::Named {
            name: field(v, "name")?.as_str()?.to_string(),
            values: get_id(v, "values")?,
        },
        "Error" => Node::Error {
            values: get_id(v, "values")?,
        },
        "Nulls" => Node::Nulls {
            count: get_u64(v, "count")?,
            runs: get_seg(v, "runs")?,
            values: get_id(v, "values")?,
        },
        "BSUP" => Node::Bsup {
            count: get_u64(v, "count")?,
        },
        other => {
            return Err(Error::MalformedMetadata(format!("unknown node kind {:?}", other)));
        }
    })
}

/// Parse a metadata section into nodes, interning node types in `ctx`.
pub fn decode(ctx: &Arc<TypeRegistry>, bytes: &[u8], limits: Limits) -> Result<Vec<Node>> {
    let cancel = CancelToken::new();
    let mut p = Parser::new(Arc::clone(ctx), bytes, limits);
    let mut tree = None;
    while let Some(unit) = p.next_unit().map_err(malformed)? {
        let Unit::Values(job) = unit else {
            return Err(Error::MalformedMetadata("control frame in metadata".into()));
        };
        let mut opts = DecodeOptions {
            reg: ctx,
            limits,
            validate: true,
            projector: None,
            cancel: &cancel,
        };
        for v in job.decode(&mut opts).map_err(malformed)? {
            if tree.replace(v).is_some() {
                return Err(Error::MalformedMetadata("more than one metadata value".into()));
            }
        }
    }
    let tree = tree.ok_or_else(|| Error::MalformedMetadata("empty metadata section".into()))?;
    let elems = tree.elements().map_err(malformed)?;
    let mut nodes = Vec::with_capacity(elems.len());
    for e in elems {
        let v = if e.typ().members().is_some() {
            e.union_member().map_err(malformed)?
        } else {
            e
        };
        nodes.push(decode_node(ctx, &v).map_err(malformed)?);
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(offset: u64, n: u64) -> Segment {
        Segment {
            offset,
            mem_length: n,
            length: n,
            format: Format::None,
        }
    }

    fn sample(reg: &TypeRegistry) -> Vec<Node> {
        let named = reg.lookup_named("port", Type::uint64()).expect("named");
        vec![
            Node::Int {
                typ: Type::int64(),
                location: seg(0, 3),
                min: -1,
                max: 9,
                count: 3,
            },
            Node::Bytes {
                typ: Type::string(),
                offsets: seg(3, 3),
                bytes: seg(6, 4),
                count: 3,
            },
            Node::Const {
                length: 3,
                value: Value::new(named, Some(primitive::encode_uint(80))),
            },
            Node::Record {
                length: 3,
                fields: vec![
                    NodeField {
                        name: "a".into(),
                        values: 0,
                        opt: false,
                        nones: Segment::default(),
                    },
                    NodeField {
                        name: "b".into(),
                        values: 1,
                        opt: true,
                        nones: seg(10, 2),
                    },
                    NodeField {
                        name: "p".into(),
                        values: 2,
                        opt: false,
                        nones: Segment::default(),
                    },
                ],
            },
            Node::Bsup { count: 2 },
            Node::Dynamic {
                length: 5,
                tags: seg(12, 5),
                values: vec![3, 4],
            },
        ]
    }

    #[test]
    fn test_metadata_roundtrip() {
        let src = TypeRegistry::new();
        let nodes = sample(&src);
        let bytes = encode(&nodes, CompressConfig::none()).expect("encode");
        let ctx = Arc::new(TypeRegistry::new());
        let back = decode(&ctx, &bytes, Limits::default()).expect("decode");
        assert_eq!(back.len(), nodes.len());
        for (a, b) in nodes.iter().zip(&back) {
            assert_eq!(a.kind_name(), b.kind_name());
            assert_eq!(a.children(), b.children());
            assert_eq!(a.segments(), b.segments());
        }
        validate(&back, 17).expect("valid");

        let types = node_types(&ctx, &back).expect("types");
        assert_eq!(
            types[3].as_ref().expect("record type").to_string(),
            "{a:int64,b?:string,p:port=uint64}"
        );
        assert!(types[4].is_none() && types[5].is_none());
        assert_eq!(Node::rows(&back, 5).expect("rows"), 5);
    }

    #[test]
    fn test_validate_rejects_forward_refs() {
        let nodes = vec![
            Node::Named {
                name: "x".into(),
                values: 1,
            },
            Node::Bsup { count: 1 },
        ];
        let err = validate(&nodes, 0).expect_err("forward");
        assert_eq!(err.kind(), ErrorKind::MalformedMetadata);

        let nodes = vec![
            Node::Bsup { count: 1 },
            Node::Error { values: 0 },
        ];
        let err = validate(&nodes, 0).expect_err("bsup under error");
        assert_eq!(err.kind(), ErrorKind::MalformedMetadata);
    }

    #[test]
    fn test_validate_rejects_out_of_range_segment() {
        let nodes = vec![Node::Int {
            typ: Type::int64(),
            location: seg(10, 10),
            min: 0,
            max: 0,
            count: 1,
        }];
        let err = validate(&nodes, 15).expect_err("segment");
        assert_eq!(err.kind(), ErrorKind::MalformedMetadata);
    }

    #[test]
    fn test_garbage_metadata() {
        let ctx = Arc::new(TypeRegistry::new());
        let err = decode(&ctx, &[0x05, 0x00, 1, 2, 3, 4, 5], Limits::default()).expect_err("garbage");
        assert_eq!(err.kind(), ErrorKind::MalformedMetadata);
    }
}
