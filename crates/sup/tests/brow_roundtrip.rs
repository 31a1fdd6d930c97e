// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// BSUP row stream round trips: values written by one registry and read back
// through a fresh one keep their bytes, their types and their ordering
// relative to control frames.

#![allow(clippy::float_cmp)]
#![allow(clippy::unreadable_literal)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::missing_panics_doc)]

use std::io::Cursor;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use sup::brow::{Item, Reader, ReaderConfig, Writer, WriterConfig};
use sup::compress::CompressConfig;
use sup::encoding::IpNet;
use sup::value::record;
use sup::{CancelToken, ErrorKind, Field, Limits, Type, TypeRegistry, Value};

fn write_all(values: &[Value], config: WriterConfig) -> Vec<u8> {
    let mut w = Writer::with_config(Vec::new(), config);
    for v in values {
        w.write(v).expect("write");
    }
    w.close().expect("close")
}

fn read_all(bytes: Vec<u8>, config: ReaderConfig) -> Vec<Value> {
    let reg = Arc::new(TypeRegistry::new());
    let mut r = Reader::new(reg, Cursor::new(bytes), config).expect("reader");
    let mut out = Vec::new();
    while let Some(v) = r.read().expect("read") {
        out.push(v);
    }
    out
}

fn assert_same(got: &[Value], want: &[Value]) {
    assert_eq!(got.len(), want.len());
    for (g, w) in got.iter().zip(want) {
        assert_eq!(g.bytes(), w.bytes());
        assert_eq!(g.typ().to_string(), w.typ().to_string());
        assert_eq!(g.to_string(), w.to_string());
    }
}

#[test]
fn test_primitive_union_roundtrip() {
    let reg = TypeRegistry::new();
    let values: Vec<Value> = [Value::int64(1), Value::string("x"), Value::bool(true)]
        .iter()
        .map(|a| {
            let rec = reg
                .lookup_record(vec![Field::new("a", a.typ().clone())])
                .expect("record");
            record(rec, &[Some(a.clone())]).expect("value")
        })
        .collect();

    let got = read_all(write_all(&values, WriterConfig::default()), ReaderConfig::default());
    assert_same(&got, &values);
    let ids: Vec<u32> = got.iter().map(|v| v.typ().id()).collect();
    assert!(ids[0] != ids[1] && ids[1] != ids[2] && ids[0] != ids[2]);
}

#[test]
fn test_union_field_roundtrip() {
    let reg = TypeRegistry::new();
    let u = reg
        .lookup_union(vec![Type::int64(), Type::string(), Type::bool()])
        .expect("union");
    let rec = reg.lookup_record(vec![Field::new("a", u.clone())]).expect("record");
    let values: Vec<Value> = [Value::int64(1), Value::string("x"), Value::bool(true)]
        .iter()
        .map(|m| {
            let a = Value::union(u.clone(), m).expect("union value");
            record(rec.clone(), &[Some(a)]).expect("value")
        })
        .collect();

    let got = read_all(write_all(&values, WriterConfig::default()), ReaderConfig::default());
    assert_same(&got, &values);
    let members: Vec<String> = got
        .iter()
        .map(|v| {
            v.deref("a")
                .expect("deref")
                .expect("field")
                .union_member()
                .expect("member")
                .to_string()
        })
        .collect();
    assert_eq!(members, ["1", r#""x""#, "true"]);
}

#[test]
fn test_set_canonicalization() {
    let reg = TypeRegistry::new();
    let set = reg.lookup_set(Type::int64());
    let ints = |xs: &[i64]| xs.iter().map(|&x| Value::int64(x)).collect::<Vec<_>>();
    let messy = Value::set(set.clone(), &ints(&[3, 1, 2, 1])).expect("set");
    let clean = Value::set(set, &ints(&[1, 2, 3])).expect("set");
    assert_eq!(messy.bytes(), clean.bytes());

    let got = read_all(write_all(&[messy], WriterConfig::default()), ReaderConfig::default());
    let elems: Vec<i64> = got[0]
        .elements()
        .expect("elements")
        .iter()
        .map(|v| v.as_int().expect("int"))
        .collect();
    assert_eq!(elems, [1, 2, 3]);
}

#[test]
fn test_map_keys_canonicalized() {
    let reg = TypeRegistry::new();
    let map = reg.lookup_map(Type::string(), Type::int64());
    let a = Value::map(
        map.clone(),
        &[
            (Value::string("b"), Value::int64(2)),
            (Value::string("a"), Value::int64(1)),
        ],
    )
    .expect("map");
    let b = Value::map(
        map,
        &[
            (Value::string("a"), Value::int64(1)),
            (Value::string("b"), Value::int64(2)),
        ],
    )
    .expect("map");
    assert_eq!(a.bytes(), b.bytes());
}

#[test]
fn test_named_rebinding_through_fresh_registry() {
    // [foo={x:{y:int64}}, foo={x:{abcdef:foo={x:{y:int64}}}}]
    let reg = TypeRegistry::new();
    let y = reg.lookup_record(vec![Field::new("y", Type::int64())]).expect("y");
    let inner = reg.lookup_record(vec![Field::new("x", y)]).expect("inner");
    let foo1 = reg.lookup_named("foo", inner).expect("foo1");
    let abcdef = reg
        .lookup_record(vec![Field::new("abcdef", foo1.clone())])
        .expect("abcdef");
    let outer = reg.lookup_record(vec![Field::new("x", abcdef)]).expect("outer");
    let foo2 = reg.lookup_named("foo", outer).expect("foo2");
    let u = reg.lookup_union(vec![foo1.clone(), foo2.clone()]).expect("union");
    let arr = reg.lookup_array(u.clone());

    let fresh = TypeRegistry::new();
    let translated = fresh.translate_type(&arr).expect("translate");
    assert_eq!(
        fresh.lookup_type_value(&translated).bytes(),
        reg.lookup_type_value(&arr).bytes()
    );
    let members = translated
        .inner()
        .and_then(Type::members)
        .expect("union members");
    assert_eq!(members.len(), 2);
    assert_ne!(members[0].id(), members[1].id());
    for (got, want) in members.iter().zip([&foo1, &foo2]) {
        assert_eq!(
            fresh.lookup_type_value(got).bytes(),
            reg.lookup_type_value(want).bytes()
        );
    }
    // The same value survives a BSUP stream into yet another registry.
    let leaf = record(
        reg.lookup_record(vec![Field::new("y", Type::int64())]).expect("y"),
        &[Some(Value::int64(7))],
    )
    .expect("leaf");
    let v1 = record(foo1.clone(), &[Some(leaf)]).expect("foo1 value");
    let abcdef_typ = foo2.fields().expect("fields")[0].typ.clone();
    let v2 = record(
        foo2.clone(),
        &[Some(record(abcdef_typ, &[Some(v1.clone())]).expect("abcdef value"))],
    )
    .expect("foo2 value");
    let value = Value::array(
        arr,
        &[
            Value::union(u.clone(), &v1).expect("m1"),
            Value::union(u, &v2).expect("m2"),
        ],
    )
    .expect("array");
    let got = read_all(write_all(&[value.clone()], WriterConfig::default()), ReaderConfig::default());
    assert_same(&got, &[value]);
}

#[test]
fn test_primitive_boundaries_roundtrip() {
    let net = IpNet::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 0)), 8).expect("net");
    let values = vec![
        Value::int64(0),
        Value::int64(1),
        Value::int64(-1),
        Value::int64(i64::MAX),
        Value::int64(i64::MIN),
        Value::uint64(0),
        Value::uint64(u64::MAX),
        Value::float64(0.0),
        Value::float64(-1.5),
        Value::float64(f64::MAX),
        Value::float64(f64::NAN),
        Value::bool(false),
        Value::string(""),
        Value::string("héllo"),
        Value::bytes_value(&[]),
        Value::bytes_value(&[0, 1, 2, 255]),
        Value::time(1_700_000_000_000_000_000),
        Value::duration(-5),
        Value::ip(IpAddr::V6(Ipv6Addr::LOCALHOST)),
        Value::net(net),
        Value::null(Type::int64()),
        Value::null(Type::string()),
        Value::null(Type::null()),
    ];
    let got = read_all(write_all(&values, WriterConfig::default()), ReaderConfig::default());
    assert_same(&got, &values);
    assert!(got[10].as_float().expect("float").is_nan());
    assert!(got[20].is_null());

    // Encoding is deterministic.
    assert_eq!(
        write_all(&values, WriterConfig::default()),
        write_all(&values, WriterConfig::default())
    );
}

#[test]
fn test_controls_keep_their_place() {
    let reg = TypeRegistry::new();
    let rec = reg.lookup_record(vec![Field::new("n", Type::int64())]).expect("record");
    let mut w = Writer::new(Vec::new());
    let row = |n: i64| record(rec.clone(), &[Some(Value::int64(n))]).expect("value");
    w.write(&row(1)).expect("write");
    w.write_control(1, b"first").expect("control");
    w.write(&row(2)).expect("write");
    w.end_stream().expect("eos");
    // The type table starts over; the record type is defined again.
    w.write(&row(3)).expect("write");
    w.write_control(2, b"second").expect("control");
    let bytes = w.close().expect("close");

    let mut r = Reader::new(
        Arc::new(TypeRegistry::new()),
        Cursor::new(bytes),
        ReaderConfig::default().threads(1),
    )
    .expect("reader");
    let mut seen = Vec::new();
    while let Some(item) = r.pull(false).expect("pull") {
        match item {
            Item::Batch(b) => seen.extend(b.into_values().iter().map(ToString::to_string)),
            Item::Control(c) => seen.push(format!("control {} {:?}", c.format, c.bytes)),
            Item::ControlError(e) => panic!("control error: {}", e),
        }
    }
    assert_eq!(
        seen,
        [
            "{n:1}".to_string(),
            format!("control 1 {:?}", b"first".to_vec()),
            "{n:2}".to_string(),
            "{n:3}".to_string(),
            format!("control 2 {:?}", b"second".to_vec()),
        ]
    );
}

#[test]
fn test_compressed_parallel_stream() {
    let reg = TypeRegistry::new();
    let rec = reg
        .lookup_record(vec![Field::new("i", Type::int64()), Field::new("s", Type::string())])
        .expect("record");
    let values: Vec<Value> = (0..5000)
        .map(|i| {
            record(
                rec.clone(),
                &[Some(Value::int64(i)), Some(Value::string(&format!("row {}", i % 17)))],
            )
            .expect("value")
        })
        .collect();
    let bytes = write_all(
        &values,
        WriterConfig::default()
            .compress(CompressConfig::default())
            .frame_threshold(4096),
    );
    let got = read_all(bytes, ReaderConfig::default().threads(4).high_water(2));
    assert_same(&got, &values);
}

#[test]
fn test_oversized_frame_rejected() {
    // Values frame announcing 2048 payload bytes with none present.
    let bytes = vec![0x10, 0x80, 0x01];
    let limits = Limits {
        max_frame_size: 1024,
        ..Limits::default()
    };
    let reg = Arc::new(TypeRegistry::new());
    let mut r = Reader::new(reg, Cursor::new(bytes), ReaderConfig::default().limits(limits))
        .expect("reader");
    let err = r.read().expect_err("too large");
    assert_eq!(err.kind(), ErrorKind::FrameTooLarge);
    assert!(r.read().expect("after error").is_none());
}

#[test]
fn test_truncated_stream() {
    let bytes = write_all(&[Value::string("abcdefgh")], WriterConfig::default());
    let short = bytes[..bytes.len() - 3].to_vec();
    let reg = Arc::new(TypeRegistry::new());
    let mut r = Reader::new(reg, Cursor::new(short), ReaderConfig::default()).expect("reader");
    let err = r.read().expect_err("truncated");
    assert_eq!(err.kind(), ErrorKind::Truncated);
}

#[test]
fn test_cancel_is_observed_promptly() {
    let values: Vec<Value> = (0..20_000).map(Value::int64).collect();
    let bytes = write_all(&values, WriterConfig::default().frame_threshold(1024));
    let token = CancelToken::new();
    let reg = Arc::new(TypeRegistry::new());
    let mut r = Reader::new(
        reg,
        Cursor::new(bytes),
        ReaderConfig::default().threads(2).cancel(token.clone()),
    )
    .expect("reader");
    assert!(r.read().expect("first").is_some());
    token.cancel();
    let mut after = 0usize;
    let err = loop {
        match r.read() {
            Ok(Some(_)) => after += 1,
            Ok(None) => panic!("stream ended without observing cancel"),
            Err(e) => break e,
        }
    };
    assert_eq!(err.kind(), ErrorKind::Canceled);
    // At most the values already decoded into the current frame.
    assert!(after < 1024, "{} values after cancel", after);
}
