// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// CSUP objects end to end: shred a value stream to disk, open it back through
// a counting reader and check projection results and the bytes they cost.

#![allow(clippy::float_cmp)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::missing_panics_doc)]

use std::fs::File;
use std::sync::Arc;
use sup::compress::{CompressConfig, Format};
use sup::csup::{
    metadata, CountingReaderAt, Header, Node, Object, Reader, ReaderAt, ReaderConfig, Segment,
    VectorReader, Writer, WriterConfig,
};
use sup::value::record;
use sup::{CancelToken, ErrorKind, Field, Limits, Projection, Type, TypeRegistry, Value};

fn write_bytes(values: &[Value], config: WriterConfig) -> Vec<u8> {
    let mut w = Writer::with_config(Vec::new(), config);
    for v in values {
        w.write(v).expect("write");
    }
    w.close().expect("close")
}

fn write_file(values: &[Value], config: WriterConfig) -> tempfile::NamedTempFile {
    let tmp = tempfile::NamedTempFile::new().expect("tempfile");
    let file = tmp.reopen().expect("reopen");
    let mut w = Writer::with_config(file, config);
    for v in values {
        w.write(v).expect("write");
    }
    w.close().expect("close");
    tmp
}

fn read_values(src: Arc<dyn ReaderAt>, config: ReaderConfig) -> Vec<Value> {
    Reader::new(Arc::new(TypeRegistry::new()), src, config)
        .expect("reader")
        .map(|v| v.expect("value"))
        .collect()
}

/// Bytes of every segment held by nodes of the given kinds.
fn segment_bytes(obj: &Object, kinds: &[&str]) -> u64 {
    obj.metadata()
        .iter()
        .filter(|n| kinds.contains(&n.kind_name()))
        .flat_map(Node::segments)
        .map(|s| s.mem_length)
        .sum()
}

#[test]
fn test_shred_and_project_one_column() {
    let reg = TypeRegistry::new();
    let rec = reg
        .lookup_record(vec![
            Field::new("ts", Type::time()),
            Field::new("host", Type::string()),
            Field::new("load", Type::float64()),
        ])
        .expect("record");
    let hosts = ["alpha", "beta", "gamma", "delta"];
    let loads: Vec<f64> = (0..10_000).map(|i| f64::from(i % 977) / 7.0).collect();
    let values: Vec<Value> = loads
        .iter()
        .enumerate()
        .map(|(i, &load)| {
            record(
                rec.clone(),
                &[
                    Some(Value::time(1_700_000_000_000_000_000 + i as i64 * 1_000_000)),
                    Some(Value::string(hosts[i % hosts.len()])),
                    Some(Value::float64(load)),
                ],
            )
            .expect("value")
        })
        .collect();
    let tmp = write_file(&values, WriterConfig::default());

    let file = File::open(tmp.path()).expect("open");
    let src = Arc::new(CountingReaderAt::new(file));
    let mut r = VectorReader::new(
        Arc::new(TypeRegistry::new()),
        Arc::clone(&src) as Arc<dyn ReaderAt>,
        ReaderConfig::default(),
    )
    .expect("reader");
    let obj = r.next_object().expect("next").expect("one object");
    let opened = src.bytes_read();
    let v = obj
        .project(r.registry(), &Projection::from_paths(["load"]))
        .expect("project");
    assert_eq!(v.len(), 10_000);
    let read = src.bytes_read() - opened;
    let bound = segment_bytes(&obj, &["Float", "Nulls", "Record"]);
    assert!(read <= bound, "read {} bytes, float and run segments hold {}", read, bound);
    assert!(read < obj.header().data_size);

    let got: Vec<f64> = v
        .values()
        .expect("rows")
        .iter()
        .map(|row| {
            row.deref("load")
                .expect("deref")
                .expect("load field")
                .as_float()
                .expect("float")
        })
        .collect();
    assert_eq!(got, loads);
    assert!(r.next_object().expect("next").is_none());
}

#[test]
fn test_optional_field_nones_become_missing() {
    let reg = TypeRegistry::new();
    let rec = reg
        .lookup_record(vec![Field::new("a", Type::int64()), Field::opt("b", Type::int64())])
        .expect("record");
    let values: Vec<Value> = (0..1000i64)
        .map(|i| {
            let b = (i % 3 != 2).then(|| Value::int64(i * 10));
            record(rec.clone(), &[Some(Value::int64(i)), b]).expect("value")
        })
        .collect();
    let src: Arc<dyn ReaderAt> = Arc::new(write_bytes(&values, WriterConfig::default()));
    let rows = read_values(
        src,
        ReaderConfig::default().projection(Projection::from_paths(["b"])),
    );
    assert_eq!(rows.len(), 1000);
    for (i, row) in rows.iter().enumerate() {
        let b = row.deref("b").expect("deref");
        if i % 3 == 2 {
            assert!(b.is_none(), "row {} should be missing, got {:?}", i, b);
        } else {
            let b = b.expect("present");
            assert_eq!(b.as_int().expect("int"), i as i64 * 10);
        }
    }
}

#[test]
fn test_non_opt_field_is_not_wrapped() {
    let reg = TypeRegistry::new();
    let rec = reg
        .lookup_record(vec![Field::new("a", Type::int64()), Field::new("b", Type::int64())])
        .expect("record");
    let values: Vec<Value> = (0..600i64)
        .map(|i| record(rec.clone(), &[Some(Value::int64(i)), Some(Value::int64(-i))]).expect("value"))
        .collect();
    let obj = Object::open(Arc::new(write_bytes(&values, WriterConfig::default()))).expect("open");
    assert!(!obj
        .metadata()
        .iter()
        .any(|n| matches!(n, Node::Dynamic { .. })));
    let v = obj
        .project(&Arc::new(TypeRegistry::new()), &Projection::from_paths(["b"]))
        .expect("project");
    for (i, row) in v.values().expect("rows").iter().enumerate() {
        assert_eq!(row.to_string(), format!("{{b:{}}}", -(i as i64)));
    }
}

#[test]
fn test_random_strings_skip_dictionary() {
    let reg = TypeRegistry::new();
    let rec = reg
        .lookup_record(vec![Field::new("k", Type::string())])
        .expect("record");
    let mut rng = fastrand::Rng::with_seed(0x5eed);
    let values: Vec<Value> = (0..10_000)
        .map(|_| {
            let k: String = (0..256).map(|_| rng.alphanumeric()).collect();
            record(rec.clone(), &[Some(Value::string(&k))]).expect("value")
        })
        .collect();
    let bytes = write_bytes(&values, WriterConfig::default());
    let obj = Object::open(Arc::new(bytes.clone())).expect("open");
    assert!(!obj.metadata().iter().any(|n| matches!(n, Node::Dict { .. })));
    assert!(obj.metadata().iter().any(|n| matches!(n, Node::Bytes { .. })));

    let got = read_values(Arc::new(bytes), ReaderConfig::default());
    assert_eq!(got.len(), values.len());
    assert_eq!(got[9_999].bytes(), values[9_999].bytes());
}

#[test]
fn test_repeated_strings_use_dictionary() {
    let reg = TypeRegistry::new();
    let rec = reg
        .lookup_record(vec![Field::new("k", Type::string())])
        .expect("record");
    let values: Vec<Value> = (0..2_000)
        .map(|i| record(rec.clone(), &[Some(Value::string(["x", "y", "z"][i % 3]))]).expect("value"))
        .collect();
    let bytes = write_bytes(&values, WriterConfig::default());
    let obj = Object::open(Arc::new(bytes.clone())).expect("open");
    assert!(obj.metadata().iter().any(|n| matches!(n, Node::Dict { .. })));
    let got = read_values(Arc::new(bytes), ReaderConfig::default());
    for (g, w) in got.iter().zip(&values) {
        assert_eq!(g.bytes(), w.bytes());
    }
}

#[test]
fn test_mixed_stream_full_roundtrip() {
    let reg = TypeRegistry::new();
    let point = reg
        .lookup_record(vec![Field::new("x", Type::int64()), Field::new("y", Type::int64())])
        .expect("point");
    let tags = reg.lookup_set(Type::string());
    let attrs = reg.lookup_map(Type::string(), Type::float64());
    let color = reg
        .lookup_enum(vec!["red".into(), "green".into(), "blue".into()])
        .expect("enum");
    let mut values = Vec::new();
    for i in 0..900i64 {
        let v = match i % 6 {
            0 => record(point.clone(), &[Some(Value::int64(i)), Some(Value::int64(i * 2))])
                .expect("point"),
            1 => Value::string(&format!("line {}", i)),
            2 => Value::set(tags.clone(), &[Value::string("b"), Value::string("a")]).expect("set"),
            3 => Value::map(attrs.clone(), &[(Value::string("w"), Value::float64(i as f64))])
                .expect("map"),
            4 => Value::enum_index(color.clone(), (i % 3) as usize).expect("enum"),
            _ => Value::null(point.clone()),
        };
        values.push(v);
    }
    // A couple of rare types stay below the columnar threshold.
    values.push(Value::bool(true));
    values.push(Value::uint64(7));

    let src: Arc<dyn ReaderAt> = Arc::new(write_bytes(
        &values,
        WriterConfig::default()
            .object_values(400)
            .bsup_threshold(50)
            .compress(CompressConfig::default()),
    ));
    let got = read_values(src, ReaderConfig::default().cache_pages(0));
    assert_eq!(got.len(), values.len());
    for (i, (g, w)) in got.iter().zip(&values).enumerate() {
        assert_eq!(g.bytes(), w.bytes(), "row {}", i);
        assert_eq!(g.to_string(), w.to_string(), "row {}", i);
    }
}

#[test]
fn test_projection_of_absent_path() {
    let reg = TypeRegistry::new();
    let rec = reg
        .lookup_record(vec![Field::new("a", Type::int64())])
        .expect("record");
    let values: Vec<Value> = (0..300i64)
        .map(|i| record(rec.clone(), &[Some(Value::int64(i))]).expect("value"))
        .collect();
    let src: Arc<dyn ReaderAt> = Arc::new(write_bytes(&values, WriterConfig::default()));
    let rows = read_values(
        src,
        ReaderConfig::default().projection(Projection::from_paths(["a", "nope"])),
    );
    assert_eq!(rows.len(), 300);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row.deref("a").expect("a").expect("a").as_int().expect("int"), i as i64);
        assert!(row.deref("nope").expect("nope").expect("field").is_missing());
    }
}

#[test]
fn test_oversized_header_rejected() {
    let values: Vec<Value> = (0..300).map(Value::int64).collect();
    let mut bytes = write_bytes(&values, WriterConfig::default());
    bytes[8..16].copy_from_slice(&u64::MAX.to_le_bytes());
    let err = Object::open(Arc::new(bytes.clone())).expect_err("meta size");
    assert_eq!(err.kind(), ErrorKind::MalformedHeader);

    let limits = Limits {
        max_data_size: 16,
        ..Limits::default()
    };
    let good = write_bytes(&values, WriterConfig::default());
    let mut r = VectorReader::new(
        Arc::new(TypeRegistry::new()),
        Arc::new(good),
        ReaderConfig::default().limits(limits),
    )
    .expect("reader");
    assert_eq!(r.pull().expect_err("data size").kind(), ErrorKind::MalformedHeader);
}

#[test]
fn test_truncated_source() {
    let values: Vec<Value> = (0..300).map(Value::int64).collect();
    let bytes = write_bytes(&values, WriterConfig::default());
    let short = bytes[..bytes.len() / 2].to_vec();
    let mut r = VectorReader::new(
        Arc::new(TypeRegistry::new()),
        Arc::new(short),
        ReaderConfig::default(),
    )
    .expect("reader");
    assert_eq!(r.pull().expect_err("truncated").kind(), ErrorKind::Truncated);
}

#[test]
fn test_cancel_before_next_object() {
    let values: Vec<Value> = (0..3000).map(Value::int64).collect();
    let src: Arc<dyn ReaderAt> = Arc::new(write_bytes(
        &values,
        WriterConfig::default().object_values(1000),
    ));
    let token = CancelToken::new();
    let mut r = Reader::new(
        Arc::new(TypeRegistry::new()),
        src,
        ReaderConfig::default().cancel(token.clone()),
    )
    .expect("reader");
    let mut seen = 0usize;
    let err = loop {
        match r.read() {
            Ok(Some(_)) => {
                seen += 1;
                if seen == 10 {
                    token.cancel();
                }
            }
            Ok(None) => panic!("stream ended without observing cancel"),
            Err(e) => break e,
        }
    };
    assert_eq!(err.kind(), ErrorKind::Canceled);
    assert!(seen <= 1000, "{} values after cancel", seen);
}

#[test]
fn test_concurrent_projections_share_object() {
    let reg = TypeRegistry::new();
    let rec = reg
        .lookup_record(vec![Field::new("a", Type::int64()), Field::new("b", Type::string())])
        .expect("record");
    let values: Vec<Value> = (0..2000i64)
        .map(|i| {
            record(rec.clone(), &[Some(Value::int64(i)), Some(Value::string(&i.to_string()))])
                .expect("value")
        })
        .collect();
    let bytes = write_bytes(&values, WriterConfig::default());
    let obj = Arc::new(Object::open(Arc::new(bytes)).expect("open"));
    let out = Arc::new(TypeRegistry::new());
    let handles: Vec<_> = ["a", "b", "a", "b"]
        .into_iter()
        .map(|path| {
            let obj = Arc::clone(&obj);
            let out = Arc::clone(&out);
            std::thread::spawn(move || {
                obj.project(&out, &Projection::from_paths([path]))
                    .expect("project")
                    .len()
            })
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().expect("join"), 2000);
    }
    assert!(obj.shadows_touched() > 0);
    assert!(obj.cache_stats().misses > 0);
}

#[test]
fn test_bsup_count_bounded_by_trailing_section() {
    // One BSUP child claiming 2^58 values over a one-byte trailing stream.
    let nodes = vec![
        Node::Bsup { count: 1 << 58 },
        Node::Dynamic {
            length: 1,
            tags: Segment {
                offset: 0,
                mem_length: 1,
                length: 1,
                format: Format::None,
            },
            values: vec![0],
        },
    ];
    let meta = metadata::encode(&nodes, CompressConfig::none()).expect("metadata");
    let mut bytes = Header::new(meta.len() as u64, 1, 1).to_bytes().to_vec();
    bytes.extend_from_slice(&meta);
    bytes.push(0x00);
    bytes.push(0xff);
    let err = Object::open(Arc::new(bytes))
        .err()
        .expect("bsup count exceeds trailing bytes");
    assert_eq!(err.kind(), ErrorKind::MalformedMetadata);
}
