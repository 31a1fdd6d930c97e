// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;
use std::sync::Arc;
use sup::brow::{Reader, ReaderConfig};
use sup::{Limits, TypeRegistry};

fuzz_target!(|data: &[u8]| {
    // Small limits so crafted lengths fail fast instead of allocating.
    let limits = Limits {
        max_frame_size: 1 << 20,
        max_uncompressed_size: 1 << 20,
        ..Limits::default()
    };
    let reg = Arc::new(TypeRegistry::new());
    let config = ReaderConfig::default().threads(1).limits(limits);
    let Ok(mut r) = Reader::new(reg, Cursor::new(data.to_vec()), config) else {
        return;
    };
    while let Ok(Some(v)) = r.read() {
        let _ = v.to_string();
    }
});
