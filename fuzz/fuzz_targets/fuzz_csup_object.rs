// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::sync::Arc;
use sup::csup::Object;
use sup::{Limits, Projection, TypeRegistry};

fuzz_target!(|data: &[u8]| {
    let limits = Limits {
        max_meta_size: 1 << 20,
        max_data_size: 1 << 20,
        ..Limits::default()
    };
    let Ok(obj) = Object::open_at(Arc::new(data.to_vec()), 0, limits, 16) else {
        return;
    };
    let reg = Arc::new(TypeRegistry::new());
    for proj in [Projection::all(), Projection::from_paths(["a", "b.c"])] {
        if let Ok(v) = obj.project(&reg, &proj) {
            let _ = v.values();
        }
    }
});
