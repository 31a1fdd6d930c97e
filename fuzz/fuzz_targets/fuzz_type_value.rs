// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![no_main]

use libfuzzer_sys::fuzz_target;
use sup::TypeRegistry;

fuzz_target!(|data: &[u8]| {
    let reg = TypeRegistry::new();
    if let Ok(t) = reg.lookup_by_value(data) {
        // Anything that decodes must encode back to a decodable type-value.
        let tv = reg.lookup_type_value(&t);
        let other = TypeRegistry::new();
        let back = other
            .lookup_by_value(tv.bytes().unwrap_or_default())
            .expect("re-decode type-value");
        assert_eq!(other.lookup_type_value(&back).bytes(), tv.bytes());
    }
});
