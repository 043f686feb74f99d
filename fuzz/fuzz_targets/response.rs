//! Fuzz target for search response decoding.
//!
//! Whatever the backend sends, extraction returns a count or a typed error.

#![no_main]

use libfuzzer_sys::fuzz_target;

use schema_field_counts::query::extract_count;

fuzz_target!(|data: &[u8]| {
    if let Ok(body) = std::str::from_utf8(data) {
        let _ = extract_count(body);
    }
});
