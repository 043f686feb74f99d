//! Fuzz target for schema scanning.
//!
//! Arbitrary bytes (including invalid UTF-8 and odd line endings) must never
//! panic the scanner, and every resolved field name must be a single token.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

use schema_field_counts::scanner::SchemaScanner;

#[derive(Arbitrary, Debug)]
struct ScanInput {
    schema: Vec<u8>,
    marker: String,
    field_token: String,
}

fuzz_target!(|input: ScanInput| {
    let scanners = [
        SchemaScanner::default(),
        SchemaScanner::new(input.marker, input.field_token),
    ];
    for scanner in &scanners {
        for declaration in scanner.scan(Cursor::new(&input.schema)) {
            let Ok(declaration) = declaration else { break };
            assert!(!declaration.field_name.contains(char::is_whitespace));
        }
    }
});
