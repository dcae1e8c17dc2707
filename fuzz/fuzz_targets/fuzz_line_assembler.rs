//! Fuzz target: `LineAssembler::push`
//!
//! Feeds arbitrary serial bytes one at a time.  Lines handed out must be
//! non-empty, free of terminators and within the line capacity.
//!
//! cargo fuzz run fuzz_line_assembler

#![no_main]

use libfuzzer_sys::fuzz_target;
use smartcam::adapters::serial::{LINE_CAPACITY, LineAssembler};

fuzz_target!(|data: &[u8]| {
    let mut assembler = LineAssembler::new();
    for &b in data {
        if let Some(line) = assembler.push(b) {
            assert!(!line.is_empty());
            assert!(!line.contains(['\r', '\n']));
            // Lossy UTF-8 may widen invalid bytes to U+FFFD (3 bytes each).
            assert!(line.len() <= LINE_CAPACITY * 3);
        }
        assert!(assembler.pending() <= LINE_CAPACITY);
    }

    // Abandoning mid-line must not leak bytes into the next line.
    assembler.discard();
    assert_eq!(assembler.pending(), 0);
});
