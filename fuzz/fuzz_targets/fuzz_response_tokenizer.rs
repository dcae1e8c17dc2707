//! Fuzz target: modem reply parsers
//!
//! Treats the input as one line of modem output and runs every field
//! parser over it.  None may panic; accepted values must be in range.
//!
//! cargo fuzz run fuzz_response_tokenizer

#![no_main]

use libfuzzer_sys::fuzz_target;
use smartcam::modem::response;
use smartcam::ota::version::{VERSION_LEN, Version};

fuzz_target!(|data: &[u8]| {
    if let Ok(v) = Version::from_body(data) {
        assert_eq!(v.as_str().len(), VERSION_LEN);
    }

    let Ok(line) = core::str::from_utf8(data) else {
        return;
    };
    let _ = response::fields(line, "+CFTPSPUTFILE:");
    let _ = response::exact_fields::<3>(line, "+HTTPACTION:");
    let _ = response::http_read_len(line);
    let _ = response::number::<u16>(line);
});
