#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Endpoint bodies are untrusted: errors are fine, panics are bugs.
        let _ = cxml_invoice::cxml::parse_status(s);
    }
});
