#![no_main]

use cxml_invoice::core::{Value, iso_date, parse_date};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let value = Value::from(s);
        if let Some(parsed) = parse_date(&value) {
            let _ = parsed.to_iso();
            let _ = parsed.date();
        }
        assert!(iso_date(&value, Some("fallback")).is_some());
    }
});
