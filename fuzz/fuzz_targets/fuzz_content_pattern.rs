#![no_main]

use libfuzzer_sys::fuzz_target;

use apimock::types::{extract_assertion_pattern, unmarshal_array_or_object, validate_regex_map};

fuzz_target!(|data: &[u8]| {
    let Ok(pattern) = extract_assertion_pattern(data) else {
        return;
    };
    if pattern.is_empty() {
        return;
    }
    let regex: std::collections::BTreeMap<String, String> =
        serde_json::from_str(&pattern).expect("derived pattern is a JSON map");
    if let Ok(body) = unmarshal_array_or_object(data) {
        let _ = validate_regex_map(body.as_ref(), &regex);
    }
});
