#![no_main]

use libfuzzer_sys::fuzz_target;
use serde_json::{Map, Value, json};

use apimock::assertion::{BuiltinEvaluator, TemplateEvaluator, normalize_assertion};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let mut params = Map::new();
    params.insert("status".into(), json!(200));
    params.insert("contents".into(), json!({"items": [{"id": 1}, {"id": 2}]}));
    params.insert("_RequestCount".into(), Value::from(3));

    let evaluator = BuiltinEvaluator::new();
    let _ = evaluator.evaluate("fuzz", text, &params);
    let _ = evaluator.evaluate("fuzz", &normalize_assertion(text), &params);
});
