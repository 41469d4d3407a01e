#![no_main]

use libfuzzer_sys::fuzz_target;

use apimock::path::PathMatcher;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    // first line is the template, the rest the request path
    let (template, path) = text.split_once('\n').unwrap_or((text, "/"));
    if let Ok(matcher) = PathMatcher::compile(template) {
        if let Some(vars) = matcher.captures(path) {
            assert!(vars.len() <= matcher.names().len());
        }
    }
});
