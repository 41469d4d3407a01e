#![no_main]

use libfuzzer_sys::fuzz_target;

use apimock::config::EngineConfig;

fuzz_target!(|data: &[u8]| {
    if let Ok(yaml) = std::str::from_utf8(data) {
        if let Ok(config) = EngineConfig::from_yaml_str(yaml) {
            let _ = config.chaos_registry(Some(0));
        }
    }
});
