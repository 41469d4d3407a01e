//! Serde adapter for human-readable durations.
//!
//! Serializes as `humantime` text (`1s 500ms`, `2s`). Accepts either that
//! text form or a bare integer number of milliseconds.

use std::time::Duration;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Millis(u64),
    Text(String),
}

/// Writes `value` as humantime text.
///
/// # Errors
///
/// Propagates serializer errors.
pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

/// Reads humantime text or integer milliseconds.
///
/// # Errors
///
/// Fails when the text is not a valid humantime duration.
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    match RawDuration::deserialize(deserializer)? {
        RawDuration::Millis(ms) => Ok(Duration::from_millis(ms)),
        RawDuration::Text(text) => parse(&text).map_err(D::Error::custom),
    }
}

/// Parses humantime text; an empty string is zero.
///
/// # Errors
///
/// Returns the humantime parser message.
pub fn parse(text: &str) -> Result<Duration, String> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(Duration::ZERO);
    }
    humantime::parse_duration(text).map_err(|e| format!("invalid duration '{text}': {e}"))
}
