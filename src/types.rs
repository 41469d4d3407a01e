//! Type tags and structural content patterns.
//!
//! Scenario files mark literal samples and derived regexes with type
//! prefixes (`__string__`, `__number__`, ...). This module strips those
//! markers, derives field→regex patterns from sample bodies, and validates
//! live bodies against such patterns.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// Prefix for numeric patterns.
pub const PREFIX_TYPE_NUMBER: &str = "__number__";
/// Prefix for boolean patterns.
pub const PREFIX_TYPE_BOOLEAN: &str = "__boolean__";
/// Prefix for string patterns.
pub const PREFIX_TYPE_STRING: &str = "__string__";
/// Prefix for literal example values.
pub const PREFIX_TYPE_EXAMPLE: &str = "__example__";
/// Prefix for object patterns.
pub const PREFIX_TYPE_OBJECT: &str = "__object__";
/// Prefix for array patterns.
pub const PREFIX_TYPE_ARRAY: &str = "__array__";

/// Pattern for unsigned integers.
pub const UINT_PREFIX_REGEX: &str = r"__number__\d{1,10}";
/// Pattern for signed integers.
pub const INT_PREFIX_REGEX: &str = r"__number__[+-]?\d{1,10}";
/// Pattern for decimals.
pub const NUMBER_PREFIX_REGEX: &str = r"__number__[+-]?((\d{1,10}(\.\d{1,5})?)|(\.\d{1,10}))";
/// Pattern for booleans.
pub const BOOLEAN_PREFIX_REGEX: &str = "__boolean__(false|true)";
/// Any word.
pub const ANY_WORD_REGEX: &str = r"\w+";
/// Anything non-empty.
pub const WILD_REGEX: &str = ".+";

/// Derived regexes longer than this collapse to [`WILD_REGEX`].
const MAX_DERIVED_REGEX_LEN: usize = 128;

const MIN_MULTIPLIER: usize = 1;
const MAX_MULTIPLIER: usize = 2;

static TYPE_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("(__number__|__boolean__|__example__|__string__|__object__|__array__)")
        .expect("valid regex")
});

/// Removes every type marker from a literal or pattern.
#[must_use]
pub fn strip_type_tags(value: &str) -> String {
    TYPE_TAG_RE.replace_all(value, "").into_owned()
}

/// Why a body failed its structural content pattern.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegexMapError {
    /// A field value did not satisfy its regex
    #[error("key '{key}' - value '{value}' didn't match regex '{pattern}'")]
    Mismatch {
        /// Dotted field path
        key: String,
        /// Live value
        value: String,
        /// Regex after tag stripping
        pattern: String,
    },

    /// A declared regex does not compile
    #[error("key '{key}' has invalid regex '{pattern}': {message}")]
    InvalidRegex {
        /// Dotted field path
        key: String,
        /// Regex after tag stripping
        pattern: String,
        /// Compiler message
        message: String,
    },
}

/// Parses a body as a JSON object or array, falling back to a YAML mapping.
///
/// Blank input yields `Ok(None)`.
///
/// # Errors
///
/// Returns a message when the bytes are neither JSON nor a YAML mapping.
pub fn unmarshal_array_or_object(bytes: &[u8]) -> Result<Option<Value>, String> {
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return serde_json::from_str(trimmed)
            .map(Some)
            .map_err(|e| format!("failed to unmarshal object/array: {e}"));
    }
    serde_yaml::from_str::<Map<String, Value>>(trimmed)
        .map(|m| Some(Value::Object(m)))
        .map_err(|e| format!("failed to unmarshal map: {e}"))
}

/// Replaces every leaf of a parsed body with a type-tagged regex.
#[must_use]
pub fn extract_types(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Bool(_) => Value::String(BOOLEAN_PREFIX_REGEX.to_string()),
        Value::Number(n) => {
            let integral = n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0);
            if n.is_u64() && !n.is_i64() {
                Value::String(UINT_PREFIX_REGEX.to_string())
            } else if integral {
                Value::String(INT_PREFIX_REGEX.to_string())
            } else {
                Value::String(NUMBER_PREFIX_REGEX.to_string())
            }
        }
        Value::String(s) if s.is_empty() => Value::String(format!(
            "{PREFIX_TYPE_STRING}[a-z]{{{},{}}}",
            1,
            MIN_MULTIPLIER * 10
        )),
        Value::String(s) => Value::String(format!("{PREFIX_TYPE_STRING}{}", value_to_regex(s))),
        Value::Array(items) => Value::Array(items.iter().map(extract_types).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), extract_types(v)))
                .collect(),
        ),
    }
}

/// Derives a loose regex describing the shape of a sample string.
///
/// Runs of letters become `\w+`, runs of digits become bounded `\d{m,n}`
/// (with an optional fraction), and separators are kept.
#[must_use]
pub fn value_to_regex(sample: &str) -> String {
    let mut out = String::new();
    let mut negative = false;
    let mut digits = 0usize;
    let mut fraction = 0usize;
    let mut alphabets = 0usize;
    let mut decimal = false;

    for c in sample.chars() {
        if c.is_ascii_digit() {
            push_alphabets(alphabets, &mut out);
            alphabets = 0;
            if decimal {
                fraction += 1;
            } else {
                digits += 1;
            }
        } else if c == '.' {
            if digits > 0 {
                decimal = true;
            } else {
                push_alphabets(alphabets, &mut out);
                alphabets = 0;
                out.push_str(".?");
            }
        } else if matches!(c, '@' | '%' | '(' | ')' | '#' | '$' | '*') {
            push_alphabets(alphabets, &mut out);
            push_digits(digits, fraction, negative, decimal, &mut out);
            alphabets = 0;
            digits = 0;
            fraction = 0;
            negative = false;
            decimal = false;
            out.push(c);
        } else if c == '-' {
            if digits == 0 && alphabets == 0 {
                negative = true;
            } else {
                if digits > 0 {
                    push_digits(digits, fraction, negative, decimal, &mut out);
                    digits = 0;
                    fraction = 0;
                    negative = false;
                    decimal = false;
                } else {
                    push_alphabets(alphabets, &mut out);
                    alphabets = 0;
                }
                out.push_str("[-]");
            }
        } else {
            push_digits(digits, fraction, negative, decimal, &mut out);
            digits = 0;
            fraction = 0;
            negative = false;
            decimal = false;
            alphabets += 1;
        }
    }
    push_alphabets(alphabets, &mut out);
    push_digits(digits, fraction, negative, decimal, &mut out);
    out
}

fn push_alphabets(alphabets: usize, out: &mut String) {
    if alphabets > 0 {
        out.push_str(ANY_WORD_REGEX);
    }
}

fn push_digits(digits: usize, fraction: usize, negative: bool, decimal: bool, out: &mut String) {
    if digits == 0 {
        return;
    }
    if negative {
        out.push_str("[+-]?");
    }
    out.push_str(&format!(
        r"\d{{{},{}}}",
        MIN_MULTIPLIER * digits,
        MAX_MULTIPLIER * digits
    ));
    if decimal {
        out.push_str(&format!(
            r"\.\d{{{},{}}}",
            MIN_MULTIPLIER * fraction,
            MAX_MULTIPLIER * fraction
        ));
    }
}

/// Flattens a type-extracted body into `dotted.key → regex`.
///
/// Array elements share their parent key and are merged as alternatives.
#[must_use]
pub fn flat_regex_map(value: &Value) -> BTreeMap<String, String> {
    let mut regex = BTreeMap::new();
    flatten_into(value, &mut regex, "", false);
    for (key, pattern) in &mut regex {
        if pattern.len() > MAX_DERIVED_REGEX_LEN {
            debug!(key = %key, "simplifying long regex");
            *pattern = WILD_REGEX.to_string();
        }
    }
    regex
}

fn flatten_into(value: &Value, regex: &mut BTreeMap<String, String>, prefix: &str, array: bool) {
    match value {
        Value::String(s) => add_flat_value(regex, prefix, "", s, array),
        Value::Object(map) => {
            for (k, v) in map {
                flatten_into(v, regex, &flat_key(prefix, k), false);
            }
        }
        Value::Array(items) => {
            for item in items {
                flatten_into(item, regex, prefix, true);
            }
        }
        Value::Null => {}
        other => debug!(value = %other, "cannot flatten untyped value"),
    }
}

fn flat_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else if key.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn add_flat_value(
    regex: &mut BTreeMap<String, String>,
    prefix: &str,
    key: &str,
    value: &str,
    array: bool,
) {
    let full_key = flat_key(prefix, key);
    // mixed word/digit classes are too loose to be useful
    let value = if value.contains(r"\w") && (value.contains(r"\d") || value.contains("[0-9]")) {
        format!("{PREFIX_TYPE_STRING}{WILD_REGEX}")
    } else {
        value.to_string()
    };
    let array_prefix = if array { PREFIX_TYPE_ARRAY } else { "" };

    match regex.get(&full_key) {
        None => {
            regex.insert(full_key, format!("{array_prefix}({value})"));
        }
        Some(old) => {
            let start = old.find('(').map_or(0, |i| i + 1);
            let inner = &old[start..old.len().saturating_sub(1).max(start)];
            if !inner.split('|').any(|part| part == value) {
                let merged = format!("{array_prefix}({inner}|{value})");
                regex.insert(full_key, merged);
            }
        }
    }
}

/// Derives the JSON-encoded `field → regex` content pattern for a body.
///
/// Blank bodies yield an empty pattern.
///
/// # Errors
///
/// Returns a message when the body cannot be parsed structurally.
pub fn extract_assertion_pattern(body: &[u8]) -> Result<String, String> {
    let Some(parsed) = unmarshal_array_or_object(body)? else {
        return Ok(String::new());
    };
    let flat = flat_regex_map(&extract_types(&parsed));
    serde_json::to_string(&flat).map_err(|e| e.to_string())
}

/// Lists dotted object field paths of a body, descending at most `max_depth`
/// levels. Array elements contribute their fields under the array's key.
///
/// # Errors
///
/// Returns a message when the body cannot be parsed structurally.
pub fn extract_top_level_fields(body: &[u8], max_depth: usize) -> Result<Vec<String>, String> {
    let Some(parsed) = unmarshal_array_or_object(body)? else {
        return Ok(Vec::new());
    };
    let mut fields = Vec::new();
    collect_fields(&parsed, "", max_depth, &mut fields);
    fields.sort();
    fields.dedup();
    Ok(fields)
}

fn collect_fields(value: &Value, prefix: &str, depth: usize, out: &mut Vec<String>) {
    if depth == 0 {
        return;
    }
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let key = flat_key(prefix, k);
                out.push(key.clone());
                collect_fields(v, &key, depth - 1, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_fields(item, prefix, depth, out);
            }
        }
        _ => {}
    }
}

/// Validates a parsed body against a `dotted.key → regex` map.
///
/// Fields without a declared regex pass. A missing body passes.
///
/// # Errors
///
/// Returns the first field whose value fails its regex.
pub fn validate_regex_map(
    value: Option<&Value>,
    regex: &BTreeMap<String, String>,
) -> Result<(), RegexMapError> {
    match value {
        Some(v) => validate_value(v, regex, ""),
        None => Ok(()),
    }
}

fn validate_value(
    value: &Value,
    regex: &BTreeMap<String, String>,
    prefix: &str,
) -> Result<(), RegexMapError> {
    match value {
        Value::Null => Ok(()),
        Value::Object(map) => map
            .iter()
            .try_for_each(|(k, v)| validate_value(v, regex, &flat_key(prefix, k))),
        Value::Array(items) => items
            .iter()
            .try_for_each(|v| validate_value(v, regex, prefix)),
        Value::String(s) => match_field(s, regex, prefix),
        other => match_field(&other.to_string(), regex, prefix),
    }
}

fn match_field(
    value: &str,
    regex: &BTreeMap<String, String>,
    key: &str,
) -> Result<(), RegexMapError> {
    let Some(pattern) = regex.get(key).filter(|p| !p.is_empty()) else {
        return Ok(());
    };
    let pattern = strip_type_tags(pattern);
    let re = Regex::new(&pattern).map_err(|e| RegexMapError::InvalidRegex {
        key: key.to_string(),
        pattern: pattern.clone(),
        message: e.to_string(),
    })?;
    if re.is_match(value) {
        Ok(())
    } else {
        Err(RegexMapError::Mismatch {
            key: key.to_string(),
            value: value.to_string(),
            pattern,
        })
    }
}

/// Literal-or-regex comparison used by the matcher and assertions.
///
/// Returns `true` when `actual` equals `pattern` exactly or matches it as a
/// regex after type tags are stripped. Invalid regexes never match.
#[must_use]
pub fn literal_or_regex_match(pattern: &str, actual: &str) -> bool {
    if pattern == actual {
        return true;
    }
    Regex::new(&strip_type_tags(pattern)).is_ok_and(|re| re.is_match(actual))
}
