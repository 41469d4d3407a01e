//! Assertion evaluation for request and response blocks.
//!
//! A scenario declares three kinds of checks on each side:
//!
//! - per-field patterns (query params, post params, headers) matched
//!   literally or as a regex after type tags are stripped
//! - a structural content pattern, a JSON object of `dotted.field → regex`
//! - free-form assertions evaluated through a [`TemplateEvaluator`]
//!
//! Checks run in that order and stop at the first failure.

pub mod functions;
pub mod template;

use std::collections::BTreeMap;
use std::time::Duration;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{AssertionError, AssertionSide};
use crate::scenario::{Request, Response};
use crate::types::{RegexMapError, strip_type_tags, unmarshal_array_or_object, validate_regex_map};

pub use functions::{ELAPSED_PARAM, STATUS_PARAM};
pub use template::{BuiltinEvaluator, TemplateEvaluator};

/// Reserved parameter holding first-value-per-key live headers.
pub const HEADERS_PARAM: &str = "headers";

/// Reserved parameter holding the parsed live body.
pub const CONTENTS_PARAM: &str = "contents";

const TEMPLATE_OPEN: &str = "{{";

// ============================================================================
// Context
// ============================================================================

/// Live data an assertion is evaluated against.
#[derive(Debug, Clone, Default)]
pub struct AssertionContext {
    /// Live query parameters (first value)
    pub query_params: BTreeMap<String, String>,
    /// Live form parameters (first value)
    pub post_params: BTreeMap<String, String>,
    /// Live headers, multi-valued
    pub headers: BTreeMap<String, Vec<String>>,
    /// Parsed live body, if it was a JSON object or array
    pub contents: Option<Value>,
    /// Extra template parameters (`status`, `elapsed`, scenario variables)
    pub params: Map<String, Value>,
}

impl AssertionContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_post_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.post_params.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.entry(name.into()).or_default().push(value.into());
        self
    }

    #[must_use]
    pub fn with_contents(mut self, contents: Value) -> Self {
        self.contents = Some(contents);
        self
    }

    /// Parses `body` as a JSON object or array. Anything else leaves the
    /// contents unset, so only the free-form assertions can inspect it.
    #[must_use]
    pub fn with_body(mut self, body: &[u8]) -> Self {
        self.contents = unmarshal_array_or_object(body).ok().flatten();
        self
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn with_status(self, status: u16) -> Self {
        self.with_param(STATUS_PARAM, Value::from(status))
    }

    #[must_use]
    pub fn with_elapsed(self, elapsed: Duration) -> Self {
        let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.with_param(ELAPSED_PARAM, Value::from(millis))
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
    }

    /// Parameter map handed to the evaluator: `params` plus the reserved
    /// `headers` and `contents` keys.
    #[must_use]
    pub fn template_params(&self) -> Map<String, Value> {
        let mut out = self.params.clone();
        let mut headers = Map::new();
        for (name, values) in &self.headers {
            if let Some(first) = values.first() {
                headers
                    .entry(canonical_header_name(name))
                    .or_insert_with(|| Value::String(first.clone()));
            }
        }
        out.insert(HEADERS_PARAM.to_string(), Value::Object(headers));
        if let Some(contents) = &self.contents {
            out.insert(CONTENTS_PARAM.to_string(), contents.clone());
        }
        out
    }
}

/// `content-type` → `Content-Type`.
#[must_use]
pub fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase()
            })
        })
        .collect::<Vec<_>>()
        .join("-")
}

// ============================================================================
// Normalization
// ============================================================================

/// Rewrites a bare assertion into template-call syntax.
///
/// `ResponseStatusMatches 200` becomes
/// `{{ResponseStatusMatches "200"}}`. Assertions already starting with
/// `{{` are returned unchanged. Arguments that are already quoted are kept,
/// including quoted arguments containing spaces.
#[must_use]
pub fn normalize_assertion(assertion: &str) -> String {
    let assertion = assertion.trim();
    if assertion.starts_with(TEMPLATE_OPEN) {
        return assertion.to_string();
    }
    let mut chars = assertion.chars().peekable();
    let mut function = String::new();
    while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
        function.push(c);
    }
    if function.is_empty() {
        return String::new();
    }
    let mut out = format!("{TEMPLATE_OPEN}{function}");
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let Some(first) = chars.next() else {
            break;
        };
        out.push(' ');
        if first == '"' {
            // Quoted arguments are copied verbatim up to the unescaped
            // closing quote.
            out.push('"');
            while let Some(c) = chars.next() {
                out.push(c);
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            out.push(escaped);
                        }
                    }
                    '"' => break,
                    _ => {}
                }
            }
        } else {
            let mut word = String::from(first);
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                word.push(c);
            }
            out.push('"');
            out.push_str(&word.replace('\\', "\\\\").replace('"', "\\\""));
            out.push('"');
        }
    }
    out.push_str("}}");
    out
}

// ============================================================================
// Request / Response
// ============================================================================

impl Request {
    /// Checks the live request in `ctx` against this block's patterns and
    /// assertions.
    ///
    /// # Errors
    ///
    /// Returns the first failing check; see [`AssertionError`] for the
    /// validation versus configuration split.
    pub fn assert(
        &self,
        ctx: &AssertionContext,
        evaluator: &dyn TemplateEvaluator,
    ) -> Result<(), AssertionError> {
        let side = AssertionSide::Request;
        check_fields(side, "query param", &self.assert_query_params_pattern, |name| {
            ctx.query_params.get(name).map(String::as_str)
        })?;
        check_fields(side, "post param", &self.assert_post_params_pattern, |name| {
            ctx.post_params.get(name).map(String::as_str)
        })?;
        check_fields(side, "header", &self.assert_headers_pattern, |name| {
            ctx.header(name)
        })?;
        check_contents(side, &self.assert_contents_pattern, ctx.contents.as_ref())?;
        check_assertions(side, &self.assertions, ctx, evaluator)
    }
}

impl Response {
    /// Checks a live response in `ctx` against this block's header
    /// patterns, content pattern and assertions.
    ///
    /// # Errors
    ///
    /// Returns the first failing check.
    pub fn assert(
        &self,
        ctx: &AssertionContext,
        evaluator: &dyn TemplateEvaluator,
    ) -> Result<(), AssertionError> {
        let side = AssertionSide::Response;
        check_fields(side, "header", &self.assert_headers_pattern, |name| {
            ctx.header(name)
        })?;
        check_contents(side, &self.assert_contents_pattern, ctx.contents.as_ref())?;
        check_assertions(side, &self.assertions, ctx, evaluator)
    }
}

fn check_fields<'a>(
    side: AssertionSide,
    field: &'static str,
    patterns: &BTreeMap<String, String>,
    lookup: impl Fn(&str) -> Option<&'a str>,
) -> Result<(), AssertionError> {
    for (name, pattern) in patterns {
        let Some(actual) = lookup(name).filter(|v| !v.is_empty()) else {
            return Err(AssertionError::MissingValue {
                side,
                field,
                name: name.clone(),
                pattern: pattern.clone(),
            });
        };
        if pattern == actual {
            continue;
        }
        let stripped = strip_type_tags(pattern);
        if stripped == actual {
            continue;
        }
        let re = Regex::new(&stripped).map_err(|e| AssertionError::InvalidPattern {
            side,
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        if !re.is_match(actual) {
            return Err(AssertionError::Mismatch {
                side,
                field,
                name: name.clone(),
                pattern: pattern.clone(),
                actual: actual.to_string(),
            });
        }
    }
    Ok(())
}

fn check_contents(
    side: AssertionSide,
    pattern: &str,
    contents: Option<&Value>,
) -> Result<(), AssertionError> {
    if pattern.is_empty() {
        return Ok(());
    }
    let regex: BTreeMap<String, String> =
        serde_json::from_str(pattern).map_err(|e| AssertionError::MalformedPattern {
            side,
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
    validate_regex_map(contents, &regex).map_err(|e| match e {
        RegexMapError::Mismatch { .. } => AssertionError::ContentMismatch {
            side,
            reason: e.to_string(),
        },
        RegexMapError::InvalidRegex {
            pattern, message, ..
        } => AssertionError::InvalidPattern {
            side,
            pattern,
            message,
        },
    })
}

fn check_assertions(
    side: AssertionSide,
    assertions: &[String],
    ctx: &AssertionContext,
    evaluator: &dyn TemplateEvaluator,
) -> Result<(), AssertionError> {
    if assertions.is_empty() {
        return Ok(());
    }
    let params = ctx.template_params();
    for raw in assertions {
        let assertion = normalize_assertion(raw);
        if assertion.is_empty() {
            continue;
        }
        let result = evaluator
            .evaluate(raw, &assertion, &params)
            .map_err(|source| AssertionError::Template {
                side,
                assertion: assertion.clone(),
                source,
            })?;
        if result != "true" {
            return Err(AssertionError::AssertionFailed {
                side,
                assertion,
                result,
            });
        }
    }
    Ok(())
}
