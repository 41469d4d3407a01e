//! Path template compilation.
//!
//! A template such as `/v1/category/{cat}/books/{id}` (or the `:cat` form)
//! compiles into a regex where every placeholder captures one path segment,
//! except the last placeholder, which absorbs the rest of the path including
//! embedded slashes. The pattern is anchored at the end of the string only.
//!
//! Mixing `:name` and `{name}` placeholders in one template is unsupported;
//! only the family detected first is compiled.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::MatchError;

/// Single-segment capture used for every placeholder but the last.
const SEGMENT_CAPTURE: &str = "([^/]*)";

/// Greedy capture used for the final placeholder.
const REST_CAPTURE: &str = "(.+)";

static COLON_PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":[\w\-]+").expect("valid regex"));

static BRACE_PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[\w\-]+\}").expect("valid regex"));

/// Placeholder syntax detected in a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlaceholderStyle {
    Colon,
    Brace,
    None,
}

impl PlaceholderStyle {
    fn detect(template: &str) -> Self {
        if template.contains(':') {
            Self::Colon
        } else if template.contains('{') && template.contains('}') {
            Self::Brace
        } else {
            Self::None
        }
    }

    fn regex(self) -> Option<&'static Regex> {
        match self {
            Self::Colon => Some(&COLON_PLACEHOLDER_RE),
            Self::Brace => Some(&BRACE_PLACEHOLDER_RE),
            Self::None => None,
        }
    }
}

/// Strips a trailing `?query` from a path or template.
#[must_use]
pub fn strip_query(path: &str) -> &str {
    path.split_once('?').map_or(path, |(p, _)| p)
}

/// Compiled path template.
#[derive(Debug, Clone)]
pub struct PathMatcher {
    template: String,
    pattern: String,
    regex: Regex,
    names: Vec<String>,
}

impl PathMatcher {
    /// Compiles a path template into a matcher.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::MalformedPattern`] if the generated regex does
    /// not compile (only possible for pathological templates).
    pub fn compile(template: &str) -> Result<Self, MatchError> {
        let raw = strip_query(template);
        let style = PlaceholderStyle::detect(raw);
        let (pattern, names) = build_pattern(raw, style);
        let regex = Regex::new(&pattern).map_err(|e| MatchError::MalformedPattern {
            field: "path",
            pattern: pattern.clone(),
            message: e.to_string(),
        })?;
        Ok(Self {
            template: template.to_string(),
            pattern,
            regex,
            names,
        })
    }

    /// The original template.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// The generated regex source.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Placeholder names in template order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Returns `true` if the path (query string ignored) fits the template.
    #[must_use]
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(strip_query(path))
    }

    /// Matches a path and extracts placeholder values.
    ///
    /// Returns `None` when the path does not fit. Captures are paired with
    /// placeholder names positionally.
    #[must_use]
    pub fn captures(&self, path: &str) -> Option<BTreeMap<String, String>> {
        let caps = self.regex.captures(strip_query(path))?;
        let values = caps
            .iter()
            .skip(1)
            .map(|m| m.map_or_else(String::new, |m| m.as_str().to_string()));
        Some(self.names.iter().cloned().zip(values).collect())
    }
}

fn build_pattern(raw: &str, style: PlaceholderStyle) -> (String, Vec<String>) {
    let mut pieces: Vec<String> = Vec::new();
    let mut names = Vec::new();
    let mut last = 0;

    if let Some(re) = style.regex() {
        for m in re.find_iter(raw) {
            pieces.push(regex::escape(&raw[last..m.start()]));
            pieces.push(SEGMENT_CAPTURE.to_string());
            names.push(placeholder_name(m.as_str()).to_string());
            last = m.end();
        }
    }
    pieces.push(regex::escape(&raw[last..]));

    // widen only the final placeholder so it can swallow trailing segments
    if let Some(idx) = pieces.iter().rposition(|p| p == SEGMENT_CAPTURE) {
        pieces[idx] = REST_CAPTURE.to_string();
    }

    let mut pattern = pieces.concat();
    if !pattern.is_empty() {
        pattern.push('$');
    }
    (pattern, names)
}

fn placeholder_name(token: &str) -> &str {
    token
        .trim_start_matches(':')
        .trim_start_matches('{')
        .trim_end_matches('}')
}

/// Matches `path` against `template` and returns extracted variables.
///
/// Returns an empty map when the template fails to compile or does not match.
#[must_use]
pub fn match_path_groups(template: &str, path: &str) -> BTreeMap<String, String> {
    PathMatcher::compile(template)
        .ok()
        .and_then(|m| m.captures(path))
        .unwrap_or_default()
}
