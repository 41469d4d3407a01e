//! Scenario key matching.
//!
//! [`ScenarioKey::equals`] compares a stored key against the key built from
//! a live request. Rules run in a fixed order and the first broken rule is
//! returned: method, group and path failures are
//! [`NotFound`](crate::error::ErrorKind::NotFound), everything after the
//! path is [`Validation`](crate::error::ErrorKind::Validation).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{CONTENT_TYPE_HEADER, Method, sanitize_non_alphabet, validate_name, validate_path};
use crate::error::{MatchError, ScenarioError};
use crate::path::{PathMatcher, strip_query};
use crate::types::{RegexMapError, literal_or_regex_match, unmarshal_array_or_object, validate_regex_map};

/// Matching-relevant subset of a [`Scenario`](super::Scenario).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioKey {
    pub method: Method,
    pub name: String,
    pub path: String,
    pub order: i32,
    pub group: String,
    pub tags: Vec<String>,
    pub predicate: String,
    pub assert_query_params_pattern: BTreeMap<String, String>,
    pub assert_post_params_pattern: BTreeMap<String, String>,
    pub assert_headers_pattern: BTreeMap<String, String>,
    pub assert_contents_pattern: String,
    #[serde(skip)]
    pub last_usage_time: i64,
    #[serde(skip)]
    pub request_count: u64,
}

impl ScenarioKey {
    /// Builds the key describing a live request.
    ///
    /// The first value of each query parameter and header becomes the
    /// candidate value, the raw body becomes the content pattern and the
    /// scenario name is read from `name_header`.
    #[must_use]
    pub fn from_request(
        method: Method,
        path: &str,
        query: &BTreeMap<String, Vec<String>>,
        headers: &BTreeMap<String, Vec<String>>,
        body: &[u8],
        name_header: &str,
    ) -> Self {
        let first = |values: &Vec<String>| values.first().cloned();
        let mut assert_headers_pattern: BTreeMap<String, String> = headers
            .iter()
            .filter_map(|(k, v)| first(v).map(|v| (k.clone(), v)))
            .collect();
        if !assert_headers_pattern
            .keys()
            .any(|k| k.eq_ignore_ascii_case(CONTENT_TYPE_HEADER))
        {
            assert_headers_pattern.insert(CONTENT_TYPE_HEADER.to_string(), String::new());
        }
        let name = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name_header))
            .and_then(|(_, v)| first(v))
            .unwrap_or_default();

        Self {
            method,
            name,
            path: strip_query(path).to_string(),
            assert_query_params_pattern: query
                .iter()
                .filter_map(|(k, v)| first(v).map(|v| (k.clone(), v)))
                .collect(),
            assert_headers_pattern,
            assert_contents_pattern: String::from_utf8_lossy(body).into_owned(),
            ..Self::default()
        }
    }

    /// Decides whether `other` (usually a live request) matches this key.
    ///
    /// # Errors
    ///
    /// Returns the first broken rule as a [`MatchError`].
    pub fn equals(&self, other: &Self) -> Result<(), MatchError> {
        if self.method != other.method {
            return Err(MatchError::Method {
                expected: self.method.to_string(),
                actual: other.method.to_string(),
            });
        }
        if !self.group.is_empty() && !other.group.is_empty() && self.group != other.group {
            return Err(MatchError::Group {
                expected: self.group.clone(),
                actual: other.group.clone(),
            });
        }

        let other_path = strip_query(&other.path);
        let matcher = PathMatcher::compile(&self.path)?;
        let matched = matcher.is_match(other_path);
        debug!(
            group = %self.group,
            this = %self,
            other = %other,
            regex = matcher.pattern(),
            matched,
            "matching path"
        );
        if !matched {
            return Err(MatchError::Path {
                template: self.path.clone(),
                path: other.path.clone(),
            });
        }

        for (name, expected) in &self.assert_query_params_pattern {
            let actual = other
                .assert_query_params_pattern
                .get(name)
                .map_or("", String::as_str);
            if !literal_or_regex_match(expected, actual) {
                return Err(MatchError::QueryParam {
                    name: name.clone(),
                    expected: expected.clone(),
                    actual: actual.to_string(),
                });
            }
        }

        for (name, expected) in &self.assert_post_params_pattern {
            let actual = other
                .assert_post_params_pattern
                .get(name)
                .map_or("", String::as_str);
            if !literal_or_regex_match(expected, actual) {
                return Err(MatchError::PostParam {
                    name: name.clone(),
                    expected: expected.clone(),
                    actual: actual.to_string(),
                });
            }
        }

        self.match_contents(&other.assert_contents_pattern)?;

        for (name, expected) in &self.assert_headers_pattern {
            let actual = lookup_ignore_case(&other.assert_headers_pattern, name);
            if !literal_or_regex_match(expected, actual) {
                return Err(MatchError::Header {
                    name: name.clone(),
                    expected: expected.clone(),
                    actual: actual.to_string(),
                });
            }
        }

        if !self.tags.is_empty() && !other.tags.is_empty() {
            let allowed: BTreeSet<String> =
                self.tags.iter().map(|t| t.to_uppercase()).collect();
            if let Some(tag) = other
                .tags
                .iter()
                .find(|t| !allowed.contains(&t.to_uppercase()))
            {
                return Err(MatchError::Tag {
                    tag: tag.clone(),
                    allowed: self.tags.clone(),
                });
            }
        }

        if !other.name.is_empty() && self.name != other.name {
            return Err(MatchError::Name {
                expected: self.name.clone(),
                actual: other.name.clone(),
            });
        }
        Ok(())
    }

    fn match_contents(&self, other: &str) -> Result<(), MatchError> {
        let pattern = &self.assert_contents_pattern;
        if pattern.is_empty() || other.contains(pattern.as_str()) || literal_or_regex_match(pattern, other) {
            return Ok(());
        }
        let content_error = |reason: String| MatchError::Content {
            expected: pattern.clone(),
            actual: other.to_string(),
            reason,
        };
        if other.is_empty() {
            return Err(content_error("request has no contents".to_string()));
        }
        let regex: BTreeMap<String, String> =
            serde_json::from_str(pattern).map_err(|e| MatchError::MalformedPattern {
                field: "contents",
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
        let live = unmarshal_array_or_object(other.as_bytes()).map_err(content_error)?;
        validate_regex_map(live.as_ref(), &regex).map_err(|e| match e {
            RegexMapError::Mismatch { .. } => content_error(e.to_string()),
            RegexMapError::InvalidRegex { pattern, message, .. } => MatchError::MalformedPattern {
                field: "contents",
                pattern,
                message,
            },
        })
    }

    /// Extracts path variables of `path` using this key's template.
    #[must_use]
    pub fn match_groups(&self, path: &str) -> BTreeMap<String, String> {
        crate::path::match_path_groups(&self.path, path)
    }

    /// Checks required fields and normalizes the path in place.
    ///
    /// # Errors
    ///
    /// Returns the first structural problem found.
    pub fn validate(&mut self) -> Result<(), ScenarioError> {
        self.path = validate_path(&self.path, "key path")?;
        validate_name(&self.name, "key scenario name")
    }

    /// First `max` non-empty segments of the path, e.g. `/v1` for `max = 1`.
    #[must_use]
    pub fn path_prefix(&self, max: usize) -> String {
        let parts: Vec<&str> = self.path.split('/').collect();
        if parts.len() <= max {
            return self.path.clone();
        }
        parts
            .iter()
            .filter(|p| !p.is_empty())
            .take(max)
            .fold(String::new(), |mut acc, p| {
                acc.push('/');
                acc.push_str(p);
                acc
            })
    }

    /// `method_path` style identifier, e.g. `get_v1_books`.
    #[must_use]
    pub fn method_path(&self) -> String {
        format!(
            "{}_{}",
            self.method.as_str().to_ascii_lowercase(),
            sanitize_non_alphabet(&self.path, "_").trim_start_matches('_')
        )
    }

    /// Name with characters outside `[a-zA-Z0-9_\-:]` removed.
    #[must_use]
    pub fn safe_name(&self) -> String {
        sanitize_non_alphabet(&self.name, "")
    }

    /// Bucket key by method and first path segment.
    #[must_use]
    pub fn partial_method_path_key(&self) -> String {
        format!("{}{}", self.method, self.path_prefix(1))
    }

    /// Bucket key by method, name and first path segment.
    #[must_use]
    pub fn method_name_path_prefix_key(&self) -> String {
        format!("{}{}{}", self.method, self.name, self.path_prefix(1))
    }
}

impl fmt::Display for ScenarioKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.method, self.path, self.name)
    }
}

fn lookup_ignore_case<'a>(map: &'a BTreeMap<String, String>, name: &str) -> &'a str {
    map.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map_or("", |(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn stored() -> ScenarioKey {
        let mut key = ScenarioKey {
            method: Method::Post,
            name: "create-book".into(),
            path: "/v1/category/{cat}/books/{id}".into(),
            group: "books".into(),
            tags: vec!["books".into(), "Library".into()],
            ..ScenarioKey::default()
        };
        key.assert_query_params_pattern
            .insert("version".into(), r"__number__\d+".into());
        key.assert_headers_pattern
            .insert("X-Target".into(), "svc-a".into());
        key
    }

    fn live() -> ScenarioKey {
        let mut key = ScenarioKey {
            method: Method::Post,
            path: "/v1/category/history/books/101?debug=1".into(),
            ..ScenarioKey::default()
        };
        key.assert_query_params_pattern
            .insert("version".into(), "2".into());
        key.assert_headers_pattern
            .insert("x-target".into(), "svc-a".into());
        key
    }

    #[test]
    fn test_matching_live_request() {
        assert_eq!(stored().equals(&live()), Ok(()));
    }

    #[test]
    fn test_equals_is_reflexive() {
        let key = stored();
        assert_eq!(key.equals(&key.clone()), Ok(()));
    }

    #[test]
    fn test_method_group_path_are_not_found() {
        let mut other = live();
        other.method = Method::Get;
        assert_eq!(stored().equals(&other).unwrap_err().kind(), ErrorKind::NotFound);

        let mut other = live();
        other.group = "authors".into();
        assert_eq!(stored().equals(&other).unwrap_err().kind(), ErrorKind::NotFound);

        let mut other = live();
        other.path = "/v1/authors/1".into();
        let err = stored().equals(&other).unwrap_err();
        assert!(matches!(err, MatchError::Path { .. }));
    }

    #[test]
    fn test_empty_group_on_either_side_is_ignored() {
        let mut other = live();
        other.group = String::new();
        assert!(stored().equals(&other).is_ok());
        let mut key = stored();
        key.group = String::new();
        let mut other = live();
        other.group = "anything".into();
        assert!(key.equals(&other).is_ok());
    }

    #[test]
    fn test_query_mismatch_and_missing() {
        let mut other = live();
        other
            .assert_query_params_pattern
            .insert("version".into(), "two".into());
        let err = stored().equals(&other).unwrap_err();
        assert!(matches!(err, MatchError::QueryParam { ref name, .. } if name == "version"));
        assert_eq!(err.kind(), ErrorKind::Validation);

        let mut other = live();
        other.assert_query_params_pattern.clear();
        assert!(matches!(
            stored().equals(&other),
            Err(MatchError::QueryParam { ref actual, .. }) if actual.is_empty()
        ));
    }

    #[test]
    fn test_post_param_mismatch() {
        let mut key = stored();
        key.assert_post_params_pattern
            .insert("title".into(), "^hist".into());
        let mut other = live();
        other
            .assert_post_params_pattern
            .insert("title".into(), "fiction".into());
        assert!(matches!(
            key.equals(&other),
            Err(MatchError::PostParam { .. })
        ));
        other
            .assert_post_params_pattern
            .insert("title".into(), "history".into());
        assert!(key.equals(&other).is_ok());
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut other = live();
        other.assert_headers_pattern.clear();
        other
            .assert_headers_pattern
            .insert("X-TARGET".into(), "svc-a".into());
        assert!(stored().equals(&other).is_ok());

        other
            .assert_headers_pattern
            .insert("X-TARGET".into(), "svc-b".into());
        let err = stored().equals(&other).unwrap_err();
        assert!(matches!(err, MatchError::Header { ref actual, .. } if actual == "svc-b"));
    }

    #[test]
    fn test_tags_are_case_insensitive_subset() {
        let mut other = live();
        other.tags = vec!["LIBRARY".into()];
        assert!(stored().equals(&other).is_ok());

        other.tags = vec!["library".into(), "beta".into()];
        let err = stored().equals(&other).unwrap_err();
        assert!(matches!(err, MatchError::Tag { ref tag, .. } if tag == "beta"));
    }

    #[test]
    fn test_name_only_checked_when_requested() {
        let mut other = live();
        other.name = "create-book".into();
        assert!(stored().equals(&other).is_ok());
        other.name = "other-book".into();
        assert!(matches!(stored().equals(&other), Err(MatchError::Name { .. })));
    }

    #[test]
    fn test_content_substring_and_structural_match() {
        let mut key = stored();
        key.assert_contents_pattern =
            r#"{"title":"(__string__\\w+)","id":"(__number__[+-]?\\d{1,10})"}"#.into();

        let mut other = live();
        other.assert_contents_pattern = r#"{"title": "history", "id": 101}"#.into();
        assert!(key.equals(&other).is_ok());

        other.assert_contents_pattern = r#"{"title": "history", "id": "abc"}"#.into();
        let err = key.equals(&other).unwrap_err();
        assert!(matches!(err, MatchError::Content { .. }));
        assert_eq!(err.kind(), ErrorKind::Validation);

        other.assert_contents_pattern = String::new();
        assert!(matches!(key.equals(&other), Err(MatchError::Content { .. })));

        key.assert_contents_pattern = "hello".into();
        other.assert_contents_pattern = "say hello world".into();
        assert!(key.equals(&other).is_ok());
    }

    #[test]
    fn test_malformed_content_pattern_is_configuration() {
        let mut key = stored();
        key.assert_contents_pattern = "{not json".into();
        let mut other = live();
        other.assert_contents_pattern = r#"{"a": 1}"#.into();
        let err = key.equals(&other).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_match_groups() {
        let groups = stored().match_groups("/v1/category/history/books/101");
        assert_eq!(groups["cat"], "history");
        assert_eq!(groups["id"], "101");
    }

    #[test]
    fn test_helpers() {
        let key = stored();
        assert_eq!(key.to_string(), "POST|/v1/category/{cat}/books/{id}|create-book");
        assert_eq!(key.path_prefix(1), "/v1");
        assert_eq!(key.path_prefix(2), "/v1/category");
        assert_eq!(key.partial_method_path_key(), "POST/v1");
        assert_eq!(key.method_path(), "post_v1_category_cat_books_id");
        assert_eq!(key.safe_name(), "create-book");
    }

    #[test]
    fn test_validate() {
        let mut key = stored();
        key.path = "v1//books/".into();
        key.validate().unwrap();
        assert_eq!(key.path, "/v1/books");

        key.name = "has space".into();
        assert!(key.validate().is_err());
    }

    #[test]
    fn test_from_request() {
        let mut query = BTreeMap::new();
        query.insert("version".to_string(), vec!["2".to_string(), "3".to_string()]);
        let mut headers = BTreeMap::new();
        headers.insert("x-target".to_string(), vec!["svc-a".to_string()]);
        headers.insert("X-Mock-Scenario".to_string(), vec!["create-book".to_string()]);
        let key = ScenarioKey::from_request(
            Method::Post,
            "/v1/category/history/books/101?version=2",
            &query,
            &headers,
            b"",
            "x-mock-scenario",
        );
        assert_eq!(key.path, "/v1/category/history/books/101");
        assert_eq!(key.name, "create-book");
        assert_eq!(key.assert_query_params_pattern["version"], "2");
        assert!(key.assert_headers_pattern.contains_key(CONTENT_TYPE_HEADER));
        assert!(stored().equals(&key).is_ok());
    }
}
