//! Scenario data model.
//!
//! A [`Scenario`] is a stored request/response pair used to answer live
//! requests. Its matching-relevant subset is a [`ScenarioKey`]. Field names
//! are the persisted document contract and must stay stable.

pub mod digest;
pub mod key;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::assertion::template::TemplateEvaluator;
use crate::error::{ScenarioError, TemplateError};
use crate::types::{PREFIX_TYPE_EXAMPLE, strip_type_tags};

pub use digest::{normalize_dir_path, normalize_group, normalize_path, sanitize_non_alphabet};
pub use key::ScenarioKey;

/// Header carrying the request's content type.
pub const CONTENT_TYPE_HEADER: &str = "Content-Type";

/// Header carrying credentials.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Template parameter holding the occurrence count of the current request.
pub const REQUEST_COUNT_PARAM: &str = "_RequestCount";

/// Maximum path and name length accepted by validation.
const MAX_IDENTIFIER_LEN: usize = 200;

/// Maximum inline response body accepted by validation.
const MAX_CONTENTS_LEN: usize = 1024 * 1024 * 1024;

static PATH_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.\-/\\:{}]+$").expect("valid regex"));

static NAME_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w\-.]+$").expect("valid regex"));

// ============================================================================
// Method
// ============================================================================

/// HTTP method in canonical uppercase form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Connect,
    Trace,
}

impl Method {
    /// Canonical uppercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Connect => "CONNECT",
            Self::Trace => "TRACE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "PATCH" => Ok(Self::Patch),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" | "OPTION" => Ok(Self::Options),
            "CONNECT" => Ok(Self::Connect),
            "TRACE" => Ok(Self::Trace),
            _ => Err(ScenarioError::InvalidMethod(s.to_string())),
        }
    }
}

impl TryFrom<String> for Method {
    type Error = ScenarioError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ============================================================================
// Authorization
// ============================================================================

/// Where an API key is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyLocation {
    #[default]
    Header,
    Query,
    Cookie,
}

/// AWS Signature Version 4 request signing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AwsSigV4Auth {
    /// Header carrying the signature
    pub name: String,
    /// Signing service, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

/// Static API key.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApiKeyAuth {
    /// Header, query or cookie name
    pub name: String,
    /// Where the key is carried
    #[serde(rename = "in", default)]
    pub location: KeyLocation,
}

/// HTTP basic authentication.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HttpBasicAuth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
}

/// HTTP bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HttpBearerAuth {
    /// Token format hint such as `JWT`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_format: Option<String>,
}

/// Authentication scheme required by a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Authorization {
    AwsSigV4(AwsSigV4Auth),
    ApiKey(ApiKeyAuth),
    HttpBasic(HttpBasicAuth),
    HttpBearer(HttpBearerAuth),
}

impl Authorization {
    /// Key under which the scheme is stored in [`Scenario::authentication`].
    #[must_use]
    pub const fn scheme_name(&self) -> &'static str {
        match self {
            Self::AwsSigV4(_) => "aws_sigv4",
            Self::ApiKey(_) => "api_key",
            Self::HttpBasic(_) => "basic_auth",
            Self::HttpBearer(_) => "bearer_auth",
        }
    }
}

// ============================================================================
// Request / Response
// ============================================================================

/// Request half of a scenario.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Request {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub path_params: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub query_params: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub post_params: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub contents: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub example_contents: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub assert_query_params_pattern: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub assert_post_params_pattern: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub assert_headers_pattern: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub assert_contents_pattern: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
}

/// Parameters assembled for evaluating a request's templates and assertions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateParams {
    /// Flat template parameter map
    pub params: Map<String, Value>,
    /// Effective query parameters (stored samples overlaid with live values)
    pub query_params: BTreeMap<String, String>,
    /// Effective request headers
    pub headers: BTreeMap<String, Vec<String>>,
}

impl Request {
    /// Content type declared by the stored headers, or `default`.
    #[must_use]
    pub fn content_type(&self, default: &str) -> String {
        find_ignore_case(&self.headers, CONTENT_TYPE_HEADER)
            .map_or_else(|| default.to_string(), strip_type_tags)
    }

    /// Stored authorization header value, if any.
    #[must_use]
    pub fn auth_header(&self) -> Option<String> {
        find_ignore_case(&self.headers, AUTHORIZATION_HEADER).map(strip_type_tags)
    }

    /// Value of the first header whose name contains `TARGET`.
    #[must_use]
    pub fn target_header(&self) -> Option<String> {
        self.headers
            .iter()
            .find(|(k, _)| k.to_ascii_uppercase().contains("TARGET"))
            .map(|(_, v)| strip_type_tags(v))
    }

    /// Builds the template parameters for a live request.
    ///
    /// Later sources override earlier ones: stored path params, query
    /// assertion samples, stored query params, header assertion samples,
    /// stored headers, live query, live headers, extracted path groups and
    /// finally explicit overrides.
    #[must_use]
    pub fn build_template_params(
        &self,
        live_query: &BTreeMap<String, Vec<String>>,
        live_headers: &BTreeMap<String, Vec<String>>,
        path_groups: &BTreeMap<String, String>,
        overrides: &Map<String, Value>,
    ) -> TemplateParams {
        let mut out = TemplateParams {
            headers: live_headers.clone(),
            ..TemplateParams::default()
        };

        for (k, v) in &self.path_params {
            put_query(&mut out, k, strip_type_tags(v));
        }
        for (k, v) in &self.assert_query_params_pattern {
            put_query(&mut out, k, sanitize_regex_value(v));
        }
        for (k, v) in &self.query_params {
            put_query(&mut out, k, strip_type_tags(v));
        }
        for (k, v) in &self.assert_headers_pattern {
            put_header(&mut out, k, sanitize_regex_value(v));
        }
        for (k, v) in &self.headers {
            put_header(&mut out, k, strip_type_tags(v));
        }

        for (k, values) in live_query {
            if let Some(first) = values.first() {
                put_query(&mut out, k, strip_type_tags(first));
            }
        }
        for (k, values) in live_headers {
            if let Some(first) = values.first() {
                put_header(&mut out, k, strip_type_tags(first));
            }
        }
        for (k, v) in path_groups {
            out.params.insert(k.clone(), Value::String(v.clone()));
        }
        for (k, v) in overrides {
            out.params.insert(k.clone(), v.clone());
            let text = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out.query_params.insert(k.clone(), text);
        }
        out
    }
}

fn put_query(out: &mut TemplateParams, name: &str, value: String) {
    out.params
        .insert(name.to_string(), Value::String(value.clone()));
    out.query_params.insert(name.to_string(), value);
}

fn put_header(out: &mut TemplateParams, name: &str, value: String) {
    out.params
        .insert(name.to_string(), Value::String(value.clone()));
    out.headers.insert(name.to_string(), vec![value]);
}

/// Keeps regex-looking patterns intact and strips type tags from literals.
fn sanitize_regex_value(value: &str) -> String {
    if value.starts_with(PREFIX_TYPE_EXAMPLE) {
        strip_type_tags(value)
    } else if value.starts_with("__") || value.starts_with('(') {
        value.to_string()
    } else {
        strip_type_tags(value)
    }
}

/// Response half of a scenario.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Response {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub contents: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub contents_file: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub example_contents: String,
    pub status_code: u16,
    /// Response fields exported to later requests
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub add_shared_variables: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub delete_shared_variables: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub assert_headers_pattern: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub assert_contents_pattern: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<String>,
}

impl Response {
    /// Content type declared by the response headers, or `default`.
    #[must_use]
    pub fn content_type(&self, default: &str) -> String {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(CONTENT_TYPE_HEADER))
            .and_then(|(_, v)| v.first())
            .map_or_else(|| default.to_string(), |v| strip_type_tags(v))
    }
}

// ============================================================================
// Scenario
// ============================================================================

/// A stored request/response template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub method: Method,
    pub name: String,
    pub path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub base_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub order: i32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub group: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub predicate: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub variables_file: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub authentication: BTreeMap<String, Authorization>,
    pub request: Request,
    pub response: Response,
    #[serde(with = "crate::config::duration")]
    pub wait_before_reply: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub request_count: u64,
}

impl Scenario {
    /// Reduces the scenario to its matching key.
    #[must_use]
    pub fn to_key(&self) -> ScenarioKey {
        let mut path = normalize_path(&self.path, '/');
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        ScenarioKey {
            method: self.method,
            name: self.name.clone(),
            path,
            order: self.order,
            group: self.group.clone(),
            tags: self.tags.clone(),
            predicate: self.predicate.clone(),
            assert_query_params_pattern: self.request.assert_query_params_pattern.clone(),
            assert_post_params_pattern: self.request.assert_post_params_pattern.clone(),
            assert_headers_pattern: self.request.assert_headers_pattern.clone(),
            assert_contents_pattern: self.request.assert_contents_pattern.clone(),
            ..ScenarioKey::default()
        }
    }

    /// Checks required fields and normalizes the path in place.
    ///
    /// # Errors
    ///
    /// Returns the first structural problem found.
    pub fn validate(&mut self) -> Result<(), ScenarioError> {
        self.path = validate_path(&self.path, "path")?;
        validate_name(&self.name, "scenario name")?;
        if self.response.contents.len() > MAX_CONTENTS_LEN {
            return Err(ScenarioError::TooLong {
                field: "contents",
                len: self.response.contents.len(),
            });
        }
        Ok(())
    }

    /// Registers an authentication scheme under its canonical key.
    pub fn add_authorization(&mut self, auth: Authorization) {
        self.authentication
            .insert(auth.scheme_name().to_string(), auth);
    }

    /// Name with characters outside `[a-zA-Z0-9_\-:]` removed.
    #[must_use]
    pub fn safe_name(&self) -> String {
        sanitize_non_alphabet(&self.name, "")
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

    /// Full URL for the scenario using `base_url` unless overridden.
    #[must_use]
    pub fn build_url(&self, override_base_url: Option<&str>) -> String {
        let base = override_base_url
            .filter(|b| !b.is_empty())
            .unwrap_or(&self.base_url);
        format!("{base}{}", self.path)
    }

    /// Evaluates the replay predicate for the given occurrence count.
    ///
    /// An empty predicate always matches.
    ///
    /// # Errors
    ///
    /// Returns the evaluator's error if the predicate cannot be evaluated.
    pub fn predicate_matches(
        &self,
        request_count: u64,
        evaluator: &dyn TemplateEvaluator,
    ) -> Result<bool, TemplateError> {
        if self.predicate.trim().is_empty() {
            return Ok(true);
        }
        let mut params = Map::new();
        params.insert(REQUEST_COUNT_PARAM.to_string(), Value::from(request_count));
        let out = evaluator.evaluate(&self.name, &self.predicate, &params)?;
        Ok(out.trim() == "true")
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}{}", self.method, self.name, self.group, self.path)
    }
}

// ============================================================================
// Validation helpers
// ============================================================================

/// Validates a path and returns it with a single leading `/`.
pub(crate) fn validate_path(path: &str, field: &'static str) -> Result<String, ScenarioError> {
    if path.is_empty() {
        return Err(ScenarioError::Missing(field));
    }
    if path.len() > MAX_IDENTIFIER_LEN {
        return Err(ScenarioError::TooLong {
            field,
            len: path.len(),
        });
    }
    if !PATH_CHARS_RE.is_match(path) {
        return Err(ScenarioError::InvalidCharacters {
            field,
            value: path.to_string(),
        });
    }
    let mut normalized = normalize_path(path, '/');
    if !normalized.starts_with('/') {
        normalized.insert(0, '/');
    }
    Ok(normalized)
}

pub(crate) fn validate_name(name: &str, field: &'static str) -> Result<(), ScenarioError> {
    if name.is_empty() {
        return Err(ScenarioError::Missing(field));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(ScenarioError::TooLong {
            field,
            len: name.len(),
        });
    }
    if !NAME_CHARS_RE.is_match(name) {
        return Err(ScenarioError::InvalidCharacters {
            field,
            value: name.to_string(),
        });
    }
    Ok(())
}

/// Case-insensitive lookup in a string map.
pub(crate) fn find_ignore_case<'a>(map: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    map.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assertion::template::BuiltinEvaluator;

    fn books() -> Scenario {
        Scenario {
            method: Method::Post,
            name: "books-create".into(),
            path: "//v1/category/{cat}/books/{id}/".into(),
            group: "books".into(),
            ..Scenario::default()
        }
    }

    #[test]
    fn test_method_parse_is_case_insensitive() {
        assert_eq!("post".parse::<Method>().unwrap(), Method::Post);
        assert_eq!("OPTION".parse::<Method>().unwrap(), Method::Options);
        assert!(matches!(
            "FETCH".parse::<Method>(),
            Err(ScenarioError::InvalidMethod(_))
        ));
    }

    #[test]
    fn test_method_serde_uses_uppercase() {
        let json = serde_json::to_string(&Method::Delete).unwrap();
        assert_eq!(json, "\"DELETE\"");
        let parsed: Method = serde_json::from_str("\"patch\"").unwrap();
        assert_eq!(parsed, Method::Patch);
    }

    #[test]
    fn test_validate_normalizes_path() {
        let mut s = books();
        s.validate().unwrap();
        assert_eq!(s.path, "/v1/category/{cat}/books/{id}");
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let mut s = books();
        s.path = "/v1/books?x=1".into();
        assert!(matches!(
            s.validate(),
            Err(ScenarioError::InvalidCharacters { field: "path", .. })
        ));

        let mut s = books();
        s.name = "bad name".into();
        assert!(matches!(
            s.validate(),
            Err(ScenarioError::InvalidCharacters { .. })
        ));

        let mut s = books();
        s.name.clear();
        assert_eq!(s.validate(), Err(ScenarioError::Missing("scenario name")));

        let mut s = books();
        s.path = format!("/{}", "a".repeat(250));
        assert!(matches!(s.validate(), Err(ScenarioError::TooLong { .. })));
    }

    #[test]
    fn test_to_key_copies_request_patterns() {
        let mut s = books();
        s.request
            .assert_headers_pattern
            .insert("X-Target".into(), "svc".into());
        let key = s.to_key();
        assert_eq!(key.path, "/v1/category/{cat}/books/{id}");
        assert_eq!(key.assert_headers_pattern["X-Target"], "svc");
        assert_eq!(key.method, Method::Post);
    }

    #[test]
    fn test_authorization_serde_is_tagged() {
        let auth = Authorization::ApiKey(ApiKeyAuth {
            name: "x-api-key".into(),
            location: KeyLocation::Header,
        });
        let json = serde_json::to_value(&auth).unwrap();
        assert_eq!(json["type"], "api_key");
        assert_eq!(json["in"], "header");
        let back: Authorization = serde_json::from_value(json).unwrap();
        assert_eq!(back, auth);
    }

    #[test]
    fn test_add_authorization_keys_by_scheme() {
        let mut s = books();
        s.add_authorization(Authorization::HttpBearer(HttpBearerAuth::default()));
        s.add_authorization(Authorization::HttpBasic(HttpBasicAuth::default()));
        assert!(s.authentication.contains_key("bearer_auth"));
        assert!(s.authentication.contains_key("basic_auth"));
    }

    #[test]
    fn test_target_and_auth_headers() {
        let mut req = Request::default();
        req.headers
            .insert("x-amz-target".into(), "__example__DynamoDB.GetItem".into());
        req.headers
            .insert("authorization".into(), "Bearer abc".into());
        assert_eq!(req.target_header().as_deref(), Some("DynamoDB.GetItem"));
        assert_eq!(req.auth_header().as_deref(), Some("Bearer abc"));
        assert_eq!(req.content_type("application/json"), "application/json");
    }

    #[test]
    fn test_build_template_params_precedence() {
        let mut req = Request::default();
        req.path_params.insert("id".into(), "__example__1".into());
        req.query_params.insert("page".into(), "__example__1".into());
        req.assert_query_params_pattern
            .insert("sort".into(), r"(asc|desc)".into());
        req.headers.insert("X-Client".into(), "stored".into());

        let mut live_query = BTreeMap::new();
        live_query.insert("page".to_string(), vec!["7".to_string()]);
        let mut live_headers = BTreeMap::new();
        live_headers.insert("X-Client".to_string(), vec!["live".to_string()]);
        let mut groups = BTreeMap::new();
        groups.insert("id".to_string(), "42".to_string());
        let mut overrides = Map::new();
        overrides.insert("limit".into(), Value::from(10));

        let out = req.build_template_params(&live_query, &live_headers, &groups, &overrides);
        assert_eq!(out.params["id"], "42");
        assert_eq!(out.params["page"], "7");
        assert_eq!(out.params["sort"], "(asc|desc)");
        assert_eq!(out.params["X-Client"], "live");
        assert_eq!(out.params["limit"], 10);
        assert_eq!(out.query_params["limit"], "10");
        assert_eq!(out.query_params["id"], "1");
        assert_eq!(out.headers["X-Client"], vec!["live".to_string()]);
    }

    #[test]
    fn test_predicate_matches() {
        let evaluator = BuiltinEvaluator::new();
        let mut s = books();
        assert!(s.predicate_matches(1, &evaluator).unwrap());

        s.predicate = "{{NthRequest 2}}".into();
        assert!(!s.predicate_matches(1, &evaluator).unwrap());
        assert!(s.predicate_matches(2, &evaluator).unwrap());
        assert!(s.predicate_matches(4, &evaluator).unwrap());
    }

    #[test]
    fn test_scenario_yaml_round_trip_keeps_fields() {
        let mut s = books();
        s.wait_before_reply = Duration::from_millis(1500);
        s.response.status_code = 201;
        let yaml = serde_yaml::to_string(&s).unwrap();
        assert!(yaml.contains("wait_before_reply: 1s 500ms"));
        let back: Scenario = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn test_helpers() {
        let mut s = books();
        s.validate().unwrap();
        assert_eq!(s.method_path(), "post_v1_category_cat_books_id");
        assert_eq!(
            s.build_url(Some("http://localhost:8080")),
            "http://localhost:8080/v1/category/{cat}/books/{id}"
        );
        assert_eq!(s.to_string(), "POSTbooks-createbooks/v1/category/{cat}/books/{id}");
    }
}
