//! Turns a captured HTTP exchange into a canonical scenario.
//!
//! Recorders and importers only need to produce a [`RawExchange`]. The
//! [`Normalizer`] derives the group, tags, assertions, authentication shape,
//! replay predicate and a content-addressed name from it.
//!
//! Body parsing problems are never fatal: they are logged and the scenario
//! is produced without a content pattern. Only a missing or unusable URL
//! aborts normalization.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{AssertionPolicy, EngineConfig};
use crate::error::{ApiMockError, ConfigError, NormalizeError};
use crate::observability::metrics;
use crate::scenario::{
    ApiKeyAuth, Authorization, AwsSigV4Auth, CONTENT_TYPE_HEADER, HttpBasicAuth, HttpBearerAuth,
    KeyLocation, Method, Scenario, normalize_group,
};
use crate::types::{
    PREFIX_TYPE_EXAMPLE, extract_assertion_pattern, extract_top_level_fields,
    unmarshal_array_or_object,
};

/// Predicate for exchanges replayed on their first occurrence.
pub const FIRST_REQUEST_PREDICATE: &str = "{{NthRequest 1}}";
/// Predicate for failed exchanges, replayed on the second occurrence.
pub const SECOND_REQUEST_PREDICATE: &str = "{{NthRequest 2}}";

/// Header commonly carrying an AWS API Gateway key.
const AWS_API_KEY_HEADER: &str = "x-api-key";

// ============================================================================
// Input
// ============================================================================

/// One captured request/response pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawExchange {
    pub method: Method,
    /// Absolute (`https://host/path?q`) or origin-relative (`/path?q`) URL
    pub url: Option<String>,
    pub request_headers: BTreeMap<String, Vec<String>>,
    /// Query parameters in addition to those in the URL
    pub query_params: BTreeMap<String, Vec<String>>,
    pub post_params: BTreeMap<String, Vec<String>>,
    pub request_body: String,
    pub response_headers: BTreeMap<String, Vec<String>>,
    pub response_body: String,
    pub status: u16,
    /// Collection or API title used as the group when present
    pub title: Option<String>,
    /// Overrides the configured name prefix
    pub prefix: Option<String>,
    pub started: Option<DateTime<Utc>>,
    pub ended: Option<DateTime<Utc>>,
}

// ============================================================================
// Normalizer
// ============================================================================

/// Normalization with a compiled assertion policy.
#[derive(Debug, Clone)]
pub struct Normalizer {
    policy: AssertionPolicy,
    scenario_name_header: String,
    name_prefix: String,
}

impl Normalizer {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a policy regex is invalid.
    pub fn new(config: &EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            policy: config.assertion_policy()?,
            scenario_name_header: config.scenario_name_header.clone(),
            name_prefix: config.name_prefix.clone(),
        })
    }

    /// Builds a fully populated scenario from `exchange`.
    ///
    /// # Errors
    ///
    /// Returns `NormalizeError::MissingUrl` when the exchange has no URL and
    /// `NormalizeError::InvalidUrl` when it cannot be split into a path.
    pub fn normalize(&self, exchange: RawExchange) -> Result<Scenario, NormalizeError> {
        let url = exchange
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(NormalizeError::MissingUrl)?;
        let parts = split_url(url)?;
        let prefix = exchange
            .prefix
            .clone()
            .unwrap_or_else(|| self.name_prefix.clone());

        let mut scenario = Scenario {
            method: exchange.method,
            path: parts.path.clone(),
            base_url: parts.base.clone(),
            start_time: exchange.started,
            end_time: exchange.ended,
            ..Scenario::default()
        };

        self.fill_request(&mut scenario, &exchange, &parts.query);
        fill_response(&mut scenario, &exchange);

        scenario.group = match scenario.request.target_header() {
            Some(target) if scenario.path == "/" => target_group(&target),
            _ => normalize_group(exchange.title.as_deref().unwrap_or_default(), &scenario.path),
        };
        if let Some(auth) = scenario.request.auth_header() {
            for scheme in infer_authorization(&auth) {
                scenario.add_authorization(scheme);
            }
        }
        scenario.tags = vec![scenario.group.clone()];
        scenario.predicate = if exchange.status >= 300 {
            SECOND_REQUEST_PREDICATE
        } else {
            FIRST_REQUEST_PREDICATE
        }
        .to_string();
        let stamp = exchange.started.unwrap_or_else(Utc::now);
        scenario.description = format!(
            "recorded at {} by {prefix} for {url}",
            stamp.to_rfc3339_opts(SecondsFormat::Secs, true)
        );

        let explicit_name = first_ignore_case(&exchange.request_headers, &self.scenario_name_header)
            .filter(|n| !n.trim().is_empty());
        scenario.name = match explicit_name {
            Some(name) => name.trim().to_string(),
            None => format!(
                "{prefix}{}-{}-{}",
                scenario.group,
                scenario.response.status_code,
                scenario.digest()
            ),
        };

        metrics::record_normalized();
        debug!(
            method = %scenario.method,
            path = %scenario.path,
            group = %scenario.group,
            name = %scenario.name,
            "normalized exchange"
        );
        Ok(scenario)
    }

    fn fill_request(&self, scenario: &mut Scenario, exchange: &RawExchange, url_query: &[(String, String)]) {
        let request = &mut scenario.request;

        let mut query: BTreeMap<String, String> = first_values(&exchange.query_params);
        for (name, value) in url_query {
            query.entry(name.clone()).or_insert_with(|| value.clone());
        }
        for (name, value) in query {
            if self.policy.assert_query_param(&name) {
                request
                    .assert_query_params_pattern
                    .insert(name.clone(), value.clone());
            }
            request
                .query_params
                .insert(name, format!("{PREFIX_TYPE_EXAMPLE}{value}"));
        }

        for (name, value) in first_values(&exchange.post_params) {
            if self.policy.assert_post_param(&name) {
                request
                    .assert_post_params_pattern
                    .insert(name.clone(), value.clone());
            }
            request
                .post_params
                .insert(name, format!("{PREFIX_TYPE_EXAMPLE}{value}"));
        }

        for (name, value) in first_values(&exchange.request_headers) {
            if self.policy.assert_header(&name) {
                request
                    .assert_headers_pattern
                    .insert(name.clone(), value.clone());
            }
            request.headers.insert(name, value);
        }

        if let Some(content_type) = first_ignore_case(&exchange.request_headers, CONTENT_TYPE_HEADER) {
            add_content_type_assertion(&mut request.assertions, content_type);
        }

        let body = analyze_body("request", &exchange.request_body);
        request.contents.clone_from(&exchange.request_body);
        request.example_contents = body.example;
        request.assert_contents_pattern = body.pattern;
    }
}

fn fill_response(scenario: &mut Scenario, exchange: &RawExchange) {
    let response = &mut scenario.response;
    response.status_code = exchange.status;
    response.headers.clone_from(&exchange.response_headers);
    if let Some(content_type) = first_ignore_case(&exchange.response_headers, CONTENT_TYPE_HEADER) {
        add_content_type_assertion(&mut response.assertions, content_type);
    }
    let body = analyze_body("response", &exchange.response_body);
    response.contents.clone_from(&exchange.response_body);
    response.example_contents = body.example;
    response.assert_contents_pattern = body.pattern;
    if !exchange.response_body.is_empty() {
        response.add_shared_variables = extract_top_level_fields(exchange.response_body.as_bytes(), 1)
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to extract shared variables from response");
                Vec::new()
            });
    }
}

/// Normalizes with a policy compiled from `config`.
///
/// # Errors
///
/// Returns a configuration error for invalid policy regexes, otherwise
/// the [`Normalizer::normalize`] errors.
pub fn normalize_exchange(config: &EngineConfig, exchange: RawExchange) -> Result<Scenario, ApiMockError> {
    Ok(Normalizer::new(config)?.normalize(exchange)?)
}

// ============================================================================
// Helpers
// ============================================================================

#[derive(Debug, Default)]
struct BodyAnalysis {
    example: String,
    pattern: String,
}

fn analyze_body(side: &str, body: &str) -> BodyAnalysis {
    if body.trim().is_empty() {
        return BodyAnalysis::default();
    }
    let example = match unmarshal_array_or_object(body.as_bytes()) {
        Ok(Some(value)) => serde_json::to_string_pretty(&value).unwrap_or_default(),
        Ok(None) => return BodyAnalysis::default(),
        Err(e) => {
            warn!(side, error = %e, "failed to parse body, skipping content assertions");
            return BodyAnalysis::default();
        }
    };
    let pattern = extract_assertion_pattern(body.as_bytes()).unwrap_or_else(|e| {
        warn!(side, error = %e, "failed to extract content pattern");
        String::new()
    });
    BodyAnalysis { example, pattern }
}

/// Adds an anchored `VariableMatches` on the recorded content type. The
/// pattern is passed as one quoted argument so parameters such as
/// `; charset=utf-8` stay part of it.
fn add_content_type_assertion(assertions: &mut Vec<String>, content_type: &str) {
    let pattern = format!("^{}$", regex::escape(content_type.trim()));
    let assertion = format!(
        "VariableMatches headers.{CONTENT_TYPE_HEADER} \"{}\"",
        pattern.replace('\\', "\\\\").replace('"', "\\\"")
    );
    if !assertions.contains(&assertion) {
        assertions.push(assertion);
    }
}

/// Last two dot-separated components, e.g. `svc.Users.ListUsers` →
/// `Users.ListUsers`.
fn target_group(target: &str) -> String {
    let parts: Vec<&str> = target.split('.').collect();
    if parts.len() <= 2 {
        return target.to_string();
    }
    parts[parts.len() - 2..].join(".")
}

fn infer_authorization(header_value: &str) -> Vec<Authorization> {
    if header_value.contains("AWS") {
        vec![
            Authorization::AwsSigV4(AwsSigV4Auth {
                name: crate::scenario::AUTHORIZATION_HEADER.to_string(),
                service: aws_signing_service(header_value),
            }),
            Authorization::ApiKey(ApiKeyAuth {
                name: AWS_API_KEY_HEADER.to_string(),
                location: KeyLocation::Header,
            }),
            Authorization::HttpBearer(HttpBearerAuth::default()),
        ]
    } else {
        vec![
            Authorization::HttpBasic(HttpBasicAuth::default()),
            Authorization::HttpBearer(HttpBearerAuth::default()),
        ]
    }
}

/// Service from a SigV4 credential scope
/// (`Credential=AKID/20240101/us-east-1/execute-api/aws4_request`).
fn aws_signing_service(header_value: &str) -> Option<String> {
    let scope = header_value.split("Credential=").nth(1)?;
    let scope = scope.split([',', ' ']).next()?;
    scope
        .split('/')
        .nth(3)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn first_values(map: &BTreeMap<String, Vec<String>>) -> BTreeMap<String, String> {
    map.iter()
        .filter_map(|(k, v)| v.first().map(|first| (k.clone(), first.clone())))
        .collect()
}

fn first_ignore_case<'a>(map: &'a BTreeMap<String, Vec<String>>, name: &str) -> Option<&'a str> {
    map.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .and_then(|(_, v)| v.first())
        .map(String::as_str)
}

#[derive(Debug, PartialEq, Eq)]
struct UrlParts {
    base: String,
    path: String,
    query: Vec<(String, String)>,
}

fn split_url(url: &str) -> Result<UrlParts, NormalizeError> {
    let invalid = || NormalizeError::InvalidUrl(url.to_string());
    let without_fragment = url.split('#').next().unwrap_or_default();
    let (base, rest) = if let Some((scheme, after)) = without_fragment.split_once("://") {
        if scheme.is_empty() || !scheme.chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c)) {
            return Err(invalid());
        }
        let host_end = after.find(['/', '?']).unwrap_or(after.len());
        let host = &after[..host_end];
        if host.is_empty() {
            return Err(invalid());
        }
        (format!("{scheme}://{host}"), &after[host_end..])
    } else if without_fragment.starts_with('/') {
        (String::new(), without_fragment)
    } else {
        return Err(invalid());
    };
    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
    let path = if path.is_empty() { "/" } else { path };
    let query = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(k), decode_component(v))
        })
        .filter(|(k, _)| !k.is_empty())
        .collect();
    Ok(UrlParts {
        base,
        path: path.to_string(),
        query,
    })
}

/// Form-style percent decoding; malformed escapes are kept verbatim.
fn decode_component(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                let digits = &bytes[i + 1..i + 3];
                let hex = digits
                    .iter()
                    .all(u8::is_ascii_hexdigit)
                    .then(|| std::str::from_utf8(digits).ok())
                    .flatten()
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                if let Some(b) = hex {
                    out.push(b);
                    i += 3;
                    continue;
                }
                out.push(b'%');
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(status: u16) -> RawExchange {
        RawExchange {
            method: Method::Post,
            url: Some("https://api.example.com/v1/books?page=2&sort=title#frag".into()),
            request_headers: BTreeMap::from([
                ("Content-Type".into(), vec!["application/json".into()]),
                ("X-Tenant".into(), vec!["acme".into()]),
            ]),
            request_body: r#"{"title":"Dune","pages":412}"#.into(),
            response_headers: BTreeMap::from([(
                "content-type".into(),
                vec!["application/json; charset=utf-8".into()],
            )]),
            response_body: r#"{"id":7,"title":"Dune","tags":["scifi"]}"#.into(),
            status,
            ..RawExchange::default()
        }
    }

    fn normalizer(yaml: &str) -> Normalizer {
        Normalizer::new(&EngineConfig::from_yaml_str(yaml).unwrap()).unwrap()
    }

    #[test]
    fn test_missing_url_is_error() {
        let mut ex = exchange(200);
        ex.url = None;
        assert_eq!(normalizer("").normalize(ex), Err(NormalizeError::MissingUrl));
        let mut ex = exchange(200);
        ex.url = Some("   ".into());
        assert_eq!(normalizer("").normalize(ex), Err(NormalizeError::MissingUrl));
    }

    #[test]
    fn test_invalid_url_is_error() {
        let mut ex = exchange(200);
        ex.url = Some("not a url".into());
        assert!(matches!(
            normalizer("").normalize(ex),
            Err(NormalizeError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_basic_fields() {
        let s = normalizer("").normalize(exchange(201)).unwrap();
        assert_eq!(s.method, Method::Post);
        assert_eq!(s.base_url, "https://api.example.com");
        assert_eq!(s.path, "/v1/books");
        assert_eq!(s.group, "v1_books");
        assert_eq!(s.tags, vec!["v1_books".to_string()]);
        assert_eq!(s.predicate, FIRST_REQUEST_PREDICATE);
        assert_eq!(s.response.status_code, 201);
        assert_eq!(s.request.query_params["page"], "__example__2");
        assert!(s.request.assert_query_params_pattern.is_empty());
        assert!(s.description.contains("by recorded- for https://api.example.com/v1/books"));
        assert_eq!(s.name, format!("recorded-v1_books-201-{}", s.digest()));
    }

    #[test]
    fn test_failure_status_replays_on_second_request() {
        let s = normalizer("").normalize(exchange(401)).unwrap();
        assert_eq!(s.predicate, SECOND_REQUEST_PREDICATE);
    }

    #[test]
    fn test_policy_copies_into_assertions() {
        let n = normalizer("assert_query_params_pattern: \"^PAGE$\"\nassert_headers_pattern: tenant\n");
        let s = n.normalize(exchange(200)).unwrap();
        assert_eq!(s.request.assert_query_params_pattern.get("page").map(String::as_str), Some("2"));
        assert!(!s.request.assert_query_params_pattern.contains_key("sort"));
        assert_eq!(s.request.assert_headers_pattern.get("X-Tenant").map(String::as_str), Some("acme"));
    }

    #[test]
    fn test_content_type_assertions_added_once() {
        let mut ex = exchange(200);
        ex.request_headers
            .insert("content-type".into(), vec!["application/json".into()]);
        let s = normalizer("").normalize(ex).unwrap();
        assert_eq!(
            s.request.assertions,
            vec![r#"VariableMatches headers.Content-Type "^application/json$""#.to_string()]
        );
        assert_eq!(
            s.response.assertions,
            vec![r#"VariableMatches headers.Content-Type "^application/json; charset=utf\\-8$""#.to_string()]
        );

        let mut list = Vec::new();
        add_content_type_assertion(&mut list, "text/plain");
        add_content_type_assertion(&mut list, "text/plain");
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_content_type_assertion_checks_media_type() {
        let s = normalizer("").normalize(exchange(200)).unwrap();
        let evaluator = crate::assertion::BuiltinEvaluator::new();
        let response = |content_type: &str| {
            crate::assertion::AssertionContext::new()
                .with_header("Content-Type", content_type)
                .with_body(br#"{"id":7,"title":"Dune","tags":["scifi"]}"#)
                .with_status(200)
        };

        assert!(s.response.assert(&response("application/json; charset=utf-8"), &evaluator).is_ok());
        for other in ["text/html; charset=utf-8", "application/json", "application/jsonx; charset=utf-8"] {
            let err = s.response.assert(&response(other), &evaluator).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Validation, "{other}");
        }
    }

    #[test]
    fn test_body_patterns_and_shared_variables() {
        let s = normalizer("").normalize(exchange(200)).unwrap();
        assert!(s.request.assert_contents_pattern.contains("title"));
        assert!(s.request.example_contents.contains('\n'));
        assert!(s.response.add_shared_variables.contains(&"id".to_string()));
    }

    #[test]
    fn test_unparseable_body_is_not_fatal() {
        let mut ex = exchange(200);
        ex.request_body = "{not json".into();
        ex.response_body = "plain text".into();
        let s = normalizer("").normalize(ex).unwrap();
        assert_eq!(s.request.contents, "{not json");
        assert!(s.request.assert_contents_pattern.is_empty());
        assert!(s.response.assert_contents_pattern.is_empty());
    }

    #[test]
    fn test_target_header_on_root_path() {
        let mut ex = exchange(200);
        ex.url = Some("https://dynamodb.us-east-1.amazonaws.com/".into());
        ex.request_headers.insert(
            "X-Amz-Target".into(),
            vec!["DynamoDB_20120810.ListTables".into()],
        );
        let s = normalizer("").normalize(ex).unwrap();
        assert_eq!(s.group, "DynamoDB_20120810.ListTables");
        assert_eq!(s.tags, vec![s.group.clone()]);

        let mut ex = exchange(200);
        ex.url = Some("https://svc/".into());
        ex.request_headers
            .insert("x-target".into(), vec!["a.b.Users.List".into()]);
        assert_eq!(normalizer("").normalize(ex).unwrap().group, "Users.List");
    }

    #[test]
    fn test_title_wins_over_path_group() {
        let mut ex = exchange(200);
        ex.title = Some("Books API".into());
        assert_eq!(normalizer("").normalize(ex).unwrap().group, "Books API");
    }

    #[test]
    fn test_authorization_inference() {
        let mut ex = exchange(200);
        ex.request_headers.insert(
            "Authorization".into(),
            vec!["AWS4-HMAC-SHA256 Credential=AKID/20240101/us-east-1/execute-api/aws4_request, SignedHeaders=host".into()],
        );
        let s = normalizer("").normalize(ex).unwrap();
        let keys: Vec<&str> = s.authentication.keys().map(String::as_str).collect();
        assert_eq!(keys, ["api_key", "aws_sigv4", "bearer_auth"]);
        assert!(matches!(
            &s.authentication["aws_sigv4"],
            Authorization::AwsSigV4(AwsSigV4Auth { service: Some(svc), .. }) if svc == "execute-api"
        ));

        let mut ex = exchange(200);
        ex.request_headers
            .insert("authorization".into(), vec!["Bearer abc".into()]);
        let s = normalizer("").normalize(ex).unwrap();
        let keys: Vec<&str> = s.authentication.keys().map(String::as_str).collect();
        assert_eq!(keys, ["basic_auth", "bearer_auth"]);

        let s = normalizer("").normalize(exchange(200)).unwrap();
        assert!(s.authentication.is_empty());
    }

    #[test]
    fn test_explicit_name_header() {
        let mut ex = exchange(200);
        ex.request_headers
            .insert("x-mock-scenario".into(), vec!["create-dune".into()]);
        assert_eq!(normalizer("").normalize(ex).unwrap().name, "create-dune");
    }

    #[test]
    fn test_identical_exchanges_get_identical_names() {
        let a = normalizer("").normalize(exchange(200)).unwrap();
        let b = normalizer("").normalize(exchange(200)).unwrap();
        assert_eq!(a.name, b.name);
    }

    #[test]
    fn test_split_url() {
        let parts = split_url("/search?q=a+b%21&empty&=x").unwrap();
        assert_eq!(parts.base, "");
        assert_eq!(parts.path, "/search");
        assert_eq!(
            parts.query,
            vec![("q".to_string(), "a b!".to_string()), ("empty".to_string(), String::new())]
        );
        assert_eq!(split_url("http://h:8080").unwrap().path, "/");
        assert!(split_url("://h/x").is_err());
        assert!(split_url("http:///x").is_err());
        assert_eq!(decode_component("100%"), "100%");
        assert_eq!(decode_component("%zz"), "%zz");
    }

    #[test]
    fn test_decode_component_requires_two_hex_digits() {
        assert_eq!(decode_component("%+1"), "% 1");
        assert_eq!(decode_component("%-1x"), "%-1x");
        assert_eq!(decode_component("%2f%2F"), "//");
    }
}
