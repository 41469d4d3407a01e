//! Engine configuration.
//!
//! One explicit [`EngineConfig`] value carries everything the engine used to
//! read from process-wide state: which recorded parameters and headers are
//! always turned into assertions, how recorded scenarios are named, and the
//! per-group chaos settings. Load it once and pass it down.

pub mod duration;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::chaos::ChaosRegistry;
use crate::error::ConfigError;

/// Overrides [`EngineConfig::assert_headers_pattern`].
pub const ENV_ASSERT_HEADERS: &str = "APIMOCK_ASSERT_HEADERS_PATTERN";
/// Overrides [`EngineConfig::assert_query_params_pattern`].
pub const ENV_ASSERT_QUERY: &str = "APIMOCK_ASSERT_QUERY_PATTERN";
/// Overrides [`EngineConfig::assert_post_params_pattern`].
pub const ENV_ASSERT_POST: &str = "APIMOCK_ASSERT_POST_PATTERN";

/// Default header carrying an explicit scenario name.
pub const DEFAULT_SCENARIO_NAME_HEADER: &str = "X-Mock-Scenario";
/// Default prefix for synthesized scenario names.
pub const DEFAULT_NAME_PREFIX: &str = "recorded-";

const INLINE_PATH: &str = "<inline>";

// ============================================================================
// Schema
// ============================================================================

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Header names (case-insensitive regex) always copied into assertions
    pub assert_headers_pattern: String,
    /// Query parameter names always copied into assertions
    pub assert_query_params_pattern: String,
    /// Form parameter names always copied into assertions
    pub assert_post_params_pattern: String,
    /// Request header whose value names the recorded scenario
    pub scenario_name_header: String,
    /// Prefix for synthesized names
    pub name_prefix: String,
    /// Per-group settings in declaration order
    pub groups: IndexMap<String, GroupConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            assert_headers_pattern: String::new(),
            assert_query_params_pattern: String::new(),
            assert_post_params_pattern: String::new(),
            scenario_name_header: DEFAULT_SCENARIO_NAME_HEADER.to_string(),
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            groups: IndexMap::new(),
        }
    }
}

/// Chaos settings and variables for one scenario group.
///
/// Zero values mean "use the default"; they are filled in once by
/// [`GroupConfig::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GroupConfig {
    pub chaos_enabled: bool,
    pub mean_time_between_failure: f64,
    pub mean_time_between_additional_latency: f64,
    #[serde(with = "duration")]
    pub max_additional_latency: Duration,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub http_errors: Vec<u16>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, String>,
}

// ============================================================================
// Loading
// ============================================================================

impl EngineConfig {
    /// Reads, parses, applies environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read,
    /// `ConfigError::Parse` for malformed YAML and
    /// `ConfigError::InvalidValue` for invalid policy regexes or chaos values.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    /// Same as [`load`](Self::load) for in-memory YAML.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Self::parse(text, Path::new(INLINE_PATH))
    }

    fn parse(text: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut config: Self = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(text).map_err(|e| ConfigError::Parse {
                path: PathBuf::from(path),
                message: e.to_string(),
            })?
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        tracing::debug!(
            path = %path.display(),
            groups = config.groups.len(),
            "engine configuration loaded"
        );
        Ok(config)
    }

    /// Applies overrides from `lookup`, normally the process environment.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let fields = [
            (ENV_ASSERT_HEADERS, &mut self.assert_headers_pattern),
            (ENV_ASSERT_QUERY, &mut self.assert_query_params_pattern),
            (ENV_ASSERT_POST, &mut self.assert_post_params_pattern),
        ];
        for (name, field) in fields {
            let current = std::mem::take(field);
            *field = override_or(lookup(name), name, current);
        }
    }

    /// Checks policy regexes and chaos values.
    ///
    /// # Errors
    ///
    /// Returns the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        AssertionPolicy::from_config(self)?;
        for (name, group) in &self.groups {
            group.validate(name)?;
        }
        Ok(())
    }

    /// Compiled assertion policy.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a policy regex is invalid.
    pub fn assertion_policy(&self) -> Result<AssertionPolicy, ConfigError> {
        AssertionPolicy::from_config(self)
    }

    #[must_use]
    pub fn group(&self, name: &str) -> Option<&GroupConfig> {
        self.groups.get(name)
    }

    /// Closest declared group name, if within a Damerau-Levenshtein
    /// distance of 3.
    #[must_use]
    pub fn suggest_group(&self, input: &str) -> Option<&str> {
        self.groups
            .keys()
            .map(|name| (name.as_str(), strsim::damerau_levenshtein(input, name)))
            .filter(|(_, dist)| *dist <= 3)
            .min_by_key(|(_, dist)| *dist)
            .map(|(name, _)| name)
    }

    /// Builds one chaos injector per configured group.
    ///
    /// With a `seed`, group `i` (in declaration order) draws from
    /// `seed + i` so runs are reproducible.
    #[must_use]
    pub fn chaos_registry(&self, seed: Option<u64>) -> ChaosRegistry {
        let registry = ChaosRegistry::new();
        for (index, (name, group)) in (0u64..).zip(&self.groups) {
            registry.upsert(name, group, seed.map(|s| s.wrapping_add(index)));
        }
        registry
    }
}

impl GroupConfig {
    fn validate(&self, group: &str) -> Result<(), ConfigError> {
        let means = [
            ("mean_time_between_failure", self.mean_time_between_failure),
            (
                "mean_time_between_additional_latency",
                self.mean_time_between_additional_latency,
            ),
        ];
        for (field, value) in means {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("groups.{group}.{field}"),
                    value: value.to_string(),
                    expected: "a non-negative number".to_string(),
                });
            }
        }
        if let Some(code) = self.http_errors.iter().find(|c| !(100..=599).contains(*c)) {
            return Err(ConfigError::InvalidValue {
                field: format!("groups.{group}.http_errors"),
                value: code.to_string(),
                expected: "HTTP status codes between 100 and 599".to_string(),
            });
        }
        Ok(())
    }
}

/// Parses an override value, keeping `current` when absent or unparseable.
fn override_or<T: FromStr>(raw: Option<String>, name: &str, current: T) -> T {
    match raw {
        Some(v) => v.parse().unwrap_or_else(|_| {
            tracing::warn!(name, value = %v, "invalid env var value, using configured value");
            current
        }),
        None => current,
    }
}

// ============================================================================
// Assertion policy
// ============================================================================

/// Compiled "always assert" name filters.
///
/// An empty pattern or an empty name never matches.
#[derive(Debug, Clone, Default)]
pub struct AssertionPolicy {
    headers: Option<Regex>,
    query_params: Option<Regex>,
    post_params: Option<Regex>,
}

impl AssertionPolicy {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the offending field.
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            headers: compile_policy("assert_headers_pattern", &config.assert_headers_pattern)?,
            query_params: compile_policy(
                "assert_query_params_pattern",
                &config.assert_query_params_pattern,
            )?,
            post_params: compile_policy(
                "assert_post_params_pattern",
                &config.assert_post_params_pattern,
            )?,
        })
    }

    #[must_use]
    pub fn assert_header(&self, name: &str) -> bool {
        policy_matches(self.headers.as_ref(), name)
    }

    #[must_use]
    pub fn assert_query_param(&self, name: &str) -> bool {
        policy_matches(self.query_params.as_ref(), name)
    }

    #[must_use]
    pub fn assert_post_param(&self, name: &str) -> bool {
        policy_matches(self.post_params.as_ref(), name)
    }
}

fn compile_policy(field: &str, pattern: &str) -> Result<Option<Regex>, ConfigError> {
    if pattern.is_empty() {
        return Ok(None);
    }
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|e| ConfigError::InvalidValue {
            field: field.to_string(),
            value: pattern.to_string(),
            expected: format!("a valid regular expression ({e})"),
        })
}

fn policy_matches(re: Option<&Regex>, name: &str) -> bool {
    !name.is_empty() && re.is_some_and(|re| re.is_match(name))
}
