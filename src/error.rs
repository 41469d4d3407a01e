//! Error types for `apimock`
//!
//! Every domain error exposes an [`ErrorKind`] so callers can branch on
//! NotFound / Validation / Configuration without inspecting messages.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `apimock` CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, bad regex policy, corrupt scenario)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// No scenario matched the request
    pub const NOT_FOUND: i32 = 4;

    /// A scenario was targeted but one of its constraints failed
    pub const VALIDATION_ERROR: i32 = 5;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;
}

// ============================================================================
// Error Kind
// ============================================================================

/// Coarse classification shared by all domain errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The candidate is categorically the wrong scenario; try the next one.
    NotFound,
    /// The candidate was the intended target but a declared constraint failed.
    Validation,
    /// Stored scenario data or configuration is malformed.
    Configuration,
}

impl ErrorKind {
    /// Label used for metrics and log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Validation => "validation",
            Self::Configuration => "configuration",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `apimock` operations.
#[derive(Debug, Error)]
pub enum ApiMockError {
    /// Scenario key matching failed
    #[error(transparent)]
    Match(#[from] MatchError),

    /// Request or response assertion failed
    #[error(transparent)]
    Assertion(#[from] AssertionError),

    /// Exchange normalization failed
    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    /// Scenario failed structural validation
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    /// Configuration loading error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid command-line usage
    #[error("usage error: {0}")]
    Usage(String),
}

impl ApiMockError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        let kind = match self {
            Self::Match(e) => e.kind(),
            Self::Assertion(e) => e.kind(),
            Self::Normalize(e) => e.kind(),
            Self::Scenario(_) => ErrorKind::Validation,
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ErrorKind::Configuration,
            Self::Io(_) => return ExitCode::IO_ERROR,
            Self::Usage(_) => return ExitCode::USAGE_ERROR,
        };
        match kind {
            ErrorKind::NotFound => ExitCode::NOT_FOUND,
            ErrorKind::Validation => ExitCode::VALIDATION_ERROR,
            ErrorKind::Configuration => ExitCode::CONFIG_ERROR,
        }
    }
}

// ============================================================================
// Match Errors
// ============================================================================

/// Verdict of a failed [`ScenarioKey::equals`](crate::scenario::ScenarioKey::equals).
///
/// Rules are checked in a fixed order and the first broken one is reported.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MatchError {
    /// HTTP method differs
    #[error("method '{expected}' didn't match '{actual}'")]
    Method {
        /// Method of the stored scenario
        expected: String,
        /// Method of the incoming request
        actual: String,
    },

    /// Both sides declare a group and they differ
    #[error("group '{expected}' didn't match '{actual}'")]
    Group {
        /// Group of the stored scenario
        expected: String,
        /// Group of the incoming request
        actual: String,
    },

    /// Request path does not fit the stored path template
    #[error("path '{template}' didn't match '{path}'")]
    Path {
        /// Stored path template
        template: String,
        /// Incoming request path
        path: String,
    },

    /// A query parameter pattern failed
    #[error("request query param '{name}' didn't match: expected '{expected}', got '{actual}'")]
    QueryParam {
        /// Parameter name
        name: String,
        /// Stored literal or regex
        expected: String,
        /// Incoming value (empty when absent)
        actual: String,
    },

    /// A post parameter pattern failed
    #[error("request post param '{name}' didn't match: expected '{expected}', got '{actual}'")]
    PostParam {
        /// Parameter name
        name: String,
        /// Stored literal or regex
        expected: String,
        /// Incoming value (empty when absent)
        actual: String,
    },

    /// The content pattern failed
    #[error("contents '{expected}' didn't match '{actual}': {reason}")]
    Content {
        /// Stored content pattern
        expected: String,
        /// Incoming content
        actual: String,
        /// Why the structural check failed
        reason: String,
    },

    /// A header pattern failed
    #[error("request header '{name}' didn't match: expected '{expected}', got '{actual}'")]
    Header {
        /// Header name as declared on the stored key
        name: String,
        /// Stored literal or regex
        expected: String,
        /// Incoming value (empty when absent)
        actual: String,
    },

    /// A requested tag is not declared by the scenario
    #[error("request tag '{tag}' didn't match scenario tags {allowed:?}")]
    Tag {
        /// The offending tag from the incoming request
        tag: String,
        /// Tags declared on the stored scenario
        allowed: Vec<String>,
    },

    /// The requested scenario name differs
    #[error("scenario name '{expected}' didn't match '{actual}'")]
    Name {
        /// Name of the stored scenario
        expected: String,
        /// Name requested by the incoming request
        actual: String,
    },

    /// The replay predicate rejected this occurrence
    #[error("predicate '{predicate}' rejected request #{request_count}")]
    Predicate {
        /// Stored predicate template
        predicate: String,
        /// Occurrence count the predicate was evaluated with
        request_count: u64,
    },

    /// Stored pattern is not usable (corrupt or hand-edited scenario)
    #[error("malformed {field} pattern '{pattern}': {message}")]
    MalformedPattern {
        /// Which pattern field was malformed
        field: &'static str,
        /// The stored pattern
        pattern: String,
        /// Parser message
        message: String,
    },
}

impl MatchError {
    /// Returns the error kind for this verdict.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Method { .. }
            | Self::Group { .. }
            | Self::Path { .. }
            | Self::Predicate { .. } => ErrorKind::NotFound,
            Self::QueryParam { .. }
            | Self::PostParam { .. }
            | Self::Content { .. }
            | Self::Header { .. }
            | Self::Tag { .. }
            | Self::Name { .. } => ErrorKind::Validation,
            Self::MalformedPattern { .. } => ErrorKind::Configuration,
        }
    }

    /// Returns `true` when the caller should move on to the next candidate.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound)
    }
}

// ============================================================================
// Assertion Errors
// ============================================================================

/// Where an assertion was evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionSide {
    /// Request-side assertion
    Request,
    /// Response-side assertion
    Response,
}

impl std::fmt::Display for AssertionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request => f.write_str("request"),
            Self::Response => f.write_str("response"),
        }
    }
}

/// Failure of [`Request::assert`](crate::scenario::Request::assert) or
/// [`Response::assert`](crate::scenario::Response::assert).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssertionError {
    /// A value required by a pattern was absent
    #[error("failed to find required {side} {field} '{name}' with pattern '{pattern}'")]
    MissingValue {
        /// Request or response
        side: AssertionSide,
        /// `query param`, `post param` or `header`
        field: &'static str,
        /// Parameter or header name
        name: String,
        /// Required pattern
        pattern: String,
    },

    /// A value did not satisfy its pattern
    #[error("didn't match required {side} {field} '{name}' with pattern '{pattern}' and actual value '{actual}'")]
    Mismatch {
        /// Request or response
        side: AssertionSide,
        /// `query param`, `post param` or `header`
        field: &'static str,
        /// Parameter or header name
        name: String,
        /// Required pattern
        pattern: String,
        /// Live value
        actual: String,
    },

    /// Live content failed the structural content pattern
    #[error("failed to validate {side} contents: {reason}")]
    ContentMismatch {
        /// Request or response
        side: AssertionSide,
        /// First field that failed
        reason: String,
    },

    /// A free-form assertion evaluated to something other than `true`
    #[error("failed to assert {side} '{assertion}' with value '{result}'")]
    AssertionFailed {
        /// Request or response
        side: AssertionSide,
        /// Normalized assertion template
        assertion: String,
        /// What the template evaluated to
        result: String,
    },

    /// A stored pattern is not a valid regular expression
    #[error("invalid {side} pattern '{pattern}': {message}")]
    InvalidPattern {
        /// Request or response
        side: AssertionSide,
        /// Offending pattern
        pattern: String,
        /// Regex compiler message
        message: String,
    },

    /// The content pattern is not a JSON object of field regexes
    #[error("failed to unmarshal {side} contents pattern '{pattern}': {message}")]
    MalformedPattern {
        /// Request or response
        side: AssertionSide,
        /// Stored content pattern
        pattern: String,
        /// Parser message
        message: String,
    },

    /// A free-form assertion could not be evaluated
    #[error("failed to evaluate {side} assertion '{assertion}': {source}")]
    Template {
        /// Request or response
        side: AssertionSide,
        /// Normalized assertion template
        assertion: String,
        /// Evaluator error
        #[source]
        source: TemplateError,
    },
}

impl AssertionError {
    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingValue { .. }
            | Self::Mismatch { .. }
            | Self::ContentMismatch { .. }
            | Self::AssertionFailed { .. } => ErrorKind::Validation,
            Self::InvalidPattern { .. } | Self::MalformedPattern { .. } | Self::Template { .. } => {
                ErrorKind::Configuration
            }
        }
    }
}

// ============================================================================
// Template Errors
// ============================================================================

/// Template evaluation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// Unbalanced `{{ }}` or bad quoting
    #[error("template '{name}' is malformed: {message}")]
    Syntax {
        /// Template name
        name: String,
        /// What went wrong
        message: String,
    },

    /// Call to a function the evaluator does not provide
    #[error("function '{0}' is not defined")]
    UnknownFunction(String),

    /// Function called with the wrong number of arguments
    #[error("function '{function}' expects {expected} argument(s), got {actual}")]
    Arity {
        /// Function name
        function: String,
        /// Expected argument count description
        expected: &'static str,
        /// Number of arguments supplied
        actual: usize,
    },
}

// ============================================================================
// Normalization Errors
// ============================================================================

/// Errors raised while turning a raw exchange into a scenario.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NormalizeError {
    /// The exchange carried no URL
    #[error("exchange has no URL to resolve")]
    MissingUrl,

    /// The URL could not be split into base and path
    #[error("invalid URL '{0}'")]
    InvalidUrl(String),
}

impl NormalizeError {
    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

// ============================================================================
// Scenario Validation Errors
// ============================================================================

/// Structural validation failures for stored scenarios and keys.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScenarioError {
    /// Required field is empty
    #[error("{0} is not specified")]
    Missing(&'static str),

    /// Field exceeds its maximum length
    #[error("{field} is too long {len}")]
    TooLong {
        /// Field name
        field: &'static str,
        /// Actual length
        len: usize,
    },

    /// Field contains characters outside its allow-list
    #[error("{field} is invalid with special characters '{value}'")]
    InvalidCharacters {
        /// Field name
        field: &'static str,
        /// Offending value
        value: String,
    },

    /// Not a recognised HTTP method
    #[error("invalid method '{0}'")]
    InvalidMethod(String),
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path to the configuration file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    Parse {
        /// Path to the configuration file (or `<inline>`)
        path: PathBuf,
        /// Error message from the parser
        message: String,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `apimock` operations.
pub type Result<T> = std::result::Result<T, ApiMockError>;

// ============================================================================
// Tests
// ============================================================================
