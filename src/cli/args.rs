//! CLI argument definitions
//!
//! All Clap derive structs for `apimock` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::scenario::Method;

// ============================================================================
// Root CLI
// ============================================================================

/// Scenario matching, normalization and chaos engine for API mocks.
#[derive(Parser, Debug)]
#[command(name = "apimock", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-error output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "APIMOCK_COLOR")]
    pub color: ColorChoice,

    /// Log line format on stderr.
    #[arg(long, default_value = "human", global = true, env = "APIMOCK_LOG_FORMAT")]
    pub log_format: OutputFormat,
}

// ============================================================================
// Top-Level Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Normalize captured exchanges into scenarios.
    Normalize(NormalizeArgs),

    /// Resolve a request against stored scenarios.
    Match(MatchArgs),

    /// Sample the chaos injector of a group.
    Chaos(ChaosArgs),

    /// Generate shell completion scripts.
    Completions(CompletionsArgs),

    /// Display version information.
    Version(VersionArgs),
}

/// Arguments for `normalize`.
#[derive(Args, Debug)]
pub struct NormalizeArgs {
    /// JSON file with one exchange or an array of exchanges (`-` for stdin).
    #[arg(short, long)]
    pub exchange: PathBuf,

    /// Engine configuration file.
    #[arg(short, long, env = "APIMOCK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format for the produced scenarios.
    #[arg(short, long, default_value = "yaml")]
    pub format: ScenarioFormat,
}

/// Arguments for `match`.
#[derive(Args, Debug)]
pub struct MatchArgs {
    /// Scenario YAML files or glob patterns.
    #[arg(short, long = "scenarios", required = true, num_args = 1..)]
    pub scenarios: Vec<String>,

    /// Request method.
    #[arg(short, long, default_value = "GET")]
    pub method: Method,

    /// Request path (query string is ignored; use --query).
    #[arg(short, long)]
    pub path: String,

    /// Request header as NAME=VALUE (repeatable).
    #[arg(long = "header", value_parser = parse_key_value)]
    pub headers: Vec<(String, String)>,

    /// Query parameter as NAME=VALUE (repeatable).
    #[arg(long = "query", value_parser = parse_key_value)]
    pub query: Vec<(String, String)>,

    /// File holding the request body.
    #[arg(long)]
    pub body: Option<PathBuf>,

    /// Restrict to a scenario group.
    #[arg(short, long)]
    pub group: Option<String>,

    /// Require a scenario name.
    #[arg(short, long)]
    pub name: Option<String>,

    /// Require tags (repeatable).
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Occurrence count used for replay predicates.
    #[arg(long, default_value_t = 1)]
    pub request_count: u64,

    /// Header carrying the scenario name.
    #[arg(long, default_value = crate::config::DEFAULT_SCENARIO_NAME_HEADER)]
    pub name_header: String,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for `chaos`.
#[derive(Args, Debug)]
pub struct ChaosArgs {
    /// Engine configuration file declaring the group.
    #[arg(short, long, env = "APIMOCK_CONFIG")]
    pub config: PathBuf,

    /// Group to sample.
    #[arg(short, long)]
    pub group: String,

    /// Number of draws.
    #[arg(short = 'n', long, default_value_t = 1000)]
    pub samples: usize,

    /// Seed for reproducible draws.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Print Prometheus metrics recorded during sampling.
    #[arg(long)]
    pub metrics: bool,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// Completions / Version
// ============================================================================

/// Arguments for shell completion generation.
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Target shell for completion script.
    pub shell: Shell,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

/// Serialization for produced scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ScenarioFormat {
    /// YAML documents.
    #[default]
    Yaml,
    /// Pretty-printed JSON.
    Json,
}

/// Shell type for completion generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    /// Bash shell.
    Bash,
    /// Zsh shell.
    Zsh,
    /// Fish shell.
    Fish,
    /// `PowerShell`.
    #[value(name = "powershell")]
    PowerShell,
    /// Elvish shell.
    Elvish,
}

/// Parses `NAME=VALUE`. The value may be empty; the name may not.
///
/// # Errors
///
/// Returns a message when `=` is missing or the name is empty.
pub fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{raw}'")),
    }
}

// ============================================================================
// Tests
// ============================================================================
