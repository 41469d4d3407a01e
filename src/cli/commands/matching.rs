//! `match` command handler.
//!
//! Loads stored scenarios, builds a key from the request described on the
//! command line and walks the candidates in file order. A candidate wins
//! when its key matches, its replay predicate accepts the occurrence count
//! and its request assertions pass.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::assertion::{AssertionContext, BuiltinEvaluator};
use crate::cli::args::{MatchArgs, OutputFormat};
use crate::error::{ApiMockError, ErrorKind, MatchError};
use crate::observability::metrics;
use crate::scenario::{Scenario, ScenarioKey};

#[derive(Deserialize)]
#[serde(untagged)]
enum ScenarioDoc {
    Many(Vec<Scenario>),
    One(Box<Scenario>),
}

/// Verdict for one candidate.
#[derive(Debug, Serialize)]
pub struct Verdict {
    pub scenario: String,
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    matched: Option<&'a str>,
    variables: BTreeMap<String, String>,
    candidates: &'a [Verdict],
}

/// Resolve the request against the stored scenarios.
///
/// # Errors
///
/// Returns a usage error when no scenario files are found, a scenario error
/// for invalid stored data, and the most relevant candidate error when
/// nothing matches.
pub fn run(args: &MatchArgs) -> Result<(), ApiMockError> {
    let mut scenarios = Vec::new();
    for path in expand_paths(&args.scenarios)? {
        scenarios.extend(load_scenarios(&path)?);
    }
    if scenarios.is_empty() {
        return Err(ApiMockError::Usage("no scenarios found".to_string()));
    }

    let query = to_multi(&args.query);
    let headers = to_multi(&args.headers);
    let body = match &args.body {
        Some(path) => std::fs::read(path)?,
        None => Vec::new(),
    };

    let mut live = ScenarioKey::from_request(
        args.method,
        &args.path,
        &query,
        &headers,
        &body,
        &args.name_header,
    );
    if let Some(group) = &args.group {
        live.group.clone_from(group);
    }
    if let Some(name) = &args.name {
        live.name.clone_from(name);
    }
    live.tags.clone_from(&args.tags);

    let mut ctx = AssertionContext::new().with_body(&body);
    for (name, value) in &args.query {
        ctx = ctx.with_query_param(name, value);
    }
    for (name, value) in &args.headers {
        ctx = ctx.with_header(name, value);
    }

    let evaluator = BuiltinEvaluator::new();
    let mut verdicts = Vec::with_capacity(scenarios.len());
    let mut winner: Option<&Scenario> = None;
    let mut best_error: Option<ApiMockError> = None;

    for scenario in &scenarios {
        let outcome = check_candidate(scenario, &live, &ctx, &evaluator, args.request_count);
        metrics::record_match(outcome.as_ref().err().map(error_kind));
        debug!(scenario = %scenario.name, matched = outcome.is_ok(), "candidate verdict");
        match outcome {
            Ok(()) => {
                verdicts.push(Verdict {
                    scenario: scenario.name.clone(),
                    matched: true,
                    kind: None,
                    reason: None,
                });
                winner = Some(scenario);
                break;
            }
            Err(e) => {
                verdicts.push(Verdict {
                    scenario: scenario.name.clone(),
                    matched: false,
                    kind: Some(error_kind(&e).as_str()),
                    reason: Some(e.to_string()),
                });
                if best_error
                    .as_ref()
                    .is_none_or(|best| rank(error_kind(&e)) > rank(error_kind(best)))
                {
                    best_error = Some(e);
                }
            }
        }
    }

    let variables = winner
        .map(|s| s.to_key().match_groups(&live.path))
        .unwrap_or_default();
    print_report(args.format, winner, &variables, &verdicts)?;

    match (winner, best_error) {
        (Some(_), _) => Ok(()),
        (None, Some(e)) => Err(e),
        (None, None) => Err(ApiMockError::Usage("no scenarios found".to_string())),
    }
}

fn check_candidate(
    scenario: &Scenario,
    live: &ScenarioKey,
    ctx: &AssertionContext,
    evaluator: &BuiltinEvaluator,
    request_count: u64,
) -> Result<(), ApiMockError> {
    scenario.to_key().equals(live)?;
    let accepted = scenario
        .predicate_matches(request_count, evaluator)
        .map_err(|e| MatchError::MalformedPattern {
            field: "predicate",
            pattern: scenario.predicate.clone(),
            message: e.to_string(),
        })?;
    if !accepted {
        return Err(MatchError::Predicate {
            predicate: scenario.predicate.clone(),
            request_count,
        }
        .into());
    }
    let ctx = ctx.clone().with_param(
        crate::scenario::REQUEST_COUNT_PARAM,
        serde_json::Value::from(request_count),
    );
    scenario.request.assert(&ctx, evaluator)?;
    Ok(())
}

fn error_kind(e: &ApiMockError) -> ErrorKind {
    match e {
        ApiMockError::Match(m) => m.kind(),
        ApiMockError::Assertion(a) => a.kind(),
        ApiMockError::Scenario(_) => ErrorKind::Validation,
        _ => ErrorKind::Configuration,
    }
}

const fn rank(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::NotFound => 0,
        ErrorKind::Validation => 1,
        ErrorKind::Configuration => 2,
    }
}

fn print_report(
    format: OutputFormat,
    winner: Option<&Scenario>,
    variables: &BTreeMap<String, String>,
    verdicts: &[Verdict],
) -> Result<(), ApiMockError> {
    match format {
        OutputFormat::Human => {
            for v in verdicts {
                match &v.reason {
                    None => println!("match    {}", v.scenario),
                    Some(reason) => println!(
                        "skip     {} [{}] {reason}",
                        v.scenario,
                        v.kind.unwrap_or_default()
                    ),
                }
            }
            if let Some(s) = winner {
                println!("selected {}", s.name);
                for (k, v) in variables {
                    println!("  {k} = {v}");
                }
            }
        }
        OutputFormat::Json => {
            let report = Report {
                matched: winner.map(|s| s.name.as_str()),
                variables: variables.clone(),
                candidates: verdicts,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

fn to_multi(pairs: &[(String, String)]) -> BTreeMap<String, Vec<String>> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (k, v) in pairs {
        out.entry(k.clone()).or_default().push(v.clone());
    }
    out
}

/// Expands glob patterns; plain paths are kept as given.
fn expand_paths(patterns: &[String]) -> Result<Vec<PathBuf>, ApiMockError> {
    let mut paths = Vec::new();
    for pattern in patterns {
        if !pattern.contains(['*', '?', '[']) {
            paths.push(PathBuf::from(pattern));
            continue;
        }
        let entries = glob::glob(pattern)
            .map_err(|e| ApiMockError::Usage(format!("invalid glob '{pattern}': {e}")))?;
        let mut matched: Vec<PathBuf> = entries.filter_map(Result::ok).collect();
        matched.sort();
        paths.extend(matched);
    }
    Ok(paths)
}

/// Reads every YAML document in `path`; a document may be one scenario or
/// a list of scenarios. Each scenario is validated.
///
/// # Errors
///
/// Returns I/O, YAML or scenario validation errors.
pub fn load_scenarios(path: &std::path::Path) -> Result<Vec<Scenario>, ApiMockError> {
    let text = std::fs::read_to_string(path)?;
    let mut out = Vec::new();
    for document in serde_yaml::Deserializer::from_str(&text) {
        match ScenarioDoc::deserialize(document)? {
            ScenarioDoc::Many(list) => out.extend(list),
            ScenarioDoc::One(one) => out.push(*one),
        }
    }
    for scenario in &mut out {
        scenario.validate()?;
    }
    debug!(path = %path.display(), count = out.len(), "loaded scenarios");
    Ok(out)
}
