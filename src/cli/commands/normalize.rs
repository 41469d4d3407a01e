//! `normalize` command handler.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::cli::args::{NormalizeArgs, ScenarioFormat};
use crate::config::EngineConfig;
use crate::error::ApiMockError;
use crate::normalize::{Normalizer, RawExchange};
use crate::scenario::Scenario;

#[derive(Deserialize)]
#[serde(untagged)]
enum ExchangeInput {
    Many(Vec<RawExchange>),
    One(Box<RawExchange>),
}

/// Normalize every exchange in the input and print the scenarios.
///
/// # Errors
///
/// Returns an I/O or JSON error for unreadable input, a configuration error
/// for a bad config file and a normalization error for exchanges without a
/// usable URL.
pub fn run(args: &NormalizeArgs) -> Result<(), ApiMockError> {
    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::from_yaml_str("")?,
    };
    let normalizer = Normalizer::new(&config)?;

    let exchanges = match serde_json::from_str::<ExchangeInput>(&read_input(&args.exchange)?)? {
        ExchangeInput::Many(list) => list,
        ExchangeInput::One(one) => vec![*one],
    };
    tracing::info!(count = exchanges.len(), "normalizing exchanges");

    let scenarios = exchanges
        .into_iter()
        .map(|exchange| normalizer.normalize(exchange))
        .collect::<Result<Vec<Scenario>, _>>()?;

    print!("{}", render(&scenarios, args.format)?);
    Ok(())
}

fn read_input(path: &Path) -> Result<String, ApiMockError> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(std::fs::read_to_string(path)?)
    }
}

/// One YAML document per scenario, or a JSON array.
///
/// # Errors
///
/// Propagates serializer errors.
pub fn render(scenarios: &[Scenario], format: ScenarioFormat) -> Result<String, ApiMockError> {
    match format {
        ScenarioFormat::Yaml => {
            let mut out = String::new();
            for scenario in scenarios {
                out.push_str("---\n");
                out.push_str(&serde_yaml::to_string(scenario)?);
            }
            Ok(out)
        }
        ScenarioFormat::Json => Ok(serde_json::to_string_pretty(scenarios)? + "\n"),
    }
}
