//! `chaos` command handler.
//!
//! Draws from one group's injector and summarizes what a client of that
//! group would have seen.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;

use serde::Serialize;

use crate::chaos::ChaosInjector;
use crate::cli::args::{ChaosArgs, OutputFormat};
use crate::config::EngineConfig;
use crate::error::ApiMockError;
use crate::observability::metrics;

/// Outcome of sampling one injector.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct ChaosSummary {
    pub group: String,
    pub enabled: bool,
    pub samples: usize,
    /// Injected status code to draw count.
    pub failures: BTreeMap<u16, usize>,
    pub delayed: usize,
    pub min_latency_ms: u128,
    pub max_latency_ms: u128,
    pub mean_latency_ms: u128,
}

/// Samples `injector` `samples` times.
#[must_use]
pub fn sample(injector: &ChaosInjector, samples: usize) -> ChaosSummary {
    let mut summary = ChaosSummary {
        group: injector.group().to_string(),
        enabled: injector.is_enabled(),
        samples,
        ..ChaosSummary::default()
    };
    let mut total = Duration::ZERO;
    let mut min: Option<Duration> = None;
    let mut max = Duration::ZERO;

    for _ in 0..samples {
        let status = injector.http_status();
        if status != 0 {
            *summary.failures.entry(status).or_default() += 1;
        }
        let delay = injector.delay_latency();
        if !delay.is_zero() {
            summary.delayed += 1;
            total += delay;
            max = max.max(delay);
            min = Some(min.map_or(delay, |m| m.min(delay)));
        }
    }

    summary.min_latency_ms = min.unwrap_or_default().as_millis();
    summary.max_latency_ms = max.as_millis();
    if summary.delayed > 0 {
        summary.mean_latency_ms = total.as_millis() / summary.delayed as u128;
    }
    summary
}

/// Sample the injector of the requested group and print a summary.
///
/// # Errors
///
/// Returns a configuration error for an unreadable config and a usage error
/// for an unknown group.
pub fn run(args: &ChaosArgs) -> Result<(), ApiMockError> {
    let config = EngineConfig::load(&args.config)?;
    let handle = if args.metrics {
        Some(metrics::init_metrics()?)
    } else {
        None
    };

    let registry = config.chaos_registry(args.seed);
    let injector = registry.get(&args.group).ok_or_else(|| {
        let mut message = format!("unknown group '{}'", args.group);
        if let Some(suggestion) = config.suggest_group(&args.group) {
            let _ = write!(message, "\n\nDid you mean '{suggestion}'?");
        }
        let groups = registry.groups();
        if !groups.is_empty() {
            let _ = write!(message, "\n\nDeclared groups: {}", groups.join(", "));
        }
        ApiMockError::Usage(message)
    })?;

    if !injector.is_enabled() {
        tracing::warn!(group = %args.group, "chaos is disabled for this group");
    }
    let summary = sample(&injector, args.samples);

    match args.format {
        OutputFormat::Human => print!("{}", render_human(&summary)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
    }
    if let Some(handle) = handle {
        print!("{}", handle.render());
    }
    Ok(())
}

fn render_human(summary: &ChaosSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "group {} ({}), {} samples",
        summary.group,
        if summary.enabled { "enabled" } else { "disabled" },
        summary.samples
    );
    let failed: usize = summary.failures.values().sum();
    let _ = writeln!(out, "failures: {failed}");
    for (status, count) in &summary.failures {
        let _ = writeln!(out, "  {status}: {count}");
    }
    let _ = writeln!(out, "delayed: {}", summary.delayed);
    if summary.delayed > 0 {
        let _ = writeln!(
            out,
            "  latency ms min/mean/max: {}/{}/{}",
            summary.min_latency_ms, summary.mean_latency_ms, summary.max_latency_ms
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GroupConfig;

    #[test]
    fn test_sample_disabled_group_is_quiet() {
        let injector = ChaosInjector::new("g", GroupConfig::default().resolve(), Some(1));
        let summary = sample(&injector, 50);
        assert!(!summary.enabled);
        assert!(summary.failures.is_empty());
        assert_eq!(summary.delayed, 0);
        assert_eq!(summary.mean_latency_ms, 0);
    }

    #[test]
    fn test_sample_enabled_group() {
        let config = GroupConfig {
            chaos_enabled: true,
            http_errors: vec![503],
            max_additional_latency: Duration::from_millis(400),
            ..GroupConfig::default()
        };
        let injector = ChaosInjector::new("g", config.resolve(), Some(9));
        let summary = sample(&injector, 500);
        assert_eq!(summary.failures.keys().copied().collect::<Vec<_>>(), [503]);
        assert!(summary.delayed > 0);
        assert!(summary.max_latency_ms <= 400);
        assert!(summary.min_latency_ms <= summary.mean_latency_ms);
        assert!(render_human(&summary).contains("503: "));
    }
}
