//! Metrics for `apimock`.
//!
//! Counters and histograms go through the `metrics` facade and are no-ops
//! until a recorder is installed. [`init_metrics`] installs a Prometheus
//! recorder whose handle renders the exposition text on demand.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::{ApiMockError, ErrorKind};

static PROMETHEUS: OnceLock<PrometheusHandle> = OnceLock::new();

/// Maximum length for group name labels.
const MAX_GROUP_LABEL_LEN: usize = 64;

/// Installs the global Prometheus recorder and returns its handle.
///
/// Calling again returns the handle installed first.
///
/// # Errors
///
/// Returns `ApiMockError::Io` if another recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, ApiMockError> {
    if let Some(handle) = PROMETHEUS.get() {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(handle.clone());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ApiMockError::Io(std::io::Error::other(e.to_string())))?;
    describe_metrics();
    Ok(PROMETHEUS.get_or_init(|| handle).clone())
}

/// Registers metric descriptions with the global recorder.
pub fn describe_metrics() {
    describe_counter!(
        "apimock_match_total",
        "Scenario match attempts by outcome"
    );
    describe_counter!(
        "apimock_chaos_faults_total",
        "HTTP failures injected by chaos, by group and status"
    );
    describe_histogram!(
        "apimock_chaos_latency_ms",
        "Latency injected by chaos in milliseconds"
    );
    describe_counter!(
        "apimock_scenarios_normalized_total",
        "Exchanges normalized into scenarios"
    );
}

/// Outcome label for a match attempt; `None` is a successful match.
#[must_use]
pub const fn match_outcome(kind: Option<ErrorKind>) -> &'static str {
    match kind {
        None => "matched",
        Some(kind) => kind.as_str(),
    }
}

/// Records one candidate verdict.
pub fn record_match(kind: Option<ErrorKind>) {
    counter!("apimock_match_total", "outcome" => match_outcome(kind)).increment(1);
}

/// Records an injected failure status.
pub fn record_chaos_fault(group: &str, status: u16) {
    counter!(
        "apimock_chaos_faults_total",
        "group" => sanitize_group_label(group),
        "status" => status.to_string(),
    )
    .increment(1);
}

/// Records injected latency.
pub fn record_chaos_latency(group: &str, delay: Duration) {
    histogram!("apimock_chaos_latency_ms", "group" => sanitize_group_label(group))
        .record(delay.as_secs_f64() * 1000.0);
}

/// Records a normalized exchange.
pub fn record_normalized() {
    counter!("apimock_scenarios_normalized_total").increment(1);
}

/// Truncates group names and replaces characters Prometheus labels reject.
fn sanitize_group_label(name: &str) -> String {
    name.chars()
        .take(MAX_GROUP_LABEL_LEN)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
