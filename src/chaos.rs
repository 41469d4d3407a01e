//! Per-group fault and latency injection.
//!
//! A [`GroupConfig`] is resolved once into an immutable [`ChaosPolicy`]
//! with every default filled in. A [`ChaosInjector`] pairs that policy with
//! a seeded random source; only the random draw is serialized.
//!
//! Both faults and latency share one gate: draw `u` uniformly from `[0, 1)`
//! and fire when `u > 1 / mean`. A larger mean therefore fires *more*
//! often. That direction is kept for compatibility with existing chaos
//! configurations.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::config::GroupConfig;
use crate::observability::metrics;

/// Mean used when a group leaves `mean_time_between_failure` unset.
pub const DEFAULT_MEAN_TIME_BETWEEN_FAILURE: f64 = 2.0;
/// Mean used when a group leaves `mean_time_between_additional_latency` unset.
pub const DEFAULT_MEAN_TIME_BETWEEN_LATENCY: f64 = 3.0;
/// Latency ceiling used when a group leaves `max_additional_latency` unset.
pub const DEFAULT_MAX_ADDITIONAL_LATENCY: Duration = Duration::from_secs(2);
/// Error statuses used when a group declares none.
pub const DEFAULT_HTTP_ERRORS: [u16; 3] = [400, 401, 500];

// ============================================================================
// Policy
// ============================================================================

/// Fully resolved chaos settings for one group.
#[derive(Debug, Clone, PartialEq)]
pub struct ChaosPolicy {
    pub enabled: bool,
    pub mean_time_between_failure: f64,
    pub mean_time_between_latency: f64,
    pub max_additional_latency: Duration,
    pub http_errors: Vec<u16>,
}

impl Default for ChaosPolicy {
    fn default() -> Self {
        GroupConfig::default().resolve()
    }
}

impl GroupConfig {
    /// Fills every unset chaos field with its default.
    #[must_use]
    pub fn resolve(&self) -> ChaosPolicy {
        let mean = |value: f64, default: f64| if value > 0.0 { value } else { default };
        ChaosPolicy {
            enabled: self.chaos_enabled,
            mean_time_between_failure: mean(
                self.mean_time_between_failure,
                DEFAULT_MEAN_TIME_BETWEEN_FAILURE,
            ),
            mean_time_between_latency: mean(
                self.mean_time_between_additional_latency,
                DEFAULT_MEAN_TIME_BETWEEN_LATENCY,
            ),
            max_additional_latency: if self.max_additional_latency.is_zero() {
                DEFAULT_MAX_ADDITIONAL_LATENCY
            } else {
                self.max_additional_latency
            },
            http_errors: if self.http_errors.is_empty() {
                DEFAULT_HTTP_ERRORS.to_vec()
            } else {
                self.http_errors.clone()
            },
        }
    }
}

/// The shared firing gate: `sample > 1 / mean`.
#[must_use]
pub fn should_fire(sample: f64, mean: f64) -> bool {
    sample > 1.0 / mean
}

/// Latency for one firing.
///
/// `window` is the max latency in tenths of a second (at least one),
/// `step` is drawn from `0..window`, `fraction` from `[0, 1)`. The result is
/// `(fraction + 0.1) * (step + 1)` tenths of a second, clamped to `max`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn scaled_latency(step: u64, fraction: f64, max: Duration) -> Duration {
    let tenths = (step + 1) as f64;
    let secs = (fraction + 0.1) * tenths / 10.0;
    Duration::try_from_secs_f64(secs).map_or(max, |d| d.min(max))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn latency_window(max: Duration) -> u64 {
    ((max.as_secs_f64() * 10.0) as u64).max(1)
}

// ============================================================================
// Injector
// ============================================================================

/// Chaos decisions for one group.
#[derive(Debug)]
pub struct ChaosInjector {
    group: String,
    policy: ChaosPolicy,
    rng: Mutex<StdRng>,
}

impl ChaosInjector {
    /// Creates an injector; `seed` makes the draws reproducible.
    #[must_use]
    pub fn new(group: impl Into<String>, policy: ChaosPolicy, seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        Self {
            group: group.into(),
            policy,
            rng: Mutex::new(rng),
        }
    }

    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    #[must_use]
    pub const fn policy(&self) -> &ChaosPolicy {
        &self.policy
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.policy.enabled
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }

    /// Status code to inject, or `0` for none.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        if !self.policy.enabled || self.policy.http_errors.is_empty() {
            return 0;
        }
        let errors = &self.policy.http_errors;
        let mean = self.policy.mean_time_between_failure;
        let status = self.with_rng(|rng| {
            if should_fire(rng.random::<f64>(), mean) {
                errors[rng.random_range(0..errors.len())]
            } else {
                0
            }
        });
        if status != 0 {
            info!(group = %self.group, status, "chaos injected HTTP failure");
            metrics::record_chaos_fault(&self.group, status);
        }
        status
    }

    /// Extra latency to add, or zero.
    #[must_use]
    pub fn delay_latency(&self) -> Duration {
        if !self.policy.enabled {
            return Duration::ZERO;
        }
        let max = self.policy.max_additional_latency;
        let mean = self.policy.mean_time_between_latency;
        let window = latency_window(max);
        let delay = self.with_rng(|rng| {
            if should_fire(rng.random::<f64>(), mean) {
                scaled_latency(rng.random_range(0..window), rng.random::<f64>(), max)
            } else {
                Duration::ZERO
            }
        });
        if !delay.is_zero() {
            info!(group = %self.group, delay_ms = delay.as_millis(), "chaos injected latency");
            metrics::record_chaos_latency(&self.group, delay);
        }
        delay
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Concurrent map of group name to shared injector.
#[derive(Debug, Default)]
pub struct ChaosRegistry {
    injectors: DashMap<String, Arc<ChaosInjector>>,
}

impl ChaosRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves `config` and installs (or replaces) the group's injector.
    pub fn upsert(&self, group: &str, config: &GroupConfig, seed: Option<u64>) -> Arc<ChaosInjector> {
        let injector = Arc::new(ChaosInjector::new(group, config.resolve(), seed));
        self.injectors
            .insert(group.to_string(), Arc::clone(&injector));
        injector
    }

    #[must_use]
    pub fn get(&self, group: &str) -> Option<Arc<ChaosInjector>> {
        self.injectors.get(group).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove(&self, group: &str) -> Option<Arc<ChaosInjector>> {
        self.injectors.remove(group).map(|(_, injector)| injector)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.injectors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.injectors.is_empty()
    }

    /// Group names, sorted.
    #[must_use]
    pub fn groups(&self) -> Vec<String> {
        let mut names: Vec<String> = self.injectors.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
