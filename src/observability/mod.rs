//! Observability module
//!
//! Structured logging and metrics for the matching, normalization and chaos
//! paths.

pub mod logging;
pub mod metrics;

pub use logging::{LogFormat, init_logging};
pub use metrics::{describe_metrics, init_metrics};
