//! `apimock` - service virtualization engine
//!
//! Decides which stored scenario answers an incoming HTTP request, checks
//! the constraints recorded with it, turns captured exchanges into new
//! scenarios and injects configured faults and latency per group.

pub mod assertion;
pub mod chaos;
pub mod cli;
pub mod config;
pub mod error;
pub mod normalize;
pub mod observability;
pub mod path;
pub mod scenario;
pub mod types;
