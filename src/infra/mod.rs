//! Logging and metrics plumbing.

pub mod log;
pub mod metrics;
