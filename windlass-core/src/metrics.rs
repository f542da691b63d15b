//! Metrics sink interface.
//!
//! The sink itself is external; workers and clients take a scope via
//! configuration and emit fixed, documented metric names against it.

use std::time::Duration;

pub trait MetricsScope: Send + Sync {
    fn counter(&self, name: &str, delta: u64);
    fn timer(&self, name: &str, duration: Duration);
}

/// Discards everything. The default when no scope is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsScope for NoopMetrics {
    fn counter(&self, _name: &str, _delta: u64) {}
    fn timer(&self, _name: &str, _duration: Duration) {}
}
