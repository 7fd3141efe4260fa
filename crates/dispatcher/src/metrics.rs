//! Dispatch metrics for observability

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one dispatcher
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    /// Messages whose handlers all succeeded
    dispatched: AtomicU64,
    /// Messages dropped by the rate limiter
    rate_limited: AtomicU64,
    /// Messages dropped because the body was not JSON
    malformed: AtomicU64,
    /// Messages aborted by a handler error
    handler_errors: AtomicU64,
    /// Successful store flushes
    flushes: AtomicU64,
    /// Failed store flushes
    flush_errors: AtomicU64,
    /// Commands delivered by successful flushes
    commands_flushed: AtomicU64,
    /// (message, route) pairs whose commands reached the store
    routed: AtomicU64,
}

impl DispatchMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rate_limited(&self) {
        self.rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_handler_errors(&self) {
        self.handler_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful flush carrying `commands` commands
    pub fn record_flush(&self, commands: usize) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        self.commands_flushed
            .fetch_add(commands as u64, Ordering::Relaxed);
    }

    /// Count `n` route writes confirmed by a successful flush
    pub fn add_routed(&self, n: u64) {
        self.routed.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_flush_errors(&self) {
        self.flush_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            handler_errors: self.handler_errors.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
            flush_errors: self.flush_errors.load(Ordering::Relaxed),
            commands_flushed: self.commands_flushed.load(Ordering::Relaxed),
            routed: self.routed.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatch metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub dispatched: u64,
    pub rate_limited: u64,
    pub malformed: u64,
    pub handler_errors: u64,
    pub flushes: u64,
    pub flush_errors: u64,
    pub commands_flushed: u64,
    pub routed: u64,
}

impl MetricsSnapshot {
    /// Messages dropped without reaching the store
    pub fn discarded(&self) -> u64 {
        self.rate_limited + self.malformed
    }
}
