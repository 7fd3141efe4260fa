//! Consumer metrics

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use observability::{RunningStats, StatsSummary};

/// Consumer metrics
#[derive(Debug, Default)]
pub struct ConsumerMetrics {
    /// Deliveries read from the source
    received: AtomicU64,

    /// Deliveries the handler accepted
    acked: AtomicU64,

    /// Failed attempts that were retried
    requeued: AtomicU64,

    /// Deliveries given up after `max_attempts`
    exhausted: AtomicU64,

    /// Source read errors
    source_errors: AtomicU64,

    /// Handler latency in milliseconds, per attempt
    latency_ms: Mutex<RunningStats>,
}

impl ConsumerMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_acked(&self) {
        self.acked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_requeued(&self) {
        self.requeued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_exhausted(&self) {
        self.exhausted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_source_error(&self) {
        self.source_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one handler call's latency
    pub fn record_latency_ms(&self, ms: f64) {
        self.latency_ms
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(ms);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> ConsumerStats {
        let latency = self.latency_ms.lock().unwrap_or_else(|e| e.into_inner());
        ConsumerStats {
            received: self.received.load(Ordering::Relaxed),
            acked: self.acked.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            source_errors: self.source_errors.load(Ordering::Relaxed),
            latency_ms: StatsSummary::from(&*latency),
        }
    }
}

/// Consumer statistics snapshot
#[derive(Debug, Clone, Default)]
pub struct ConsumerStats {
    /// Deliveries read from the source
    pub received: u64,

    /// Deliveries the handler accepted
    pub acked: u64,

    /// Failed attempts that were retried
    pub requeued: u64,

    /// Deliveries given up after `max_attempts`
    pub exhausted: u64,

    /// Source read errors
    pub source_errors: u64,

    /// Handler latency (ms)
    pub latency_ms: StatsSummary,
}

impl ConsumerStats {
    /// Deliveries neither acked nor exhausted
    pub fn in_flight(&self) -> u64 {
        self.received.saturating_sub(self.acked + self.exhausted)
    }
}
