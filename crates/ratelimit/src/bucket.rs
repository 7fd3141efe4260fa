//! Token bucket

use std::time::Instant;

/// Token bucket with continuous refill
///
/// Tokens refill at `rate` per second up to `capacity`. Each admit consumes
/// one token; when none is available the admit is rejected without waiting.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    /// Maximum tokens (burst size)
    capacity: f64,
    /// Tokens added per second
    rate: f64,
    /// Current available tokens
    tokens: f64,
    /// Last refill timestamp
    last_refill: Instant,
}

impl TokenBucket {
    /// Creates a full bucket with `rate` tokens per second and the same capacity
    pub fn new(rate: u32, now: Instant) -> Self {
        let rate = f64::from(rate);
        Self {
            capacity: rate,
            rate,
            tokens: rate,
            last_refill: now,
        }
    }

    /// Tries to consume one token. Returns `true` if allowed.
    pub fn try_take(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Currently available tokens
    pub fn available(&self) -> f64 {
        self.tokens
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_refill = now;
    }
}
