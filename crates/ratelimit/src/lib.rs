//! # Ratelimit
//!
//! Per-key token-bucket throttle with bounded memory.
//!
//! Each key gets its own bucket holding `rate` tokens and refilling at `rate`
//! tokens per second. At most `size` buckets are tracked; the least recently
//! used one is evicted (and forgets its state) when a new key arrives.
//!
//! ```
//! use ratelimit::RateLimiter;
//!
//! let limiter = RateLimiter::new(1, 500).unwrap();
//! assert!(!limiter.exceeded("some-key"));
//! assert!(limiter.exceeded("some-key"));
//! ```

mod bucket;

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Instant;

use lru::LruCache;
use thiserror::Error;
use tracing::trace;

pub use bucket::TokenBucket;

/// Rate limiter construction errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateLimitError {
    /// A zero rate would reject every message after the first
    #[error("rate must be > 0")]
    ZeroRate,

    /// The key cache must hold at least one entry
    #[error("size must be > 0")]
    ZeroSize,
}

/// Per-key rate limiter
///
/// Safe to share across tasks; the key map is guarded by an internal lock.
#[derive(Debug)]
pub struct RateLimiter {
    keys: Mutex<LruCache<String, TokenBucket>>,
    rate: u32,
}

impl RateLimiter {
    /// Create a limiter admitting `rate` messages per second per key,
    /// tracking at most `size` keys
    pub fn new(rate: u32, size: usize) -> Result<Self, RateLimitError> {
        if rate == 0 {
            return Err(RateLimitError::ZeroRate);
        }
        let size = NonZeroUsize::new(size).ok_or(RateLimitError::ZeroSize)?;
        Ok(Self {
            keys: Mutex::new(LruCache::new(size)),
            rate,
        })
    }

    /// Returns true if `key` has exceeded its rate
    ///
    /// The first observation of a key always admits.
    pub fn exceeded(&self, key: &str) -> bool {
        self.exceeded_at(key, Instant::now())
    }

    /// Number of keys currently tracked
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true when no key is tracked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured tokens per second
    pub fn rate(&self) -> u32 {
        self.rate
    }

    fn exceeded_at(&self, key: &str, now: Instant) -> bool {
        let mut keys = self.lock();

        if let Some(bucket) = keys.get_mut(key) {
            let exceeded = !bucket.try_take(now);
            if exceeded {
                trace!(key, "rate exceeded");
            }
            return exceeded;
        }

        let mut bucket = TokenBucket::new(self.rate, now);
        bucket.try_take(now);
        if let Some((evicted, _)) = keys.push(key.to_string(), bucket) {
            trace!(evicted = %evicted, "rate limiter evicted key");
        }
        false
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, TokenBucket>> {
        // A poisoned map only loses throttling state, never correctness.
        self.keys.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_exceeded() {
        let rl = RateLimiter::new(1, 500).unwrap();
        let start = Instant::now();
        assert!(!rl.exceeded_at("some-key", start));
        assert!(rl.exceeded_at("some-key", start));

        let later = start + Duration::from_secs(1);
        assert!(!rl.exceeded_at("some-key", later));
        assert!(rl.exceeded_at("some-key", later));
    }

    #[test]
    fn test_burst_equals_rate() {
        let rl = RateLimiter::new(10, 500).unwrap();
        let now = Instant::now();
        for _ in 0..10 {
            assert!(!rl.exceeded_at("k", now));
        }
        assert!(rl.exceeded_at("k", now));
    }

    #[test]
    fn test_keys_are_independent() {
        let rl = RateLimiter::new(1, 500).unwrap();
        let now = Instant::now();
        assert!(!rl.exceeded_at("a", now));
        assert!(rl.exceeded_at("a", now));
        assert!(!rl.exceeded_at("b", now));
    }

    #[test]
    fn test_max_keys() {
        let rl = RateLimiter::new(1, 1).unwrap();
        rl.exceeded("a");
        rl.exceeded("b");
        assert_eq!(rl.len(), 1);
    }

    #[test]
    fn test_evicted_key_starts_fresh() {
        let rl = RateLimiter::new(1, 1).unwrap();
        let now = Instant::now();
        assert!(!rl.exceeded_at("a", now));
        assert!(rl.exceeded_at("a", now));
        assert!(!rl.exceeded_at("b", now));
        // "a" was evicted by "b", so it is admitted again
        assert!(!rl.exceeded_at("a", now));
    }

    #[test]
    fn test_invalid_construction() {
        assert_eq!(RateLimiter::new(0, 10).unwrap_err(), RateLimitError::ZeroRate);
        assert_eq!(RateLimiter::new(10, 0).unwrap_err(), RateLimitError::ZeroSize);
    }
}
