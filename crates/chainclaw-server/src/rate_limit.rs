//! Per-user token bucket (spec.md §4.4 "Per-user rate limit ... enforced
//! before any skill call", §5 "Back-pressure and limits").
//!
//! Grounded on `chainclaw-providers`'s [`PriceOracle`](chainclaw_providers::PriceOracle)
//! cache shape: a `RwLock<HashMap<key, state-with-timestamp>>`, refreshed
//! lazily on access rather than by a background sweep.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Refills `capacity` tokens every `refill_every`; each call consumes one
/// token. Unknown users start with a full bucket.
pub struct RateLimiter {
    capacity: f64,
    refill_every: Duration,
    buckets: RwLock<HashMap<String, Bucket>>,
}

impl RateLimiter {
    pub fn new(capacity: f64, refill_every: Duration) -> Self {
        Self { capacity, refill_every, buckets: RwLock::new(HashMap::new()) }
    }

    /// Per spec.md §4.4 defaults: 20 commands/minute, matching
    /// [`chainclaw_types::user::Preferences::max_transactions_per_day`]'s
    /// order of magnitude for ambient (non-tx) traffic.
    pub fn default_for_commands() -> Self {
        Self::new(20.0, Duration::from_secs(60))
    }

    /// `true` if a token was available and consumed; `false` if the caller
    /// should be told to slow down.
    pub async fn try_acquire(&self, user_id: &str) -> bool {
        let mut buckets = self.buckets.write().await;
        let now = Instant::now();
        let bucket = buckets.entry(user_id.to_string()).or_insert_with(|| Bucket {
            tokens: self.capacity,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill);
        if elapsed >= self.refill_every {
            let periods = elapsed.as_secs_f64() / self.refill_every.as_secs_f64();
            bucket.tokens = (bucket.tokens + periods * self.capacity).min(self.capacity);
            bucket.last_refill = now;
        }

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exhausts_then_refuses() {
        let limiter = RateLimiter::new(2.0, Duration::from_secs(60));
        assert!(limiter.try_acquire("u1").await);
        assert!(limiter.try_acquire("u1").await);
        assert!(!limiter.try_acquire("u1").await);
    }

    #[tokio::test]
    async fn users_have_independent_buckets() {
        let limiter = RateLimiter::new(1.0, Duration::from_secs(60));
        assert!(limiter.try_acquire("u1").await);
        assert!(limiter.try_acquire("u2").await);
        assert!(!limiter.try_acquire("u1").await);
    }
}
