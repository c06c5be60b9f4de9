//! Per-(user, provider) token-bucket admission control.
//!
//! Each pair gets a bucket holding up to `capacity` tokens that refills
//! continuously at `capacity / window`. A call spends one token. Denials are
//! never queued; the router fails over to the next provider instead.
//!
//! Buckets that have been idle for longer than the window are full again
//! and carry no state, so they are evicted every [`EVICT_EVERY`] checks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use concierge_types::config::RateLimitConfig;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allow,
    /// No token available. One will be after `retry_after`.
    Deny { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allow)
    }
}

/// Number of `check_limit` calls between idle-bucket sweeps.
pub const EVICT_EVERY: u64 = 1024;

struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

pub struct RateLimiter {
    capacity: f64,
    /// Tokens per second.
    refill_rate: f64,
    window: Duration,
    buckets: DashMap<(String, String), Bucket>,
    checks: AtomicU64,
}

impl RateLimiter {
    /// A limiter allowing `capacity` calls per `window` per pair.
    ///
    /// `capacity == 0` or a zero window disables limiting.
    pub fn new(capacity: u32, window: Duration) -> Self {
        let refill_rate = if window.is_zero() {
            0.0
        } else {
            capacity as f64 / window.as_secs_f64()
        };
        Self {
            capacity: capacity as f64,
            refill_rate,
            window,
            buckets: DashMap::new(),
            checks: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.requests_per_window,
            Duration::from_secs(config.window_seconds),
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0.0 && self.refill_rate > 0.0
    }

    /// Spend a token for `(user, provider)` if one is available.
    pub fn check_limit(&self, user: &str, provider: &str) -> RateDecision {
        if !self.is_enabled() {
            return RateDecision::Allow;
        }

        if self.checks.fetch_add(1, Ordering::Relaxed) % EVICT_EVERY == EVICT_EVERY - 1 {
            self.evict_idle();
        }

        self.spend(user, provider, Instant::now())
    }

    fn spend(&self, user: &str, provider: &str, now: Instant) -> RateDecision {
        let mut entry = self
            .buckets
            .entry((user.to_string(), provider.to_string()))
            .or_insert_with(|| Bucket {
                tokens: self.capacity,
                last_refill: now,
            });
        let bucket = entry.value_mut();

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_rate).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            RateDecision::Allow
        } else {
            let missing = 1.0 - bucket.tokens;
            RateDecision::Deny {
                retry_after: Duration::from_secs_f64(missing / self.refill_rate),
            }
        }
    }

    /// Drop buckets untouched for longer than the window.
    ///
    /// Such a bucket has refilled to capacity, so forgetting it changes no
    /// future decision.
    pub fn evict_idle(&self) {
        let now = Instant::now();
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| now.duration_since(bucket.last_refill) <= self.window);
        let evicted = before.saturating_sub(self.buckets.len());
        if evicted > 0 {
            tracing::debug!(
                evicted,
                remaining = self.buckets.len(),
                "evicted idle rate-limit buckets"
            );
        }
    }

    /// Number of (user, provider) pairs currently tracked.
    pub fn tracked_pairs(&self) -> usize {
        self.buckets.len()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("capacity", &self.capacity)
            .field("refill_rate", &self.refill_rate)
            .field("active_pairs", &self.buckets.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_capacity_then_denies() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        for _ in 0..3 {
            assert_eq!(limiter.check_limit("alice", "openai"), RateDecision::Allow);
        }
        match limiter.check_limit("alice", "openai") {
            RateDecision::Deny { retry_after } => {
                assert!(retry_after > Duration::from_secs(15));
                assert!(retry_after <= Duration::from_secs(20));
            }
            RateDecision::Allow => panic!("fourth call should be denied"),
        }
    }

    #[test]
    fn test_buckets_are_per_pair() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.check_limit("alice", "openai").is_allowed());
        assert!(!limiter.check_limit("alice", "openai").is_allowed());
        assert!(limiter.check_limit("alice", "anthropic").is_allowed());
        assert!(limiter.check_limit("bob", "openai").is_allowed());
    }

    #[test]
    fn test_tokens_refill_over_time() {
        let limiter = RateLimiter::new(1, Duration::from_millis(50));
        assert!(limiter.check_limit("alice", "p").is_allowed());
        assert!(!limiter.check_limit("alice", "p").is_allowed());
        std::thread::sleep(Duration::from_millis(70));
        assert!(limiter.check_limit("alice", "p").is_allowed());
    }

    #[test]
    fn test_evict_idle_drops_only_stale_buckets() {
        let limiter = RateLimiter::new(2, Duration::from_millis(30));
        for user in 0..50 {
            assert!(limiter.check_limit(&format!("user-{user}"), "p").is_allowed());
        }
        assert_eq!(limiter.tracked_pairs(), 50);

        std::thread::sleep(Duration::from_millis(60));
        assert!(limiter.check_limit("active", "p").is_allowed());
        limiter.evict_idle();
        assert_eq!(limiter.tracked_pairs(), 1);

        // An evicted pair starts over with a full bucket.
        assert!(limiter.check_limit("user-0", "p").is_allowed());
        assert!(limiter.check_limit("user-0", "p").is_allowed());
        assert!(!limiter.check_limit("user-0", "p").is_allowed());
    }

    #[test]
    fn test_periodic_sweep_bounds_tracked_pairs() {
        let limiter = RateLimiter::new(1, Duration::from_millis(10));
        for user in 0..(EVICT_EVERY - 1) {
            limiter.check_limit(&format!("user-{user}"), "p");
        }
        std::thread::sleep(Duration::from_millis(30));
        // This check triggers the sweep before inserting its own bucket.
        limiter.check_limit("late", "p");
        assert_eq!(limiter.tracked_pairs(), 1);
    }

    #[test]
    fn test_zero_capacity_disables_limiting() {
        let limiter = RateLimiter::new(0, Duration::from_secs(60));
        for _ in 0..100 {
            assert!(limiter.check_limit("alice", "p").is_allowed());
        }
    }
}
