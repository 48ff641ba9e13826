//! Sliding-window request limiting, keyed by client identifier.
//!
//! Handlers receive a limiter through application state rather than a
//! process global, so a shared-store implementation can be swapped in for
//! multi-instance deployments.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub trait RateLimiter: Send + Sync {
    /// Records a hit for `key` and reports whether it still fits the window.
    fn try_acquire(&self, key: &str) -> bool;
}

/// In-memory limiter: at most `max_hits` hits per `window` per key.
pub struct SlidingWindowLimiter {
    window: Duration,
    max_hits: usize,
    hits: Mutex<HashMap<String, Vec<Instant>>>,
}

impl SlidingWindowLimiter {
    pub fn new(window: Duration, max_hits: usize) -> Self {
        SlidingWindowLimiter {
            window,
            max_hits,
            hits: Mutex::new(HashMap::new()),
        }
    }

    fn try_acquire_at(&self, key: &str, now: Instant) -> bool {
        let mut hits = self.hits.lock().unwrap();
        let entry = hits.entry(key.to_string()).or_default();
        entry.retain(|&hit| now.duration_since(hit) < self.window);
        if entry.len() >= self.max_hits {
            return false;
        }
        entry.push(now);
        true
    }

    /// Drops keys whose hits have all expired. Called from a periodic sweep
    /// so idle clients do not accumulate.
    pub fn cleanup(&self) {
        let now = Instant::now();
        let mut hits = self.hits.lock().unwrap();
        hits.retain(|_, times| {
            times.retain(|&hit| now.duration_since(hit) < self.window);
            !times.is_empty()
        });
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.hits.lock().unwrap().len()
    }
}

impl RateLimiter for SlidingWindowLimiter {
    fn try_acquire(&self, key: &str) -> bool {
        self.try_acquire_at(key, Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_once_the_window_is_full() {
        let limiter = SlidingWindowLimiter::new(Duration::from_secs(60), 2);
        let start = Instant::now();

        assert!(limiter.try_acquire_at("10.0.0.1", start));
        assert!(limiter.try_acquire_at("10.0.0.1", start));
        assert!(!limiter.try_acquire_at("10.0.0.1", start));
    }

    #[test]
    fn keys_are_limited_independently() {
        let limiter = SlidingWindowLimiter::new(Duration::from_secs(60), 1);
        let start = Instant::now();

        assert!(limiter.try_acquire_at("10.0.0.1", start));
        assert!(!limiter.try_acquire_at("10.0.0.1", start));
        assert!(limiter.try_acquire_at("10.0.0.2", start));
    }

    #[test]
    fn expired_hits_free_up_the_window() {
        let window = Duration::from_secs(60);
        let limiter = SlidingWindowLimiter::new(window, 1);
        let start = Instant::now();

        assert!(limiter.try_acquire_at("10.0.0.1", start));
        assert!(!limiter.try_acquire_at("10.0.0.1", start + Duration::from_secs(30)));
        assert!(limiter.try_acquire_at("10.0.0.1", start + window + Duration::from_secs(1)));
    }

    #[test]
    fn cleanup_drops_idle_keys() {
        let limiter = SlidingWindowLimiter::new(Duration::from_millis(0), 5);
        let start = Instant::now();

        limiter.try_acquire_at("10.0.0.1", start);
        limiter.try_acquire_at("10.0.0.2", start);
        assert_eq!(limiter.tracked_keys(), 2);

        limiter.cleanup();
        assert_eq!(limiter.tracked_keys(), 0);
    }
}
