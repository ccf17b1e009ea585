//! Sliding-window rate limiting

use std::collections::VecDeque;

pub const MINUTE_MS: i64 = 60 * 1000;
pub const HOUR_MS: i64 = 60 * MINUTE_MS;

/// Admits at most `max` hits within any trailing `window_ms`
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max: usize,
    window_ms: i64,
    hits: VecDeque<i64>,
}

impl RateLimiter {
    pub fn new(max: usize, window_ms: i64) -> Self {
        Self {
            max,
            window_ms,
            hits: VecDeque::new(),
        }
    }

    pub fn per_minute(max: usize) -> Self {
        Self::new(max, MINUTE_MS)
    }

    pub fn per_hour(max: usize) -> Self {
        Self::new(max, HOUR_MS)
    }

    /// Seed the window with earlier hits, oldest first
    pub fn with_hits(mut self, hits: impl IntoIterator<Item = i64>) -> Self {
        self.hits.extend(hits);
        self
    }

    pub fn hits(&self) -> Vec<i64> {
        self.hits.iter().copied().collect()
    }

    fn evict(&mut self, now_ms: i64) {
        let cutoff = now_ms - self.window_ms;
        while matches!(self.hits.front(), Some(&t) if t <= cutoff) {
            self.hits.pop_front();
        }
    }

    /// Record a hit if allowed; denial leaves the window untouched
    pub fn try_acquire(&mut self, now_ms: i64) -> bool {
        self.evict(now_ms);
        if self.hits.len() >= self.max {
            return false;
        }
        self.hits.push_back(now_ms);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denies_after_max() {
        let mut limiter = RateLimiter::per_minute(2);
        assert!(limiter.try_acquire(0));
        assert!(limiter.try_acquire(10));
        assert!(!limiter.try_acquire(20));
    }

    #[test]
    fn test_window_slides() {
        let mut limiter = RateLimiter::per_hour(1);
        assert!(limiter.try_acquire(1_000));
        assert!(!limiter.try_acquire(1_000 + HOUR_MS - 1));
        assert!(limiter.try_acquire(1_000 + HOUR_MS));
    }

    #[test]
    fn test_restored_hits_count_against_window() {
        let mut first = RateLimiter::per_hour(2);
        assert!(first.try_acquire(0));
        assert!(first.try_acquire(100));

        let mut second = RateLimiter::per_hour(2).with_hits(first.hits());
        assert!(!second.try_acquire(200));
        assert!(second.try_acquire(HOUR_MS + 1));
        assert_eq!(second.hits(), vec![100, HOUR_MS + 1]);
    }
}
