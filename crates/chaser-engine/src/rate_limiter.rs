//! Token-bucket admission control for order traffic.
//!
//! One limiter per operation class. An acquire is admitted iff the event
//! count within the last second is below the per-second rate and the
//! count within the retained window is below the burst size. The limiter
//! never fails, it only delays.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Events older than this are discarded lazily to bound memory.
const RETENTION: Duration = Duration::from_secs(60);

/// Blocking acquires sleep in increments of this.
const ACQUIRE_POLL: Duration = Duration::from_millis(50);

/// Token-bucket rate limiter for one operation class.
pub struct RateLimiter {
    rate_per_second: usize,
    burst: usize,
    events: Mutex<VecDeque<Instant>>,
}

/// Point-in-time limiter statistics.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiterStats {
    pub events_in_last_second: usize,
    pub events_in_window: usize,
    pub is_limited: bool,
}

impl RateLimiter {
    pub fn new(rate_per_second: usize, burst: usize) -> Self {
        Self {
            rate_per_second,
            burst,
            events: Mutex::new(VecDeque::with_capacity(burst)),
        }
    }

    /// Admit and record one event if within limits.
    pub fn try_acquire(&self) -> bool {
        let now = Instant::now();
        let mut events = self.events.lock();
        Self::discard_old(&mut events, now);

        if events.len() >= self.burst {
            return false;
        }

        let one_second_ago = now - Duration::from_secs(1);
        let recent = events.iter().filter(|&&t| t > one_second_ago).count();
        if recent >= self.rate_per_second {
            return false;
        }

        events.push_back(now);
        true
    }

    /// Sleep in short increments until admitted.
    pub async fn acquire(&self) {
        while !self.try_acquire() {
            tokio::time::sleep(ACQUIRE_POLL).await;
        }
    }

    pub fn stats(&self) -> RateLimiterStats {
        let now = Instant::now();
        let mut events = self.events.lock();
        Self::discard_old(&mut events, now);

        let one_second_ago = now - Duration::from_secs(1);
        let recent = events.iter().filter(|&&t| t > one_second_ago).count();
        RateLimiterStats {
            events_in_last_second: recent,
            events_in_window: events.len(),
            is_limited: recent >= self.rate_per_second || events.len() >= self.burst,
        }
    }

    pub fn reset(&self) {
        self.events.lock().clear();
    }

    fn discard_old(events: &mut VecDeque<Instant>, now: Instant) {
        let cutoff = now - RETENTION;
        while events.front().is_some_and(|&t| t < cutoff) {
            events.pop_front();
        }
    }
}

/// The engine's two limiter instances: place and cancel.
pub struct OrderRateLimiter {
    pub place: RateLimiter,
    pub cancel: RateLimiter,
}

impl OrderRateLimiter {
    /// Burst headroom is twice the per-second rate for each class.
    pub fn new(max_orders_per_second: usize, max_requests_per_second: usize) -> Self {
        Self {
            place: RateLimiter::new(max_orders_per_second, max_orders_per_second * 2),
            cancel: RateLimiter::new(max_requests_per_second, max_requests_per_second * 2),
        }
    }
}

impl Default for OrderRateLimiter {
    fn default() -> Self {
        Self::new(10, 20)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_under_rate() {
        let limiter = RateLimiter::new(10, 20);
        for _ in 0..10 {
            assert!(limiter.try_acquire());
        }
        // 11th in the same second is refused.
        assert!(!limiter.try_acquire());
    }

    #[test]
    fn test_rate_bound_over_one_second_window() {
        let limiter = RateLimiter::new(5, 100);
        let mut admitted = 0;
        for _ in 0..50 {
            if limiter.try_acquire() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 5);
        assert!(limiter.stats().is_limited);
    }

    #[test]
    fn test_burst_bound() {
        // Burst smaller than rate: burst wins.
        let limiter = RateLimiter::new(100, 3);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
        assert_eq!(limiter.stats().events_in_window, 3);
    }

    #[test]
    fn test_reset_clears_events() {
        let limiter = RateLimiter::new(1, 1);
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
        limiter.reset();
        assert!(limiter.try_acquire());
    }

    #[test]
    fn test_default_instances() {
        let limiters = OrderRateLimiter::default();
        assert!(limiters.place.try_acquire());
        assert!(limiters.cancel.try_acquire());
    }

    #[tokio::test]
    async fn test_blocking_acquire_immediate_when_under_limit() {
        let limiter = RateLimiter::new(10, 20);
        tokio::time::timeout(Duration::from_millis(10), limiter.acquire())
            .await
            .expect("acquire under limit should not block");
    }

    #[tokio::test]
    async fn test_blocking_acquire_waits_for_window_to_roll() {
        let limiter = RateLimiter::new(1, 10);
        assert!(limiter.try_acquire());

        let start = Instant::now();
        tokio::time::timeout(Duration::from_secs(3), limiter.acquire())
            .await
            .expect("acquire should admit once the window rolls");
        // Admission required waiting out the one-second window.
        assert!(start.elapsed() >= Duration::from_millis(900));
    }
}
