//! Per-request trading metrics.
//!
//! Counters are plain atomics; the running min/avg/max response times are
//! f64 bit patterns updated with CAS loops so the reader task never takes
//! a lock on the hot path.

use std::sync::atomic::{AtomicU64, Ordering};

/// Running trading-channel statistics.
pub struct TradingMetrics {
    total_requests: AtomicU64,
    successful_orders: AtomicU64,
    cancelled_orders: AtomicU64,
    failed_orders: AtomicU64,
    /// f64 bits.
    min_response_ms: AtomicU64,
    /// f64 bits.
    max_response_ms: AtomicU64,
    /// f64 bits.
    avg_response_ms: AtomicU64,
}

impl Default for TradingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl TradingMetrics {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            successful_orders: AtomicU64::new(0),
            cancelled_orders: AtomicU64::new(0),
            failed_orders: AtomicU64::new(0),
            min_response_ms: AtomicU64::new(f64::MAX.to_bits()),
            max_response_ms: AtomicU64::new(0f64.to_bits()),
            avg_response_ms: AtomicU64::new(0f64.to_bits()),
        }
    }

    /// Record one completed request round trip.
    pub fn update_response_time(&self, time_ms: f64) {
        let total = self.total_requests.fetch_add(1, Ordering::Relaxed) + 1;

        cas_f64(&self.min_response_ms, |current| time_ms.min(current));
        cas_f64(&self.max_response_ms, |current| time_ms.max(current));
        cas_f64(&self.avg_response_ms, |current| {
            (current * (total - 1) as f64 + time_ms) / total as f64
        });
    }

    pub fn record_order_success(&self) {
        self.successful_orders.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancel_success(&self) {
        self.cancelled_orders.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed_orders.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TradingMetricsSnapshot {
        let total = self.total_requests.load(Ordering::Relaxed);
        let min = f64::from_bits(self.min_response_ms.load(Ordering::Relaxed));
        TradingMetricsSnapshot {
            total_requests: total,
            successful_orders: self.successful_orders.load(Ordering::Relaxed),
            cancelled_orders: self.cancelled_orders.load(Ordering::Relaxed),
            failed_orders: self.failed_orders.load(Ordering::Relaxed),
            min_response_ms: if total == 0 { 0.0 } else { min },
            max_response_ms: f64::from_bits(self.max_response_ms.load(Ordering::Relaxed)),
            avg_response_ms: f64::from_bits(self.avg_response_ms.load(Ordering::Relaxed)),
        }
    }
}

fn cas_f64(cell: &AtomicU64, update: impl Fn(f64) -> f64) {
    let mut current = cell.load(Ordering::Relaxed);
    loop {
        let next = update(f64::from_bits(current)).to_bits();
        match cell.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return,
            Err(actual) => current = actual,
        }
    }
}

/// Point-in-time copy of the trading metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradingMetricsSnapshot {
    pub total_requests: u64,
    pub successful_orders: u64,
    pub cancelled_orders: u64,
    pub failed_orders: u64,
    pub min_response_ms: f64,
    pub max_response_ms: f64,
    pub avg_response_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot() {
        let metrics = TradingMetrics::new();
        let snap = metrics.snapshot();
        assert_eq!(snap.total_requests, 0);
        assert_eq!(snap.min_response_ms, 0.0);
        assert_eq!(snap.max_response_ms, 0.0);
    }

    #[test]
    fn test_response_time_min_avg_max() {
        let metrics = TradingMetrics::new();
        metrics.update_response_time(10.0);
        metrics.update_response_time(20.0);
        metrics.update_response_time(30.0);

        let snap = metrics.snapshot();
        assert_eq!(snap.total_requests, 3);
        assert_eq!(snap.min_response_ms, 10.0);
        assert_eq!(snap.max_response_ms, 30.0);
        assert!((snap.avg_response_ms - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_outcome_counters_independent() {
        let metrics = TradingMetrics::new();
        metrics.record_order_success();
        metrics.record_order_success();
        metrics.record_cancel_success();
        metrics.record_failure();

        let snap = metrics.snapshot();
        assert_eq!(snap.successful_orders, 2);
        assert_eq!(snap.cancelled_orders, 1);
        assert_eq!(snap.failed_orders, 1);
        // Counters do not bump total_requests; only round trips do.
        assert_eq!(snap.total_requests, 0);
    }
}
