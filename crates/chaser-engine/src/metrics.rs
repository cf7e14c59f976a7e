//! Engine latency and outcome metrics.
//!
//! Two latency series are tracked per rotation: execution latency (from
//! decision start to placement completion) and reaction latency (from
//! book arrival to placement completion). Uptime is computed from real
//! downtime intervals opened on disconnect and closed on reconnect.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct LatencySeries {
    avg_ms: f64,
    min_ms: f64,
    max_ms: f64,
    samples: u64,
}

impl LatencySeries {
    fn new() -> Self {
        Self {
            avg_ms: 0.0,
            min_ms: f64::MAX,
            max_ms: 0.0,
            samples: 0,
        }
    }

    fn record(&mut self, latency_ms: f64) {
        self.avg_ms =
            (self.avg_ms * self.samples as f64 + latency_ms) / (self.samples as f64 + 1.0);
        self.min_ms = self.min_ms.min(latency_ms);
        self.max_ms = self.max_ms.max(latency_ms);
        self.samples += 1;
    }
}

struct Inner {
    execution: LatencySeries,
    reaction: LatencySeries,
    successful_orders: u64,
    failed_orders: u64,
    rotations: u64,
    reconnect_count: u64,
    start: Instant,
    downtime: Duration,
    down_since: Option<Instant>,
}

/// Engine-level metrics, shared between the engine and the supervisor.
pub struct EngineMetrics {
    inner: Mutex<Inner>,
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                execution: LatencySeries::new(),
                reaction: LatencySeries::new(),
                successful_orders: 0,
                failed_orders: 0,
                rotations: 0,
                reconnect_count: 0,
                start: Instant::now(),
                downtime: Duration::ZERO,
                down_since: None,
            }),
        }
    }

    /// Record one rotation's latency pair.
    pub fn record_rotation_latency(&self, execution_ms: f64, reaction_ms: f64) {
        let mut inner = self.inner.lock();
        inner.execution.record(execution_ms);
        inner.reaction.record(reaction_ms);
        inner.rotations += 1;
    }

    pub fn record_order_outcomes(&self, successful: u64, failed: u64) {
        let mut inner = self.inner.lock();
        inner.successful_orders += successful;
        inner.failed_orders += failed;
    }

    /// A connection went down: open a downtime interval.
    pub fn record_disconnect(&self) {
        let mut inner = self.inner.lock();
        if inner.down_since.is_none() {
            inner.down_since = Some(Instant::now());
        }
    }

    /// A connection came back: close the interval, count the reconnect.
    pub fn record_reconnect(&self) {
        let mut inner = self.inner.lock();
        if let Some(since) = inner.down_since.take() {
            inner.downtime += since.elapsed();
            inner.reconnect_count += 1;
        }
    }

    pub fn snapshot(&self) -> LatencyMetricsSnapshot {
        let inner = self.inner.lock();
        let elapsed = inner.start.elapsed();

        // An open interval counts against uptime too.
        let mut downtime = inner.downtime;
        if let Some(since) = inner.down_since {
            downtime += since.elapsed();
        }
        let uptime_pct = if elapsed.is_zero() {
            100.0
        } else {
            let up = elapsed.saturating_sub(downtime);
            up.as_secs_f64() / elapsed.as_secs_f64() * 100.0
        };

        LatencyMetricsSnapshot {
            avg_execution_ms: inner.execution.avg_ms,
            min_execution_ms: zero_if_empty(inner.execution.min_ms, inner.execution.samples),
            max_execution_ms: inner.execution.max_ms,
            avg_reaction_ms: inner.reaction.avg_ms,
            min_reaction_ms: zero_if_empty(inner.reaction.min_ms, inner.reaction.samples),
            max_reaction_ms: inner.reaction.max_ms,
            rotations: inner.rotations,
            successful_orders: inner.successful_orders,
            failed_orders: inner.failed_orders,
            reconnect_count: inner.reconnect_count,
            uptime_pct,
        }
    }
}

fn zero_if_empty(min_ms: f64, samples: u64) -> f64 {
    if samples == 0 {
        0.0
    } else {
        min_ms
    }
}

/// Point-in-time copy of the engine metrics.
#[derive(Debug, Clone, Copy)]
pub struct LatencyMetricsSnapshot {
    pub avg_execution_ms: f64,
    pub min_execution_ms: f64,
    pub max_execution_ms: f64,
    pub avg_reaction_ms: f64,
    pub min_reaction_ms: f64,
    pub max_reaction_ms: f64,
    pub rotations: u64,
    pub successful_orders: u64,
    pub failed_orders: u64,
    pub reconnect_count: u64,
    pub uptime_pct: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot() {
        let metrics = EngineMetrics::new();
        let snap = metrics.snapshot();
        assert_eq!(snap.rotations, 0);
        assert_eq!(snap.min_execution_ms, 0.0);
        assert!(snap.uptime_pct > 99.0);
    }

    #[test]
    fn test_latency_series() {
        let metrics = EngineMetrics::new();
        metrics.record_rotation_latency(10.0, 15.0);
        metrics.record_rotation_latency(20.0, 25.0);

        let snap = metrics.snapshot();
        assert_eq!(snap.rotations, 2);
        assert!((snap.avg_execution_ms - 15.0).abs() < 1e-9);
        assert_eq!(snap.min_execution_ms, 10.0);
        assert_eq!(snap.max_execution_ms, 20.0);
        assert!((snap.avg_reaction_ms - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_order_outcome_counters() {
        let metrics = EngineMetrics::new();
        metrics.record_order_outcomes(1, 1);
        metrics.record_order_outcomes(2, 0);

        let snap = metrics.snapshot();
        assert_eq!(snap.successful_orders, 3);
        assert_eq!(snap.failed_orders, 1);
    }

    #[test]
    fn test_downtime_reduces_uptime() {
        let metrics = EngineMetrics::new();
        metrics.record_disconnect();
        std::thread::sleep(Duration::from_millis(30));
        metrics.record_reconnect();

        let snap = metrics.snapshot();
        assert_eq!(snap.reconnect_count, 1);
        assert!(snap.uptime_pct < 100.0);
    }

    #[test]
    fn test_double_disconnect_keeps_first_interval() {
        let metrics = EngineMetrics::new();
        metrics.record_disconnect();
        metrics.record_disconnect();
        metrics.record_reconnect();
        // Second reconnect without a disconnect is a no-op.
        metrics.record_reconnect();
        assert_eq!(metrics.snapshot().reconnect_count, 1);
    }
}
