//! Heartbeat monitoring for WebSocket connections.
//!
//! Tracks inbound activity and ping/pong timing on a monotonic clock.
//! The connection is declared dead when no frame has arrived within the
//! idle threshold; a ping is emitted once the channel has been quiet for
//! a full heartbeat interval.

use parking_lot::RwLock;
use std::time::{Duration, Instant};
use tracing::debug;

/// Connection health monitor.
pub struct HeartbeatMonitor {
    /// Ping cadence.
    interval: Duration,
    /// Idle threshold: no inbound frame for this long means dead.
    idle_timeout: Duration,
    /// Last inbound frame of any kind.
    last_inbound: RwLock<Instant>,
    /// Last ping sent.
    last_ping: RwLock<Option<Instant>>,
}

impl HeartbeatMonitor {
    pub fn new(interval_ms: u64, idle_timeout_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            idle_timeout: Duration::from_millis(idle_timeout_ms),
            last_inbound: RwLock::new(Instant::now()),
            last_ping: RwLock::new(None),
        }
    }

    /// Reset state (called on connection establishment).
    pub fn reset(&self) {
        *self.last_inbound.write() = Instant::now();
        *self.last_ping.write() = None;
    }

    /// Record an inbound frame of any kind.
    pub fn record_inbound(&self) {
        *self.last_inbound.write() = Instant::now();
    }

    /// Record that a ping was sent.
    pub fn record_ping(&self) {
        *self.last_ping.write() = Some(Instant::now());
    }

    /// Record a pong and log the round trip.
    pub fn record_pong(&self) {
        self.record_inbound();
        if let Some(ping_at) = *self.last_ping.read() {
            debug!(rtt_ms = ping_at.elapsed().as_millis() as u64, "Received pong");
        }
    }

    /// No inbound frame within the idle threshold.
    pub fn is_idle_timed_out(&self) -> bool {
        self.last_inbound.read().elapsed() > self.idle_timeout
    }

    /// The channel has been quiet for a full interval, time to ping.
    pub fn should_send_ping(&self) -> bool {
        self.last_inbound.read().elapsed() >= self.interval
    }

    /// Sleep until the next health check.
    pub async fn wait_for_check(&self) {
        tokio::time::sleep(self.interval / 2).await;
    }

    /// Milliseconds since the last inbound frame.
    pub fn idle_ms(&self) -> u64 {
        self.last_inbound.read().elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_monitor_is_healthy() {
        let hb = HeartbeatMonitor::new(15_000, 30_000);
        assert!(!hb.is_idle_timed_out());
        assert!(!hb.should_send_ping());
    }

    #[test]
    fn test_inbound_resets_idle_clock() {
        let hb = HeartbeatMonitor::new(15_000, 30_000);
        hb.record_inbound();
        assert!(hb.idle_ms() < 1_000);
    }

    #[test]
    fn test_zero_thresholds_trip_immediately() {
        let hb = HeartbeatMonitor::new(0, 0);
        std::thread::sleep(Duration::from_millis(2));
        assert!(hb.is_idle_timed_out());
        assert!(hb.should_send_ping());
    }
}
