//! Outstanding request tracking.
//!
//! Every in-flight request has exactly one entry here until its response
//! arrives, it times out, or the connection goes away. Each completion
//! slot is fulfilled exactly once; late responses find no entry and are
//! dropped by the caller.

use crate::messages::WsApiResponse;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Why outstanding slots were failed wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosedReason {
    ConnectionClosed,
    Shutdown,
}

/// What a completion slot resolves to.
pub type SlotResult = Result<WsApiResponse, ClosedReason>;

struct PendingRequest {
    method: String,
    sent_at: Instant,
    tx: oneshot::Sender<SlotResult>,
}

/// Mutex-guarded map of request id to completion slot.
///
/// The lock is held only for insert, remove, and completion; never across
/// I/O or awaits.
pub struct PendingRequests {
    map: Mutex<HashMap<String, PendingRequest>>,
    next_id: AtomicU64,
}

impl Default for PendingRequests {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingRequests {
    pub fn new() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Monotonic request id with a stable textual prefix.
    pub fn next_request_id(&self) -> String {
        format!("req_{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register an in-flight request and obtain its completion slot.
    pub fn register(&self, id: &str, method: &str) -> oneshot::Receiver<SlotResult> {
        let (tx, rx) = oneshot::channel();
        self.map.lock().insert(
            id.to_string(),
            PendingRequest {
                method: method.to_string(),
                sent_at: Instant::now(),
                tx,
            },
        );
        rx
    }

    /// Fulfill the slot for `id` with a response.
    ///
    /// Returns the method and round-trip time, or None when the id is
    /// unknown (already timed out or never registered).
    pub fn complete(&self, id: &str, response: WsApiResponse) -> Option<(String, Duration)> {
        let entry = self.map.lock().remove(id)?;
        let elapsed = entry.sent_at.elapsed();
        // Receiver may have been dropped by a timed-out caller.
        let _ = entry.tx.send(Ok(response));
        Some((entry.method, elapsed))
    }

    /// Drop the entry for `id` (caller gave up). Returns whether it existed.
    pub fn remove(&self, id: &str) -> bool {
        self.map.lock().remove(id).is_some()
    }

    /// Fail every outstanding slot with the given reason.
    pub fn fail_all(&self, reason: ClosedReason) {
        let drained: Vec<PendingRequest> = self.map.lock().drain().map(|(_, p)| p).collect();
        for entry in drained {
            let _ = entry.tx.send(Err(reason));
        }
    }

    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_response(id: &str) -> WsApiResponse {
        WsApiResponse {
            id: Some(id.to_string()),
            status: Some(200),
            result: Some(serde_json::json!({})),
            error: None,
        }
    }

    #[test]
    fn test_request_ids_monotonic() {
        let pending = PendingRequests::new();
        assert_eq!(pending.next_request_id(), "req_1");
        assert_eq!(pending.next_request_id(), "req_2");
    }

    #[tokio::test]
    async fn test_complete_fulfills_exactly_once() {
        let pending = PendingRequests::new();
        let rx = pending.register("req_1", "order.place");
        assert_eq!(pending.len(), 1);

        let (method, _rtt) = pending.complete("req_1", ok_response("req_1")).unwrap();
        assert_eq!(method, "order.place");
        assert!(pending.is_empty());

        // Second completion finds no entry.
        assert!(pending.complete("req_1", ok_response("req_1")).is_none());

        let result = rx.await.unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_remove_then_late_response_dropped() {
        let pending = PendingRequests::new();
        let _rx = pending.register("req_1", "order.cancel");

        // Caller times out and removes the entry.
        assert!(pending.remove("req_1"));

        // The stray response finds nothing to complete.
        assert!(pending.complete("req_1", ok_response("req_1")).is_none());
    }

    #[tokio::test]
    async fn test_fail_all_on_disconnect() {
        let pending = PendingRequests::new();
        let rx1 = pending.register("req_1", "order.place");
        let rx2 = pending.register("req_2", "order.cancel");

        pending.fail_all(ClosedReason::ConnectionClosed);
        assert!(pending.is_empty());

        assert_eq!(rx1.await.unwrap(), Err(ClosedReason::ConnectionClosed));
        assert_eq!(rx2.await.unwrap(), Err(ClosedReason::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_complete_with_dropped_receiver_is_harmless() {
        let pending = PendingRequests::new();
        let rx = pending.register("req_1", "order.place");
        drop(rx);
        // Completion does not panic and removes the entry.
        assert!(pending.complete("req_1", ok_response("req_1")).is_some());
        assert!(pending.is_empty());
    }
}
