//! WebSocket client shared by the market-data and trading channels.
//!
//! Provides robust connectivity with:
//! - Automatic reconnection with per-attempt delay scaling
//! - Heartbeat monitoring (15s ping cadence, 30s idle threshold)
//! - Subscription replay after reconnection
//! - Channel-based message routing and a reconnect-safe write handle

pub mod connection;
pub mod error;
pub mod heartbeat;

pub use connection::{ConnectionConfig, ConnectionEvent, ConnectionManager, WsWriteHandle};
pub use error::{WsError, WsResult};
pub use heartbeat::HeartbeatMonitor;

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any WebSocket connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
