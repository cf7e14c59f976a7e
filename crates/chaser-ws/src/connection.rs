//! WebSocket connection manager.
//!
//! Handles connection lifecycle, reconnection with per-attempt delay
//! scaling, heartbeat enforcement, and subscription replay after
//! reconnection. Inbound text payloads are forwarded in receive order over
//! a bounded channel; the single consumer guarantees the owner never sees
//! interleaved messages from one connection.

use crate::error::{WsError, WsResult};
use crate::heartbeat::HeartbeatMonitor;
use chaser_core::ConnectionState;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio_tungstenite::{
    connect_async_tls_with_config, tungstenite::protocol::WebSocketConfig, tungstenite::Message,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Upper bound on a single inbound message; larger frames fail the read
/// and the connection is torn down.
const MAX_MESSAGE_BYTES: usize = 16 << 20;

/// Reconnect delays scale linearly with the attempt number, capped here.
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(60);

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket URL.
    pub url: String,
    /// Base reconnection delay; attempt N waits N times this.
    pub reconnect_delay_ms: u64,
    /// Maximum reconnection attempts (0 = infinite).
    pub max_reconnect_attempts: u32,
    /// Reconnect automatically on disconnect.
    pub enable_auto_reconnect: bool,
    /// Ping cadence.
    pub heartbeat_interval_ms: u64,
    /// Idle threshold: no inbound frame for this long means dead.
    pub idle_timeout_ms: u64,
    /// Messages replayed after every (re)connect, before normal traffic.
    pub on_connect_messages: Vec<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            reconnect_delay_ms: 5_000,
            max_reconnect_attempts: 10,
            enable_auto_reconnect: true,
            heartbeat_interval_ms: 15_000,
            idle_timeout_ms: 30_000,
            on_connect_messages: Vec::new(),
        }
    }
}

/// Status transitions emitted to the owning component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Up,
    Down { reason: String },
    /// All reconnection attempts failed; the connection is idle for good.
    Exhausted,
}

/// Reconnect-safe, cloneable sender for outbound text.
#[derive(Clone)]
pub struct WsWriteHandle {
    tx: mpsc::Sender<String>,
    state: Arc<RwLock<ConnectionState>>,
}

impl WsWriteHandle {
    /// Queue a text message for sending.
    ///
    /// Fails when the connection is not open or the channel is closed.
    pub async fn send(&self, text: String) -> WsResult<()> {
        if !self.is_open() {
            return Err(WsError::NotConnected);
        }
        self.tx.send(text).await.map_err(|_| WsError::ChannelClosed)
    }

    pub fn is_open(&self) -> bool {
        *self.state.read() == ConnectionState::Open && !self.tx.is_closed()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }
}

/// WebSocket connection manager.
pub struct ConnectionManager {
    config: ConnectionConfig,
    state: Arc<RwLock<ConnectionState>>,
    heartbeat: HeartbeatMonitor,
    /// Inbound text payloads, forwarded in receive order.
    message_tx: mpsc::Sender<String>,
    /// Status transitions for the owner.
    event_tx: mpsc::Sender<ConnectionEvent>,
    outbound_tx: mpsc::Sender<String>,
    outbound_rx: TokioMutex<mpsc::Receiver<String>>,
    shutdown_token: CancellationToken,
}

impl ConnectionManager {
    pub fn new(
        config: ConnectionConfig,
        message_tx: mpsc::Sender<String>,
        event_tx: mpsc::Sender<ConnectionEvent>,
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(256);
        let heartbeat =
            HeartbeatMonitor::new(config.heartbeat_interval_ms, config.idle_timeout_ms);
        Self {
            config,
            state: Arc::new(RwLock::new(ConnectionState::Idle)),
            heartbeat,
            message_tx,
            event_tx,
            outbound_tx,
            outbound_rx: TokioMutex::new(outbound_rx),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Get a write handle for sending messages.
    pub fn write_handle(&self) -> WsWriteHandle {
        WsWriteHandle {
            tx: self.outbound_tx.clone(),
            state: self.state.clone(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Signal graceful shutdown. Wakes every sleep in the connect loop.
    pub fn shutdown(&self) {
        info!(url = %self.config.url, "Connection shutdown requested");
        *self.state.write() = ConnectionState::Closing;
        self.shutdown_token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Connect and run the message loop until shutdown or exhaustion.
    pub async fn run(&self) -> WsResult<()> {
        let mut attempt = 0u32;

        loop {
            if self.is_shutdown() {
                *self.state.write() = ConnectionState::Idle;
                return Ok(());
            }

            *self.state.write() = ConnectionState::Connecting;

            let disconnect_reason = match self.try_connect(&mut attempt).await {
                Ok(()) => {
                    info!(url = %self.config.url, "WebSocket connection closed");
                    "closed".to_string()
                }
                Err(e) => {
                    error!(url = %self.config.url, ?e, "WebSocket connection error");
                    e.to_string()
                }
            };
            self.emit(ConnectionEvent::Down {
                reason: disconnect_reason,
            })
            .await;

            if self.is_shutdown() {
                *self.state.write() = ConnectionState::Idle;
                return Ok(());
            }

            if !self.config.enable_auto_reconnect {
                info!(url = %self.config.url, "Auto-reconnect disabled, staying down");
                *self.state.write() = ConnectionState::Idle;
                return Ok(());
            }

            attempt += 1;
            if self.config.max_reconnect_attempts > 0
                && attempt >= self.config.max_reconnect_attempts
            {
                error!(attempt, url = %self.config.url, "Max reconnection attempts reached");
                *self.state.write() = ConnectionState::Idle;
                self.emit(ConnectionEvent::Exhausted).await;
                return Err(WsError::ReconnectExhausted { attempts: attempt });
            }

            *self.state.write() = ConnectionState::Reconnecting;

            let delay = reconnect_delay(self.config.reconnect_delay_ms, attempt);
            warn!(attempt, delay_ms = delay.as_millis() as u64, "Reconnecting");

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown_token.cancelled() => {
                    *self.state.write() = ConnectionState::Idle;
                    return Ok(());
                }
            }
        }
    }

    async fn try_connect(&self, attempt: &mut u32) -> WsResult<()> {
        info!(url = %self.config.url, "Connecting to WebSocket");

        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(MAX_MESSAGE_BYTES);
        ws_config.max_frame_size = Some(MAX_MESSAGE_BYTES);
        let (ws_stream, _response) =
            connect_async_tls_with_config(&self.config.url, Some(ws_config), true, None).await?;
        let (mut write, mut read) = ws_stream.split();

        *self.state.write() = ConnectionState::Open;
        // The budget counts consecutive failures only.
        *attempt = 0;
        info!(url = %self.config.url, "WebSocket connected");

        // Replay subscriptions before normal traffic.
        for msg in &self.config.on_connect_messages {
            write.send(Message::Text(msg.clone())).await?;
        }

        self.heartbeat.reset();
        self.emit(ConnectionEvent::Up).await;

        let mut outbound_rx = self.outbound_rx.lock().await;

        loop {
            tokio::select! {
                () = self.shutdown_token.cancelled() => {
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(?e, "Failed to send Close frame during shutdown");
                    }
                    *self.state.write() = ConnectionState::Idle;
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.heartbeat.record_inbound();
                            if self.message_tx.send(text).await.is_err() {
                                warn!("Message receiver dropped");
                            }
                        }
                        Some(Ok(Message::Binary(_))) => {
                            self.heartbeat.record_inbound();
                            debug!("Ignoring binary frame");
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            self.heartbeat.record_inbound();
                            // Pong must echo the ping payload.
                            write.send(Message::Pong(payload)).await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            self.heartbeat.record_pong();
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "WebSocket closed by server");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!(?e, "WebSocket read error");
                            return Err(e.into());
                        }
                        None => {
                            warn!("WebSocket stream ended");
                            return Ok(());
                        }
                    }
                }

                outbound = outbound_rx.recv() => {
                    if let Some(text) = outbound {
                        write.send(Message::Text(text)).await?;
                    }
                }

                _ = self.heartbeat.wait_for_check() => {
                    if self.heartbeat.is_idle_timed_out() {
                        error!(idle_ms = self.heartbeat.idle_ms(), "Heartbeat timeout");
                        return Err(WsError::HeartbeatTimeout);
                    }
                    if self.heartbeat.should_send_ping() {
                        write.send(Message::Ping(Vec::new())).await?;
                        self.heartbeat.record_ping();
                        debug!("Sent heartbeat ping");
                    }
                }
            }
        }
    }

    async fn emit(&self, event: ConnectionEvent) {
        if self.event_tx.send(event).await.is_err() {
            debug!("Connection event receiver dropped");
        }
    }
}

/// Delay before reconnect attempt N: base times N, capped at one minute.
fn reconnect_delay(base_ms: u64, attempt: u32) -> Duration {
    let scaled = base_ms.saturating_mul(u64::from(attempt.max(1)));
    Duration::from_millis(scaled).min(MAX_RECONNECT_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();
        assert_eq!(config.reconnect_delay_ms, 5_000);
        assert_eq!(config.max_reconnect_attempts, 10);
        assert!(config.enable_auto_reconnect);
        assert_eq!(config.heartbeat_interval_ms, 15_000);
        assert_eq!(config.idle_timeout_ms, 30_000);
    }

    #[test]
    fn test_reconnect_delay_scales_linearly() {
        assert_eq!(reconnect_delay(5_000, 1), Duration::from_secs(5));
        assert_eq!(reconnect_delay(5_000, 2), Duration::from_secs(10));
        assert_eq!(reconnect_delay(5_000, 3), Duration::from_secs(15));
    }

    #[test]
    fn test_reconnect_delay_capped() {
        assert_eq!(reconnect_delay(5_000, 100), MAX_RECONNECT_DELAY);
        // attempt 0 behaves like attempt 1
        assert_eq!(reconnect_delay(5_000, 0), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_write_handle_rejects_when_idle() {
        let (msg_tx, _msg_rx) = mpsc::channel(8);
        let (evt_tx, _evt_rx) = mpsc::channel(8);
        let manager = ConnectionManager::new(ConnectionConfig::default(), msg_tx, evt_tx);

        let handle = manager.write_handle();
        assert!(!handle.is_open());
        let err = handle.send("hello".to_string()).await.unwrap_err();
        assert!(matches!(err, WsError::NotConnected));
    }

    #[test]
    fn test_initial_state_is_idle() {
        let (msg_tx, _msg_rx) = mpsc::channel(8);
        let (evt_tx, _evt_rx) = mpsc::channel(8);
        let manager = ConnectionManager::new(ConnectionConfig::default(), msg_tx, evt_tx);
        assert_eq!(manager.state(), ConnectionState::Idle);
        assert!(!manager.is_shutdown());
    }

    #[test]
    fn test_shutdown_moves_to_closing() {
        let (msg_tx, _msg_rx) = mpsc::channel(8);
        let (evt_tx, _evt_rx) = mpsc::channel(8);
        let manager = ConnectionManager::new(ConnectionConfig::default(), msg_tx, evt_tx);
        manager.shutdown();
        assert!(manager.is_shutdown());
        assert_eq!(manager.state(), ConnectionState::Closing);
    }
}
