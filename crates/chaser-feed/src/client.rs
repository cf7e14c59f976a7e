//! Streaming market-data client for one symbol.

use crate::error::{FeedError, FeedResult};
use crate::parser::{parse_depth_message, stream_url};
use chaser_core::{ConnectionState, OrderBook};
use chaser_ws::{ConnectionConfig, ConnectionEvent, ConnectionManager};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, warn};

/// Handler invoked with each decoded book snapshot, in receive order.
///
/// Runs on the feed's worker task; it must not perform I/O or take locks
/// that are held across I/O.
pub type BookHandler = Arc<dyn Fn(OrderBook) + Send + Sync>;

/// Feed connection policy.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub enable_auto_reconnect: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: 5_000,
            max_reconnect_attempts: 10,
            enable_auto_reconnect: true,
        }
    }
}

/// Market-data client: one depth stream over one connection.
pub struct MarketDataClient {
    conn: Arc<ConnectionManager>,
    message_rx: Mutex<Option<mpsc::Receiver<String>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MarketDataClient {
    /// Create a client for `<ws_base>/<symbol-lower>@depth<depth>@100ms`.
    ///
    /// Returns the client plus the receiver for connection status events
    /// (up/down/exhausted), which the owner should drain.
    pub fn new(
        ws_base: &str,
        symbol: &str,
        depth: u32,
        config: FeedConfig,
    ) -> (Self, mpsc::Receiver<ConnectionEvent>) {
        let (message_tx, message_rx) = mpsc::channel(1024);
        let (event_tx, event_rx) = mpsc::channel(32);

        let conn_config = ConnectionConfig {
            url: stream_url(ws_base, symbol, depth),
            reconnect_delay_ms: config.reconnect_delay_ms,
            max_reconnect_attempts: config.max_reconnect_attempts,
            enable_auto_reconnect: config.enable_auto_reconnect,
            ..ConnectionConfig::default()
        };

        let client = Self {
            conn: Arc::new(ConnectionManager::new(conn_config, message_tx, event_tx)),
            message_rx: Mutex::new(Some(message_rx)),
            tasks: Mutex::new(Vec::new()),
        };
        (client, event_rx)
    }

    /// Start the connection and the decode worker.
    ///
    /// The worker drains the inbound channel on a single task, so book
    /// snapshots reach `handler` strictly in receive order.
    pub fn start(&self, handler: BookHandler) -> FeedResult<()> {
        let mut rx = self
            .message_rx
            .lock()
            .take()
            .ok_or(FeedError::AlreadyStarted)?;

        let conn = self.conn.clone();
        let conn_task = tokio::spawn(async move {
            if let Err(e) = conn.run().await {
                error!(?e, "Market-data connection terminated");
            }
        });

        let worker_task = tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                match parse_depth_message(&text) {
                    Ok(Some(book)) => handler(book),
                    Ok(None) => {}
                    Err(e) => warn!(?e, "Dropping undecodable depth payload"),
                }
            }
        });

        let mut tasks = self.tasks.lock();
        tasks.push(conn_task);
        tasks.push(worker_task);
        Ok(())
    }

    pub fn state(&self) -> ConnectionState {
        self.conn.state()
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_open()
    }

    /// Shut the stream down; worker exits when the channel drains.
    pub fn shutdown(&self) {
        self.conn.shutdown();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }
}
