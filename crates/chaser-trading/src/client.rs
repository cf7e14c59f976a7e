//! Trading client over a persistent duplex WebSocket.
//!
//! Synchronous callers go through [`TradingClient::send_and_wait`]: the
//! request is signed, registered in the pending map, and written; the
//! reader task fulfills the completion slot when the matching response id
//! arrives. Timeouts remove the slot so a late response is dropped
//! without effect.

use crate::error::{TradingError, TradingResult};
use crate::messages::{method, WsApiRequest, WsApiResponse};
use crate::metrics::{TradingMetrics, TradingMetricsSnapshot};
use crate::pending::{ClosedReason, PendingRequests};
use crate::signer::{ApiCredentials, RequestSigner};
use chaser_core::{Order, OrderSide, OrderState, Price, Size};
use chaser_ws::{ConnectionConfig, ConnectionEvent, ConnectionManager, WsWriteHandle};
use parking_lot::Mutex;
use rust_decimal::{Decimal, RoundingStrategy};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Trading channel configuration.
#[derive(Debug, Clone)]
pub struct TradingConfig {
    /// Duplex endpoint URL.
    pub url: String,
    pub credentials: ApiCredentials,
    pub price_precision: u32,
    pub quantity_precision: u32,
    /// Connect-loop attempts before giving up.
    pub max_retries: u32,
    /// Base per-attempt reconnect delay; scales with attempt number.
    pub retry_delay_ms: u64,
    /// Per-request response deadline.
    pub request_timeout_ms: u64,
}

impl TradingConfig {
    pub fn new(url: String, credentials: ApiCredentials) -> Self {
        Self {
            url,
            credentials,
            price_precision: 2,
            quantity_precision: 5,
            max_retries: 100,
            retry_delay_ms: 1_000,
            request_timeout_ms: 5_000,
        }
    }
}

/// Trading client: place/cancel/query over one persistent channel.
pub struct TradingClient {
    conn: Arc<ConnectionManager>,
    write: WsWriteHandle,
    pending: Arc<PendingRequests>,
    signer: RequestSigner,
    metrics: Arc<TradingMetrics>,
    request_timeout: Duration,
    price_precision: u32,
    quantity_precision: u32,
    shutting_down: AtomicBool,
    message_rx: Mutex<Option<mpsc::Receiver<String>>>,
    event_rx: Mutex<Option<mpsc::Receiver<ConnectionEvent>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl TradingClient {
    /// Create the client.
    ///
    /// Returns the client plus a receiver of connection status events;
    /// pending requests are failed internally before each Down event is
    /// forwarded to this receiver.
    pub fn new(config: TradingConfig) -> (Arc<Self>, mpsc::Receiver<ConnectionEvent>) {
        let (message_tx, message_rx) = mpsc::channel(1024);
        let (event_tx, event_rx) = mpsc::channel(32);
        let (external_tx, external_rx) = mpsc::channel(32);

        let conn_config = ConnectionConfig {
            url: config.url.clone(),
            reconnect_delay_ms: config.retry_delay_ms,
            max_reconnect_attempts: config.max_retries,
            ..ConnectionConfig::default()
        };
        let conn = Arc::new(ConnectionManager::new(conn_config, message_tx, event_tx));
        let write = conn.write_handle();

        let client = Arc::new(Self {
            conn,
            write,
            pending: Arc::new(PendingRequests::new()),
            signer: RequestSigner::new(config.credentials),
            metrics: Arc::new(TradingMetrics::new()),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            price_precision: config.price_precision,
            quantity_precision: config.quantity_precision,
            shutting_down: AtomicBool::new(false),
            message_rx: Mutex::new(Some(message_rx)),
            event_rx: Mutex::new(Some(event_rx)),
            tasks: Mutex::new(Vec::new()),
        });

        client.spawn_event_task(external_tx);
        (client, external_rx)
    }

    /// Start the connection and the response reader.
    pub fn start(&self) -> TradingResult<()> {
        let mut rx = self
            .message_rx
            .lock()
            .take()
            .ok_or(TradingError::AlreadyStarted)?;

        let conn = self.conn.clone();
        let conn_task = tokio::spawn(async move {
            if let Err(e) = conn.run().await {
                error!(?e, "Trading connection terminated");
            }
        });

        let pending = self.pending.clone();
        let metrics = self.metrics.clone();
        let reader_task = tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                handle_response_payload(&pending, &metrics, &text);
            }
        });

        let mut tasks = self.tasks.lock();
        tasks.push(conn_task);
        tasks.push(reader_task);
        Ok(())
    }

    fn spawn_event_task(self: &Arc<Self>, external_tx: mpsc::Sender<ConnectionEvent>) {
        let mut event_rx = self
            .event_rx
            .lock()
            .take()
            .expect("event task spawned once");
        let pending = self.pending.clone();
        let task = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                if matches!(
                    event,
                    ConnectionEvent::Down { .. } | ConnectionEvent::Exhausted
                ) {
                    // Outstanding callers must not hang on a dead socket.
                    pending.fail_all(ClosedReason::ConnectionClosed);
                }
                if external_tx.send(event).await.is_err() {
                    break;
                }
            }
        });
        self.tasks.lock().push(task);
    }

    /// Wait until the channel is open, polling in short increments.
    pub async fn wait_until_open(&self, timeout: Duration) -> TradingResult<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        while !self.conn.is_open() {
            if tokio::time::Instant::now() >= deadline {
                return Err(TradingError::NotConnected);
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_open()
    }

    pub fn metrics(&self) -> TradingMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Shut down: refuse new requests, fail outstanding slots, close the
    /// channel.
    pub fn shutdown(&self) {
        info!("Trading client shutting down");
        self.shutting_down.store(true, Ordering::SeqCst);
        self.pending.fail_all(ClosedReason::Shutdown);
        self.conn.shutdown();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }

    /// Sign and send one request, then wait for the correlated response.
    pub async fn send_and_wait(
        &self,
        method_name: &str,
        mut params: Map<String, Value>,
    ) -> TradingResult<WsApiResponse> {
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(TradingError::ShuttingDown);
        }
        if !self.write.is_open() {
            return Err(TradingError::NotConnected);
        }

        self.signer
            .sign_params(&mut params, chrono::Utc::now().timestamp_millis());

        let id = self.pending.next_request_id();
        let request = WsApiRequest {
            id: id.clone(),
            method: method_name.to_string(),
            params,
        };
        let payload = serde_json::to_string(&request)?;

        let rx = self.pending.register(&id, method_name);
        if let Err(e) = self.write.send(payload).await {
            self.pending.remove(&id);
            return Err(e.into());
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(Ok(response))) => Ok(response),
            Ok(Ok(Err(ClosedReason::ConnectionClosed))) => Err(TradingError::ConnectionClosed),
            Ok(Ok(Err(ClosedReason::Shutdown))) => Err(TradingError::ShuttingDown),
            // Slot sender dropped without completing: treat as closed.
            Ok(Err(_)) => Err(TradingError::ConnectionClosed),
            Err(_elapsed) => {
                self.pending.remove(&id);
                self.metrics.record_failure();
                warn!(method = method_name, %id, "Request timeout");
                Err(TradingError::Timeout {
                    method: method_name.to_string(),
                })
            }
        }
    }

    /// Place a GTC limit order. Returns the locally tracked order on ack.
    pub async fn place_limit(
        &self,
        symbol: &str,
        side: OrderSide,
        price: Price,
        size: Size,
        client_order_id: &str,
    ) -> TradingResult<Order> {
        let mut params = Map::new();
        params.insert("symbol".into(), Value::String(symbol.to_string()));
        params.insert("side".into(), Value::String(side.as_wire().to_string()));
        params.insert("type".into(), Value::String("LIMIT".into()));
        params.insert("timeInForce".into(), Value::String("GTC".into()));
        params.insert(
            "price".into(),
            Value::String(format_decimal(price.inner(), self.price_precision)),
        );
        params.insert(
            "quantity".into(),
            Value::String(format_decimal(size.inner(), self.quantity_precision)),
        );
        if !client_order_id.is_empty() {
            params.insert(
                "newClientOrderId".into(),
                Value::String(client_order_id.to_string()),
            );
        }

        let response = self.send_and_wait(method::PLACE, params).await?;
        if let Some(err) = &response.error {
            return Err(TradingError::Rejected {
                code: err.code,
                msg: err.msg.clone(),
            });
        }

        let order_id = response
            .result_field_string("orderId")
            .ok_or_else(|| TradingError::MalformedResponse("missing orderId".into()))?;

        // A placement that does not rest is a reject for this strategy.
        if let Some(status) = response.result_str("status") {
            let state = OrderState::from_wire(status);
            if !state.is_open() {
                return Err(TradingError::Rejected {
                    code: 0,
                    msg: format!("unexpected placement status {state}"),
                });
            }
        }

        debug!(%order_id, %side, %price, "Order placed");
        Ok(Order::new(
            order_id,
            client_order_id.to_string(),
            symbol.to_string(),
            side,
            price,
            size,
        ))
    }

    /// Cancel one order by exchange id.
    pub async fn cancel(&self, symbol: &str, order_id: &str) -> TradingResult<()> {
        let numeric_id: i64 = order_id
            .parse()
            .map_err(|_| TradingError::InvalidOrderId(order_id.to_string()))?;

        let mut params = Map::new();
        params.insert("symbol".into(), Value::String(symbol.to_string()));
        params.insert("orderId".into(), Value::from(numeric_id));

        let response = self.send_and_wait(method::CANCEL, params).await?;
        match response.error {
            None => Ok(()),
            Some(err) => Err(TradingError::Rejected {
                code: err.code,
                msg: err.msg,
            }),
        }
    }

    /// Cancel every open order on the symbol. Idempotent: a response
    /// saying there was nothing to cancel counts as success.
    pub async fn cancel_all(&self, symbol: &str) -> TradingResult<()> {
        let mut params = Map::new();
        params.insert("symbol".into(), Value::String(symbol.to_string()));

        let response = self.send_and_wait(method::CANCEL_ALL, params).await?;
        match response.error {
            None => Ok(()),
            Some(err) if err.code == NO_OPEN_ORDERS_CODE => Ok(()),
            Some(err) => Err(TradingError::Rejected {
                code: err.code,
                msg: err.msg,
            }),
        }
    }

    /// Query the current state of one order.
    pub async fn query_order(&self, symbol: &str, order_id: &str) -> TradingResult<OrderState> {
        let numeric_id: i64 = order_id
            .parse()
            .map_err(|_| TradingError::InvalidOrderId(order_id.to_string()))?;

        let mut params = Map::new();
        params.insert("symbol".into(), Value::String(symbol.to_string()));
        params.insert("orderId".into(), Value::from(numeric_id));

        let response = self.send_and_wait(method::QUERY, params).await?;
        if let Some(err) = &response.error {
            return Err(TradingError::Rejected {
                code: err.code,
                msg: err.msg.clone(),
            });
        }
        response
            .result_str("status")
            .map(OrderState::from_wire)
            .ok_or_else(|| TradingError::MalformedResponse("missing status".into()))
    }

    /// List open orders on the symbol.
    pub async fn open_orders(&self, symbol: &str) -> TradingResult<Vec<Order>> {
        let mut params = Map::new();
        params.insert("symbol".into(), Value::String(symbol.to_string()));

        let response = self.send_and_wait(method::OPEN_ORDERS, params).await?;
        if let Some(err) = response.error {
            return Err(TradingError::Rejected {
                code: err.code,
                msg: err.msg,
            });
        }

        let items = response
            .result
            .as_ref()
            .and_then(Value::as_array)
            .ok_or_else(|| TradingError::MalformedResponse("result is not a list".into()))?;

        items.iter().map(parse_open_order).collect()
    }
}

/// Exchange error code meaning there were no orders to cancel.
const NO_OPEN_ORDERS_CODE: i64 = -2011;

/// Correlate one inbound payload with its pending slot and update metrics.
fn handle_response_payload(pending: &PendingRequests, metrics: &TradingMetrics, text: &str) {
    let response: WsApiResponse = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(?e, "Undecodable trading payload");
            return;
        }
    };

    let Some(id) = response.id.clone() else {
        debug!("Trading push event without id, ignoring");
        return;
    };

    let is_error = response.error.is_some();
    let has_order_id = response.result_field_string("orderId").is_some();
    let error_summary = response.error.as_ref().map(|e| (e.code, e.msg.clone()));

    match pending.complete(&id, response) {
        Some((req_method, rtt)) => {
            metrics.update_response_time(rtt.as_secs_f64() * 1_000.0);
            if is_error {
                metrics.record_failure();
                if let Some((code, msg)) = error_summary {
                    warn!(%id, code, %msg, "Exchange error response");
                }
            } else if req_method == method::PLACE && has_order_id {
                metrics.record_order_success();
            } else if req_method == method::CANCEL || req_method == method::CANCEL_ALL {
                metrics.record_cancel_success();
            }
        }
        None => {
            // Caller already timed out and removed the slot.
            debug!(%id, "Dropping stray response with no pending slot");
        }
    }
}

/// Render a decimal at fixed precision for the wire.
fn format_decimal(value: Decimal, precision: u32) -> String {
    let mut rounded = value.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(precision);
    rounded.to_string()
}

fn parse_open_order(item: &Value) -> TradingResult<Order> {
    let field_str = |name: &str| -> TradingResult<String> {
        match item.get(name) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            _ => Err(TradingError::MalformedResponse(format!("missing {name}"))),
        }
    };

    let side = match field_str("side")?.as_str() {
        "BUY" => OrderSide::Buy,
        "SELL" => OrderSide::Sell,
        other => {
            return Err(TradingError::MalformedResponse(format!(
                "unknown side {other}"
            )))
        }
    };

    let price: Decimal = field_str("price")?
        .parse()
        .map_err(|_| TradingError::MalformedResponse("bad price".into()))?;
    let qty: Decimal = field_str("origQty")?
        .parse()
        .map_err(|_| TradingError::MalformedResponse("bad origQty".into()))?;

    let mut order = Order::new(
        field_str("orderId")?,
        field_str("clientOrderId").unwrap_or_default(),
        field_str("symbol")?,
        side,
        Price::new(price),
        Size::new(qty),
    );
    if let Ok(status) = field_str("status") {
        order.state = OrderState::from_wire(&status);
    }
    if let Ok(executed) = field_str("executedQty") {
        if let Ok(filled) = executed.parse::<Decimal>() {
            order.filled_size = Size::new(filled);
        }
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_format_decimal_pads_and_rounds() {
        assert_eq!(format_decimal(dec!(98.2), 2), "98.20");
        assert_eq!(format_decimal(dec!(98.196), 2), "98.20");
        assert_eq!(format_decimal(dec!(0.5), 5), "0.50000");
    }

    #[test]
    fn test_handle_response_classifies_place_success() {
        let pending = PendingRequests::new();
        let metrics = TradingMetrics::new();
        let _rx = pending.register("req_1", method::PLACE);

        handle_response_payload(
            &pending,
            &metrics,
            r#"{"id":"req_1","status":200,"result":{"orderId":77,"status":"NEW"}}"#,
        );

        let snap = metrics.snapshot();
        assert_eq!(snap.total_requests, 1);
        assert_eq!(snap.successful_orders, 1);
        assert_eq!(snap.failed_orders, 0);
        assert!(pending.is_empty());
    }

    #[test]
    fn test_handle_response_classifies_error() {
        let pending = PendingRequests::new();
        let metrics = TradingMetrics::new();
        let _rx = pending.register("req_1", method::PLACE);

        handle_response_payload(
            &pending,
            &metrics,
            r#"{"id":"req_1","status":400,"error":{"code":-2010,"msg":"rejected"}}"#,
        );

        let snap = metrics.snapshot();
        assert_eq!(snap.failed_orders, 1);
        assert_eq!(snap.successful_orders, 0);
    }

    #[test]
    fn test_handle_response_counts_cancel() {
        let pending = PendingRequests::new();
        let metrics = TradingMetrics::new();
        let _rx = pending.register("req_9", method::CANCEL);

        handle_response_payload(
            &pending,
            &metrics,
            r#"{"id":"req_9","status":200,"result":{"status":"CANCELED"}}"#,
        );

        assert_eq!(metrics.snapshot().cancelled_orders, 1);
    }

    #[test]
    fn test_stray_response_dropped_without_metrics() {
        let pending = PendingRequests::new();
        let metrics = TradingMetrics::new();

        // No pending slot registered: the stray response is dropped.
        handle_response_payload(
            &pending,
            &metrics,
            r#"{"id":"req_404","status":200,"result":{"status":"CANCELED"}}"#,
        );

        assert_eq!(metrics.snapshot().total_requests, 0);
        assert_eq!(metrics.snapshot().cancelled_orders, 0);
    }

    #[test]
    fn test_parse_open_order() {
        let item: Value = serde_json::from_str(
            r#"{"orderId":12345,"clientOrderId":"MM_BID_1_000001","symbol":"BTCUSDT",
                "side":"BUY","price":"98.20","origQty":"0.50000","executedQty":"0.10000",
                "status":"PARTIALLY_FILLED"}"#,
        )
        .unwrap();

        let order = parse_open_order(&item).unwrap();
        assert_eq!(order.order_id, "12345");
        assert_eq!(order.side, OrderSide::Buy);
        assert_eq!(order.price.inner(), dec!(98.20));
        assert_eq!(order.filled_size.inner(), dec!(0.10000));
        assert_eq!(order.state, OrderState::PartiallyFilled);
    }

    #[tokio::test]
    async fn test_send_refused_when_not_connected() {
        let config = TradingConfig::new(
            "wss://example.org/ws-api".into(),
            ApiCredentials::new("k".into(), "s".into()),
        );
        let (client, _events) = TradingClient::new(config);

        let err = client
            .send_and_wait(method::CANCEL_ALL, Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TradingError::NotConnected));
    }

    #[tokio::test]
    async fn test_send_refused_during_shutdown() {
        let config = TradingConfig::new(
            "wss://example.org/ws-api".into(),
            ApiCredentials::new("k".into(), "s".into()),
        );
        let (client, _events) = TradingClient::new(config);
        client.shutdown();

        let err = client
            .send_and_wait(method::CANCEL_ALL, Map::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TradingError::ShuttingDown));
    }
}
