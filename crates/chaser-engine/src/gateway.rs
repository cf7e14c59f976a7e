//! Order gateway trait for rotation I/O.
//!
//! Abstracts the exchange adapter behind a dyn-compatible trait so the
//! rotation logic can be driven against a mock in tests. The production
//! implementation lives on [`chaser_exchange::ExchangeClient`].

use chaser_core::{Order, OrderSide, Price, Size};
use chaser_exchange::{ExchangeClient, ExchangeError};
use chaser_trading::TradingError;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// A placement about to be sent.
#[derive(Debug, Clone)]
pub struct PlaceRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub price: Price,
    pub size: Size,
    pub client_order_id: String,
}

/// A cancellation about to be sent.
#[derive(Debug, Clone)]
pub struct CancelRequest {
    pub symbol: String,
    pub order_id: String,
}

/// Gateway-level failures, as the engine sees them.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Exchange rejected request: code={code}, msg={msg}")]
    Rejected { code: i64, msg: String },

    #[error("Request timeout")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Not connected")]
    NotConnected,

    #[error("{0}")]
    Other(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Trait for issuing order mutations.
pub trait OrderGateway: Send + Sync {
    fn place_limit(&self, request: PlaceRequest) -> BoxFuture<'_, GatewayResult<Order>>;

    fn cancel(&self, request: CancelRequest) -> BoxFuture<'_, GatewayResult<()>>;

    fn cancel_all(&self, symbol: String) -> BoxFuture<'_, GatewayResult<()>>;

    fn is_connected(&self) -> bool;
}

impl OrderGateway for ExchangeClient {
    fn place_limit(&self, request: PlaceRequest) -> BoxFuture<'_, GatewayResult<Order>> {
        Box::pin(async move {
            self.place_limit_order(
                &request.symbol,
                request.side,
                request.price,
                request.size,
                &request.client_order_id,
            )
            .await
            .map_err(into_gateway_error)
        })
    }

    fn cancel(&self, request: CancelRequest) -> BoxFuture<'_, GatewayResult<()>> {
        Box::pin(async move {
            self.cancel_order(&request.symbol, &request.order_id)
                .await
                .map_err(into_gateway_error)
        })
    }

    fn cancel_all(&self, symbol: String) -> BoxFuture<'_, GatewayResult<()>> {
        Box::pin(async move {
            self.cancel_all_orders(&symbol)
                .await
                .map_err(into_gateway_error)
        })
    }

    fn is_connected(&self) -> bool {
        self.trading_connected()
    }
}

fn into_gateway_error(error: ExchangeError) -> GatewayError {
    match error {
        ExchangeError::Trading(TradingError::Rejected { code, msg }) => {
            GatewayError::Rejected { code, msg }
        }
        ExchangeError::Trading(TradingError::Timeout { .. }) => GatewayError::Timeout,
        ExchangeError::Trading(TradingError::ConnectionClosed)
        | ExchangeError::Trading(TradingError::ShuttingDown) => GatewayError::ConnectionClosed,
        ExchangeError::Trading(TradingError::NotConnected) | ExchangeError::NotConnected => {
            GatewayError::NotConnected
        }
        other => GatewayError::Other(other.to_string()),
    }
}

/// Mock gateway for rotation tests.
///
/// Scripted per side: placements for a side listed in `fail_places` are
/// rejected; `cancel_delay` stalls cancellations past the engine's
/// deadline; dropping `connected` makes every operation fail closed.
pub struct MockGateway {
    places: parking_lot::Mutex<Vec<PlaceRequest>>,
    cancels: parking_lot::Mutex<Vec<CancelRequest>>,
    cancel_alls: parking_lot::Mutex<Vec<String>>,
    fail_places: parking_lot::Mutex<Vec<OrderSide>>,
    cancel_delay: parking_lot::Mutex<Option<std::time::Duration>>,
    disconnect_after_cancels: std::sync::atomic::AtomicBool,
    connected: std::sync::atomic::AtomicBool,
    next_order_id: std::sync::atomic::AtomicU64,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            places: parking_lot::Mutex::new(Vec::new()),
            cancels: parking_lot::Mutex::new(Vec::new()),
            cancel_alls: parking_lot::Mutex::new(Vec::new()),
            fail_places: parking_lot::Mutex::new(Vec::new()),
            cancel_delay: parking_lot::Mutex::new(None),
            disconnect_after_cancels: std::sync::atomic::AtomicBool::new(false),
            connected: std::sync::atomic::AtomicBool::new(true),
            next_order_id: std::sync::atomic::AtomicU64::new(1),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Reject placements on `side` until cleared.
    pub fn fail_place_on(&self, side: OrderSide) {
        self.fail_places.lock().push(side);
    }

    pub fn clear_place_failures(&self) {
        self.fail_places.lock().clear();
    }

    /// Stall every cancel by `delay`.
    pub fn set_cancel_delay(&self, delay: std::time::Duration) {
        *self.cancel_delay.lock() = Some(delay);
    }

    /// Drop the connection as soon as the cancel phase has run.
    pub fn disconnect_after_cancels(&self) {
        self.disconnect_after_cancels
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected
            .store(connected, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn placed(&self) -> Vec<PlaceRequest> {
        self.places.lock().clone()
    }

    pub fn cancelled(&self) -> Vec<CancelRequest> {
        self.cancels.lock().clone()
    }

    pub fn cancel_all_calls(&self) -> Vec<String> {
        self.cancel_alls.lock().clone()
    }
}

impl OrderGateway for MockGateway {
    fn place_limit(&self, request: PlaceRequest) -> BoxFuture<'_, GatewayResult<Order>> {
        Box::pin(async move {
            if !self.is_connected() {
                return Err(GatewayError::ConnectionClosed);
            }
            if self.fail_places.lock().contains(&request.side) {
                return Err(GatewayError::Rejected {
                    code: -2010,
                    msg: "scripted reject".to_string(),
                });
            }
            let id = self
                .next_order_id
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            self.places.lock().push(request.clone());
            Ok(Order::new(
                id.to_string(),
                request.client_order_id,
                request.symbol,
                request.side,
                request.price,
                request.size,
            ))
        })
    }

    fn cancel(&self, request: CancelRequest) -> BoxFuture<'_, GatewayResult<()>> {
        Box::pin(async move {
            if !self.is_connected() {
                return Err(GatewayError::ConnectionClosed);
            }
            let delay = *self.cancel_delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.cancels.lock().push(request);
            if self
                .disconnect_after_cancels
                .load(std::sync::atomic::Ordering::SeqCst)
            {
                self.set_connected(false);
            }
            Ok(())
        })
    }

    fn cancel_all(&self, symbol: String) -> BoxFuture<'_, GatewayResult<()>> {
        Box::pin(async move {
            if !self.is_connected() {
                return Err(GatewayError::ConnectionClosed);
            }
            self.cancel_alls.lock().push(symbol);
            Ok(())
        })
    }

    fn is_connected(&self) -> bool {
        self.connected.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request(side: OrderSide) -> PlaceRequest {
        PlaceRequest {
            symbol: "BTCUSDT".into(),
            side,
            price: Price::new(dec!(100)),
            size: Size::new(dec!(0.5)),
            client_order_id: "MM_BID_1_000001".into(),
        }
    }

    #[tokio::test]
    async fn test_mock_records_places() {
        let mock = MockGateway::new();
        let order = mock.place_limit(request(OrderSide::Buy)).await.unwrap();
        assert_eq!(order.side, OrderSide::Buy);
        assert_eq!(mock.placed().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_scripted_side_reject() {
        let mock = MockGateway::new();
        mock.fail_place_on(OrderSide::Sell);

        assert!(mock.place_limit(request(OrderSide::Buy)).await.is_ok());
        let err = mock.place_limit(request(OrderSide::Sell)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_mock_disconnected_fails_closed() {
        let mock = MockGateway::new();
        mock.set_connected(false);
        let err = mock.place_limit(request(OrderSide::Buy)).await.unwrap_err();
        assert!(matches!(err, GatewayError::ConnectionClosed));
    }
}
