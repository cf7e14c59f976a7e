//! Binance spot adapter.
//!
//! One depth stream for market data, one ws-api channel for trading.
//! Endpoints are selected by the `testnet` flag. The adapter offers
//! concurrency-safe point operations only; callers decide parallelism.

use crate::error::{ExchangeError, ExchangeResult};
use crate::metadata::SymbolMeta;
use crate::symbol::{stream_symbol, wire_symbol};
use chaser_core::{Order, OrderBook, OrderSide, OrderState, Price, Size};
use chaser_feed::{BookHandler, FeedConfig, MarketDataClient};
use chaser_trading::{ApiCredentials, TradingClient, TradingConfig, TradingMetricsSnapshot};
use chaser_ws::ConnectionEvent;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

const MAINNET_STREAM_URL: &str = "wss://stream.binance.com:9443/ws";
const TESTNET_STREAM_URL: &str = "wss://stream.testnet.binance.vision/ws";
const MAINNET_TRADING_URL: &str = "wss://ws-api.binance.com:443/ws-api/v3";
const TESTNET_TRADING_URL: &str = "wss://ws-api.testnet.binance.vision/ws-api/v3";

/// Which channel a connection event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    MarketData,
    Trading,
}

/// Connection status event tagged with its channel.
#[derive(Debug, Clone)]
pub struct ExchangeEvent {
    pub channel: ChannelKind,
    pub event: ConnectionEvent,
}

/// Top-of-book read served from the cached snapshot.
#[derive(Debug, Clone, Copy)]
pub struct TopOfBook {
    pub best_bid: Price,
    pub best_ask: Price,
    pub mid: Price,
}

/// Adapter configuration.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    /// Registry key, e.g. "binance".
    pub exchange: String,
    pub symbol: String,
    pub testnet: bool,
    pub api_key: String,
    pub api_secret: String,
    pub price_precision: u32,
    pub quantity_precision: u32,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub request_timeout_ms: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            exchange: "binance".to_string(),
            symbol: "BTCUSDT".to_string(),
            testnet: false,
            api_key: String::new(),
            api_secret: String::new(),
            price_precision: 2,
            quantity_precision: 5,
            reconnect_delay_ms: 5_000,
            max_reconnect_attempts: 10,
            request_timeout_ms: 5_000,
        }
    }
}

/// Binance exchange adapter.
pub struct BinanceExchange {
    config: ExchangeConfig,
    trading: Arc<TradingClient>,
    feed: Mutex<Option<MarketDataClient>>,
    /// Most recent decoded book; read-mostly, never held across I/O.
    latest_book: Arc<Mutex<Option<OrderBook>>>,
    /// Per-symbol metadata seeded once at startup.
    metadata: Mutex<HashMap<String, SymbolMeta>>,
    event_tx: mpsc::Sender<ExchangeEvent>,
}

impl BinanceExchange {
    /// Build the adapter. Returns it plus the unified event stream the
    /// owner drains for reconnect/downtime accounting.
    pub fn new(config: ExchangeConfig) -> (Self, mpsc::Receiver<ExchangeEvent>) {
        let (event_tx, event_rx) = mpsc::channel(64);

        let trading_url = if config.testnet {
            TESTNET_TRADING_URL
        } else {
            MAINNET_TRADING_URL
        };
        let mut trading_config = TradingConfig::new(
            trading_url.to_string(),
            ApiCredentials::new(config.api_key.clone(), config.api_secret.clone()),
        );
        trading_config.price_precision = config.price_precision;
        trading_config.quantity_precision = config.quantity_precision;
        trading_config.retry_delay_ms = config.reconnect_delay_ms;
        trading_config.request_timeout_ms = config.request_timeout_ms;

        let (trading, trading_events) = TradingClient::new(trading_config);
        forward_events(trading_events, ChannelKind::Trading, event_tx.clone());

        let wire = wire_symbol(&config.symbol);
        let mut metadata = HashMap::new();
        metadata.insert(
            wire,
            SymbolMeta::from_precisions(config.price_precision, config.quantity_precision),
        );

        let adapter = Self {
            config,
            trading,
            feed: Mutex::new(None),
            latest_book: Arc::new(Mutex::new(None)),
            metadata: Mutex::new(metadata),
            event_tx,
        };
        (adapter, event_rx)
    }

    pub fn name(&self) -> &str {
        "binance"
    }

    /// Open the trading channel and wait until it is usable.
    pub async fn connect(&self) -> ExchangeResult<()> {
        self.trading.start()?;
        self.trading
            .wait_until_open(Duration::from_secs(15))
            .await?;
        info!(testnet = self.config.testnet, "Trading channel open");
        Ok(())
    }

    /// Open the depth stream and deliver snapshots to `handler`.
    ///
    /// The adapter refreshes its book cache before forwarding each
    /// snapshot, so `top_of_book` never needs a round trip.
    pub fn subscribe_orderbook(
        &self,
        symbol: &str,
        depth: u32,
        handler: BookHandler,
    ) -> ExchangeResult<()> {
        let mut feed_slot = self.feed.lock();
        if feed_slot.is_some() {
            return Err(ExchangeError::AlreadySubscribed);
        }

        let stream_base = if self.config.testnet {
            TESTNET_STREAM_URL
        } else {
            MAINNET_STREAM_URL
        };
        let feed_config = FeedConfig {
            reconnect_delay_ms: self.config.reconnect_delay_ms,
            max_reconnect_attempts: self.config.max_reconnect_attempts,
            enable_auto_reconnect: true,
        };
        let (feed, feed_events) =
            MarketDataClient::new(stream_base, &stream_symbol(symbol), depth, feed_config);
        forward_events(feed_events, ChannelKind::MarketData, self.event_tx.clone());

        let cache = self.latest_book.clone();
        let caching_handler: BookHandler = Arc::new(move |book: OrderBook| {
            *cache.lock() = Some(book.clone());
            handler(book);
        });

        feed.start(caching_handler)?;
        *feed_slot = Some(feed);
        info!(symbol = %stream_symbol(symbol), depth, "Subscribed to depth stream");
        Ok(())
    }

    /// Serve best bid/ask/mid from the cached book, without a round trip.
    pub fn top_of_book(&self) -> Option<TopOfBook> {
        let guard = self.latest_book.lock();
        let book = guard.as_ref()?;
        Some(TopOfBook {
            best_bid: book.best_bid()?,
            best_ask: book.best_ask()?,
            mid: book.mid_price()?,
        })
    }

    /// Clone of the most recent decoded book.
    pub fn latest_book(&self) -> Option<OrderBook> {
        self.latest_book.lock().clone()
    }

    pub fn symbol_meta(&self, symbol: &str) -> Option<SymbolMeta> {
        self.metadata.lock().get(&wire_symbol(symbol)).cloned()
    }

    pub async fn place_limit_order(
        &self,
        symbol: &str,
        side: OrderSide,
        price: Price,
        size: Size,
        client_order_id: &str,
    ) -> ExchangeResult<Order> {
        Ok(self
            .trading
            .place_limit(&wire_symbol(symbol), side, price, size, client_order_id)
            .await?)
    }

    pub async fn cancel_order(&self, symbol: &str, order_id: &str) -> ExchangeResult<()> {
        Ok(self.trading.cancel(&wire_symbol(symbol), order_id).await?)
    }

    pub async fn cancel_all_orders(&self, symbol: &str) -> ExchangeResult<()> {
        Ok(self.trading.cancel_all(&wire_symbol(symbol)).await?)
    }

    pub async fn query_order(&self, symbol: &str, order_id: &str) -> ExchangeResult<OrderState> {
        Ok(self
            .trading
            .query_order(&wire_symbol(symbol), order_id)
            .await?)
    }

    pub async fn open_orders(&self, symbol: &str) -> ExchangeResult<Vec<Order>> {
        Ok(self.trading.open_orders(&wire_symbol(symbol)).await?)
    }

    pub fn trading_connected(&self) -> bool {
        self.trading.is_connected()
    }

    pub fn market_data_connected(&self) -> bool {
        self.feed.lock().as_ref().is_some_and(|f| f.is_connected())
    }

    pub fn trading_metrics(&self) -> TradingMetricsSnapshot {
        self.trading.metrics()
    }

    /// Tear both channels down.
    pub fn disconnect(&self) {
        if let Some(feed) = self.feed.lock().take() {
            feed.shutdown();
        }
        self.trading.shutdown();
    }
}

/// Tag and forward one channel's connection events onto the unified stream.
fn forward_events(
    mut rx: mpsc::Receiver<ConnectionEvent>,
    channel: ChannelKind,
    tx: mpsc::Sender<ExchangeEvent>,
) {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if tx.send(ExchangeEvent { channel, event }).await.is_err() {
                break;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaser_core::PriceLevel;
    use rust_decimal_macros::dec;

    fn test_config() -> ExchangeConfig {
        ExchangeConfig {
            symbol: "BTC/USDT".to_string(),
            api_key: "k".to_string(),
            api_secret: "s".to_string(),
            ..ExchangeConfig::default()
        }
    }

    #[tokio::test]
    async fn test_metadata_seeded_for_configured_symbol() {
        let (adapter, _events) = BinanceExchange::new(test_config());

        // Any neutral spelling resolves to the same entry.
        let meta = adapter.symbol_meta("btc-usdt").unwrap();
        assert_eq!(meta.tick_size.inner(), dec!(0.01));
        assert!(adapter.symbol_meta("ETHUSDT").is_none());
    }

    #[tokio::test]
    async fn test_top_of_book_empty_until_first_snapshot() {
        let (adapter, _events) = BinanceExchange::new(test_config());
        assert!(adapter.top_of_book().is_none());

        *adapter.latest_book.lock() = Some(OrderBook::new(
            vec![PriceLevel::new(
                Price::new(dec!(100.00)),
                Size::new(dec!(1)),
            )],
            vec![PriceLevel::new(
                Price::new(dec!(100.40)),
                Size::new(dec!(1)),
            )],
        ));

        let top = adapter.top_of_book().unwrap();
        assert_eq!(top.mid.inner(), dec!(100.20));
        assert_eq!(top.best_bid.inner(), dec!(100.00));
    }

    #[tokio::test]
    async fn test_not_connected_initially() {
        let (adapter, _events) = BinanceExchange::new(test_config());
        assert!(!adapter.trading_connected());
        assert!(!adapter.market_data_connected());
    }
}
