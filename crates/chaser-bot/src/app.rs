//! Supervisor: owns the lifecycle of the exchange adapter and the quote
//! engine and drives the reactive decision loop.
//!
//! The book callback runs on the feed worker and only touches shared
//! state (cached book, mid, flags) before signalling the decision task.
//! The single decision task reacts to mid changes, so at most one
//! rotation is ever in flight.

use crate::config::BotConfig;
use crate::error::{AppError, AppResult};
use chaser_core::{OrderBook, Price, Size};
use chaser_engine::{EngineConfig, EngineError, EngineMetrics, OrderGateway, OrderManager};
use chaser_exchange::{ExchangeClient, ExchangeConfig, ExchangeEvent};
use chaser_feed::BookHandler;
use chaser_ws::ConnectionEvent;
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Depth of the subscribed book stream.
const BOOK_DEPTH: u32 = 20;

/// How long the decision loop waits per iteration when idle.
const DECISION_WAIT: Duration = Duration::from_millis(10);

/// Status snapshot cadence.
const STATUS_INTERVAL: Duration = Duration::from_secs(30);

/// Budget for the best-effort cancel-all during stop.
const SHUTDOWN_CANCEL_BUDGET: Duration = Duration::from_millis(900);

/// State shared between the book callback and the decision task.
struct SharedState {
    book: Mutex<Option<OrderBook>>,
    current_mid: Mutex<Option<Price>>,
    book_received_at: Mutex<Option<Instant>>,
    price_changed: AtomicBool,
    running: AtomicBool,
    notify: Notify,
}

impl SharedState {
    fn new() -> Self {
        Self {
            book: Mutex::new(None),
            current_mid: Mutex::new(None),
            book_received_at: Mutex::new(None),
            price_changed: AtomicBool::new(false),
            running: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }
}

/// The market-maker supervisor.
pub struct MarketMakerBot {
    config: BotConfig,
    exchange: Arc<ExchangeClient>,
    engine: Arc<OrderManager>,
    state: Arc<SharedState>,
    events_rx: Mutex<Option<mpsc::Receiver<ExchangeEvent>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MarketMakerBot {
    /// Validate config, build the adapter, wire handlers, connect, and
    /// subscribe to the book stream.
    pub async fn initialize(config: BotConfig) -> AppResult<Self> {
        config.validate()?;

        if !config.use_websocket_trading {
            warn!("use_websocket_trading=false is not wired; using the duplex channel");
        }

        let exchange_config = ExchangeConfig {
            exchange: config.exchange.clone(),
            symbol: config.symbol.clone(),
            testnet: config.testnet,
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            price_precision: config.price_precision,
            quantity_precision: config.quantity_precision,
            reconnect_delay_ms: config.reconnect_delay_ms,
            max_reconnect_attempts: config.max_reconnect_attempts,
            request_timeout_ms: 5_000,
        };
        let (exchange, events_rx) = chaser_exchange::create(exchange_config)?;
        let exchange = Arc::new(exchange);

        let engine_config = EngineConfig {
            symbol: config.symbol.clone(),
            order_size: Size::new(config.order_size),
            spread: config.spread_percentage,
            price_precision: config.price_precision,
            quantity_precision: config.quantity_precision,
            cooldown: Duration::from_millis(config.order_update_cooldown_ms),
            cancel_deadline: Duration::from_millis(100),
            max_orders_per_second: config.max_orders_per_second,
            max_requests_per_second: config.max_requests_per_second,
        };
        let gateway: Arc<dyn OrderGateway> = exchange.clone();
        let engine = Arc::new(OrderManager::new(gateway, engine_config));

        let state = Arc::new(SharedState::new());

        info!(
            exchange = %exchange.name(),
            symbol = %config.symbol,
            testnet = config.testnet,
            "Connecting"
        );
        exchange.connect().await?;

        let handler = Self::book_handler(state.clone());
        exchange.subscribe_orderbook(&config.symbol, BOOK_DEPTH, handler)?;

        info!("Supervisor initialized");
        Ok(Self {
            config,
            exchange,
            engine,
            state,
            events_rx: Mutex::new(Some(events_rx)),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Book callback: cache the snapshot, recompute mid, signal the
    /// decision task. Runs on the feed worker; no I/O, no engine locks.
    fn book_handler(state: Arc<SharedState>) -> BookHandler {
        // Mid equality tolerance for float-fed books.
        let epsilon = dec!(0.00001);
        Arc::new(move |book: OrderBook| {
            let received_at = book.received_at;
            let mid = book.mid_price();
            *state.book.lock() = Some(book);

            // Empty or crossed books never drive quoting.
            let Some(new_mid) = mid else { return };

            let old_mid = *state.current_mid.lock();
            let changed = match old_mid {
                Some(old) => (new_mid.inner() - old.inner()).abs() > epsilon,
                None => true,
            };
            if changed {
                *state.current_mid.lock() = Some(new_mid);
                *state.book_received_at.lock() = Some(received_at);
                state.price_changed.store(true, Ordering::SeqCst);
                state.notify.notify_one();
            }
        })
    }

    /// Start the decision and connection-event tasks.
    pub fn start(&self) {
        self.state.running.store(true, Ordering::SeqCst);

        let mut tasks = self.tasks.lock();

        let state = self.state.clone();
        let engine = self.engine.clone();
        let exchange = self.exchange.clone();
        tasks.push(tokio::spawn(async move {
            Self::decision_loop(state, engine, exchange).await;
        }));

        if let Some(events_rx) = self.events_rx.lock().take() {
            let state = self.state.clone();
            let metrics = self.engine.metrics_handle();
            tasks.push(tokio::spawn(async move {
                Self::event_loop(events_rx, metrics, state).await;
            }));
        }

        info!(symbol = %self.config.symbol, "Market maker running");
    }

    /// The single decision task.
    async fn decision_loop(
        state: Arc<SharedState>,
        engine: Arc<OrderManager>,
        exchange: Arc<ExchangeClient>,
    ) {
        let mut last_status = Instant::now();

        while state.running.load(Ordering::SeqCst) {
            let _ = tokio::time::timeout(DECISION_WAIT, state.notify.notified()).await;
            if !state.running.load(Ordering::SeqCst) {
                break;
            }

            if state.price_changed.swap(false, Ordering::SeqCst) {
                let mid = *state.current_mid.lock();
                let received_at = *state.book_received_at.lock();
                let book = state.book.lock().clone();

                if let (Some(mid), Some(received_at)) = (mid, received_at) {
                    if let Some(book) = book {
                        engine.observe_book(&book);
                    }
                    match engine.update(mid, received_at).await {
                        Ok(_) => {}
                        Err(EngineError::ConnectionDown) => {
                            debug!("Rotation deferred: trading channel down")
                        }
                        Err(e) => warn!(?e, "Quote update failed"),
                    }
                }
            }

            if last_status.elapsed() >= STATUS_INTERVAL {
                Self::log_status(&engine, &exchange, &state);
                last_status = Instant::now();
            }
        }
        debug!("Decision loop exited");
    }

    /// Connection-event task: downtime accounting plus fatal-upstream
    /// handling when a channel exhausts its reconnect budget.
    async fn event_loop(
        mut events_rx: mpsc::Receiver<ExchangeEvent>,
        metrics: Arc<EngineMetrics>,
        state: Arc<SharedState>,
    ) {
        while let Some(ExchangeEvent { channel, event }) = events_rx.recv().await {
            match event {
                ConnectionEvent::Up => {
                    info!(?channel, "Channel up");
                    metrics.record_reconnect();
                }
                ConnectionEvent::Down { reason } => {
                    warn!(?channel, %reason, "Channel down");
                    metrics.record_disconnect();
                }
                ConnectionEvent::Exhausted => {
                    error!(?channel, "Reconnection attempts exhausted, stopping");
                    state.running.store(false, Ordering::SeqCst);
                    state.notify.notify_one();
                }
            }
        }
    }

    fn log_status(
        engine: &OrderManager,
        exchange: &ExchangeClient,
        state: &SharedState,
    ) {
        let (bid, ask) = engine.active_quotes();
        let snap = engine.metrics();
        let trading = exchange.trading_metrics();
        let (place_stats, cancel_stats) = engine.rate_limiter_stats();
        let mid = state.current_mid.lock().map(|m| m.to_string());

        info!(
            mid = ?mid,
            active_bid = ?bid.map(|o| format!("{} @ {}", o.order_id, o.price)),
            active_ask = ?ask.map(|o| format!("{} @ {}", o.order_id, o.price)),
            rotations = snap.rotations,
            successful_orders = snap.successful_orders,
            failed_orders = snap.failed_orders,
            avg_execution_ms = snap.avg_execution_ms,
            avg_reaction_ms = snap.avg_reaction_ms,
            reconnects = snap.reconnect_count,
            uptime_pct = snap.uptime_pct,
            requests = trading.total_requests,
            avg_response_ms = trading.avg_response_ms,
            place_rate = place_stats.events_in_last_second,
            cancel_rate = cancel_stats.events_in_last_second,
            "Status"
        );
    }

    /// Whether the supervisor is still running.
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    /// Resolve when the supervisor stops on its own.
    pub async fn wait_stopped(&self) {
        while self.is_running() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Stop: wake the decision task, cancel resting orders best-effort,
    /// tear both channels down. Returns promptly.
    pub async fn stop(&self) {
        info!("Stopping market maker");
        self.state.running.store(false, Ordering::SeqCst);
        self.state.notify.notify_one();

        match tokio::time::timeout(SHUTDOWN_CANCEL_BUDGET, self.engine.cancel_all_active()).await
        {
            Ok(Ok(())) => info!("Resting orders cancelled"),
            Ok(Err(e)) => warn!(?e, "Cancel-all failed during shutdown"),
            Err(_) => warn!("Cancel-all timed out during shutdown"),
        }

        self.exchange.disconnect();
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        info!("Market maker stopped");
    }

    /// Final metrics for the exit summary.
    pub fn final_metrics(&self) -> chaser_engine::LatencyMetricsSnapshot {
        self.engine.metrics()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaser_core::{PriceLevel, Size};

    fn level(price: &str, size: &str) -> PriceLevel {
        PriceLevel::new(
            Price::new(price.parse().unwrap()),
            Size::new(size.parse().unwrap()),
        )
    }

    #[tokio::test]
    async fn test_book_handler_signals_on_mid_change() {
        let state = Arc::new(SharedState::new());
        let handler = MarketMakerBot::book_handler(state.clone());

        handler(OrderBook::new(
            vec![level("100.00", "1")],
            vec![level("100.40", "1")],
        ));

        assert!(state.price_changed.load(Ordering::SeqCst));
        assert_eq!(
            state.current_mid.lock().unwrap().inner(),
            dec!(100.20)
        );
        assert!(state.book_received_at.lock().is_some());
    }

    #[tokio::test]
    async fn test_book_handler_ignores_sub_epsilon_move() {
        let state = Arc::new(SharedState::new());
        let handler = MarketMakerBot::book_handler(state.clone());

        handler(OrderBook::new(
            vec![level("100.00", "1")],
            vec![level("100.40", "1")],
        ));
        state.price_changed.store(false, Ordering::SeqCst);

        // Same book again: mid unchanged, no signal.
        handler(OrderBook::new(
            vec![level("100.00", "1")],
            vec![level("100.40", "1")],
        ));
        assert!(!state.price_changed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_book_handler_skips_crossed_book() {
        let state = Arc::new(SharedState::new());
        let handler = MarketMakerBot::book_handler(state.clone());

        handler(OrderBook::new(
            vec![level("100.50", "1")],
            vec![level("100.40", "1")],
        ));

        // Book is cached for inspection, but no mid and no signal.
        assert!(state.book.lock().is_some());
        assert!(state.current_mid.lock().is_none());
        assert!(!state.price_changed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_book_handler_skips_empty_side() {
        let state = Arc::new(SharedState::new());
        let handler = MarketMakerBot::book_handler(state.clone());

        handler(OrderBook::new(vec![], vec![level("100.40", "1")]));
        assert!(state.current_mid.lock().is_none());
        assert!(!state.price_changed.load(Ordering::SeqCst));
    }
}
