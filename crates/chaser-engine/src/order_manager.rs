//! Rotation of the two resting quotes.
//!
//! Each mid-price update becomes at most one rotation: cancel whatever
//! rests, then place a fresh symmetric pair. The cancel phase completes
//! (or times out softly) before the place phase starts; within each
//! phase the two sides run concurrently. The single decision task
//! driving [`OrderManager::update`] guarantees one rotation in flight.

use crate::error::{EngineError, EngineResult};
use crate::gateway::{CancelRequest, OrderGateway, PlaceRequest};
use crate::metrics::{EngineMetrics, LatencyMetricsSnapshot};
use crate::rate_limiter::{OrderRateLimiter, RateLimiterStats};
use crate::validator::{OrderValidator, TradingLimits};
use chaser_core::{Order, OrderBook, OrderSide, Price, Size};
use parking_lot::Mutex;
use rand::Rng;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Mid moves below this ratio are deduplicated (0.01%).
const PRICE_CHANGE_THRESHOLD: Decimal = dec!(0.0001);

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub symbol: String,
    /// Quantity per side.
    pub order_size: Size,
    /// Half-spread as a fraction of mid.
    pub spread: Decimal,
    pub price_precision: u32,
    pub quantity_precision: u32,
    /// Minimum gap between rotations.
    pub cooldown: Duration,
    /// Soft per-cancel deadline.
    pub cancel_deadline: Duration,
    pub max_orders_per_second: usize,
    pub max_requests_per_second: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            order_size: Size::new(dec!(0.001)),
            spread: dec!(0.02),
            price_precision: 2,
            quantity_precision: 5,
            cooldown: Duration::from_millis(100),
            cancel_deadline: Duration::from_millis(100),
            max_orders_per_second: 10,
            max_requests_per_second: 20,
        }
    }
}

/// The two active-quote slots.
///
/// At steady state both are present or both absent; half-populated
/// states exist only inside a rotation or after a one-sided reject.
#[derive(Debug, Default)]
pub struct ActiveQuotes {
    pub bid: Option<Order>,
    pub ask: Option<Order>,
}

/// How a rotation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationOutcome {
    BothOk,
    BidOnly,
    AskOnly,
    Neither,
}

/// Quote engine / order manager.
pub struct OrderManager {
    gateway: Arc<dyn OrderGateway>,
    config: EngineConfig,
    validator: Mutex<OrderValidator>,
    /// Slot lock; never held across I/O.
    slots: Mutex<ActiveQuotes>,
    limiters: OrderRateLimiter,
    tick_size: Price,
    lot_size: Size,
    last_mid: Mutex<Option<Price>>,
    last_update: Mutex<Option<Instant>>,
    metrics: Arc<EngineMetrics>,
}

impl OrderManager {
    pub fn new(gateway: Arc<dyn OrderGateway>, config: EngineConfig) -> Self {
        let limits = TradingLimits {
            price_precision: config.price_precision,
            quantity_precision: config.quantity_precision,
            ..TradingLimits::default()
        };
        let tick_size = Price::tick_from_precision(config.price_precision);
        let lot_size = Size::lot_from_precision(config.quantity_precision);
        let limiters = OrderRateLimiter::new(
            config.max_orders_per_second,
            config.max_requests_per_second,
        );
        Self {
            gateway,
            config,
            validator: Mutex::new(OrderValidator::new(limits)),
            slots: Mutex::new(ActiveQuotes::default()),
            limiters,
            tick_size,
            lot_size,
            last_mid: Mutex::new(None),
            last_update: Mutex::new(None),
            metrics: Arc::new(EngineMetrics::new()),
        }
    }

    /// Feed a fresh book into the validator's dynamic limits.
    pub fn observe_book(&self, book: &OrderBook) {
        self.validator.lock().update_limits(book);
    }

    /// React to a mid-price change.
    ///
    /// Returns `Ok(true)` when both sides rest (or no update was needed),
    /// `Ok(false)` when the rotation ended short of a full pair.
    pub async fn update(&self, mid: Price, book_received_at: Instant) -> EngineResult<bool> {
        if !mid.is_positive() {
            return Err(EngineError::InvalidMid(mid.to_string()));
        }
        if !self.gateway.is_connected() {
            debug!("Skipping update: trading channel down");
            return Err(EngineError::ConnectionDown);
        }

        let slots_full = {
            let slots = self.slots.lock();
            slots.bid.is_some() && slots.ask.is_some()
        };

        if slots_full {
            if let Some(last_mid) = *self.last_mid.lock() {
                let change =
                    (mid.inner() - last_mid.inner()).abs() / last_mid.inner();
                if change <= PRICE_CHANGE_THRESHOLD {
                    debug!(%mid, %last_mid, %change, "Mid change below threshold, skipping");
                    return Ok(true);
                }
            }
            if let Some(last_update) = *self.last_update.lock() {
                if last_update.elapsed() < self.config.cooldown {
                    debug!("Rotation cooldown active, skipping");
                    return Ok(true);
                }
            }
        }

        let outcome = self.rotate(mid, book_received_at).await?;
        Ok(outcome == RotationOutcome::BothOk)
    }

    /// Cancel the resting pair and place a fresh one around `mid`.
    async fn rotate(
        &self,
        mid: Price,
        book_received_at: Instant,
    ) -> EngineResult<RotationOutcome> {
        let decision_start = Instant::now();

        let bid_price = Price::new(mid.inner() * (Decimal::ONE - self.config.spread))
            .round_to_tick(self.tick_size);
        let ask_price = Price::new(mid.inner() * (Decimal::ONE + self.config.spread))
            .round_to_tick(self.tick_size);
        let size = self.config.order_size.round_to_lot(self.lot_size);

        let validation = self
            .validator
            .lock()
            .validate_quote(bid_price, ask_price, size, mid);
        if let Err(reject) = validation {
            warn!(
                reason = %reject,
                suggested_price = ?reject.suggested_price,
                suggested_quantity = ?reject.suggested_quantity,
                "Quote validation reject, rotation aborted"
            );
            self.metrics.record_order_outcomes(0, 2);
            return Ok(RotationOutcome::Neither);
        }

        // Snapshot under the slot lock, release it for the I/O below.
        let (resting_bid, resting_ask) = {
            let slots = self.slots.lock();
            (slots.bid.clone(), slots.ask.clone())
        };

        if resting_bid.is_some() || resting_ask.is_some() {
            tokio::join!(
                self.cancel_resting(resting_bid.as_ref()),
                self.cancel_resting(resting_ask.as_ref()),
            );
            let mut slots = self.slots.lock();
            slots.bid = None;
            slots.ask = None;
        }

        let (bid_ok, ask_ok) = tokio::join!(
            self.place_quote(OrderSide::Buy, bid_price, size),
            self.place_quote(OrderSide::Sell, ask_price, size),
        );

        *self.last_mid.lock() = Some(mid);
        *self.last_update.lock() = Some(Instant::now());

        let execution_ms = decision_start.elapsed().as_secs_f64() * 1_000.0;
        let reaction_ms = book_received_at.elapsed().as_secs_f64() * 1_000.0;
        self.metrics
            .record_rotation_latency(execution_ms, reaction_ms);
        let successful = u64::from(bid_ok) + u64::from(ask_ok);
        self.metrics
            .record_order_outcomes(successful, 2 - successful);

        let outcome = match (bid_ok, ask_ok) {
            (true, true) => RotationOutcome::BothOk,
            (true, false) => RotationOutcome::BidOnly,
            (false, true) => RotationOutcome::AskOnly,
            (false, false) => RotationOutcome::Neither,
        };
        info!(
            %mid,
            %bid_price,
            %ask_price,
            ?outcome,
            execution_ms,
            reaction_ms,
            "Rotation complete"
        );
        Ok(outcome)
    }

    /// Cancel one resting order with the soft per-cancel deadline.
    async fn cancel_resting(&self, order: Option<&Order>) {
        let Some(order) = order else { return };

        self.limiters.cancel.acquire().await;
        let request = CancelRequest {
            symbol: self.config.symbol.clone(),
            order_id: order.order_id.clone(),
        };
        match tokio::time::timeout(self.config.cancel_deadline, self.gateway.cancel(request)).await
        {
            Ok(Ok(())) => debug!(order_id = %order.order_id, "Canceled order"),
            Ok(Err(e)) => {
                warn!(order_id = %order.order_id, ?e, "Cancel failed, continuing")
            }
            Err(_) => warn!(
                order_id = %order.order_id,
                deadline_ms = self.config.cancel_deadline.as_millis() as u64,
                "Cancel timed out, continuing"
            ),
        }
    }

    /// Place one side; install the order into its slot on success.
    async fn place_quote(&self, side: OrderSide, price: Price, size: Size) -> bool {
        self.limiters.place.acquire().await;

        let request = PlaceRequest {
            symbol: self.config.symbol.clone(),
            side,
            price,
            size,
            client_order_id: generate_client_order_id(side),
        };
        let started = Instant::now();
        match self.gateway.place_limit(request).await {
            Ok(order) => {
                debug!(
                    %side,
                    order_id = %order.order_id,
                    latency_us = started.elapsed().as_micros() as u64,
                    "Placement completed"
                );
                let mut slots = self.slots.lock();
                match side {
                    OrderSide::Buy => slots.bid = Some(order),
                    OrderSide::Sell => slots.ask = Some(order),
                }
                true
            }
            Err(e) => {
                warn!(%side, %price, ?e, "Placement failed");
                false
            }
        }
    }

    /// Cancel everything on the symbol and empty the slots.
    ///
    /// Idempotent: a second call succeeds with nothing to cancel.
    pub async fn cancel_all_active(&self) -> EngineResult<()> {
        {
            let mut slots = self.slots.lock();
            slots.bid = None;
            slots.ask = None;
        }
        self.limiters.cancel.acquire().await;
        self.gateway
            .cancel_all(self.config.symbol.clone())
            .await?;
        Ok(())
    }

    /// Clone of the current slot pair.
    pub fn active_quotes(&self) -> (Option<Order>, Option<Order>) {
        let slots = self.slots.lock();
        (slots.bid.clone(), slots.ask.clone())
    }

    pub fn metrics(&self) -> LatencyMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Shared handle for connection-event accounting by the supervisor.
    pub fn metrics_handle(&self) -> Arc<EngineMetrics> {
        self.metrics.clone()
    }

    pub fn rate_limiter_stats(&self) -> (RateLimiterStats, RateLimiterStats) {
        (self.limiters.place.stats(), self.limiters.cancel.stats())
    }

    pub fn last_mid(&self) -> Option<Price> {
        *self.last_mid.lock()
    }
}

/// Client order id: `MM_<SIDE>_<monotonic-ts>_<random-6-digit>`.
///
/// Disambiguates responses and stays collision-free across reconnects.
fn generate_client_order_id(side: OrderSide) -> String {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let suffix: u32 = rand::thread_rng().gen_range(100_000..=999_999);
    format!("MM_{}_{}_{}", side.slot_tag(), ts, suffix)
}
