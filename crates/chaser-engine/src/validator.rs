//! Static sanity checks on quotes before they reach the wire.
//!
//! Rules run in order: range checks on price/size/notional, tick/lot
//! alignment, per-side deviation from mid, then the pair checks (no
//! cross, spread inside the allowed band). A reject carries the reason
//! and, where one exists, a suggested correction. Limits tighten
//! dynamically as fresh books arrive so the engine cannot quote into a
//! dislocated or empty market.

use chaser_core::{OrderBook, OrderSide, Price, Size};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Orders further than this from mid are refused outright.
const MAX_DEVIATION: Decimal = dec!(0.10);

/// Trading limits with exchange-typical defaults.
#[derive(Debug, Clone)]
pub struct TradingLimits {
    pub min_price: Price,
    pub max_price: Price,
    pub min_qty: Size,
    pub max_qty: Size,
    /// Minimum order value (price * quantity).
    pub min_notional: Decimal,
    pub max_notional: Decimal,
    pub price_precision: u32,
    pub quantity_precision: u32,
    /// Allowed quote spread band, as fractions of mid.
    pub min_spread: Decimal,
    pub max_spread: Decimal,
}

impl Default for TradingLimits {
    fn default() -> Self {
        Self {
            min_price: Price::new(dec!(0.01)),
            max_price: Price::new(dec!(1000000)),
            min_qty: Size::new(dec!(0.00001)),
            max_qty: Size::new(dec!(10000)),
            min_notional: dec!(10),
            max_notional: dec!(100000),
            price_precision: 2,
            quantity_precision: 5,
            min_spread: dec!(0.001),
            max_spread: dec!(0.10),
        }
    }
}

/// A failed validation: why, plus suggested corrections where they exist.
#[derive(Debug, Clone)]
pub struct ValidationReject {
    pub reason: String,
    pub suggested_price: Option<Price>,
    pub suggested_quantity: Option<Size>,
}

impl ValidationReject {
    fn new(reason: String) -> Self {
        Self {
            reason,
            suggested_price: None,
            suggested_quantity: None,
        }
    }

    fn with_price(mut self, price: Price) -> Self {
        self.suggested_price = Some(price);
        self
    }

    fn with_quantity(mut self, quantity: Size) -> Self {
        self.suggested_quantity = Some(quantity);
        self
    }
}

impl std::fmt::Display for ValidationReject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason)
    }
}

pub type ValidationResult = Result<(), ValidationReject>;

/// Order validator with dynamically tightened limits.
#[derive(Debug, Clone)]
pub struct OrderValidator {
    limits: TradingLimits,
    tick_size: Price,
    lot_size: Size,
}

impl Default for OrderValidator {
    fn default() -> Self {
        Self::new(TradingLimits::default())
    }
}

impl OrderValidator {
    pub fn new(limits: TradingLimits) -> Self {
        let tick_size = Price::tick_from_precision(limits.price_precision);
        let lot_size = Size::lot_from_precision(limits.quantity_precision);
        Self {
            limits,
            tick_size,
            lot_size,
        }
    }

    pub fn limits(&self) -> &TradingLimits {
        &self.limits
    }

    /// Validate a single order against the current limits.
    pub fn validate_order(
        &self,
        price: Price,
        quantity: Size,
        side: OrderSide,
        mid: Price,
    ) -> ValidationResult {
        if !quantity.is_positive() {
            return Err(ValidationReject::new(format!(
                "Quantity {quantity} is not positive"
            ))
            .with_quantity(self.limits.min_qty));
        }

        if price < self.limits.min_price || price > self.limits.max_price {
            let suggested = if price < self.limits.min_price {
                self.limits.min_price
            } else {
                self.limits.max_price
            };
            return Err(ValidationReject::new(format!(
                "Price {price} is outside valid range [{}, {}]",
                self.limits.min_price, self.limits.max_price
            ))
            .with_price(suggested));
        }

        if quantity < self.limits.min_qty || quantity > self.limits.max_qty {
            let suggested = if quantity < self.limits.min_qty {
                self.limits.min_qty
            } else {
                self.limits.max_qty
            };
            return Err(ValidationReject::new(format!(
                "Quantity {quantity} is outside valid range [{}, {}]",
                self.limits.min_qty, self.limits.max_qty
            ))
            .with_quantity(suggested));
        }

        let notional = quantity.notional(price);
        if notional < self.limits.min_notional || notional > self.limits.max_notional {
            let suggested = if notional < self.limits.min_notional {
                Size::new(self.limits.min_notional / price.inner())
            } else {
                Size::new(self.limits.max_notional / price.inner())
            };
            return Err(ValidationReject::new(format!(
                "Notional {notional} is outside valid range [{}, {}]",
                self.limits.min_notional, self.limits.max_notional
            ))
            .with_quantity(suggested.round_to_lot(self.lot_size)));
        }

        if !price.is_tick_aligned(self.tick_size) {
            return Err(
                ValidationReject::new(format!("Price {price} is not tick-aligned"))
                    .with_price(price.round_to_tick(self.tick_size)),
            );
        }

        if !quantity.is_lot_aligned(self.lot_size) {
            return Err(
                ValidationReject::new(format!("Quantity {quantity} is not lot-aligned"))
                    .with_quantity(quantity.round_to_lot(self.lot_size)),
            );
        }

        if mid.is_positive() {
            let deviation = (price.inner() - mid.inner()).abs() / mid.inner();
            if deviation > MAX_DEVIATION {
                let suggested = match side {
                    OrderSide::Buy => Price::new(mid.inner() * (Decimal::ONE - MAX_DEVIATION)),
                    OrderSide::Sell => Price::new(mid.inner() * (Decimal::ONE + MAX_DEVIATION)),
                };
                return Err(ValidationReject::new(format!(
                    "Price {price} deviates more than 10% from mid {mid}"
                ))
                .with_price(suggested.round_to_tick(self.tick_size)));
            }
        }

        Ok(())
    }

    /// Validate a full bid/ask pair.
    pub fn validate_quote(
        &self,
        bid_price: Price,
        ask_price: Price,
        quantity: Size,
        mid: Price,
    ) -> ValidationResult {
        self.validate_order(bid_price, quantity, OrderSide::Buy, mid)?;
        self.validate_order(ask_price, quantity, OrderSide::Sell, mid)?;

        if bid_price >= ask_price {
            return Err(ValidationReject::new(format!(
                "Quotes are crossed: bid {bid_price} >= ask {ask_price}"
            )));
        }

        if mid.is_positive() {
            let spread = (ask_price.inner() - bid_price.inner()) / mid.inner();
            if spread < self.limits.min_spread || spread > self.limits.max_spread {
                // Suggest a bid that would sit at a 2% total spread.
                let target = dec!(0.02);
                let suggested =
                    Price::new(mid.inner() * (Decimal::ONE - target / Decimal::TWO));
                return Err(ValidationReject::new(format!(
                    "Spread {spread} is outside valid range [{}, {}]",
                    self.limits.min_spread, self.limits.max_spread
                ))
                .with_price(suggested.round_to_tick(self.tick_size))
                .with_quantity(quantity));
            }
        }

        Ok(())
    }

    /// Tighten limits from a fresh book.
    ///
    /// The spread band follows the observed top-of-book spread and the
    /// price bounds track the current mid.
    pub fn update_limits(&mut self, book: &OrderBook) {
        let Some(mid) = book.mid_price() else {
            return;
        };
        let Some(observed) = book.observed_spread() else {
            return;
        };

        if observed > Decimal::ZERO {
            self.limits.min_spread = dec!(0.0001).max(observed * dec!(0.5));
            self.limits.max_spread = dec!(0.10).min(observed * dec!(5));
        }

        self.limits.min_price = Price::new(mid.inner() * dec!(0.5));
        self.limits.max_price = Price::new(mid.inner() * dec!(2));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaser_core::PriceLevel;

    fn validator() -> OrderValidator {
        OrderValidator::default()
    }

    fn price(d: Decimal) -> Price {
        Price::new(d)
    }

    fn size(d: Decimal) -> Size {
        Size::new(d)
    }

    #[test]
    fn test_valid_pair_passes_without_suggestion() {
        let v = validator();
        let result = v.validate_quote(
            price(dec!(98.20)),
            price(dec!(102.20)),
            size(dec!(0.5)),
            price(dec!(100.20)),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_price_out_of_range_suggests_bound() {
        let v = validator();
        let err = v
            .validate_order(
                price(dec!(0.001)),
                size(dec!(100000)),
                OrderSide::Buy,
                Price::ZERO,
            )
            .unwrap_err();
        assert_eq!(err.suggested_price.unwrap(), v.limits().min_price);
    }

    #[test]
    fn test_notional_too_small_suggests_quantity() {
        let v = validator();
        // 100 * 0.01 = 1 < min_notional 10
        let err = v
            .validate_order(price(dec!(100)), size(dec!(0.01)), OrderSide::Buy, Price::ZERO)
            .unwrap_err();
        let suggested = err.suggested_quantity.unwrap();
        // Suggested quantity restores the minimum notional.
        assert!(suggested.notional(price(dec!(100))) >= dec!(10));
    }

    #[test]
    fn test_misaligned_price_suggests_tick_rounding() {
        let v = validator();
        let err = v
            .validate_order(
                price(dec!(98.196)),
                size(dec!(0.5)),
                OrderSide::Buy,
                price(dec!(100)),
            )
            .unwrap_err();
        assert_eq!(err.suggested_price.unwrap().inner(), dec!(98.20));
    }

    #[test]
    fn test_deviation_beyond_ten_percent_rejected() {
        let v = validator();
        let mid = price(dec!(100));
        let err = v
            .validate_order(price(dec!(85)), size(dec!(0.5)), OrderSide::Buy, mid)
            .unwrap_err();
        // Suggested bid is mid * 0.90.
        assert_eq!(err.suggested_price.unwrap().inner(), dec!(90.00));

        let err = v
            .validate_order(price(dec!(115)), size(dec!(0.5)), OrderSide::Sell, mid)
            .unwrap_err();
        assert_eq!(err.suggested_price.unwrap().inner(), dec!(110.00));
    }

    #[test]
    fn test_crossed_pair_rejected() {
        let v = validator();
        let err = v
            .validate_quote(
                price(dec!(101.00)),
                price(dec!(100.00)),
                size(dec!(0.5)),
                price(dec!(100.50)),
            )
            .unwrap_err();
        assert!(err.reason.contains("crossed"));
    }

    #[test]
    fn test_spread_outside_band_rejected() {
        let v = validator();
        // Spread of 0.02% is below the default 0.1% minimum.
        let err = v
            .validate_quote(
                price(dec!(99.99)),
                price(dec!(100.01)),
                size(dec!(1)),
                price(dec!(100.00)),
            )
            .unwrap_err();
        assert!(err.reason.contains("Spread"));
        assert!(err.suggested_price.is_some());
    }

    #[test]
    fn test_update_limits_tracks_observed_book() {
        let mut v = validator();
        let book = OrderBook::new(
            vec![PriceLevel::new(price(dec!(100.00)), size(dec!(1)))],
            vec![PriceLevel::new(price(dec!(100.40)), size(dec!(1)))],
        );
        v.update_limits(&book);

        let limits = v.limits();
        // observed spread = 0.4 / 100.2
        let observed = dec!(0.4) / dec!(100.2);
        assert_eq!(limits.min_spread, observed * dec!(0.5));
        assert_eq!(limits.max_spread, observed * dec!(5));
        assert_eq!(limits.min_price.inner(), dec!(100.2) * dec!(0.5));
        assert_eq!(limits.max_price.inner(), dec!(100.2) * dec!(2));
    }

    #[test]
    fn test_update_limits_ignores_empty_book() {
        let mut v = validator();
        let before = v.limits().clone();
        let book = OrderBook::new(vec![], vec![]);
        v.update_limits(&book);
        assert_eq!(v.limits().min_spread, before.min_spread);
        assert_eq!(v.limits().max_price, before.max_price);
    }
}
