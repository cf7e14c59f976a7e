//! Per-symbol trading metadata.

use chaser_core::{Price, Size};
use rust_decimal::Decimal;

/// Exchange rules for one symbol, derived once at startup.
#[derive(Debug, Clone)]
pub struct SymbolMeta {
    pub price_precision: u32,
    pub quantity_precision: u32,
    pub tick_size: Price,
    pub lot_size: Size,
    pub min_qty: Size,
    pub max_qty: Size,
}

impl SymbolMeta {
    /// Derive metadata from configured precisions.
    pub fn from_precisions(price_precision: u32, quantity_precision: u32) -> Self {
        Self {
            price_precision,
            quantity_precision,
            tick_size: Price::tick_from_precision(price_precision),
            lot_size: Size::lot_from_precision(quantity_precision),
            min_qty: Size::lot_from_precision(quantity_precision),
            max_qty: Size::new(Decimal::from(10_000)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_from_precisions() {
        let meta = SymbolMeta::from_precisions(2, 5);
        assert_eq!(meta.tick_size.inner(), dec!(0.01));
        assert_eq!(meta.lot_size.inner(), dec!(0.00001));
        assert_eq!(meta.min_qty, meta.lot_size);
    }
}
