//! Order book snapshot and mid-price derivation.

use crate::{Price, Size};
use rust_decimal::Decimal;
use std::time::Instant;

/// One price level of the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLevel {
    pub price: Price,
    pub size: Size,
}

impl PriceLevel {
    pub fn new(price: Price, size: Size) -> Self {
        Self { price, size }
    }
}

/// Decoded depth snapshot.
///
/// Bids are sorted descending, asks ascending; `received_at` is a monotonic
/// stamp taken when the frame arrived. A crossed book (best_bid >= best_ask)
/// yields no mid price and is never used for quote computation.
#[derive(Debug, Clone)]
pub struct OrderBook {
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub received_at: Instant,
}

impl OrderBook {
    pub fn new(bids: Vec<PriceLevel>, asks: Vec<PriceLevel>) -> Self {
        Self {
            bids,
            asks,
            received_at: Instant::now(),
        }
    }

    pub fn best_bid(&self) -> Option<Price> {
        self.bids.first().map(|l| l.price)
    }

    pub fn best_ask(&self) -> Option<Price> {
        self.asks.first().map(|l| l.price)
    }

    pub fn is_crossed(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => bid >= ask,
            _ => false,
        }
    }

    /// Mid price: (best_bid + best_ask) / 2.
    ///
    /// None when either side is empty or the book is crossed.
    pub fn mid_price(&self) -> Option<Price> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        if bid >= ask {
            return None;
        }
        Some(Price::new((bid.inner() + ask.inner()) / Decimal::TWO))
    }

    /// Top-of-book spread as a fraction of mid.
    pub fn observed_spread(&self) -> Option<Decimal> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        let mid = self.mid_price()?;
        Some((ask.inner() - bid.inner()) / mid.inner())
    }
}
