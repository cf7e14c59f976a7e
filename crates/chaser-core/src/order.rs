//! Order types shared across the trading stack.

use crate::{Price, Size};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Order side: buy (bid) or sell (ask).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Returns the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Wire representation used in request params.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }

    /// Short tag used in client order ids.
    pub fn slot_tag(&self) -> &'static str {
        match self {
            Self::Buy => "BID",
            Self::Sell => "ASK",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_wire())
    }
}

/// Order lifecycle state as reported by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
}

impl OrderState {
    /// Parse the exchange's status string; unknown statuses map to Rejected.
    pub fn from_wire(s: &str) -> Self {
        match s {
            "NEW" => Self::New,
            "PARTIALLY_FILLED" => Self::PartiallyFilled,
            "FILLED" => Self::Filled,
            "CANCELED" => Self::Canceled,
            "EXPIRED" => Self::Expired,
            _ => Self::Rejected,
        }
    }

    /// Whether the order can still rest on the book.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::New | Self::PartiallyFilled)
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::New => "NEW",
            Self::PartiallyFilled => "PARTIALLY_FILLED",
            Self::Filled => "FILLED",
            Self::Canceled => "CANCELED",
            Self::Rejected => "REJECTED",
            Self::Expired => "EXPIRED",
        };
        write!(f, "{s}")
    }
}

/// Time-in-force for resting limit orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good-til-cancelled (the only TIF this bot uses).
    #[default]
    #[serde(rename = "GTC")]
    GoodTilCancelled,
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GTC")
    }
}

/// A resting order as tracked locally.
///
/// Created from a successful place response, mutated only by the quote
/// engine, dropped when superseded by a rotation or on shutdown.
#[derive(Debug, Clone)]
pub struct Order {
    /// Exchange-assigned order id.
    pub order_id: String,
    /// Client order id sent with the placement.
    pub client_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub price: Price,
    pub size: Size,
    pub filled_size: Size,
    pub state: OrderState,
    pub created_at: Instant,
    pub updated_at: Instant,
}

impl Order {
    pub fn new(
        order_id: String,
        client_order_id: String,
        symbol: String,
        side: OrderSide,
        price: Price,
        size: Size,
    ) -> Self {
        let now = Instant::now();
        Self {
            order_id,
            client_order_id,
            symbol,
            side,
            price,
            size,
            filled_size: Size::ZERO,
            state: OrderState::New,
            created_at: now,
            updated_at: now,
        }
    }
}
