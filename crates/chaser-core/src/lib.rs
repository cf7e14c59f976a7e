//! Core data model for the quote-maintenance bot.
//!
//! Decimal price/size types, order and book structures, and the shared
//! error type. Everything here is transport-agnostic.

pub mod book;
pub mod decimal;
pub mod error;
pub mod order;

pub use book::{OrderBook, PriceLevel};
pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use order::{Order, OrderSide, OrderState, TimeInForce};

/// Connection lifecycle states shared by both channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closing,
    Reconnecting,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Open => write!(f, "OPEN"),
            Self::Closing => write!(f, "CLOSING"),
            Self::Reconnecting => write!(f, "RECONNECTING"),
        }
    }
}
