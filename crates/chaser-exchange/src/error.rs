//! Exchange adapter error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("Unsupported exchange: {name} (supported: {supported})")]
    UnsupportedExchange { name: String, supported: String },

    #[error("Not connected")]
    NotConnected,

    #[error("Already subscribed to a book stream")]
    AlreadySubscribed,

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Feed error: {0}")]
    Feed(#[from] chaser_feed::FeedError),

    #[error("Trading error: {0}")]
    Trading(#[from] chaser_trading::TradingError),
}

pub type ExchangeResult<T> = Result<T, ExchangeError>;
