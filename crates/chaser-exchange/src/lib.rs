//! Exchange adapter: one capability surface over the two channels.
//!
//! Unifies the market-data client and the trading client, caches
//! per-symbol metadata and the most recent decoded book, and normalizes
//! symbol strings between the engine's neutral form and the wire form.
//! Concrete exchanges are selected through a small registry keyed on the
//! case-folded exchange name.

pub mod binance;
pub mod error;
pub mod factory;
pub mod metadata;
pub mod symbol;

pub use binance::{BinanceExchange, ChannelKind, ExchangeConfig, ExchangeEvent, TopOfBook};
pub use error::{ExchangeError, ExchangeResult};
pub use factory::{create, is_supported, supported_exchanges, ExchangeClient};
pub use metadata::SymbolMeta;
pub use symbol::{stream_symbol, wire_symbol};
