//! Market-data client: depth stream subscription and decoding.
//!
//! Owns one WebSocket connection per symbol stream, decodes each depth
//! payload into an [`chaser_core::OrderBook`], and delivers snapshots to
//! the registered handler in receive order on a single worker task.

pub mod client;
pub mod error;
pub mod parser;

pub use client::{BookHandler, FeedConfig, MarketDataClient};
pub use error::{FeedError, FeedResult};
pub use parser::{parse_depth_message, stream_url};
