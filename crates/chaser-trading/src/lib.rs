//! Trading client: signed request/response over a persistent duplex channel.
//!
//! Every outbound request carries a unique id; the reader task correlates
//! responses back to their waiting callers and fulfills each completion
//! slot exactly once. Transport concerns (reconnection, heartbeats) live
//! in `chaser-ws`; this crate only sees text payloads.

pub mod client;
pub mod error;
pub mod messages;
pub mod metrics;
pub mod pending;
pub mod signer;

pub use client::{TradingClient, TradingConfig};
pub use error::{TradingError, TradingResult};
pub use messages::{ApiError, WsApiRequest, WsApiResponse};
pub use metrics::{TradingMetrics, TradingMetricsSnapshot};
pub use pending::{ClosedReason, PendingRequests};
pub use signer::{ApiCredentials, RequestSigner};
