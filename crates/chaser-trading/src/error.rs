//! Trading client error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TradingError {
    #[error("Not connected")]
    NotConnected,

    #[error("Client already started")]
    AlreadyStarted,

    #[error("Client is shutting down")]
    ShuttingDown,

    #[error("Request timeout for method {method}")]
    Timeout { method: String },

    #[error("Connection closed while waiting for response")]
    ConnectionClosed,

    #[error("Exchange rejected request: code={code}, msg={msg}")]
    Rejected { code: i64, msg: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Invalid order id: {0}")]
    InvalidOrderId(String),

    #[error("WebSocket error: {0}")]
    Ws(#[from] chaser_ws::WsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type TradingResult<T> = Result<T, TradingError>;
