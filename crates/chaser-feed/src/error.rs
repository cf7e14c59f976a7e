//! Feed error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Depth payload parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    Ws(#[from] chaser_ws::WsError),

    #[error("Feed already started")]
    AlreadyStarted,
}

pub type FeedResult<T> = Result<T, FeedError>;
