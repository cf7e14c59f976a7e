//! Engine error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid mid price: {0}")]
    InvalidMid(String),

    #[error("Trading channel is down")]
    ConnectionDown,

    #[error("Gateway error: {0}")]
    Gateway(#[from] crate::gateway::GatewayError),
}

pub type EngineResult<T> = Result<T, EngineError>;
