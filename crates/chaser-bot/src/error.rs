//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Initialization error: {0}")]
    Init(String),

    #[error("Exchange error: {0}")]
    Exchange(#[from] chaser_exchange::ExchangeError),

    #[error("Engine error: {0}")]
    Engine(#[from] chaser_engine::EngineError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] chaser_telemetry::TelemetryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
