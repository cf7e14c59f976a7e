//! Error types for chaser-telemetry.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Log file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging init error: {0}")]
    Init(String),
}

pub type TelemetryResult<T> = Result<T, TelemetryError>;
