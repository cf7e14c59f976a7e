//! Supervisor: wires the exchange adapter to the quote engine and drives
//! the reactive decision loop.

pub mod app;
pub mod config;
pub mod error;

pub use app::MarketMakerBot;
pub use config::BotConfig;
pub use error::{AppError, AppResult};
