//! Bot configuration.
//!
//! Loaded from a TOML file; unknown keys are ignored. A handful of
//! environment variables override the file with highest priority.

use crate::error::{AppError, AppResult};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Exchange registry key.
    pub exchange: String,
    /// Use sandbox endpoints.
    pub testnet: bool,
    /// Trading pair, neutral form.
    pub symbol: String,
    /// Quantity per side, base currency.
    pub order_size: Decimal,
    /// Half-spread from mid; must be > 0 and <= 0.1.
    pub spread_percentage: Decimal,
    pub price_precision: u32,
    pub quantity_precision: u32,
    /// Minimum gap between rotations.
    pub order_update_cooldown_ms: u64,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub max_orders_per_second: usize,
    pub max_requests_per_second: usize,
    /// Trade over the duplex channel (the REST fallback is not wired).
    pub use_websocket_trading: bool,
    pub api_key: String,
    pub api_secret: String,
    pub log_file: Option<String>,
    pub verbose: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            exchange: "binance".to_string(),
            testnet: false,
            symbol: "BTCUSDT".to_string(),
            order_size: dec!(0.001),
            spread_percentage: dec!(0.02),
            price_precision: 2,
            quantity_precision: 5,
            order_update_cooldown_ms: 100,
            reconnect_delay_ms: 5_000,
            max_reconnect_attempts: 10,
            max_orders_per_second: 10,
            max_requests_per_second: 20,
            use_websocket_trading: true,
            api_key: String::new(),
            api_secret: String::new(),
            log_file: Some("logs/chaser.log".to_string()),
            verbose: false,
        }
    }
}

impl BotConfig {
    /// Load from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Cannot read config file {path}: {e}")))?;
        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Cannot parse config file {path}: {e}")))
    }

    /// Apply environment overrides; these beat the file.
    pub fn apply_env_overrides(&mut self) -> AppResult<()> {
        if let Ok(key) = std::env::var("API_KEY") {
            self.api_key = key;
        }
        if let Ok(secret) = std::env::var("API_SECRET") {
            self.api_secret = secret;
        }
        if let Ok(symbol) = std::env::var("SYMBOL") {
            self.symbol = symbol;
        }
        if let Ok(size) = std::env::var("ORDER_SIZE") {
            self.order_size = size
                .parse()
                .map_err(|_| AppError::Config(format!("Invalid ORDER_SIZE: {size}")))?;
        }
        if let Ok(spread) = std::env::var("SPREAD_PERCENTAGE") {
            self.spread_percentage = spread
                .parse()
                .map_err(|_| AppError::Config(format!("Invalid SPREAD_PERCENTAGE: {spread}")))?;
        }
        if let Ok(log_file) = std::env::var("LOG_FILE") {
            self.log_file = Some(log_file);
        }
        if let Ok(verbose) = std::env::var("VERBOSE") {
            self.verbose = !matches!(verbose.as_str(), "false" | "0");
        }
        Ok(())
    }

    /// Reject configurations the bot must not start with.
    pub fn validate(&self) -> AppResult<()> {
        if self.symbol.is_empty() {
            return Err(AppError::Config("Trading symbol is not set".to_string()));
        }
        if self.api_key.is_empty() || self.api_secret.is_empty() {
            return Err(AppError::Config("API credentials are not set".to_string()));
        }
        if self.order_size <= Decimal::ZERO {
            return Err(AppError::Config(format!(
                "Invalid order size: {}",
                self.order_size
            )));
        }
        if self.spread_percentage <= Decimal::ZERO || self.spread_percentage > dec!(0.1) {
            return Err(AppError::Config(format!(
                "Invalid spread percentage {} (must be > 0 and <= 0.1)",
                self.spread_percentage
            )));
        }
        if self.max_orders_per_second == 0 {
            return Err(AppError::Config(
                "max_orders_per_second must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid_config() -> BotConfig {
        BotConfig {
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            ..BotConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = BotConfig::default();
        assert_eq!(config.exchange, "binance");
        assert_eq!(config.order_update_cooldown_ms, 100);
        assert_eq!(config.reconnect_delay_ms, 5_000);
        assert_eq!(config.max_reconnect_attempts, 10);
        assert_eq!(config.spread_percentage, dec!(0.02));
    }

    #[test]
    fn test_validate_accepts_good_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_credentials() {
        let config = BotConfig::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_spread() {
        let mut config = valid_config();
        config.spread_percentage = dec!(0);
        assert!(config.validate().is_err());

        config.spread_percentage = dec!(0.2);
        assert!(config.validate().is_err());

        config.spread_percentage = dec!(0.1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_order_size() {
        let mut config = valid_config();
        config.order_size = dec!(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_parses_and_ignores_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
symbol = "SEIUSDT"
order_size = "0.5"
spread_percentage = "0.01"
testnet = true
some_future_option = 42
"#
        )
        .unwrap();

        let config = BotConfig::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.symbol, "SEIUSDT");
        assert_eq!(config.order_size, dec!(0.5));
        assert_eq!(config.spread_percentage, dec!(0.01));
        assert!(config.testnet);
        // Unspecified keys fall back to defaults.
        assert_eq!(config.max_orders_per_second, 10);
    }

    #[test]
    fn test_from_file_missing_is_config_error() {
        let err = BotConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
