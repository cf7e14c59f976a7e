//! Exchange registry and factory.
//!
//! Concrete adapters are tagged variants behind one capability surface;
//! the factory selects by case-folded exchange name.

use crate::binance::{
    BinanceExchange, ExchangeConfig, ExchangeEvent, TopOfBook,
};
use crate::error::{ExchangeError, ExchangeResult};
use crate::metadata::SymbolMeta;
use chaser_core::{Order, OrderBook, OrderSide, OrderState, Price, Size};
use chaser_feed::BookHandler;
use chaser_trading::TradingMetricsSnapshot;
use tokio::sync::mpsc;

const SUPPORTED: &[&str] = &["binance"];

/// Names the factory recognizes.
pub fn supported_exchanges() -> Vec<&'static str> {
    SUPPORTED.to_vec()
}

pub fn is_supported(name: &str) -> bool {
    SUPPORTED.contains(&name.to_lowercase().as_str())
}

/// Build the adapter selected by `config.exchange`.
pub fn create(
    config: ExchangeConfig,
) -> ExchangeResult<(ExchangeClient, mpsc::Receiver<ExchangeEvent>)> {
    match config.exchange.to_lowercase().as_str() {
        "binance" => {
            let (adapter, events) = BinanceExchange::new(config);
            Ok((ExchangeClient::Binance(adapter), events))
        }
        other => Err(ExchangeError::UnsupportedExchange {
            name: other.to_string(),
            supported: SUPPORTED.join(", "),
        }),
    }
}

/// Capability surface consumed by the engine and supervisor.
pub enum ExchangeClient {
    Binance(BinanceExchange),
}

impl ExchangeClient {
    pub fn name(&self) -> &str {
        match self {
            Self::Binance(ex) => ex.name(),
        }
    }

    pub async fn connect(&self) -> ExchangeResult<()> {
        match self {
            Self::Binance(ex) => ex.connect().await,
        }
    }

    pub fn disconnect(&self) {
        match self {
            Self::Binance(ex) => ex.disconnect(),
        }
    }

    pub fn subscribe_orderbook(
        &self,
        symbol: &str,
        depth: u32,
        handler: BookHandler,
    ) -> ExchangeResult<()> {
        match self {
            Self::Binance(ex) => ex.subscribe_orderbook(symbol, depth, handler),
        }
    }

    pub fn top_of_book(&self) -> Option<TopOfBook> {
        match self {
            Self::Binance(ex) => ex.top_of_book(),
        }
    }

    pub fn latest_book(&self) -> Option<OrderBook> {
        match self {
            Self::Binance(ex) => ex.latest_book(),
        }
    }

    pub fn symbol_meta(&self, symbol: &str) -> Option<SymbolMeta> {
        match self {
            Self::Binance(ex) => ex.symbol_meta(symbol),
        }
    }

    pub async fn place_limit_order(
        &self,
        symbol: &str,
        side: OrderSide,
        price: Price,
        size: Size,
        client_order_id: &str,
    ) -> ExchangeResult<Order> {
        match self {
            Self::Binance(ex) => {
                ex.place_limit_order(symbol, side, price, size, client_order_id)
                    .await
            }
        }
    }

    pub async fn cancel_order(&self, symbol: &str, order_id: &str) -> ExchangeResult<()> {
        match self {
            Self::Binance(ex) => ex.cancel_order(symbol, order_id).await,
        }
    }

    pub async fn cancel_all_orders(&self, symbol: &str) -> ExchangeResult<()> {
        match self {
            Self::Binance(ex) => ex.cancel_all_orders(symbol).await,
        }
    }

    pub async fn query_order(&self, symbol: &str, order_id: &str) -> ExchangeResult<OrderState> {
        match self {
            Self::Binance(ex) => ex.query_order(symbol, order_id).await,
        }
    }

    pub async fn open_orders(&self, symbol: &str) -> ExchangeResult<Vec<Order>> {
        match self {
            Self::Binance(ex) => ex.open_orders(symbol).await,
        }
    }

    pub fn trading_connected(&self) -> bool {
        match self {
            Self::Binance(ex) => ex.trading_connected(),
        }
    }

    pub fn market_data_connected(&self) -> bool {
        match self {
            Self::Binance(ex) => ex.market_data_connected(),
        }
    }

    pub fn trading_metrics(&self) -> TradingMetricsSnapshot {
        match self {
            Self::Binance(ex) => ex.trading_metrics(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_names_case_folded() {
        assert!(is_supported("binance"));
        assert!(is_supported("Binance"));
        assert!(is_supported("BINANCE"));
        assert!(!is_supported("kraken"));
    }

    #[tokio::test]
    async fn test_factory_creates_binance() {
        let config = ExchangeConfig {
            exchange: "Binance".to_string(),
            ..ExchangeConfig::default()
        };
        let (client, _events) = create(config).unwrap();
        assert_eq!(client.name(), "binance");
    }

    #[tokio::test]
    async fn test_factory_rejects_unknown() {
        let config = ExchangeConfig {
            exchange: "mtgox".to_string(),
            ..ExchangeConfig::default()
        };
        let err = create(config).err().unwrap();
        match err {
            ExchangeError::UnsupportedExchange { name, supported } => {
                assert_eq!(name, "mtgox");
                assert!(supported.contains("binance"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
