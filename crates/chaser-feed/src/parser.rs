//! Depth payload decoding.
//!
//! Accepts both raw partial-depth payloads and combined-stream envelopes:
//!
//! ```json
//! {"lastUpdateId": 160, "bids": [["100.00", "1.2"]], "asks": [["100.40", "0.8"]]}
//! {"stream": "btcusdt@depth20@100ms", "data": { ... }}
//! ```
//!
//! Payloads without both sides (subscription acks, pings, unrelated
//! events) are ignored rather than treated as errors.

use crate::error::FeedResult;
use chaser_core::{OrderBook, Price, PriceLevel, Size};
use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct DepthPayload {
    #[serde(default, rename = "lastUpdateId")]
    #[allow(dead_code)]
    last_update_id: Option<u64>,
    bids: Vec<(Decimal, Decimal)>,
    asks: Vec<(Decimal, Decimal)>,
}

/// Build the stream URL for a partial depth subscription.
///
/// Shape: `<ws-base>/<symbol-lower>@depth<N>@100ms`.
pub fn stream_url(ws_base: &str, symbol: &str, depth: u32) -> String {
    format!(
        "{}/{}@depth{}@100ms",
        ws_base.trim_end_matches('/'),
        symbol.to_lowercase(),
        depth
    )
}

/// Decode one inbound text payload into a book snapshot.
///
/// Returns `Ok(None)` for payloads that are not depth updates. The
/// returned book is stamped with the decode-time monotonic clock.
pub fn parse_depth_message(text: &str) -> FeedResult<Option<OrderBook>> {
    let value: serde_json::Value = serde_json::from_str(text)?;

    // Combined-stream envelopes wrap the payload under "data".
    let payload = match value.get("data") {
        Some(data) => data,
        None => &value,
    };

    if payload.get("bids").is_none() || payload.get("asks").is_none() {
        return Ok(None);
    }

    let depth: DepthPayload = serde_json::from_value(payload.clone())?;

    let to_levels = |raw: Vec<(Decimal, Decimal)>| {
        raw.into_iter()
            .map(|(price, size)| PriceLevel::new(Price::new(price), Size::new(size)))
            .collect()
    };

    Ok(Some(OrderBook::new(
        to_levels(depth.bids),
        to_levels(depth.asks),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_stream_url_shape() {
        assert_eq!(
            stream_url("wss://stream.binance.com:9443/ws", "BTCUSDT", 20),
            "wss://stream.binance.com:9443/ws/btcusdt@depth20@100ms"
        );
    }

    #[test]
    fn test_parse_raw_depth() {
        let text = r#"{"lastUpdateId":160,"bids":[["100.00","1"],["99.90","2"]],"asks":[["100.40","1"]]}"#;
        let book = parse_depth_message(text).unwrap().unwrap();

        assert_eq!(book.bids.len(), 2);
        assert_eq!(book.asks.len(), 1);
        assert_eq!(book.best_bid().unwrap().inner(), dec!(100.00));
        assert_eq!(book.best_ask().unwrap().inner(), dec!(100.40));
        assert_eq!(book.mid_price().unwrap().inner(), dec!(100.20));
    }

    #[test]
    fn test_parse_combined_stream_envelope() {
        let text = r#"{"stream":"btcusdt@depth20@100ms","data":{"bids":[["50000","0.5"]],"asks":[["50010","0.5"]]}}"#;
        let book = parse_depth_message(text).unwrap().unwrap();
        assert_eq!(book.best_bid().unwrap().inner(), dec!(50000));
    }

    #[test]
    fn test_non_depth_payload_ignored() {
        assert!(parse_depth_message(r#"{"result":null,"id":1}"#)
            .unwrap()
            .is_none());
        assert!(parse_depth_message(r#"{"e":"trade","p":"100"}"#)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_malformed_payload_is_error() {
        assert!(parse_depth_message("not json").is_err());
        assert!(parse_depth_message(r#"{"bids":"oops","asks":[]}"#).is_err());
    }
}
