//! Symbol string normalization.
//!
//! The engine works with a neutral symbol form; the exchange wants
//! `BTCUSDT` on the trading channel and `btcusdt` in stream URLs.

/// Neutral form to wire form: separators stripped, upper-cased.
///
/// `btc/usdt`, `BTC-USDT`, and `btcusdt` all become `BTCUSDT`.
pub fn wire_symbol(symbol: &str) -> String {
    symbol
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}

/// Stream-URL form: wire form, lower-cased.
pub fn stream_symbol(symbol: &str) -> String {
    wire_symbol(symbol).to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_symbol_strips_separators() {
        assert_eq!(wire_symbol("BTC/USDT"), "BTCUSDT");
        assert_eq!(wire_symbol("btc-usdt"), "BTCUSDT");
        assert_eq!(wire_symbol("BTC_USDT"), "BTCUSDT");
        assert_eq!(wire_symbol("BTCUSDT"), "BTCUSDT");
    }

    #[test]
    fn test_stream_symbol_is_lowercase() {
        assert_eq!(stream_symbol("BTC/USDT"), "btcusdt");
        assert_eq!(stream_symbol("SEIUSDT"), "seiusdt");
    }
}
