//! Wire frames for the duplex trading channel.
//!
//! Requests are `{id, method, params}`, responses `{id, status?, result?,
//! error?}`. Params carry the signed query fields; results are kept as raw
//! JSON and picked apart by the operation wrappers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Methods understood by the trading endpoint.
pub mod method {
    pub const PLACE: &str = "order.place";
    pub const CANCEL: &str = "order.cancel";
    pub const CANCEL_ALL: &str = "openOrders.cancelAll";
    pub const QUERY: &str = "order.status";
    pub const OPEN_ORDERS: &str = "openOrders.status";
}

/// Outbound request frame.
#[derive(Debug, Clone, Serialize)]
pub struct WsApiRequest {
    pub id: String,
    pub method: String,
    pub params: Map<String, Value>,
}

/// Error payload carried in failed responses.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ApiError {
    pub code: i64,
    pub msg: String,
}

/// Inbound response frame.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WsApiResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

impl WsApiResponse {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// String field lookup on the result object.
    pub fn result_str(&self, field: &str) -> Option<&str> {
        self.result.as_ref()?.get(field)?.as_str()
    }

    /// Field lookup on the result object, rendered as a string
    /// (exchange ids arrive as either numbers or strings).
    pub fn result_field_string(&self, field: &str) -> Option<String> {
        let value = self.result.as_ref()?.get(field)?;
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_place_response() {
        let text = r#"{"id":"req_1","status":200,"result":{"orderId":12345,"status":"NEW","side":"BUY"}}"#;
        let resp: WsApiResponse = serde_json::from_str(text).unwrap();

        assert!(resp.is_success());
        assert_eq!(resp.id.as_deref(), Some("req_1"));
        assert_eq!(resp.result_field_string("orderId").unwrap(), "12345");
        assert_eq!(resp.result_str("status"), Some("NEW"));
    }

    #[test]
    fn test_parse_error_response() {
        let text = r#"{"id":"req_2","status":400,"error":{"code":-2010,"msg":"Account has insufficient balance"}}"#;
        let resp: WsApiResponse = serde_json::from_str(text).unwrap();

        assert!(!resp.is_success());
        let err = resp.error.unwrap();
        assert_eq!(err.code, -2010);
        assert!(err.msg.contains("insufficient"));
    }

    #[test]
    fn test_request_serializes_params() {
        let mut params = Map::new();
        params.insert("symbol".into(), Value::String("BTCUSDT".into()));
        let req = WsApiRequest {
            id: "req_7".into(),
            method: method::PLACE.into(),
            params,
        };
        let text = serde_json::to_string(&req).unwrap();
        assert!(text.contains(r#""method":"order.place""#));
        assert!(text.contains(r#""id":"req_7""#));
    }
}
