//! JSON frames exchanged with the market feed server.
//!
//! Outbound (client → server):
//!
//! ```text
//! {"action":"authenticate","api_key":"..."}
//! {"action":"subscribe","symbol":"RELIANCE","exchange":"NSE","mode":1,"depth":5}
//! {"action":"unsubscribe","symbol":"RELIANCE","exchange":"NSE","mode":1}
//! ```
//!
//! Inbound (server → client):
//!
//! ```text
//! {"type":"auth","status":"success"}
//! {"type":"market_data","exchange":"NSE","symbol":"RELIANCE","mode":1,"data":{...}}
//! ```

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::constants::DEPTH_HINT;
use crate::types::feed::{InstrumentKey, Mode};

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
enum OutboundFrame<'a> {
    Authenticate {
        api_key: &'a str,
    },
    Subscribe {
        symbol: &'a str,
        exchange: &'a str,
        mode: Mode,
        depth: u8,
    },
    Unsubscribe {
        symbol: &'a str,
        exchange: &'a str,
        mode: Mode,
    },
}

pub(crate) fn auth_frame(api_key: &str) -> serde_json::Result<String> {
    serde_json::to_string(&OutboundFrame::Authenticate { api_key })
}

pub(crate) fn subscribe_frame(key: &InstrumentKey, mode: Mode) -> serde_json::Result<String> {
    serde_json::to_string(&OutboundFrame::Subscribe {
        symbol: &key.symbol,
        exchange: &key.exchange,
        mode,
        depth: DEPTH_HINT,
    })
}

pub(crate) fn unsubscribe_frame(key: &InstrumentKey, mode: Mode) -> serde_json::Result<String> {
    serde_json::to_string(&OutboundFrame::Unsubscribe {
        symbol: &key.symbol,
        exchange: &key.exchange,
        mode,
    })
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// A server frame, classified by its `type` field.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum InboundFrame {
    Auth {
        #[serde(default)]
        status: Option<String>,
    },
    MarketData {
        #[serde(default)]
        exchange: String,
        #[serde(default)]
        symbol: String,
        #[serde(default, deserialize_with = "mode_code")]
        mode: i64,
        #[serde(default)]
        data: Value,
    },
    #[serde(other)]
    Unknown,
}

impl InboundFrame {
    pub(crate) fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Integral mode code from an integer, a whole float (`1.0`) or a numeric
/// string. Anything else reads as `0`, which no mode uses.
fn mode_code<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let whole = |f: f64| (f.fract() == 0.0).then_some(f as i64);
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(whole)),
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(whole),
        _ => None,
    }
    .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn as_json(frame: serde_json::Result<String>) -> Value {
        serde_json::from_str(&frame.unwrap()).unwrap()
    }

    #[test]
    fn outbound_frames_match_wire_format() {
        let key = InstrumentKey::new("NSE", "RELIANCE");

        assert_eq!(
            as_json(auth_frame("secret")),
            json!({"action": "authenticate", "api_key": "secret"})
        );
        assert_eq!(
            as_json(subscribe_frame(&key, Mode::Depth)),
            json!({"action": "subscribe", "symbol": "RELIANCE", "exchange": "NSE", "mode": 3, "depth": 5})
        );
        assert_eq!(
            as_json(unsubscribe_frame(&key, Mode::Ltp)),
            json!({"action": "unsubscribe", "symbol": "RELIANCE", "exchange": "NSE", "mode": 1})
        );
    }

    #[test]
    fn classifies_inbound_frames() {
        let auth = InboundFrame::parse(r#"{"type":"auth","status":"success"}"#).unwrap();
        assert!(matches!(auth, InboundFrame::Auth { status: Some(s) } if s == "success"));

        let data = InboundFrame::parse(
            r#"{"type":"market_data","exchange":"NSE","symbol":"SBIN","mode":2,"data":{"ltp":1.5}}"#,
        )
        .unwrap();
        let InboundFrame::MarketData { exchange, symbol, mode, data } = data else {
            panic!("expected market data");
        };
        assert_eq!((exchange.as_str(), symbol.as_str(), mode), ("NSE", "SBIN", 2));
        assert_eq!(data, json!({"ltp": 1.5}));

        let other = InboundFrame::parse(r#"{"type":"heartbeat","seq":7}"#).unwrap();
        assert!(matches!(other, InboundFrame::Unknown));
    }

    #[test]
    fn market_data_fields_default_when_missing() {
        let frame = InboundFrame::parse(r#"{"type":"market_data"}"#).unwrap();
        let InboundFrame::MarketData { exchange, symbol, mode, data } = frame else {
            panic!("expected market data");
        };
        assert!(exchange.is_empty() && symbol.is_empty());
        assert_eq!(mode, 0);
        assert_eq!(data, Value::Null);
    }

    #[test]
    fn mode_accepts_whole_floats_and_numeric_strings() {
        let mode_of = |raw: &str| {
            let text = format!(r#"{{"type":"market_data","mode":{raw}}}"#);
            match InboundFrame::parse(&text).unwrap() {
                InboundFrame::MarketData { mode, .. } => mode,
                other => panic!("expected market data, got {other:?}"),
            }
        };
        assert_eq!(mode_of("1"), 1);
        assert_eq!(mode_of("3.0"), 3);
        assert_eq!(mode_of(r#""2""#), 2);
        assert_eq!(mode_of("1.5"), 0);
        assert_eq!(mode_of("null"), 0);
        assert_eq!(mode_of(r#""ltp""#), 0);
    }

    #[test]
    fn malformed_frames_fail_to_parse() {
        assert!(InboundFrame::parse("not json").is_err());
        assert!(InboundFrame::parse(r#"{"status":"success"}"#).is_err());
        assert!(InboundFrame::parse(r#"[1,2,3]"#).is_err());
    }
}
