//! Market feed types: instruments, modes, cached records and callback events.
//!
//! Records decode leniently from the `data` object of a `market_data` frame:
//! a missing or `null` numeric field becomes `0`, integers sent as floats are
//! truncated, numbers sent as strings are parsed, and a missing depth payload
//! becomes an empty object. A non-numeric string or a field of any other JSON
//! type still fails the record.

use std::collections::HashMap;
use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Instrument identity
// ---------------------------------------------------------------------------

/// An instrument on the feed, identified by exchange and symbol.
///
/// Both parts are compared by exact, case-sensitive string match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstrumentKey {
    /// Exchange code (e.g. `"NSE"`, `"NFO"`).
    pub exchange: String,
    /// Trading symbol (e.g. `"RELIANCE"`).
    pub symbol: String,
}

impl InstrumentKey {
    /// Create a new instrument key.
    pub fn new(exchange: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            exchange: exchange.into(),
            symbol: symbol.into(),
        }
    }
}

impl fmt::Display for InstrumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.exchange, self.symbol)
    }
}

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Fidelity level of a subscription. The discriminant is the wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Mode {
    /// Last traded price only.
    Ltp = 1,
    /// OHLC, LTP and volume.
    Quote = 2,
    /// LTP plus order book depth.
    Depth = 3,
}

impl Mode {
    /// All modes, in wire-code order.
    pub const ALL: [Mode; 3] = [Mode::Ltp, Mode::Quote, Mode::Depth];

    /// Numeric code used in subscribe/unsubscribe and `market_data` frames.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Parse a wire code. Unknown codes yield `None`.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::Ltp),
            2 => Some(Self::Quote),
            3 => Some(Self::Depth),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ltp => "ltp",
            Self::Quote => "quote",
            Self::Depth => "depth",
        };
        f.write_str(name)
    }
}

impl Serialize for Mode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// An (instrument, mode) pair the server has been asked to stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    pub key: InstrumentKey,
    pub mode: Mode,
}

impl Subscription {
    /// Pair an instrument with a mode.
    pub fn new(key: InstrumentKey, mode: Mode) -> Self {
        Self { key, mode }
    }
}

/// Lifecycle of the feed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No socket. Initial state, and the state after `disconnect()` or a
    /// server-side close of a ready connection.
    #[default]
    Disconnected,
    /// Dialing the feed.
    Connecting,
    /// Socket open, auth frame sent, waiting for the result.
    Authenticating,
    /// Authenticated; subscribe/unsubscribe are accepted.
    Ready,
    /// The last connection attempt failed (timeout, rejection, dial error or
    /// a close before authentication).
    Failed,
}

// ---------------------------------------------------------------------------
// Cached records
// ---------------------------------------------------------------------------

/// Last traded price update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LtpRecord {
    /// Last traded price.
    #[serde(rename = "ltp", default, deserialize_with = "lenient_f64")]
    pub last_traded_price: f64,
    /// Exchange timestamp in epoch milliseconds.
    #[serde(rename = "timestamp", default, deserialize_with = "lenient_i64")]
    pub timestamp_ms: i64,
}

/// Quote update (OHLC + LTP + volume).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteRecord {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub open: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub high: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub low: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub close: f64,
    #[serde(rename = "ltp", default, deserialize_with = "lenient_f64")]
    pub last_traded_price: f64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub volume: i64,
    #[serde(rename = "timestamp", default, deserialize_with = "lenient_i64")]
    pub timestamp_ms: i64,
}

/// Depth update. The bid/ask levels are kept verbatim as sent by the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthRecord {
    #[serde(rename = "ltp", default, deserialize_with = "lenient_f64")]
    pub last_traded_price: f64,
    #[serde(rename = "timestamp", default, deserialize_with = "lenient_i64")]
    pub timestamp_ms: i64,
    /// Opaque depth payload; an empty object when the feed sent none.
    #[serde(rename = "depth", default = "empty_object", deserialize_with = "object_or_empty")]
    pub depth_levels: Value,
}

impl Default for DepthRecord {
    fn default() -> Self {
        Self {
            last_traded_price: 0.0,
            timestamp_ms: 0,
            depth_levels: empty_object(),
        }
    }
}

/// A decoded update of any mode.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeedRecord {
    Ltp(LtpRecord),
    Quote(QuoteRecord),
    Depth(DepthRecord),
}

impl FeedRecord {
    /// Decode the `data` object of a `market_data` frame into the record
    /// shape for `mode`. A `null` payload decodes like an empty object.
    pub fn decode(mode: Mode, data: Value) -> serde_json::Result<Self> {
        let data = match data {
            Value::Null => empty_object(),
            other => other,
        };
        Ok(match mode {
            Mode::Ltp => Self::Ltp(serde_json::from_value(data)?),
            Mode::Quote => Self::Quote(serde_json::from_value(data)?),
            Mode::Depth => Self::Depth(serde_json::from_value(data)?),
        })
    }

    /// The mode this record belongs to.
    pub fn mode(&self) -> Mode {
        match self {
            Self::Ltp(_) => Mode::Ltp,
            Self::Quote(_) => Mode::Quote,
            Self::Depth(_) => Mode::Depth,
        }
    }

    /// Last traded price, present in every mode.
    pub fn last_traded_price(&self) -> f64 {
        match self {
            Self::Ltp(r) => r.last_traded_price,
            Self::Quote(r) => r.last_traded_price,
            Self::Depth(r) => r.last_traded_price,
        }
    }
}

// ---------------------------------------------------------------------------
// Callback envelope
// ---------------------------------------------------------------------------

/// Kind tag of a [`FeedEvent`]; serialized as the envelope's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedEventKind {
    MarketData,
}

/// Event handed to a registered callback after each cached update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedEvent {
    #[serde(rename = "type")]
    pub kind: FeedEventKind,
    pub exchange: String,
    pub symbol: String,
    pub mode: Mode,
    pub data: FeedRecord,
}

impl FeedEvent {
    pub(crate) fn market_data(key: InstrumentKey, data: FeedRecord) -> Self {
        Self {
            kind: FeedEventKind::MarketData,
            exchange: key.exchange,
            symbol: key.symbol,
            mode: data.mode(),
            data,
        }
    }
}

/// Point-in-time copy of one mode's cache: exchange → symbol → record.
pub type Snapshot<R> = HashMap<String, HashMap<String, R>>;

// ---------------------------------------------------------------------------
// Lenient decoding helpers
// ---------------------------------------------------------------------------

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(n)) => Ok(n.as_f64().unwrap_or_default()),
        Some(Value::String(s)) => s.trim().parse().map_err(D::Error::custom),
        Some(other) => Err(D::Error::custom(format!("expected a number, got {other}"))),
    }
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => Ok(n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or_default()),
        Some(Value::String(s)) => {
            let s = s.trim();
            s.parse::<i64>()
                .or_else(|_| s.parse::<f64>().map(|f| f as i64))
                .map_err(D::Error::custom)
        }
        Some(other) => Err(D::Error::custom(format!("expected an integer, got {other}"))),
    }
}

fn object_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Value, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => empty_object(),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ltp_record_reads_wire_names() {
        let record = FeedRecord::decode(Mode::Ltp, json!({"ltp": 2500.5, "timestamp": 1700000000}))
            .unwrap();
        assert_eq!(
            record,
            FeedRecord::Ltp(LtpRecord {
                last_traded_price: 2500.5,
                timestamp_ms: 1_700_000_000,
            })
        );
    }

    #[test]
    fn missing_numeric_fields_default_to_zero() {
        let record = FeedRecord::decode(Mode::Quote, json!({"ltp": 10.0, "volume": null})).unwrap();
        let FeedRecord::Quote(quote) = record else {
            panic!("expected quote record");
        };
        assert_eq!(quote.last_traded_price, 10.0);
        assert_eq!(quote.open, 0.0);
        assert_eq!(quote.volume, 0);
        assert_eq!(quote.timestamp_ms, 0);
    }

    #[test]
    fn integer_fields_accept_floats() {
        let record = FeedRecord::decode(Mode::Quote, json!({"volume": 1200.0, "timestamp": 17.9})).unwrap();
        let FeedRecord::Quote(quote) = record else {
            panic!("expected quote record");
        };
        assert_eq!(quote.volume, 1200);
        assert_eq!(quote.timestamp_ms, 17);
    }

    #[test]
    fn depth_without_payload_is_empty_object() {
        let record = FeedRecord::decode(Mode::Depth, json!({"ltp": 99.5, "timestamp": 5})).unwrap();
        let FeedRecord::Depth(depth) = record else {
            panic!("expected depth record");
        };
        assert_eq!(depth.last_traded_price, 99.5);
        assert_eq!(depth.timestamp_ms, 5);
        assert_eq!(depth.depth_levels, json!({}));

        let FeedRecord::Depth(depth) =
            FeedRecord::decode(Mode::Depth, json!({"depth": null})).unwrap()
        else {
            panic!("expected depth record");
        };
        assert_eq!(depth.depth_levels, json!({}));
    }

    #[test]
    fn depth_payload_is_passed_through() {
        let levels = json!({"buy": [{"price": 100.0, "quantity": 10}], "sell": []});
        let record = FeedRecord::decode(Mode::Depth, json!({"depth": levels.clone()})).unwrap();
        let FeedRecord::Depth(depth) = record else {
            panic!("expected depth record");
        };
        assert_eq!(depth.depth_levels, levels);
    }

    #[test]
    fn null_payload_decodes_to_defaults() {
        let record = FeedRecord::decode(Mode::Ltp, Value::Null).unwrap();
        assert_eq!(record, FeedRecord::Ltp(LtpRecord::default()));
    }

    #[test]
    fn numeric_strings_are_parsed() {
        let record =
            FeedRecord::decode(Mode::Quote, json!({"ltp": "2500.5", "volume": " 42 ", "timestamp": "17.0"}))
                .unwrap();
        let FeedRecord::Quote(quote) = record else {
            panic!("expected quote record");
        };
        assert_eq!(quote.last_traded_price, 2500.5);
        assert_eq!(quote.volume, 42);
        assert_eq!(quote.timestamp_ms, 17);
    }

    #[test]
    fn wrongly_typed_field_fails() {
        assert!(FeedRecord::decode(Mode::Ltp, json!({"ltp": "n/a"})).is_err());
        assert!(FeedRecord::decode(Mode::Ltp, json!({"ltp": true})).is_err());
        assert!(FeedRecord::decode(Mode::Quote, json!({"volume": [1]})).is_err());
    }

    #[test]
    fn mode_codes() {
        for mode in Mode::ALL {
            assert_eq!(Mode::from_code(mode.code() as i64), Some(mode));
        }
        assert_eq!(Mode::from_code(0), None);
        assert_eq!(Mode::from_code(4), None);
    }

    #[test]
    fn event_envelope_serializes_like_the_feed() {
        let event = FeedEvent::market_data(
            InstrumentKey::new("NSE", "SBIN"),
            FeedRecord::Ltp(LtpRecord {
                last_traded_price: 612.25,
                timestamp_ms: 42,
            }),
        );
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "type": "market_data",
                "exchange": "NSE",
                "symbol": "SBIN",
                "mode": 1,
                "data": {"ltp": 612.25, "timestamp": 42}
            })
        );
    }
}
