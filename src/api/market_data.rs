//! Market data queries: quote, multi-quote and depth snapshots over REST.

use serde_json::{Value, json};

use crate::client::{Payload, RestClient};
use crate::types::feed::InstrumentKey;

impl RestClient {
    /// Real-time quote for one instrument.
    ///
    /// **Endpoint:** `POST {base}/quotes`
    pub async fn quotes(&self, symbol: &str, exchange: &str) -> Value {
        self.post("quotes", instrument_payload(symbol, exchange)).await
    }

    /// Real-time quotes for several instruments in one request.
    ///
    /// **Endpoint:** `POST {base}/multiquotes`
    pub async fn multiquotes(&self, instruments: &[InstrumentKey]) -> Value {
        let symbols = instruments
            .iter()
            .map(|key| json!({"symbol": key.symbol, "exchange": key.exchange}))
            .collect();
        let mut payload = Payload::new();
        payload.insert("symbols".to_owned(), Value::Array(symbols));
        self.post("multiquotes", payload).await
    }

    /// Market depth (order book) for one instrument.
    ///
    /// **Endpoint:** `POST {base}/depth`
    pub async fn depth(&self, symbol: &str, exchange: &str) -> Value {
        self.post("depth", instrument_payload(symbol, exchange)).await
    }
}

fn instrument_payload(symbol: &str, exchange: &str) -> Payload {
    let mut payload = Payload::new();
    payload.insert("symbol".to_owned(), symbol.into());
    payload.insert("exchange".to_owned(), exchange.into());
    payload
}
