//! Receive loop for one feed connection.
//!
//! Every text frame is classified by its `type` field and routed either to the
//! connection state machine (`auth`) or to the caches (`market_data`).
//! Malformed frames, unknown types and unknown modes are dropped; nothing a
//! server sends can take the loop down short of closing the socket.

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::SplitStream;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;

use crate::types::feed::{InstrumentKey, Mode};
use crate::ws::feed::{FeedShared, WsStream};
use crate::ws::protocol::InboundFrame;

pub(crate) struct Router {
    shared: Arc<FeedShared>,
    generation: u64,
    /// Released at most once, by the first auth frame of this connection.
    auth: Option<oneshot::Sender<bool>>,
}

impl Router {
    pub(crate) fn new(shared: Arc<FeedShared>, generation: u64, auth: oneshot::Sender<bool>) -> Self {
        Self {
            shared,
            generation,
            auth: Some(auth),
        }
    }

    /// Drive the read half until the server closes the socket or it errors,
    /// then tear the session down.
    pub(crate) async fn run(mut self, mut read: SplitStream<WsStream>) {
        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Text(text)) => self.route(&text),
                Ok(Message::Close(_)) => {
                    tracing::info!(generation = self.generation, "Feed socket closed by server");
                    break;
                }
                Ok(Message::Binary(data)) => {
                    tracing::debug!(len = data.len(), "Ignoring binary frame on feed");
                }
                // Ping/pong handled automatically by tungstenite
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(generation = self.generation, error = %e, "Feed socket error");
                    break;
                }
            }
        }

        self.shared.socket_closed(self.generation);
        // A still-pending auth sender is dropped here, which fails the
        // waiting connect() immediately instead of at its timeout.
    }

    pub(crate) fn route(&mut self, text: &str) {
        let frame = match InboundFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(error = %e, "Dropping malformed feed frame");
                return;
            }
        };

        match frame {
            InboundFrame::Auth { status } => {
                self.resolve_auth(status.as_deref() == Some("success"));
            }
            InboundFrame::MarketData {
                exchange,
                symbol,
                mode,
                data,
            } => match Mode::from_code(mode) {
                Some(mode) => self.shared.apply_update(
                    self.generation,
                    mode,
                    InstrumentKey::new(exchange, symbol),
                    data,
                ),
                None => {
                    tracing::debug!(%exchange, %symbol, mode, "Ignoring market data with unknown mode");
                }
            },
            InboundFrame::Unknown => {
                tracing::debug!("Ignoring feed frame of unknown type");
            }
        }
    }

    fn resolve_auth(&mut self, success: bool) {
        let Some(tx) = self.auth.take() else {
            tracing::debug!(success, "Ignoring repeated auth frame");
            return;
        };
        let ready = success && self.shared.mark_ready(self.generation);
        // The connect() side may already have timed out and gone away.
        let _ = tx.send(ready);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::feed::{ConnectionState, LtpRecord, Subscription};

    fn authenticating() -> (Arc<FeedShared>, Router, oneshot::Receiver<bool>) {
        let shared = Arc::new(FeedShared::new());
        let generation = shared.force_state(ConnectionState::Authenticating);
        let (tx, rx) = oneshot::channel();
        let router = Router::new(shared.clone(), generation, tx);
        (shared, router, rx)
    }

    fn ready_with(subs: &[(&str, &str, Mode)]) -> (Arc<FeedShared>, Router) {
        let (shared, mut router, _rx) = authenticating();
        router.route(r#"{"type":"auth","status":"success"}"#);
        for (exchange, symbol, mode) in subs {
            shared
                .registry
                .insert(Subscription::new(InstrumentKey::new(*exchange, *symbol), *mode));
        }
        (shared, router)
    }

    #[test]
    fn auth_success_marks_ready_and_releases_once() {
        let (shared, mut router, mut rx) = authenticating();
        router.route(r#"{"type":"auth","status":"success"}"#);
        assert_eq!(shared.state(), ConnectionState::Ready);
        assert_eq!(rx.try_recv(), Ok(true));

        // A second auth frame must not panic or flip anything.
        router.route(r#"{"type":"auth","status":"failed"}"#);
        assert_eq!(shared.state(), ConnectionState::Ready);
    }

    #[test]
    fn auth_failure_releases_with_false() {
        let (shared, mut router, mut rx) = authenticating();
        router.route(r#"{"type":"auth","status":"invalid key"}"#);
        assert_eq!(rx.try_recv(), Ok(false));
        assert_eq!(shared.state(), ConnectionState::Authenticating);
    }

    #[test]
    fn auth_without_status_is_a_failure() {
        let (_shared, mut router, mut rx) = authenticating();
        router.route(r#"{"type":"auth"}"#);
        assert_eq!(rx.try_recv(), Ok(false));
    }

    #[test]
    fn market_data_lands_in_cache() {
        let (shared, mut router) = ready_with(&[("NSE", "RELIANCE", Mode::Ltp)]);
        router.route(
            r#"{"type":"market_data","exchange":"NSE","symbol":"RELIANCE","mode":1,"data":{"ltp":2500.5,"timestamp":1700000000}}"#,
        );
        assert_eq!(
            shared.cache.ltp(None, None)["NSE"]["RELIANCE"],
            LtpRecord {
                last_traded_price: 2500.5,
                timestamp_ms: 1_700_000_000,
            }
        );
    }

    #[test]
    fn drops_garbage_unknown_types_and_modes() {
        let (shared, mut router) = ready_with(&[("NSE", "SBIN", Mode::Ltp)]);
        router.route("{{{");
        router.route(r#"{"type":"heartbeat"}"#);
        router.route(r#"{"type":"market_data","exchange":"NSE","symbol":"SBIN","mode":9,"data":{"ltp":1}}"#);
        router.route(r#"{"type":"market_data","exchange":"NSE","symbol":"SBIN","mode":1,"data":{"ltp":"x"}}"#);

        for mode in Mode::ALL {
            assert_eq!(shared.cache.len(mode), 0);
        }
        assert_eq!(shared.state(), ConnectionState::Ready);
    }

    #[test]
    fn drops_updates_for_unsubscribed_instruments() {
        let (shared, mut router) = ready_with(&[("NSE", "SBIN", Mode::Quote)]);
        router.route(r#"{"type":"market_data","exchange":"NSE","symbol":"SBIN","mode":1,"data":{"ltp":1}}"#);
        router.route(r#"{"type":"market_data","exchange":"NSE","symbol":"INFY","mode":2,"data":{"ltp":1}}"#);
        router.route(r#"{"type":"market_data","exchange":"NSE","symbol":"SBIN","mode":2,"data":{"ltp":1}}"#);

        assert_eq!(shared.cache.len(Mode::Ltp), 0);
        assert_eq!(shared.cache.len(Mode::Quote), 1);
    }

    #[test]
    fn stale_generation_cannot_write() {
        let (shared, mut router) = ready_with(&[("NSE", "SBIN", Mode::Ltp)]);
        shared.force_state(ConnectionState::Ready);
        shared
            .registry
            .insert(Subscription::new(InstrumentKey::new("NSE", "SBIN"), Mode::Ltp));

        router.route(r#"{"type":"market_data","exchange":"NSE","symbol":"SBIN","mode":1,"data":{"ltp":1}}"#);
        assert_eq!(shared.cache.len(Mode::Ltp), 0);
    }
}
