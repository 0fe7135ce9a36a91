//! Streaming market feed client.
//!
//! Holds one WebSocket connection to the OpenAlgo feed, authenticates with the
//! API key, and keeps a live cache per [`Mode`] for every subscribed
//! instrument. Data can be pulled as snapshots or pushed to a callback.
//!
//! # Example
//!
//! ```no_run
//! use openalgo_rs::types::feed::InstrumentKey;
//! use openalgo_rs::ws::feed::FeedClient;
//! use openalgo_rs::ws::registry::FeedHandler;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let feed = FeedClient::builder("your-api-key")
//!     .url("ws://127.0.0.1:8765")
//!     .build();
//!
//! if feed.connect().await {
//!     let instruments = vec![InstrumentKey::new("NSE", "RELIANCE")];
//!     feed.subscribe_ltp(&instruments, Some(FeedHandler::new(|event| println!("{event:?}"))));
//!
//!     // ... later
//!     println!("{:?}", feed.ltp(Some("NSE"), None));
//!     feed.disconnect();
//! }
//! # }
//! ```
//!
//! # Lifecycle
//!
//! ```text
//! Disconnected ──connect()──▶ Connecting ──socket open──▶ Authenticating ──auth ok──▶ Ready
//!      ▲                           │                            │                        │
//!      └──── disconnect() / close ─┴──── timeout / reject ─▶ Failed ◀── close ───────────┘ (→ Disconnected)
//! ```
//!
//! Every teardown (explicit or socket-driven) clears all caches and
//! subscriptions. Nothing reconnects or resubscribes automatically.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use crate::constants::{AUTH_TIMEOUT, DEFAULT_HOST, DEFAULT_WS_PORT};
use crate::error::{OpenAlgoError, Result};
use crate::types::feed::{
    ConnectionState, DepthRecord, FeedEvent, FeedRecord, InstrumentKey, LtpRecord, Mode,
    QuoteRecord, Snapshot, Subscription,
};
use crate::ws::cache::{self, FeedCache};
use crate::ws::protocol;
use crate::ws::registry::{FeedHandler, SubscriptionRegistry};
use crate::ws::router::Router;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

type WriterHalf = SplitSink<WsStream, Message>;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a [`FeedClient`].
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Feed address; `ws://` for plain TCP, `wss://` for TLS.
    pub url: String,
    /// Upper bound on dial + authentication in `connect()`.
    pub auth_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: feed_url_from_host(DEFAULT_HOST, DEFAULT_WS_PORT),
            auth_timeout: AUTH_TIMEOUT,
        }
    }
}

/// Derive the feed address from a REST host: drop the scheme, any port and
/// path, then use `ws://` on `port`.
///
/// `http://127.0.0.1:5000` with port `8765` becomes `ws://127.0.0.1:8765`.
pub fn feed_url_from_host(host: &str, port: u16) -> String {
    let host = host.trim();
    let parsed = Url::parse(host)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .and_then(|url| url.host_str().map(str::to_owned));
    let hostname = parsed.unwrap_or_else(|| {
        let bare = host
            .trim_start_matches("http://")
            .trim_start_matches("https://");
        bare.split(['/', ':']).next().unwrap_or_default().to_owned()
    });
    format!("ws://{hostname}:{port}")
}

/// Builder for a [`FeedClient`].
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use openalgo_rs::ws::feed::FeedClient;
///
/// let feed = FeedClient::builder("api-key")
///     .url("wss://demo.example.com/ws")
///     .auth_timeout(Duration::from_secs(3))
///     .build();
/// ```
#[derive(Debug)]
pub struct FeedClientBuilder {
    api_key: String,
    config: FeedConfig,
}

impl FeedClientBuilder {
    /// Create a builder with the default configuration.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            config: FeedConfig::default(),
        }
    }

    /// Set the feed URL explicitly. Default: derived from the default host.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    /// Derive the feed URL from a REST host and feed port.
    pub fn host(mut self, host: &str, port: u16) -> Self {
        self.config.url = feed_url_from_host(host, port);
        self
    }

    /// Set the connect/auth timeout. Default: 5 seconds.
    pub fn auth_timeout(mut self, timeout: Duration) -> Self {
        self.config.auth_timeout = timeout;
        self
    }

    /// Build the [`FeedClient`]. No connection is made until `connect()`.
    pub fn build(self) -> FeedClient {
        FeedClient::new(self.api_key, self.config)
    }
}

// ---------------------------------------------------------------------------
// Shared session state
// ---------------------------------------------------------------------------

/// Handles to the two tasks serving one socket.
struct Link {
    outbound: mpsc::UnboundedSender<Message>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Link {
    /// Queue a close frame and stop reading. The writer exits on its own once
    /// the close frame is flushed.
    fn close(self) {
        let _ = self.outbound.send(Message::Close(None));
        self.reader.abort();
        drop(self.writer);
    }
}

#[derive(Default)]
struct Session {
    state: ConnectionState,
    /// Bumped on every connect attempt and every teardown. Socket tasks carry
    /// the generation they were started with and lose all write access once it
    /// moves on.
    generation: u64,
    link: Option<Link>,
}

/// State shared between caller threads and the receive task.
///
/// `session` is read-locked for subscribe/unsubscribe and for every cache
/// write, and write-locked for state transitions and teardown, so a teardown
/// never interleaves with an update or a registry change.
pub(crate) struct FeedShared {
    session: RwLock<Session>,
    pub(crate) registry: SubscriptionRegistry,
    pub(crate) cache: FeedCache,
}

impl FeedShared {
    pub(crate) fn new() -> Self {
        Self {
            session: RwLock::new(Session::default()),
            registry: SubscriptionRegistry::new(),
            cache: FeedCache::new(),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.session.read().state
    }

    /// Authenticating → Ready, if `generation` is still current.
    pub(crate) fn mark_ready(&self, generation: u64) -> bool {
        let mut session = self.session.write();
        if session.generation != generation || session.state != ConnectionState::Authenticating {
            return false;
        }
        session.state = ConnectionState::Ready;
        true
    }

    /// Cache an update and hand it to the mode's callback.
    ///
    /// Dropped if the connection moved on, or if the (instrument, mode) pair
    /// is not subscribed. The callback runs after the session lock is
    /// released, so it may call back into the client.
    pub(crate) fn apply_update(&self, generation: u64, mode: Mode, key: InstrumentKey, data: Value) {
        let event = {
            let session = self.session.read();
            if session.generation != generation || session.state != ConnectionState::Ready {
                return;
            }
            let subscription = Subscription::new(key, mode);
            let stored = self
                .registry
                .with_active(&subscription, || self.cache.store(mode, &subscription.key, data));
            match stored {
                Some(Ok(record)) => FeedEvent::market_data(subscription.key, record),
                Some(Err(e)) => {
                    tracing::warn!(
                        instrument = %subscription.key,
                        %mode,
                        error = %e,
                        "Dropping undecodable market data"
                    );
                    return;
                }
                None => {
                    tracing::debug!(
                        instrument = %subscription.key,
                        %mode,
                        "Dropping market data for unsubscribed instrument"
                    );
                    return;
                }
            }
        };

        if let Some(handler) = self.registry.handler(mode) {
            cache::dispatch(&handler, &event);
        }
    }

    /// The read half saw a close or an error.
    pub(crate) fn socket_closed(&self, generation: u64) {
        let link = {
            let mut session = self.session.write();
            if session.generation != generation {
                return;
            }
            let next = match session.state {
                ConnectionState::Ready => ConnectionState::Disconnected,
                _ => ConnectionState::Failed,
            };
            self.teardown(&mut session, next)
        };
        // Dropping the link closes the outbound queue, which ends the writer.
        drop(link);
        tracing::info!(generation, "Feed session ended; caches cleared");
    }

    /// Tear down if `generation` is still current. Returns the detached link.
    fn reset_if_current(&self, generation: u64, next: ConnectionState) -> Option<Link> {
        let mut session = self.session.write();
        if session.generation != generation {
            return None;
        }
        self.teardown(&mut session, next)
    }

    fn teardown(&self, session: &mut Session, next: ConnectionState) -> Option<Link> {
        session.generation += 1;
        session.state = next;
        self.cache.clear();
        self.registry.clear_subscriptions();
        session.link.take()
    }

    #[cfg(test)]
    pub(crate) fn force_state(&self, state: ConnectionState) -> u64 {
        let mut session = self.session.write();
        session.generation += 1;
        session.state = state;
        session.generation
    }
}

// ---------------------------------------------------------------------------
// FeedClient
// ---------------------------------------------------------------------------

/// Client for the OpenAlgo streaming market feed.
///
/// `connect()` is the only operation that waits; subscribe, unsubscribe,
/// snapshots and `disconnect()` return immediately and may be called from any
/// thread, including from inside a feed callback.
pub struct FeedClient {
    api_key: String,
    config: FeedConfig,
    shared: Arc<FeedShared>,
}

impl std::fmt::Debug for FeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedClient")
            .field("url", &self.config.url)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl FeedClient {
    /// Create a client with explicit configuration.
    ///
    /// Prefer [`FeedClient::builder`] for a more ergonomic API.
    pub fn new(api_key: impl Into<String>, config: FeedConfig) -> Self {
        Self {
            api_key: api_key.into(),
            config,
            shared: Arc::new(FeedShared::new()),
        }
    }

    /// Start building a client.
    pub fn builder(api_key: impl Into<String>) -> FeedClientBuilder {
        FeedClientBuilder::new(api_key)
    }

    /// The active configuration.
    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Connection
    // -----------------------------------------------------------------------

    /// Connect and authenticate, waiting at most the configured timeout.
    ///
    /// Returns `true` once the feed acknowledged the API key, or immediately
    /// if already ready. Returns `false` on timeout, rejection, dial failure
    /// or if another connect is already in flight.
    pub async fn connect(&self) -> bool {
        match self.try_connect().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(url = %self.config.url, error = %e, "Feed connect failed");
                false
            }
        }
    }

    /// Like [`connect`](Self::connect), but reports why it failed.
    pub async fn try_connect(&self) -> Result<()> {
        let generation = {
            let mut session = self.shared.session.write();
            match session.state {
                ConnectionState::Ready => return Ok(()),
                ConnectionState::Connecting | ConnectionState::Authenticating => {
                    return Err(OpenAlgoError::ConnectInProgress);
                }
                ConnectionState::Disconnected | ConnectionState::Failed => {}
            }
            session.generation += 1;
            session.state = ConnectionState::Connecting;
            session.generation
        };

        // Fails the attempt on every exit except success, including the
        // caller dropping this future mid-handshake.
        let guard = AttemptGuard {
            shared: self.shared.as_ref(),
            generation,
            armed: true,
        };

        let timeout = self.config.auth_timeout;
        let result = match tokio::time::timeout(timeout, self.open(generation)).await {
            Ok(result) => result,
            Err(_) => Err(OpenAlgoError::AuthTimeout(timeout)),
        };

        match result {
            Ok(()) => {
                guard.disarm();
                tracing::info!(url = %self.config.url, "Feed connected and authenticated");
                Ok(())
            }
            Err(e) => {
                drop(guard);
                Err(e)
            }
        }
    }

    /// Dial, start the socket tasks, send the auth frame and wait for the
    /// router to report the auth result.
    async fn open(&self, generation: u64) -> Result<()> {
        let url = parse_feed_url(&self.config.url)?;
        let (ws, _resp) = connect_async(url.as_str()).await?;
        let (write, read) = ws.split();

        let (outbound, queue) = mpsc::unbounded_channel();
        let (auth_tx, auth_rx) = oneshot::channel();
        let auth = protocol::auth_frame(&self.api_key)?;
        // Cannot fail: `queue` is still held here.
        let _ = outbound.send(Message::Text(auth.into()));

        {
            let mut session = self.shared.session.write();
            if session.generation != generation {
                // disconnect() ran while we were dialing.
                return Err(OpenAlgoError::ConnectionClosed);
            }
            let writer = tokio::spawn(write_loop(write, queue));
            let reader = tokio::spawn(Router::new(self.shared.clone(), generation, auth_tx).run(read));
            session.state = ConnectionState::Authenticating;
            session.link = Some(Link {
                outbound,
                reader,
                writer,
            });
        }
        tracing::debug!(url = %url, "Feed socket open, auth frame sent");

        match auth_rx.await {
            Ok(true) => Ok(()),
            Ok(false) => Err(OpenAlgoError::AuthRejected),
            Err(_) => Err(OpenAlgoError::ConnectionClosed),
        }
    }

    /// Close the socket (if any), force `Disconnected` and clear every cache
    /// and subscription. Safe to call in any state, any number of times.
    pub fn disconnect(&self) {
        let link = {
            let mut session = self.shared.session.write();
            self.shared.teardown(&mut session, ConnectionState::Disconnected)
        };
        if let Some(link) = link {
            link.close();
            tracing::info!(url = %self.config.url, "Disconnected from feed");
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Whether a socket is open (authenticating or ready).
    pub fn is_connected(&self) -> bool {
        matches!(
            self.state(),
            ConnectionState::Authenticating | ConnectionState::Ready
        )
    }

    /// Whether the feed accepted the API key and subscriptions are allowed.
    pub fn is_authenticated(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    /// Subscribe `instruments` in `mode`, replacing the mode's callback slot
    /// with `handler` (even for an empty list).
    ///
    /// Sends one frame per instrument, in order, without waiting for an
    /// acknowledgement. Returns `false` without side effects unless ready.
    pub fn subscribe(&self, mode: Mode, instruments: &[InstrumentKey], handler: Option<FeedHandler>) -> bool {
        let session = self.shared.session.read();
        let Some(link) = ready_link(&session) else {
            tracing::debug!(%mode, "Subscribe rejected: feed not ready");
            return false;
        };

        self.shared.registry.set_handler(mode, handler);
        for key in instruments {
            let frame = match protocol::subscribe_frame(key, mode) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(instrument = %key, %mode, error = %e, "Failed to encode subscribe frame");
                    return false;
                }
            };
            self.shared.registry.insert(Subscription::new(key.clone(), mode));
            if link.outbound.send(Message::Text(frame.into())).is_err() {
                tracing::warn!(instrument = %key, %mode, "Feed writer gone; subscribe not sent");
                return false;
            }
            tracing::debug!(instrument = %key, %mode, "Subscribe sent");
        }
        true
    }

    /// Unsubscribe `instruments` from `mode`, evicting each cached entry
    /// before its frame is queued. The mode's callback slot is left as is.
    ///
    /// Returns `false` without side effects unless ready.
    pub fn unsubscribe(&self, mode: Mode, instruments: &[InstrumentKey]) -> bool {
        let session = self.shared.session.read();
        let Some(link) = ready_link(&session) else {
            tracing::debug!(%mode, "Unsubscribe rejected: feed not ready");
            return false;
        };

        for key in instruments {
            let frame = match protocol::unsubscribe_frame(key, mode) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(instrument = %key, %mode, error = %e, "Failed to encode unsubscribe frame");
                    return false;
                }
            };
            self.shared.registry.remove(&Subscription::new(key.clone(), mode));
            self.shared.cache.evict(mode, key);
            if link.outbound.send(Message::Text(frame.into())).is_err() {
                tracing::warn!(instrument = %key, %mode, "Feed writer gone; unsubscribe not sent");
                return false;
            }
            tracing::debug!(instrument = %key, %mode, "Unsubscribe sent");
        }
        true
    }

    /// Subscribe to last-traded-price updates.
    pub fn subscribe_ltp(&self, instruments: &[InstrumentKey], handler: Option<FeedHandler>) -> bool {
        self.subscribe(Mode::Ltp, instruments, handler)
    }

    /// Subscribe to quote updates.
    pub fn subscribe_quote(&self, instruments: &[InstrumentKey], handler: Option<FeedHandler>) -> bool {
        self.subscribe(Mode::Quote, instruments, handler)
    }

    /// Subscribe to market depth updates.
    pub fn subscribe_depth(&self, instruments: &[InstrumentKey], handler: Option<FeedHandler>) -> bool {
        self.subscribe(Mode::Depth, instruments, handler)
    }

    /// Unsubscribe from last-traded-price updates.
    pub fn unsubscribe_ltp(&self, instruments: &[InstrumentKey]) -> bool {
        self.unsubscribe(Mode::Ltp, instruments)
    }

    /// Unsubscribe from quote updates.
    pub fn unsubscribe_quote(&self, instruments: &[InstrumentKey]) -> bool {
        self.unsubscribe(Mode::Quote, instruments)
    }

    /// Unsubscribe from market depth updates.
    pub fn unsubscribe_depth(&self, instruments: &[InstrumentKey]) -> bool {
        self.unsubscribe(Mode::Depth, instruments)
    }

    /// Currently subscribed (instrument, mode) pairs, in no particular order.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.shared.registry.subscriptions()
    }

    /// Whether `key` is currently subscribed in `mode`.
    pub fn is_subscribed(&self, key: &InstrumentKey, mode: Mode) -> bool {
        self.shared.registry.contains(&Subscription::new(key.clone(), mode))
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Cached LTP records, optionally filtered by exact exchange and/or symbol.
    pub fn ltp(&self, exchange: Option<&str>, symbol: Option<&str>) -> Snapshot<LtpRecord> {
        self.shared.cache.ltp(exchange, symbol)
    }

    /// Cached quote records, optionally filtered by exact exchange and/or symbol.
    pub fn quotes(&self, exchange: Option<&str>, symbol: Option<&str>) -> Snapshot<QuoteRecord> {
        self.shared.cache.quotes(exchange, symbol)
    }

    /// Cached depth records, optionally filtered by exact exchange and/or symbol.
    pub fn depth(&self, exchange: Option<&str>, symbol: Option<&str>) -> Snapshot<DepthRecord> {
        self.shared.cache.depth(exchange, symbol)
    }

    /// Cached records of any mode.
    pub fn snapshot(&self, mode: Mode, exchange: Option<&str>, symbol: Option<&str>) -> Snapshot<FeedRecord> {
        self.shared.cache.snapshot(mode, exchange, symbol)
    }
}

impl Drop for FeedClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

// ---------------------------------------------------------------------------
// Internal
// ---------------------------------------------------------------------------

/// Tears down the connect attempt of `generation` when dropped armed.
struct AttemptGuard<'a> {
    shared: &'a FeedShared,
    generation: u64,
    armed: bool,
}

impl AttemptGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(link) = self.shared.reset_if_current(self.generation, ConnectionState::Failed) {
            link.close();
        }
        tracing::debug!(generation = self.generation, "Connect attempt ended without authentication");
    }
}

fn ready_link(session: &Session) -> Option<&Link> {
    if session.state != ConnectionState::Ready {
        return None;
    }
    session.link.as_ref()
}

/// Parse the feed URL; `ws` selects plain TCP, `wss` selects TLS.
fn parse_feed_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(OpenAlgoError::InvalidArgument(format!(
            "feed URL must use ws:// or wss://, got {other}://"
        ))),
    }
}

/// Drain the outbound queue into the socket until a close frame is sent, the
/// queue is dropped, or a send fails.
async fn write_loop(mut write: WriterHalf, mut queue: mpsc::UnboundedReceiver<Message>) {
    while let Some(msg) = queue.recv().await {
        let closing = matches!(msg, Message::Close(_));
        if let Err(e) = write.send(msg).await {
            tracing::error!(error = %e, "Failed to write to feed socket");
            return;
        }
        if closing {
            return;
        }
    }
    let _ = write.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_feed_url_from_host() {
        assert_eq!(feed_url_from_host("http://127.0.0.1:5000", 8765), "ws://127.0.0.1:8765");
        assert_eq!(feed_url_from_host("https://demo.openalgo.in", 8765), "ws://demo.openalgo.in:8765");
        assert_eq!(feed_url_from_host("localhost:5000/", 9000), "ws://localhost:9000");
        assert_eq!(feed_url_from_host("http://host.example/api", 8765), "ws://host.example:8765");
        assert_eq!(feed_url_from_host("http://[::1]:5000", 8765), "ws://[::1]:8765");
        assert_eq!(feed_url_from_host(" https://[2001:db8::1]/ ", 9000), "ws://[2001:db8::1]:9000");
    }

    #[test]
    fn default_config() {
        let config = FeedConfig::default();
        assert_eq!(config.url, "ws://127.0.0.1:8765");
        assert_eq!(config.auth_timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_non_websocket_schemes() {
        assert!(parse_feed_url("ws://127.0.0.1:8765").is_ok());
        assert!(parse_feed_url("wss://demo.example.com/ws").is_ok());
        assert!(matches!(
            parse_feed_url("http://127.0.0.1:8765"),
            Err(OpenAlgoError::InvalidArgument(_))
        ));
        assert!(parse_feed_url("127.0.0.1:8765").is_err());
    }

    #[test]
    fn new_client_is_disconnected_and_empty() {
        let feed = FeedClient::builder("key").build();
        assert_eq!(feed.state(), ConnectionState::Disconnected);
        assert!(!feed.is_connected());
        assert!(!feed.is_authenticated());
        assert!(feed.subscriptions().is_empty());
        for mode in Mode::ALL {
            assert!(feed.snapshot(mode, None, None).is_empty());
        }
    }

    #[test]
    fn subscribe_requires_ready() {
        let feed = FeedClient::builder("key").build();
        let instruments = [InstrumentKey::new("NSE", "SBIN")];

        assert!(!feed.subscribe_ltp(&instruments, Some(FeedHandler::new(|_| {}))));
        assert!(!feed.unsubscribe_ltp(&instruments));
        assert!(feed.subscriptions().is_empty());
        assert!(feed.shared.registry.handler(Mode::Ltp).is_none());
    }

    #[test]
    fn disconnect_is_idempotent() {
        let feed = FeedClient::builder("key").build();
        feed.disconnect();
        feed.disconnect();
        assert_eq!(feed.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn disconnect_clears_caches_and_subscriptions() {
        let feed = FeedClient::builder("key").build();
        let generation = feed.shared.force_state(ConnectionState::Ready);
        let key = InstrumentKey::new("NSE", "SBIN");
        for mode in Mode::ALL {
            feed.shared.registry.insert(Subscription::new(key.clone(), mode));
            feed.shared
                .apply_update(generation, mode, key.clone(), serde_json::json!({"ltp": 1.0}));
            assert_eq!(feed.shared.cache.len(mode), 1);
        }

        feed.disconnect();
        assert_eq!(feed.state(), ConnectionState::Disconnected);
        assert!(feed.subscriptions().is_empty());
        for mode in Mode::ALL {
            assert!(feed.snapshot(mode, None, None).is_empty());
        }

        // A late update from the old connection is rejected.
        feed.shared
            .apply_update(generation, Mode::Ltp, key, serde_json::json!({"ltp": 2.0}));
        assert!(feed.ltp(None, None).is_empty());
    }

    #[test]
    fn disconnect_racing_updates_leaves_nothing_cached() {
        let feed = FeedClient::builder("key").build();
        let generation = feed.shared.force_state(ConnectionState::Ready);
        let keys: Vec<_> = (0..8)
            .map(|i| InstrumentKey::new("NSE", format!("SYM{i}")))
            .collect();
        for key in &keys {
            for mode in Mode::ALL {
                feed.shared.registry.insert(Subscription::new(key.clone(), mode));
            }
        }

        let barrier = std::sync::Barrier::new(5);
        std::thread::scope(|scope| {
            for worker in 0..4 {
                let (shared, keys, barrier) = (&feed.shared, &keys, &barrier);
                scope.spawn(move || {
                    barrier.wait();
                    for round in 0..2_000 {
                        let key = keys[(worker + round) % keys.len()].clone();
                        let mode = Mode::ALL[round % Mode::ALL.len()];
                        shared.apply_update(generation, mode, key, serde_json::json!({"ltp": round}));
                    }
                });
            }
            barrier.wait();
            std::thread::sleep(Duration::from_millis(1));
            feed.disconnect();
        });

        assert_eq!(feed.state(), ConnectionState::Disconnected);
        for mode in Mode::ALL {
            assert!(feed.snapshot(mode, None, None).is_empty(), "{mode} cache survived disconnect");
        }
    }

    #[tokio::test]
    async fn connect_rejects_bad_scheme() {
        let feed = FeedClient::builder("key").url("http://127.0.0.1:1").build();
        assert!(matches!(
            feed.try_connect().await,
            Err(OpenAlgoError::InvalidArgument(_))
        ));
        assert_eq!(feed.state(), ConnectionState::Failed);
    }
}
