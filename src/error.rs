//! Error types for the `openalgo-rs` crate.
//!
//! Fallible operations return [`Result<T>`], an alias for
//! `std::result::Result<T, OpenAlgoError>`.
//!
//! [`OpenAlgoError`] covers:
//! - **HTTP transport errors** from the REST client
//! - **JSON errors** while encoding frames or decoding payloads
//! - **WebSocket errors** while dialing or talking to the feed
//! - **URL errors** for malformed feed addresses
//! - **Feed handshake failures** (timeout, rejected key, socket closed early)
//!
//! The streaming surface itself reports failures as `bool` flags; use
//! [`FeedClient::try_connect`](crate::ws::feed::FeedClient::try_connect) when
//! the reason matters.

use std::time::Duration;

/// All possible errors produced by the `openalgo-rs` client.
#[derive(Debug, thiserror::Error)]
pub enum OpenAlgoError {
    /// A network or transport-level error from `reqwest`.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Failed to encode or decode JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A WebSocket-level error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// An error parsing a URL.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// The caller provided an invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// No auth result arrived before the deadline.
    #[error("feed did not authenticate within {0:?}")]
    AuthTimeout(Duration),

    /// The feed answered the auth frame with a non-success status.
    #[error("feed rejected the API key")]
    AuthRejected,

    /// The socket closed before the handshake completed.
    #[error("feed connection closed before authentication")]
    ConnectionClosed,

    /// Another `connect()` call is already dialing or authenticating.
    #[error("a feed connection attempt is already in progress")]
    ConnectInProgress,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, OpenAlgoError>;
