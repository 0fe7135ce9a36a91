//! Streaming market feed.
//!
//! [`feed::FeedClient`] connects to the OpenAlgo WebSocket feed, authenticates
//! with the API key and keeps live caches for three subscription modes:
//!
//! - **LTP** (mode 1): last traded price and timestamp
//! - **Quote** (mode 2): OHLC, LTP, volume and timestamp
//! - **Depth** (mode 3): LTP, timestamp and the order book payload
//!
//! All frames are JSON text. Cached data is read with
//! snapshot calls or pushed to a per-mode [`registry::FeedHandler`].
//!
//! ## Modules
//!
//! - [`feed`]: connection lifecycle and the public client
//! - `router`: receive loop classifying inbound frames
//! - [`registry`]: active subscriptions and callback slots
//! - `cache`: per-mode caches and callback dispatch
//! - `protocol`: wire frames

pub(crate) mod cache;
pub mod feed;
pub(crate) mod protocol;
pub mod registry;
pub(crate) mod router;
