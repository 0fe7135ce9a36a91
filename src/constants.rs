//! Constants for the OpenAlgo REST API and market feed.
//!
//! These are the defaults used by [`OpenAlgoClient`](crate::OpenAlgoClient)
//! and [`FeedClient`](crate::ws::feed::FeedClient) when no explicit value is
//! supplied, exported for advanced usage.

use std::time::Duration;

// ---------------------------------------------------------------------------
// REST API
// ---------------------------------------------------------------------------

/// Default OpenAlgo host (a locally running OpenAlgo server).
pub const DEFAULT_HOST: &str = "http://127.0.0.1:5000";

/// Default REST API version segment (`{host}/api/{version}/`).
pub const DEFAULT_API_VERSION: &str = "v1";

/// Default timeout applied to every REST request.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(120);

// ---------------------------------------------------------------------------
// Market feed
// ---------------------------------------------------------------------------

/// Port the market feed listens on when the feed URL is derived from the host.
pub const DEFAULT_WS_PORT: u16 = 8765;

/// How long `connect()` waits for the socket to open and authenticate.
pub const AUTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Depth levels requested in every subscribe frame, regardless of mode.
pub const DEPTH_HINT: u8 = 5;
