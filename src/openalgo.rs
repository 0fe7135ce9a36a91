//! Top-level client composing the REST API and the market feed.

use std::time::Duration;

use crate::client::RestClient;
use crate::constants::{DEFAULT_API_VERSION, DEFAULT_HOST, DEFAULT_HTTP_TIMEOUT, DEFAULT_WS_PORT};
use crate::error::Result;
use crate::ws::feed::{FeedClient, feed_url_from_host};

/// One REST client and one feed client sharing an API key.
///
/// # Example
///
/// ```no_run
/// use openalgo_rs::OpenAlgoClient;
/// use openalgo_rs::types::feed::InstrumentKey;
///
/// # #[tokio::main]
/// # async fn main() -> openalgo_rs::Result<()> {
/// let client = OpenAlgoClient::builder("your-api-key")
///     .host("http://127.0.0.1:5000")
///     .build()?;
///
/// println!("{}", client.rest().quotes("RELIANCE", "NSE").await);
///
/// let feed = client.feed();
/// if feed.connect().await {
///     feed.subscribe_quote(&[InstrumentKey::new("NSE", "RELIANCE")], None);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct OpenAlgoClient {
    rest: RestClient,
    feed: FeedClient,
}

impl OpenAlgoClient {
    /// Client for a local OpenAlgo server with all defaults.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::builder(api_key).build()
    }

    /// Client for `host`, feed on the same host at the default port.
    pub fn with_host(api_key: impl Into<String>, host: impl Into<String>) -> Result<Self> {
        Self::builder(api_key).host(host).build()
    }

    pub fn builder(api_key: impl Into<String>) -> OpenAlgoClientBuilder {
        OpenAlgoClientBuilder::new(api_key)
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    pub fn feed(&self) -> &FeedClient {
        &self.feed
    }
}

/// Builder for an [`OpenAlgoClient`].
#[derive(Debug)]
pub struct OpenAlgoClientBuilder {
    api_key: String,
    host: String,
    version: String,
    timeout: Duration,
    ws_port: u16,
    ws_url: Option<String>,
}

impl OpenAlgoClientBuilder {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            host: DEFAULT_HOST.to_owned(),
            version: DEFAULT_API_VERSION.to_owned(),
            timeout: DEFAULT_HTTP_TIMEOUT,
            ws_port: DEFAULT_WS_PORT,
            ws_url: None,
        }
    }

    /// REST host. Default: `http://127.0.0.1:5000`.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// API version path segment. Default: `v1`.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// REST request timeout. Default: 120 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Feed port used when the feed URL is derived from the host. Default: 8765.
    pub fn ws_port(mut self, port: u16) -> Self {
        self.ws_port = port;
        self
    }

    /// Explicit feed URL; overrides the host-derived one.
    pub fn ws_url(mut self, url: impl Into<String>) -> Self {
        self.ws_url = Some(url.into());
        self
    }

    pub fn build(self) -> Result<OpenAlgoClient> {
        let rest = RestClient::with_options(&self.api_key, &self.host, &self.version, self.timeout)?;
        let ws_url = self
            .ws_url
            .unwrap_or_else(|| feed_url_from_host(&self.host, self.ws_port));
        let feed = FeedClient::builder(self.api_key).url(ws_url).build();
        Ok(OpenAlgoClient { rest, feed })
    }
}
