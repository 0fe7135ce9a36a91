//! HTTP client for the OpenAlgo REST API.
//!
//! [`RestClient`] wraps [`reqwest::Client`], injects the `apikey` into every
//! request and never fails: transport or decode problems come back as
//! `{"status":"error","message":...}`, the same envelope the server uses for
//! its own errors. Query builders are added via `impl` blocks in
//! [`crate::api`].

use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};
use serde_json::{Map, Value, json};

use crate::constants::{DEFAULT_API_VERSION, DEFAULT_HOST, DEFAULT_HTTP_TIMEOUT};
use crate::error::Result;

/// JSON object body sent to a POST endpoint.
pub type Payload = Map<String, Value>;

/// HTTP client for the OpenAlgo REST API.
///
/// # Example
///
/// ```no_run
/// use openalgo_rs::client::RestClient;
///
/// # #[tokio::main]
/// # async fn main() -> openalgo_rs::Result<()> {
/// let client = RestClient::new("your-api-key")?;
/// let quote = client.quotes("RELIANCE", "NSE").await;
/// println!("{quote}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    api_key: String,
    /// `{host}/api/{version}/`, always ending in a slash.
    base_url: String,
}

impl RestClient {
    /// Create a client for the default local host, API `v1`, 120 s timeout.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_options(api_key, DEFAULT_HOST, DEFAULT_API_VERSION, DEFAULT_HTTP_TIMEOUT)
    }

    /// Create a client for an explicit host, API version and timeout.
    pub fn with_options(
        api_key: impl Into<String>,
        host: &str,
        version: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .default_headers(Self::default_headers())
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: format!("{}/api/{}/", host.trim_end_matches('/'), version),
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Returns the base URL (`{host}/api/{version}/`).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -----------------------------------------------------------------------
    // Generic HTTP helpers
    // -----------------------------------------------------------------------

    /// POST `payload` plus `apikey` as JSON to `endpoint` and return the
    /// decoded body.
    pub async fn post(&self, endpoint: &str, mut payload: Payload) -> Value {
        let url = self.url(endpoint);
        tracing::debug!(%url, "POST");

        payload.insert("apikey".to_owned(), Value::String(self.api_key.clone()));
        let sent = self.http.post(&url).json(&payload).send().await;
        Self::handle_response(&url, sent).await
    }

    /// GET `endpoint` with `apikey` and `params` as query parameters.
    /// Parameters with a `None` value are skipped.
    pub async fn get(&self, endpoint: &str, params: &[(&str, Option<&str>)]) -> Value {
        let url = self.url(endpoint);
        tracing::debug!(%url, "GET");

        let mut query = vec![("apikey", self.api_key.as_str())];
        query.extend(params.iter().filter_map(|(k, v)| v.map(|v| (*k, v))));
        let sent = self.http.get(&url).query(&query).send().await;
        Self::handle_response(&url, sent).await
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    fn default_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    /// Decode the body whatever the status code; the server reports its own
    /// errors in the body.
    async fn handle_response(url: &str, sent: reqwest::Result<reqwest::Response>) -> Value {
        let bytes = match sent {
            Ok(resp) => match resp.bytes().await {
                Ok(bytes) => bytes,
                Err(e) => return error_body(url, &e),
            },
            Err(e) => return error_body(url, &e),
        };

        if bytes.is_empty() {
            return Value::Object(Map::new());
        }
        serde_json::from_slice(&bytes).unwrap_or_else(|e| error_body(url, &e))
    }
}

fn error_body(url: &str, e: &dyn std::fmt::Display) -> Value {
    tracing::warn!(%url, error = %e, "REST request failed");
    json!({"status": "error", "message": e.to_string()})
}
