//! Shared HTTP transport
//!
//! Features:
//! - HTTP/2 negotiated per host, HTTP/1.1 fallback
//! - Brotli, Zstd, Gzip compression (auto-negotiated)
//! - Connection pooling with keep-alive
//! - Browser-like default headers (several embed hosts refuse bare clients)
//! - Per-request header overrides for hosts that check Origin/Referer

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::config::HttpSettings;
use crate::error::TransportError;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// HTTP client shared by catalog sources, the deobfuscator and decoders.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct FetchClient {
    client: Client,
}

impl FetchClient {
    /// Create a client with default timeouts.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_settings(&HttpSettings::default())
    }

    /// Create a client from the `[http]` settings table.
    pub fn with_settings(settings: &HttpSettings) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        let user_agent = settings.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
        if let Ok(value) = HeaderValue::from_str(user_agent) {
            headers.insert(USER_AGENT, value);
        }
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("es-MX,es;q=0.9,en;q=0.8"),
        );

        let client = Client::builder()
            // Let the server negotiate HTTP/2; most embed hosts still speak 1.1
            .http2_adaptive_window(true)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .brotli(true)
            .zstd(true)
            .gzip(true)
            .deflate(true)
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .timeout(Duration::from_secs(settings.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(10))
            .cookie_store(true)
            .build()?;

        Ok(Self { client })
    }

    /// GET a URL, optionally with extra headers, failing on non-2xx.
    #[instrument(skip(self, headers), fields(url = %url))]
    pub async fn fetch(
        &self,
        url: &str,
        headers: Option<&HeaderMap>,
    ) -> Result<Response, TransportError> {
        debug!("Fetching");
        let mut request = self.client.get(url);
        if let Some(headers) = headers {
            request = request.headers(headers.clone());
        }
        Self::send(request, url).await
    }

    /// GET and return the body as text.
    pub async fn fetch_text(&self, url: &str) -> Result<String, TransportError> {
        self.fetch_text_with(url, None).await
    }

    /// GET with header overrides and return the body as text.
    pub async fn fetch_text_with(
        &self,
        url: &str,
        headers: Option<&HeaderMap>,
    ) -> Result<String, TransportError> {
        let response = self.fetch(url, headers).await?;
        Ok(response.text().await?)
    }

    /// GET and deserialize a JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, TransportError> {
        let response = self.fetch(url, None).await?;
        Ok(response.json().await?)
    }

    /// POST a JSON body with extra headers and deserialize the JSON reply.
    pub async fn post_json<B, T>(
        &self,
        url: &str,
        body: &B,
        headers: HeaderMap,
    ) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.client.post(url).headers(headers).json(body);
        let response = Self::send(request, url).await?;
        Ok(response.json().await?)
    }

    async fn send(request: RequestBuilder, url: &str) -> Result<Response, TransportError> {
        let response = request.send().await?;

        info!(
            status = %response.status(),
            version = ?response.version(),
            "Response received"
        );

        if !response.status().is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }

    /// Get the underlying reqwest client
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}
