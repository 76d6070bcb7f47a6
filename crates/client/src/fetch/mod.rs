//! Origin fetch capability.
//!
//! The engine only ever talks to the network through [`Origin`]. An origin
//! answers with whatever status the server returned; only transport failures
//! (unreachable host, timeout, oversized body) are errors.
//!
//! ### Limits
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)
//! - Request timeout: 20s (configurable)

pub mod url;

use async_trait::async_trait;
use reqwest::{Client, Method};
use std::time::{Duration, Instant};

pub use url::{UrlError, canonicalize, resolve};

use offcache_core::{AppConfig, Error, RequestDescriptor, ResponseSnapshot};

/// Asynchronous access to the network origin.
#[async_trait]
pub trait Origin: Send + Sync {
    /// Fetch a request, returning the full response.
    async fn fetch(&self, request: &RequestDescriptor) -> Result<ResponseSnapshot, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "offcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "offcache/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// reqwest-backed origin.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn too_large(&self, len: impl std::fmt::Display) -> Error {
        Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes))
    }
}

#[async_trait]
impl Origin for FetchClient {
    async fn fetch(&self, request: &RequestDescriptor) -> Result<ResponseSnapshot, Error> {
        let start = Instant::now();
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {}", request.method, e)))?;

        let mut builder = self.http.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::Network(format!("timeout fetching {}: {}", request.url, e))
            } else {
                Error::Network(format!("network error fetching {}: {}", request.url, e))
            }
        })?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && !usize::try_from(len).is_ok_and(|len| len <= self.config.max_bytes)
        {
            return Err(self.too_large(len));
        }

        // Values that are not valid UTF-8 are kept, decoded lossily.
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
            .collect::<Vec<_>>();
        let final_url = response.url().clone();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(self.too_large(bytes.len()));
        }

        tracing::debug!(
            "fetched {} {} -> {} {} in {}ms ({} bytes)",
            request.method,
            request.url,
            final_url,
            status.as_u16(),
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(ResponseSnapshot::new(status.as_u16(), headers, bytes))
    }
}
