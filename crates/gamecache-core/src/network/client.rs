//! Network access behind the [`Fetcher`] trait.
//!
//! The router never talks to reqwest directly; it only sees a `Fetcher`.
//! A fetch that returns any HTTP status is a success at this layer. Only
//! failures to obtain a response at all are errors, matching what the
//! caching strategies need to distinguish.

use crate::config::NetworkConfig;
use crate::error::{GameCacheError, Result};
use crate::models::{FetchRequest, FetchResponse};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Performs network requests on behalf of the router.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Send the request and capture the full response.
    ///
    /// Returns `Err` only when no response could be obtained.
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse>;
}

/// reqwest-backed fetcher.
pub struct HttpFetcher {
    client: Client,
    timeout: Option<Duration>,
}

impl HttpFetcher {
    /// Create a fetcher with the default timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(Some(NetworkConfig::REQUEST_TIMEOUT))
    }

    /// Create a fetcher with a custom timeout. `None` never times out.
    pub fn with_timeout(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder().user_agent(NetworkConfig::USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| GameCacheError::Network {
            message: format!("Failed to create HTTP client: {}", e),
            source: Some(e),
        })?;

        Ok(Self { client, timeout })
    }

    fn map_send_error(&self, request: &FetchRequest, err: reqwest::Error) -> GameCacheError {
        if err.is_timeout() {
            GameCacheError::Timeout(self.timeout.unwrap_or_default())
        } else {
            GameCacheError::Network {
                message: format!("{} {} failed: {}", request.method, request.url, err),
                source: Some(err),
            }
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone());
        for (name, value) in &request.headers {
            if is_hop_by_hop(name) {
                continue;
            }
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.map_send_error(request, e))?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter(|(name, _)| !is_hop_by_hop(name.as_str()))
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.map_send_error(request, e))?;

        debug!("{} {} -> {}", request.method, request.url, status.as_u16());

        Ok(FetchResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body,
        })
    }
}

/// Headers that describe a single connection rather than the resource.
fn is_hop_by_hop(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-connection"
            | "transfer-encoding"
            | "upgrade"
            | "te"
            | "trailer"
            | "host"
            | "content-length"
    )
}
