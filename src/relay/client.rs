//! Outbound HTTP client used for origin fetches.
//!
//! One pooled `reqwest::Client` is shared by every request task. Each origin
//! request is bounded three ways: connecting, waiting for the response head,
//! and idling between body chunks. There is no overall deadline, since media
//! bodies may legitimately take a long time to stream.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Response, Url};

use super::error::RelayError;

/// Origin client configuration.
#[derive(Debug, Clone)]
pub struct OriginConfig {
    pub connect_timeout: Duration,
    /// Bound on waiting for the origin's status line and headers.
    pub response_timeout: Duration,
    /// Bound on the gap between two body chunks.
    pub read_timeout: Duration,
    pub pool_idle_timeout: Duration,
    pub user_agent: String,
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            response_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(60),
            pool_idle_timeout: Duration::from_secs(90),
            user_agent: format!("vidler/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// HTTP client for talking to media origins.
#[derive(Clone)]
pub struct OriginClient {
    client: Client,
    config: OriginConfig,
}

impl OriginClient {
    /// Create a new origin client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying reqwest client fails to initialize.
    pub fn new(config: OriginConfig) -> Result<Self, RelayError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.read_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(RelayError::Client)?;

        Ok(Self { client, config })
    }

    /// Issue a HEAD request. Only the status and headers are transferred.
    pub async fn head(&self, uri: &str) -> Result<Response, RelayError> {
        let url = parse_origin_uri(uri)?;
        self.send(uri, self.client.head(url).send()).await
    }

    /// Issue a GET request. The body is left unread for the caller to stream.
    pub async fn get(&self, uri: &str) -> Result<Response, RelayError> {
        let url = parse_origin_uri(uri)?;
        self.send(uri, self.client.get(url).send()).await
    }

    /// Wait for the response head, bounded by `response_timeout`.
    async fn send<F>(&self, uri: &str, request: F) -> Result<Response, RelayError>
    where
        F: Future<Output = Result<Response, reqwest::Error>>,
    {
        match tokio::time::timeout(self.config.response_timeout, request).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) if e.is_timeout() => Err(RelayError::Timeout {
                uri: uri.to_string(),
            }),
            Ok(Err(e)) => Err(RelayError::Transport {
                uri: uri.to_string(),
                source: e,
            }),
            Err(_) => Err(RelayError::Timeout {
                uri: uri.to_string(),
            }),
        }
    }
}

/// Only absolute http(s) URIs are relayed.
pub fn parse_origin_uri(uri: &str) -> Result<Url, RelayError> {
    let url = Url::parse(uri).map_err(|e| RelayError::InvalidUri {
        uri: uri.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(RelayError::InvalidUri {
            uri: uri.to_string(),
            reason: format!("unsupported scheme {:?}", other),
        }),
    }
}
