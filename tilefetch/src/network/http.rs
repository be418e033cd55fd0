//! HTTP client abstraction for testability

use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default User-Agent sent with tile requests.
pub const DEFAULT_USER_AGENT: &str = concat!("tilefetch/", env!("CARGO_PKG_VERSION"));

/// HTTP status meaning the tile definitively does not exist.
pub const STATUS_NOT_FOUND: u16 = 404;

/// Transport-level errors.
///
/// HTTP status codes are not errors at this level; they are returned in
/// [`FetchResponse`] so callers can tell "not found" apart from a fault.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// The request was canceled before it completed.
    #[error("Request canceled")]
    Canceled,

    /// Connection, timeout or body read failure.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl NetworkError {
    /// Returns true if this error is a cancellation signal.
    pub fn is_canceled(&self) -> bool {
        matches!(self, NetworkError::Canceled)
    }
}

/// A completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: Bytes,
}

impl FetchResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 404 status.
    pub fn is_not_found(&self) -> bool {
        self.status == STATUS_NOT_FOUND
    }
}

/// Async fetch primitive used by tile fetch tasks.
///
/// Implementations must be safe to share between concurrent fetches.
/// The `cancel` token is forwarded from the owning task; implementations
/// should stop work promptly and return [`NetworkError::Canceled`] once it
/// fires, although callers tolerate a late result.
pub trait NetworkClient: Send + Sync {
    /// Performs an HTTP GET.
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<FetchResponse, NetworkError>>;
}

/// Network client backed by `reqwest`.
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a client with the default timeout and User-Agent.
    pub fn new() -> Result<Self, NetworkError> {
        Self::with_config(DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT)
    }

    /// Creates a client with a custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, NetworkError> {
        Self::with_config(timeout_secs, DEFAULT_USER_AGENT)
    }

    /// Creates a client with a custom timeout and User-Agent.
    pub fn with_config(timeout_secs: u64, user_agent: &str) -> Result<Self, NetworkError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| NetworkError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<FetchResponse, NetworkError> {
        trace!(url = url, "HTTP GET request starting");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| NetworkError::Transport(format!("Request failed: {}", e)))?;

        let status = response.status().as_u16();
        debug!(url = url, status = status, "HTTP response received");

        let body = response
            .bytes()
            .await
            .map_err(|e| NetworkError::Transport(format!("Failed to read response: {}", e)))?;

        Ok(FetchResponse { status, body })
    }
}

impl NetworkClient for ReqwestClient {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<FetchResponse, NetworkError>> {
        Box::pin(async move {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    trace!(url = url, "HTTP GET canceled");
                    Err(NetworkError::Canceled)
                }
                result = self.get(url) => result,
            }
        })
    }
}
