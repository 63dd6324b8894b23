//! HTTP fetch client
//!
//! Thin abstraction over issuing a GET request with query parameters and
//! returning raw bytes. The [`FetchClient`] trait is the seam that lets the
//! pagination engine, image cache and detail view be tested against mock
//! transports.

use std::time::Duration;

/// Query parameter names used by the photo list API.
pub mod param {
    pub const PAGE: &str = "page";
    pub const LIMIT: &str = "limit";
}

/// Error type for fetch operations
#[derive(Debug)]
pub enum FetchError {
    InvalidUrl(String),
    NoData,
    Transport(reqwest::Error),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::InvalidUrl(url) => write!(f, "Invalid URL: {}", url),
            FetchError::NoData => write!(f, "Response contained no data"),
            FetchError::Transport(e) => write!(f, "Transport error: {}", e),
        }
    }
}

impl std::error::Error for FetchError {}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Transport(err)
    }
}

/// A GET-only transport returning raw response bytes.
///
/// `timeout` overrides the transport's default on a per-call basis; `None`
/// keeps the default.
pub trait FetchClient {
    #[allow(async_fn_in_trait)]
    async fn fetch(
        &self,
        url: &str,
        query: &[(&str, String)],
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, FetchError>;
}

/// Reqwest-backed fetch client used in production.
pub struct HttpFetchClient {
    http: reqwest::Client,
}

impl HttpFetchClient {
    /// Create a client with the given default per-request timeout.
    pub fn new(default_timeout: Duration) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(default_timeout)
            .build()?;
        Ok(Self { http })
    }
}

impl FetchClient for HttpFetchClient {
    async fn fetch(
        &self,
        url: &str,
        query: &[(&str, String)],
        timeout: Option<Duration>,
    ) -> Result<Vec<u8>, FetchError> {
        let parsed =
            reqwest::Url::parse(url).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;

        let mut request = self.http.get(parsed).query(query);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(FetchError::NoData);
        }
        Ok(bytes.to_vec())
    }
}
