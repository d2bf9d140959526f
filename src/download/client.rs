//! HTTP client wrapper for transfer requests.
//!
//! This module provides the `HttpClient` struct which issues the streaming
//! GET for a transfer with proper timeout configuration and error mapping.

use std::time::Duration;

use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE};
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use super::constants::CONNECT_TIMEOUT_SECS;
use super::error::DownloadError;
use crate::user_agent;

/// Browser User-Agent sent by probe requests.
///
/// Some hosts only attach Content-Disposition for browser-looking clients.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// HTTP client for transfer requests.
///
/// This client is designed to be created once and shared by every transfer,
/// taking advantage of connection pooling. Cloning is cheap.
///
/// # Example
///
/// ```no_run
/// use multiloader_core::download::HttpClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new();
/// let response = client.get("https://example.com/file.bin", "https://example.com/file.bin").await?;
/// println!("status: {}", response.status());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with a 30 second connect timeout and no
    /// overall transfer deadline.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeouts(Duration::from_secs(CONNECT_TIMEOUT_SECS), None)
    }

    /// Creates a new HTTP client with explicit timeouts.
    ///
    /// `transfer_timeout` bounds a whole transfer, body included. `None`
    /// leaves it unbounded, so a stalled peer blocks that transfer until it
    /// is cancelled.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_timeouts(connect_timeout: Duration, transfer_timeout: Option<Duration>) -> Self {
        let mut builder = Client::builder()
            .connect_timeout(connect_timeout)
            // Bytes on disk must match the served Content-Length
            .gzip(false)
            .user_agent(user_agent::default_download_user_agent());
        if let Some(timeout) = transfer_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Sends a GET to `request_url` and requires a `200 OK` answer.
    ///
    /// `display_url` is what ends up in errors and logs; callers pass the
    /// URL without any appended token.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The URL is invalid
    /// - The request fails (network error, timeout)
    /// - The server returns any status other than 200
    #[instrument(skip(self, request_url), fields(url = %display_url))]
    pub async fn get(
        &self,
        request_url: &str,
        display_url: &str,
    ) -> Result<reqwest::Response, DownloadError> {
        let parsed =
            url::Url::parse(request_url).map_err(|_| DownloadError::invalid_url(display_url))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| DownloadError::network(display_url, e))?;

        let status = response.status();
        if status != StatusCode::OK {
            debug!(status = status.as_u16(), "non-OK response");
            return Err(DownloadError::http_status(display_url, status.as_u16()));
        }

        Ok(response)
    }
}

/// Reads the `Content-Length` header.
///
/// The header is read directly because `Response::content_length` reports the
/// body size hint, which is zero for HEAD responses.
pub(crate) fn content_length(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
}

/// Reads the total from a `Content-Range: bytes <start>-<end>/<total>` header.
pub(crate) fn content_range_total(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(CONTENT_RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_content_range_total)
}

fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse::<u64>().ok()
}
