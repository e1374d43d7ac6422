use crate::util::validate_feed_url;
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while downloading the source feed.
///
/// Every variant is fatal for the run: there is no retry.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The configured URL is unusable (unparseable, or not http/https)
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(String),
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// The request and body download together exceeded the timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
    /// Response body is not UTF-8
    #[error("Feed is not valid UTF-8")]
    InvalidUtf8,
}

/// Builds the HTTP client used for the feed request.
///
/// Some hosts reject requests without a browser-like `User-Agent`, so one is
/// always sent.
pub fn build_client(user_agent: &str) -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .build()
        .map_err(FetchError::Network)
}

/// Downloads the feed at `url` and returns its body as text.
///
/// # Errors
///
/// - [`FetchError::InvalidUrl`] - URL does not parse or is not http(s)
/// - [`FetchError::Timeout`] - send plus body read exceeded `timeout`
/// - [`FetchError::HttpStatus`] - non-2xx response (including 5xx; no retry)
/// - [`FetchError::Network`] - connection or TLS errors
/// - [`FetchError::ResponseTooLarge`] - body exceeded 10MB
/// - [`FetchError::InvalidUtf8`] - body is not UTF-8
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<String, FetchError> {
    let url = validate_feed_url(url).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;

    let bytes = tokio::time::timeout(timeout, fetch_bytes(client, url))
        .await
        .map_err(|_| FetchError::Timeout(timeout))??;

    let text = String::from_utf8(bytes).map_err(|_| FetchError::InvalidUtf8)?;
    tracing::debug!(bytes = text.len(), "Feed downloaded");

    // quick-xml does not skip a leading byte order mark in &str input.
    match text.strip_prefix('\u{feff}') {
        Some(stripped) => Ok(stripped.to_string()),
        None => Ok(text),
    }
}

async fn fetch_bytes(client: &reqwest::Client, url: Url) -> Result<Vec<u8>, FetchError> {
    let response = client.get(url.clone()).send().await?;

    if !response.status().is_success() {
        tracing::warn!(url = %url, status = %response.status(), "Feed request failed");
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    read_limited_bytes(response, MAX_FEED_SIZE).await
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
