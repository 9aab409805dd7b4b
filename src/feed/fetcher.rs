use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

use crate::feed::parser::{parse_document, ParseError, RawFeedDocument};

const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while retrieving and parsing one feed document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Request exceeded the 30-second timeout
    #[error("request timed out")]
    Timeout,
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Response body exceeded the 10MB size limit
    #[error("response too large")]
    TooLarge,
    /// Document retrieved but not parseable as a feed
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Retrieves a feed document and parses it into a [`RawFeedDocument`].
///
/// One shot: no automatic retries. A failing source is reported to the
/// caller, who decides whether it aborts anything (the aggregation engine
/// swallows it; the feed endpoint surfaces it).
///
/// # Errors
///
/// Returns [`FetchError`] on network failure, timeout, non-2xx status,
/// oversized response, or an unparseable document.
pub async fn fetch_and_parse(
    client: &reqwest::Client,
    url: &str,
) -> Result<RawFeedDocument, FetchError> {
    let response = tokio::time::timeout(FETCH_TIMEOUT, client.get(url).send())
        .await
        .map_err(|_| FetchError::Timeout)?
        .map_err(FetchError::Network)?;

    if !response.status().is_success() {
        return Err(FetchError::HttpStatus(response.status().as_u16()));
    }

    let bytes = read_limited_bytes(response, MAX_FEED_SIZE).await?;

    Ok(parse_document(&bytes)?)
}

/// Reads a response body with a hard size limit using stream-based reading.
async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::TooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::TooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
