//! Bibliographic data providers
//!
//! Each client turns one HTTP API into a [`Fetcher`](crate::scheduler::Fetcher)
//! keyed by [`Isbn`](zousho_common::Isbn). Listed in trust priority order:
//! openBD, Rakuten Books, Google Books.

pub mod google_books_client;
pub mod openbd_client;
pub mod rakuten_client;

pub use google_books_client::GoogleBooksClient;
pub use openbd_client::OpenBdClient;
pub use rakuten_client::RakutenBooksClient;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;

use crate::scheduler::FetchOutcome;

const USER_AGENT: &str = concat!("zousho/", env!("CARGO_PKG_VERSION"));

/// Provider identity, in trust priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    #[serde(rename = "openbd")]
    OpenBd,
    Rakuten,
    GoogleBooks,
}

impl SourceId {
    /// All providers, most trusted first
    pub const PRIORITY: [SourceId; 3] = [Self::OpenBd, Self::Rakuten, Self::GoogleBooks];

    pub fn name(self) -> &'static str {
        match self {
            Self::OpenBd => "openbd",
            Self::Rakuten => "rakuten",
            Self::GoogleBooks => "google_books",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Provider client errors
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Not found")]
    NotFound,

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl<V> From<SourceError> for FetchOutcome<V> {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::RateLimitExceeded => FetchOutcome::RateLimited,
            SourceError::NotFound => FetchOutcome::Empty,
            other => FetchOutcome::Error(other.to_string()),
        }
    }
}

/// Fold a client result into a fetch outcome; `Ok(None)` means no data
pub(crate) fn into_outcome<V>(result: Result<Option<V>, SourceError>) -> FetchOutcome<V> {
    match result {
        Ok(Some(value)) => FetchOutcome::Success(value),
        Ok(None) => FetchOutcome::Empty,
        Err(e) => e.into(),
    }
}

pub(crate) fn build_http_client(timeout: Duration) -> Result<Client, SourceError> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| SourceError::NetworkError(e.to_string()))
}

/// Token bucket capping raw requests per second
pub(crate) fn request_limiter(requests_per_second: u32) -> DefaultDirectRateLimiter {
    let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
    RateLimiter::direct(Quota::per_second(rps))
}

/// GET `url` and decode JSON, mapping HTTP status to [`SourceError`]
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    limiter: &DefaultDirectRateLimiter,
    source: SourceId,
    url: &str,
) -> Result<T, SourceError> {
    limiter.until_ready().await;

    tracing::trace!(source = %source, url = %url, "Provider request");

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| SourceError::NetworkError(e.to_string()))?;

    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
        return Err(SourceError::RateLimitExceeded);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(SourceError::NotFound);
    }
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(SourceError::ApiError(status.as_u16(), error_text));
    }

    response
        .json()
        .await
        .map_err(|e| SourceError::ParseError(e.to_string()))
}

static VOLUME_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*?\S)[\s　]*[(（\[［]?([0-9０-９]+)[)）\]］]?$").expect("valid volume suffix pattern")
});

/// Split a trailing volume number off a title ("ONE PIECE 12" → "ONE PIECE", "12")
///
/// Requires whitespace or a bracket before the number so titles that merely
/// end in digits ("2001", "1Q84") stay whole.
pub fn split_volume_suffix(title: &str) -> (String, Option<String>) {
    let trimmed = title.trim();
    if let Some(caps) = VOLUME_SUFFIX.captures(trimmed) {
        if let (Some(base), Some(number)) = (caps.get(1), caps.get(2)) {
            let separator = &trimmed[base.end()..number.start()];
            if !separator.is_empty() {
                return (base.as_str().trim().to_string(), Some(number.as_str().to_string()));
            }
        }
    }
    (trimmed.to_string(), None)
}
