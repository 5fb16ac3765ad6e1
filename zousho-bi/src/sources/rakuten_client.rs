//! Rakuten Books API client
//!
//! Uses `BooksBook/Search` with `formatVersion=2`. Requires an application id;
//! without one the provider stays disabled. Rakuten titles carry the volume
//! number inline ("ONE PIECE 12"), so it is split back out here.

use async_trait::async_trait;
use governor::DefaultDirectRateLimiter;
use reqwest::Client;
use serde::Deserialize;
use zousho_common::book::non_blank;
use zousho_common::config::SourceSettings;
use zousho_common::{BookRecord, Isbn};

use super::{
    build_http_client, get_json, into_outcome, request_limiter, split_volume_suffix, SourceError,
    SourceId,
};
use crate::scheduler::{FetchOutcome, Fetcher};

const RAKUTEN_BASE_URL: &str = "https://app.rakuten.co.jp/services/api/BooksBook/Search/20170404";

#[derive(Debug, Deserialize)]
struct RakutenResponse {
    #[serde(rename = "Items", default)]
    items: Vec<RakutenItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RakutenItem {
    title: String,
    sub_title: String,
    series_name: String,
    author: String,
    publisher_name: String,
    size: String,
    isbn: String,
    sales_date: String,
    large_image_url: String,
    books_genre_id: String,
}

/// Rakuten Books client
pub struct RakutenBooksClient {
    client: Client,
    base_url: String,
    application_id: String,
    rate_limiter: DefaultDirectRateLimiter,
}

impl RakutenBooksClient {
    pub fn new(settings: &SourceSettings, application_id: String) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_http_client(settings.timeout)?,
            base_url: RAKUTEN_BASE_URL.to_string(),
            application_id,
            rate_limiter: request_limiter(settings.requests_per_second),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub async fn lookup(&self, isbn: &Isbn) -> Result<Option<BookRecord>, SourceError> {
        let url = format!(
            "{}?format=json&formatVersion=2&isbn={}&applicationId={}",
            self.base_url,
            isbn,
            urlencoding::encode(&self.application_id)
        );
        let response: RakutenResponse =
            get_json(&self.client, &self.rate_limiter, SourceId::Rakuten, &url).await?;

        let record = response
            .items
            .into_iter()
            .next()
            .and_then(|item| record_from_item(isbn, item));
        if let Some(record) = &record {
            tracing::debug!(isbn = %isbn, title = %record.display_title(), "Rakuten hit");
        }
        Ok(record)
    }
}

#[async_trait]
impl Fetcher<Isbn, BookRecord> for RakutenBooksClient {
    async fn fetch(&self, key: &Isbn) -> FetchOutcome<BookRecord> {
        into_outcome(self.lookup(key).await)
    }
}

fn record_from_item(requested: &Isbn, item: RakutenItem) -> Option<BookRecord> {
    let full_title = non_blank(Some(item.title))?;
    let (title, volume) = split_volume_suffix(&full_title);
    let isbn = Isbn::parse(&item.isbn).unwrap_or_else(|| requested.clone());

    // "001001001008/001001001009": keep the first genre path
    let genre = item.books_genre_id.split('/').next().unwrap_or_default().to_string();

    Some(BookRecord {
        id: isbn.to_string(),
        isbn: Some(isbn),
        title: Some(title),
        volume,
        volume_title: non_blank(Some(item.sub_title)),
        authors: item
            .author
            .split('/')
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect(),
        publisher: non_blank(Some(item.publisher_name)),
        published: non_blank(Some(item.sales_date)),
        classification: non_blank(Some(genre)).map(|g| format!("rakuten:{}", g)),
        classification_labels: non_blank(Some(item.size)).into_iter().collect(),
        series_title: non_blank(Some(item.series_name)),
        edition: None,
        extent: None,
        cover_url: non_blank(Some(item.large_image_url)),
    })
}
