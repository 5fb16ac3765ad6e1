//! Google Books API client
//!
//! Two lookups against `/volumes`:
//! - `q=isbn:<isbn>` for a single book
//! - `q=intitle:<query>` for every edition of a series, feeding series grouping

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

const GOOGLE_BOOKS_BASE_URL: &str = "https://www.googleapis.com/books/v1";

/// Page size for title searches (API maximum)
const SEARCH_PAGE_SIZE: u32 = 40;

#[derive(Debug, Deserialize)]
struct VolumesResponse {
    #[serde(rename = "totalItems", default)]
    total_items: u32,
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
struct Volume {
    id: String,
    #[serde(rename = "volumeInfo", default)]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct VolumeInfo {
    title: Option<String>,
    subtitle: Option<String>,
    authors: Vec<String>,
    publisher: Option<String>,
    published_date: Option<String>,
    industry_identifiers: Vec<IndustryIdentifier>,
    page_count: Option<u32>,
    categories: Vec<String>,
    image_links: Option<ImageLinks>,
}

#[derive(Debug, Deserialize)]
struct IndustryIdentifier {
    #[serde(rename = "type")]
    kind: String,
    identifier: String,
}

#[derive(Debug, Deserialize)]
struct ImageLinks {
    thumbnail: Option<String>,
}

/// Google Books client
pub struct GoogleBooksClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    rate_limiter: DefaultDirectRateLimiter,
}

impl GoogleBooksClient {
    pub fn new(settings: &SourceSettings) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_http_client(settings.timeout)?,
            base_url: GOOGLE_BOOKS_BASE_URL.to_string(),
            api_key: settings.api_key.clone(),
            rate_limiter: request_limiter(settings.requests_per_second),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn volumes_url(&self, query: &str, extra: &str) -> String {
        let mut url = format!(
            "{}/volumes?q={}{}",
            self.base_url,
            urlencoding::encode(query),
            extra
        );
        if let Some(key) = &self.api_key {
            url.push_str("&key=");
            url.push_str(&urlencoding::encode(key));
        }
        url
    }

    pub async fn lookup(&self, isbn: &Isbn) -> Result<Option<BookRecord>, SourceError> {
        let url = self.volumes_url(&format!("isbn:{}", isbn), "");
        let response: VolumesResponse =
            get_json(&self.client, &self.rate_limiter, SourceId::GoogleBooks, &url).await?;

        let record = response
            .items
            .into_iter()
            .next()
            .and_then(|volume| record_from_volume(volume, Some(isbn)));
        if let Some(record) = &record {
            tracing::debug!(isbn = %isbn, title = %record.display_title(), "Google Books hit");
        }
        Ok(record)
    }

    /// All editions whose title matches `query`; `Ok(None)` when nothing matched
    pub async fn search_title(&self, query: &str) -> Result<Option<Vec<BookRecord>>, SourceError> {
        let url = self.volumes_url(
            &format!("intitle:{}", query),
            &format!("&maxResults={}&printType=books", SEARCH_PAGE_SIZE),
        );
        let response: VolumesResponse =
            get_json(&self.client, &self.rate_limiter, SourceId::GoogleBooks, &url).await?;

        let records: Vec<BookRecord> = response
            .items
            .into_iter()
            .filter_map(|volume| record_from_volume(volume, None))
            .collect();

        tracing::debug!(
            query = %query,
            total = response.total_items,
            returned = records.len(),
            "Google Books title search"
        );

        Ok((!records.is_empty()).then_some(records))
    }
}

#[async_trait]
impl Fetcher<Isbn, BookRecord> for GoogleBooksClient {
    async fn fetch(&self, key: &Isbn) -> FetchOutcome<BookRecord> {
        into_outcome(self.lookup(key).await)
    }
}

#[async_trait]
impl Fetcher<String, Vec<BookRecord>> for GoogleBooksClient {
    async fn fetch(&self, key: &String) -> FetchOutcome<Vec<BookRecord>> {
        into_outcome(self.search_title(key).await)
    }
}

fn record_from_volume(volume: Volume, requested: Option<&Isbn>) -> Option<BookRecord> {
    let info = volume.volume_info;
    let full_title = non_blank(info.title)?;
    let (title, volume_number) = split_volume_suffix(&full_title);

    let reported = info
        .industry_identifiers
        .iter()
        .filter(|id| id.kind == "ISBN_13" || id.kind == "ISBN_10")
        .find_map(|id| Isbn::parse(&id.identifier));
    let isbn = reported.or_else(|| requested.cloned());

    Some(BookRecord {
        id: volume.id,
        isbn,
        title: Some(title),
        volume: volume_number,
        volume_title: non_blank(info.subtitle),
        authors: info.authors,
        publisher: non_blank(info.publisher),
        published: non_blank(info.published_date),
        classification: None,
        classification_labels: info.categories,
        series_title: None,
        edition: None,
        extent: info.page_count.filter(|p| *p > 0).map(|p| format!("{}p", p)),
        cover_url: info.image_links.and_then(|links| links.thumbnail),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> VolumesResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_record_from_volume() {
        let response = parse(json!({
            "totalItems": 1,
            "items": [{
                "id": "abc123",
                "volumeInfo": {
                    "title": "リーダブルコード",
                    "subtitle": "より良いコードを書くためのシンプルで実践的なテクニック",
                    "authors": ["Dustin Boswell", "Trevor Foucher"],
                    "publishedDate": "2012-06",
                    "industryIdentifiers": [
                        {"type": "ISBN_10", "identifier": "4873115655"},
                        {"type": "ISBN_13", "identifier": "9784873115658"}
                    ],
                    "pageCount": 237,
                    "categories": ["Computers"]
                }
            }]
        }));

        let volume = response.items.into_iter().next().unwrap();
        let record = record_from_volume(volume, None).unwrap();

        assert_eq!(record.id, "abc123");
        assert_eq!(record.isbn.as_ref().map(Isbn::as_str), Some("9784873115658"));
        assert_eq!(record.authors.len(), 2);
        assert_eq!(record.extent.as_deref(), Some("237p"));
        assert!(record.volume.is_none());
        assert_eq!(record.classification_labels, vec!["Computers"]);
    }

    #[test]
    fn test_zero_results() {
        let response = parse(json!({"kind": "books#volumes", "totalItems": 0}));
        assert_eq!(response.total_items, 0);
        assert!(response.items.is_empty());
    }

    #[test]
    fn test_volume_suffix_and_fallback_isbn() {
        let response = parse(json!({
            "items": [{"id": "v", "volumeInfo": {"title": "ハイキュー!! 3"}}]
        }));
        let requested = Isbn::parse("9784088725093").unwrap();
        let volume = response.items.into_iter().next().unwrap();
        let record = record_from_volume(volume, Some(&requested)).unwrap();

        assert_eq!(record.title.as_deref(), Some("ハイキュー!!"));
        assert_eq!(record.volume.as_deref(), Some("3"));
        assert_eq!(record.isbn, Some(requested));
    }
}
