//! openBD API client
//!
//! `GET /v1/get?isbn=...` returns a JSON array with one entry per requested
//! ISBN: `null` when unknown, otherwise a `summary` block plus the raw ONIX
//! record. The summary covers title, volume, series, publisher, date, cover
//! and authors; the C-code subject and page extent come from ONIX.

use async_trait::async_trait;
use governor::DefaultDirectRateLimiter;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use zousho_common::book::non_blank;
use zousho_common::config::SourceSettings;
use zousho_common::{BookRecord, Isbn};

use super::{build_http_client, get_json, into_outcome, request_limiter, SourceError, SourceId};
use crate::scheduler::{FetchOutcome, Fetcher};

const OPENBD_BASE_URL: &str = "https://api.openbd.jp/v1";

/// ONIX subject scheme for the Japanese C-code
const ONIX_SCHEME_CCODE: &str = "78";

/// ONIX extent type for main content page count
const ONIX_EXTENT_PAGES: &str = "11";

/// ONIX measure type for height
const ONIX_MEASURE_HEIGHT: &str = "01";

#[derive(Debug, Deserialize)]
struct OpenBdEntry {
    summary: OpenBdSummary,
    #[serde(default)]
    onix: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OpenBdSummary {
    isbn: String,
    title: String,
    volume: String,
    series: String,
    publisher: String,
    pubdate: String,
    cover: String,
    author: String,
}

/// openBD client
pub struct OpenBdClient {
    client: Client,
    base_url: String,
    rate_limiter: DefaultDirectRateLimiter,
}

impl OpenBdClient {
    pub fn new(settings: &SourceSettings) -> Result<Self, SourceError> {
        Ok(Self {
            client: build_http_client(settings.timeout)?,
            base_url: OPENBD_BASE_URL.to_string(),
            rate_limiter: request_limiter(settings.requests_per_second),
        })
    }

    /// Point the client at another host (mirrors, tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Look up one ISBN; `Ok(None)` when openBD has no entry
    pub async fn lookup(&self, isbn: &Isbn) -> Result<Option<BookRecord>, SourceError> {
        let url = format!("{}/get?isbn={}", self.base_url, isbn);
        let entries: Vec<Option<Value>> =
            get_json(&self.client, &self.rate_limiter, SourceId::OpenBd, &url).await?;

        let Some(Some(raw)) = entries.into_iter().next() else {
            return Ok(None);
        };
        let entry: OpenBdEntry =
            serde_json::from_value(raw).map_err(|e| SourceError::ParseError(e.to_string()))?;

        let record = record_from_entry(isbn, entry);
        if let Some(record) = &record {
            tracing::debug!(isbn = %isbn, title = %record.display_title(), "openBD hit");
        }
        Ok(record)
    }
}

#[async_trait]
impl Fetcher<Isbn, BookRecord> for OpenBdClient {
    async fn fetch(&self, key: &Isbn) -> FetchOutcome<BookRecord> {
        into_outcome(self.lookup(key).await)
    }
}

fn record_from_entry(requested: &Isbn, entry: OpenBdEntry) -> Option<BookRecord> {
    let summary = entry.summary;
    let title = non_blank(Some(summary.title))?;

    let isbn = Isbn::parse(&summary.isbn).unwrap_or_else(|| requested.clone());
    let onix = entry.onix.unwrap_or(Value::Null);
    let detail = &onix["DescriptiveDetail"];

    Some(BookRecord {
        id: isbn.to_string(),
        isbn: Some(isbn),
        title: Some(title),
        volume: non_blank(Some(summary.volume)),
        volume_title: onix_part_title(detail),
        authors: parse_authors(&summary.author),
        publisher: non_blank(Some(summary.publisher)),
        published: non_blank(Some(summary.pubdate)),
        classification: onix_ccode(detail).map(|code| format!("ccode:{}", code)),
        classification_labels: Vec::new(),
        series_title: non_blank(Some(summary.series)),
        edition: detail["EditionStatement"].as_str().and_then(|s| non_blank(Some(s.to_string()))),
        extent: onix_extent(detail),
        cover_url: non_blank(Some(summary.cover)),
    })
}

/// "尾田栄一郎／著 山田太郎／イラスト" → ["尾田栄一郎", "山田太郎"]
fn parse_authors(raw: &str) -> Vec<String> {
    raw.split([' ', '　', ','])
        .filter_map(|part| {
            let name = part.split(['／', '/']).next().unwrap_or_default().trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect()
}

fn onix_ccode(detail: &Value) -> Option<String> {
    detail["Subject"].as_array()?.iter().find_map(|subject| {
        (subject["SubjectSchemeIdentifier"].as_str() == Some(ONIX_SCHEME_CCODE))
            .then(|| subject["SubjectCode"].as_str().map(str::to_string))
            .flatten()
    })
}

fn onix_part_title(detail: &Value) -> Option<String> {
    let part = &detail["TitleDetail"]["TitleElement"]["PartNumber"];
    part.as_str().and_then(|s| non_blank(Some(s.to_string())))
}

/// "192p ; 18cm" from the page-count extent and height measure
fn onix_extent(detail: &Value) -> Option<String> {
    let pages = detail["Extent"].as_array().and_then(|extents| {
        extents.iter().find_map(|extent| {
            (extent["ExtentType"].as_str() == Some(ONIX_EXTENT_PAGES))
                .then(|| extent["ExtentValue"].as_str().map(|v| format!("{}p", v)))
                .flatten()
        })
    });
    let height = detail["Measure"].as_array().and_then(|measures| {
        measures.iter().find_map(|measure| {
            if measure["MeasureType"].as_str() != Some(ONIX_MEASURE_HEIGHT) {
                return None;
            }
            let value = measure["Measurement"].as_str()?;
            let unit = measure["MeasureUnitCode"].as_str().unwrap_or("cm");
            Some(format!("{}{}", value, unit))
        })
    });

    match (pages, height) {
        (Some(p), Some(h)) => Some(format!("{} ; {}", p, h)),
        (p, h) => p.or(h),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn isbn() -> Isbn {
        Isbn::parse("9784088725093").unwrap()
    }

    fn entry(value: Value) -> OpenBdEntry {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_record_from_full_entry() {
        let record = record_from_entry(
            &isbn(),
            entry(json!({
                "summary": {
                    "isbn": "9784088725093",
                    "title": "ONE PIECE",
                    "volume": "1",
                    "series": "ジャンプ・コミックス",
                    "publisher": "集英社",
                    "pubdate": "19971224",
                    "cover": "https://cover.openbd.jp/9784088725093.jpg",
                    "author": "尾田栄一郎／著"
                },
                "onix": {
                    "DescriptiveDetail": {
                        "Subject": [
                            {"SubjectSchemeIdentifier": "79", "SubjectCode": "01"},
                            {"SubjectSchemeIdentifier": "78", "SubjectCode": "0979"}
                        ],
                        "Extent": [{"ExtentType": "11", "ExtentValue": "216", "ExtentUnit": "03"}],
                        "Measure": [{"MeasureType": "01", "Measurement": "18", "MeasureUnitCode": "cm"}]
                    }
                }
            })),
        )
        .unwrap();

        assert_eq!(record.title.as_deref(), Some("ONE PIECE"));
        assert_eq!(record.volume.as_deref(), Some("1"));
        assert_eq!(record.authors, vec!["尾田栄一郎"]);
        assert_eq!(record.classification.as_deref(), Some("ccode:0979"));
        assert_eq!(record.extent.as_deref(), Some("216p ; 18cm"));
        assert_eq!(record.isbn, Some(isbn()));
    }

    #[test]
    fn test_blank_title_means_no_data() {
        let record = record_from_entry(&isbn(), entry(json!({"summary": {"title": ""}})));
        assert!(record.is_none());
    }

    #[test]
    fn test_missing_onix_is_tolerated() {
        let record =
            record_from_entry(&isbn(), entry(json!({"summary": {"title": "X", "isbn": "bogus"}})))
                .unwrap();
        assert_eq!(record.isbn, Some(isbn()));
        assert!(record.extent.is_none());
        assert!(record.classification.is_none());
    }

    #[test]
    fn test_parse_authors_strips_roles() {
        assert_eq!(
            parse_authors("荒木飛呂彦／著 山田太郎/イラスト"),
            vec!["荒木飛呂彦", "山田太郎"]
        );
        assert!(parse_authors("").is_empty());
    }
}
