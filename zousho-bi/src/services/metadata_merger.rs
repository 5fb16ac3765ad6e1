//! Cross-provider record merging
//!
//! Providers are consulted in trust order. For every field the first provider
//! with a non-empty value wins; list fields take the first non-empty list.
//! The merged identifier is always the canonical ISBN that was looked up.

use serde::{Deserialize, Serialize};
use tracing::debug;
use zousho_common::{BookRecord, Isbn};

use crate::scheduler::Settlement;
use crate::sources::SourceId;

/// Below this normalized Levenshtein similarity two values are reported as a conflict
pub const CONFLICT_SIMILARITY_THRESHOLD: f64 = 0.8;

/// Two providers disagreeing on a field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldConflict {
    pub field: &'static str,
    pub kept: String,
    pub other: String,
    pub similarity: f64,
}

/// Merged view of one ISBN across all providers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LookupState {
    /// At least one provider has not settled yet
    Pending {
        /// Best data so far, when any provider already returned a title
        #[serde(default, skip_serializing_if = "Option::is_none")]
        partial: Option<BookRecord>,
        /// A provider was rate limited and will be asked again
        retrying: bool,
    },
    /// Every provider settled and none had a title
    NotFound,
    /// Every provider settled and the merged record has a title
    Found {
        record: BookRecord,
        /// Providers that contributed data, in trust order
        sources: Vec<SourceId>,
    },
}

fn first_text(records: &[&BookRecord], field: impl Fn(&BookRecord) -> Option<&String>) -> Option<String> {
    records
        .iter()
        .filter_map(|r| field(r))
        .find(|v| !v.trim().is_empty())
        .cloned()
}

fn first_list(records: &[&BookRecord], field: impl Fn(&BookRecord) -> &Vec<String>) -> Vec<String> {
    records
        .iter()
        .map(|r| field(r))
        .find(|v| !v.is_empty())
        .cloned()
        .unwrap_or_default()
}

/// Merge records given in trust order
pub fn merge_records(isbn: &Isbn, records: &[&BookRecord]) -> BookRecord {
    for conflict in detect_conflicts(records) {
        debug!(
            isbn = %isbn,
            field = conflict.field,
            kept = %conflict.kept,
            other = %conflict.other,
            similarity = conflict.similarity,
            "Providers disagree"
        );
    }

    BookRecord {
        id: isbn.to_string(),
        isbn: Some(isbn.clone()),
        title: first_text(records, |r| r.title.as_ref()),
        volume: first_text(records, |r| r.volume.as_ref()),
        volume_title: first_text(records, |r| r.volume_title.as_ref()),
        authors: first_list(records, |r| &r.authors),
        publisher: first_text(records, |r| r.publisher.as_ref()),
        published: first_text(records, |r| r.published.as_ref()),
        classification: first_text(records, |r| r.classification.as_ref()),
        classification_labels: first_list(records, |r| &r.classification_labels),
        series_title: first_text(records, |r| r.series_title.as_ref()),
        edition: first_text(records, |r| r.edition.as_ref()),
        extent: first_text(records, |r| r.extent.as_ref()),
        cover_url: first_text(records, |r| r.cover_url.as_ref()),
    }
}

fn title_of(record: &BookRecord) -> Option<&String> {
    record.title.as_ref()
}

fn publisher_of(record: &BookRecord) -> Option<&String> {
    record.publisher.as_ref()
}

/// Title and publisher values that differ noticeably from the winning one
pub fn detect_conflicts(records: &[&BookRecord]) -> Vec<FieldConflict> {
    let mut conflicts = Vec::new();
    let fields: [(&'static str, fn(&BookRecord) -> Option<&String>); 2] =
        [("title", title_of), ("publisher", publisher_of)];

    for (field, get) in fields {
        let mut values = records
            .iter()
            .filter_map(|r| get(r))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty());
        let Some(kept) = values.next() else {
            continue;
        };
        for other in values {
            let similarity = strsim::normalized_levenshtein(kept, other);
            if similarity < CONFLICT_SIMILARITY_THRESHOLD {
                conflicts.push(FieldConflict {
                    field,
                    kept: kept.to_string(),
                    other: other.to_string(),
                    similarity,
                });
            }
        }
    }
    conflicts
}

/// Combine every provider's settlement for `isbn` (in trust order)
///
/// `None` means the provider has not settled the key yet.
pub fn resolve_lookup(
    isbn: &Isbn,
    settlements: &[(SourceId, Option<Settlement<BookRecord>>)],
) -> LookupState {
    let found: Vec<(SourceId, &BookRecord)> = settlements
        .iter()
        .filter_map(|(source, settlement)| match settlement {
            Some(Settlement::Found(record)) if record.has_title() => Some((*source, record)),
            _ => None,
        })
        .collect();
    let records: Vec<&BookRecord> = found.iter().map(|(_, r)| *r).collect();

    let retrying = settlements
        .iter()
        .any(|(_, s)| s.as_ref().is_some_and(Settlement::is_retry_pending));
    let unsettled = retrying || settlements.iter().any(|(_, s)| s.is_none());

    if unsettled {
        let partial = (!records.is_empty()).then(|| merge_records(isbn, &records));
        return LookupState::Pending { partial, retrying };
    }

    if records.is_empty() {
        return LookupState::NotFound;
    }

    LookupState::Found {
        record: merge_records(isbn, &records),
        sources: found.into_iter().map(|(source, _)| source).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn isbn() -> Isbn {
        Isbn::parse("9784088725093").unwrap()
    }

    fn record(title: Option<&str>, publisher: Option<&str>) -> BookRecord {
        BookRecord {
            title: title.map(str::to_string),
            publisher: publisher.map(str::to_string),
            ..BookRecord::new("provider-id")
        }
    }

    #[test]
    fn test_first_non_empty_wins() {
        let openbd = BookRecord {
            authors: vec![],
            ..record(Some("ONE PIECE"), None)
        };
        let rakuten = BookRecord {
            authors: vec!["尾田 栄一郎".to_string()],
            series_title: Some("ジャンプコミックス".to_string()),
            ..record(Some("ONE PIECE 1"), Some("集英社"))
        };

        let merged = merge_records(&isbn(), &[&openbd, &rakuten]);

        assert_eq!(merged.title.as_deref(), Some("ONE PIECE"));
        assert_eq!(merged.publisher.as_deref(), Some("集英社"));
        assert_eq!(merged.authors, vec!["尾田 栄一郎"]);
        assert_eq!(merged.id, "9784088725093");
        assert_eq!(merged.isbn, Some(isbn()));
    }

    #[test]
    fn test_blank_values_are_skipped() {
        let first = record(Some("  "), None);
        let second = record(Some("NARUTO"), None);
        let merged = merge_records(&isbn(), &[&first, &second]);
        assert_eq!(merged.title.as_deref(), Some("NARUTO"));
    }

    #[test]
    fn test_detect_conflicts() {
        let a = record(Some("ONE PIECE"), Some("集英社"));
        let b = record(Some("ONE PIECE"), Some("講談社"));
        let conflicts = detect_conflicts(&[&a, &b]);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].field, "publisher");
    }

    #[test]
    fn test_resolve_pending_and_retrying() {
        let found = record(Some("ONE PIECE"), None);
        let state = resolve_lookup(
            &isbn(),
            &[
                (SourceId::OpenBd, Some(Settlement::Found(found))),
                (SourceId::Rakuten, Some(Settlement::RetryPending)),
                (SourceId::GoogleBooks, Some(Settlement::NotFound)),
            ],
        );
        match state {
            LookupState::Pending { partial, retrying } => {
                assert!(retrying);
                assert_eq!(partial.unwrap().title.as_deref(), Some("ONE PIECE"));
            }
            other => panic!("expected pending, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_not_found_vs_found() {
        let none = resolve_lookup(
            &isbn(),
            &[
                (SourceId::OpenBd, Some(Settlement::NotFound)),
                (SourceId::GoogleBooks, Some(Settlement::Found(record(None, Some("x"))))),
            ],
        );
        assert_eq!(none, LookupState::NotFound);

        let found = resolve_lookup(
            &isbn(),
            &[
                (SourceId::OpenBd, Some(Settlement::NotFound)),
                (SourceId::GoogleBooks, Some(Settlement::Found(record(Some("NARUTO"), None)))),
            ],
        );
        match found {
            LookupState::Found { record, sources } => {
                assert_eq!(record.title.as_deref(), Some("NARUTO"));
                assert_eq!(sources, vec![SourceId::GoogleBooks]);
            }
            other => panic!("expected found, got {:?}", other),
        }
    }

    #[test]
    fn test_unsettled_source_keeps_pending() {
        let state = resolve_lookup(&isbn(), &[(SourceId::OpenBd, None)]);
        assert_eq!(
            state,
            LookupState::Pending {
                partial: None,
                retrying: false
            }
        );
    }
}
