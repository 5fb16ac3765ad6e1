//! Book metadata model shared by providers, merger and series grouping

use serde::{Deserialize, Serialize};

use crate::Isbn;

/// Bibliographic record as returned by one provider, or merged across several
///
/// All descriptive fields are optional because no provider fills all of them.
/// A record without a title means the provider had no data for the book.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    /// Provider-assigned id (volume id, item code, or the ISBN itself)
    pub id: String,
    /// Canonical ISBN, when the provider reported one that validates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<Isbn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Free-text volume label ("3", "第3巻", "上")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    /// Title of the individual volume within a series
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    /// Publication date as the provider wrote it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    /// Classification code with its scheme prefix, e.g. `ndc9:726.1`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,
    /// Human-readable labels for the classification, broadest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classification_labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edition: Option<String>,
    /// Physical extent, e.g. `191p ; 18cm`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
}

impl BookRecord {
    /// Empty record for `id`
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// True when the record carries a non-blank title
    pub fn has_title(&self) -> bool {
        self.title.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    /// Title for display, empty when missing
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }
}

/// `Some(value)` unless the value is blank
///
/// Providers send empty strings where they mean "unknown"; every client runs
/// its text fields through this before building a record.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
