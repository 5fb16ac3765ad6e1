//! Pairwise scoring rules for volume grouping
//!
//! Each rule compares a group member with an incoming record and returns a
//! score contribution. Rules flagged `requires_title_match` only count when
//! the titles match. A title mismatch scores -1 and only the ungated rules
//! are added to it.

use std::collections::HashSet;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use zousho_common::similarity::string_similarity;
use zousho_common::BookRecord;

use super::volume::{normalize_text, residual};

/// N-gram similarity at or above which two titles are the same title
pub const TITLE_SIMILARITY_THRESHOLD: f64 = 0.9;

/// Score for two records with the same ISBN
pub const IDENTIFIER_SCORE: i32 = 1000;

/// Publication dates this close count as the same printing window
pub const PUBLICATION_WINDOW_DAYS: i64 = 50;

/// A named scoring rule
#[derive(Clone, Copy)]
pub struct ScoringRule {
    pub name: &'static str,
    pub requires_title_match: bool,
    pub score: fn(&BookRecord, &BookRecord) -> i32,
}

impl std::fmt::Debug for ScoringRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoringRule")
            .field("name", &self.name)
            .field("requires_title_match", &self.requires_title_match)
            .finish()
    }
}

/// Rules in evaluation order
pub const RULES: &[ScoringRule] = &[
    ScoringRule {
        name: "identifier",
        requires_title_match: false,
        score: identifier,
    },
    ScoringRule {
        name: "title",
        requires_title_match: false,
        score: title,
    },
    ScoringRule {
        name: "edition",
        requires_title_match: true,
        score: edition,
    },
    ScoringRule {
        name: "volume_residual",
        requires_title_match: true,
        score: volume_residual,
    },
    ScoringRule {
        name: "volume_title_residual",
        requires_title_match: true,
        score: volume_title_residual,
    },
    ScoringRule {
        name: "extent",
        requires_title_match: true,
        score: extent,
    },
    ScoringRule {
        name: "classification",
        requires_title_match: true,
        score: classification,
    },
    ScoringRule {
        name: "publication_window",
        requires_title_match: false,
        score: publication_window,
    },
    ScoringRule {
        name: "series_title",
        requires_title_match: true,
        score: series_title,
    },
];

/// Exact title match, or n-gram similarity above the threshold
pub fn title_matches(a: &BookRecord, b: &BookRecord) -> bool {
    let (Some(ta), Some(tb)) = (a.title.as_deref(), b.title.as_deref()) else {
        return false;
    };
    let (ta, tb) = (ta.trim(), tb.trim());
    if ta.is_empty() || tb.is_empty() {
        return false;
    }
    ta == tb || string_similarity(ta, tb) >= TITLE_SIMILARITY_THRESHOLD
}

/// Total score of `incoming` against group member `member`
pub fn score_pair(member: &BookRecord, incoming: &BookRecord) -> i32 {
    score_breakdown(member, incoming)
        .into_iter()
        .map(|(_, score)| score)
        .sum()
}

/// Per-rule contributions, skipping gated rules when titles differ
pub fn score_breakdown(member: &BookRecord, incoming: &BookRecord) -> Vec<(&'static str, i32)> {
    let title_match = title_matches(member, incoming);
    RULES
        .iter()
        .filter(|rule| title_match || !rule.requires_title_match)
        .map(|rule| (rule.name, (rule.score)(member, incoming)))
        .collect()
}

fn identifier(a: &BookRecord, b: &BookRecord) -> i32 {
    match (&a.isbn, &b.isbn) {
        (Some(x), Some(y)) if x == y => IDENTIFIER_SCORE,
        _ => 0,
    }
}

fn title(a: &BookRecord, b: &BookRecord) -> i32 {
    if title_matches(a, b) {
        1
    } else {
        -1
    }
}

/// +1 when both texts are present and equal after normalization
fn same_text(a: Option<&str>, b: Option<&str>) -> i32 {
    let a = normalize_text(a.unwrap_or_default());
    let b = normalize_text(b.unwrap_or_default());
    i32::from(!a.is_empty() && a == b)
}

fn edition(a: &BookRecord, b: &BookRecord) -> i32 {
    same_text(a.edition.as_deref(), b.edition.as_deref())
}

fn volume_residual(a: &BookRecord, b: &BookRecord) -> i32 {
    let (ra, rb) = (residual(a.volume.as_deref()), residual(b.volume.as_deref()));
    i32::from(!ra.is_empty() && ra == rb)
}

fn volume_title_residual(a: &BookRecord, b: &BookRecord) -> i32 {
    let (ra, rb) = (
        residual(a.volume_title.as_deref()),
        residual(b.volume_title.as_deref()),
    );
    i32::from(!ra.is_empty() && ra == rb)
}

static PAGE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[\d,]+\s*(pp\.?|p\.?|ページ|頁)").expect("valid page token pattern")
});

static CM_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*cm").expect("valid cm token pattern"));

static EXTENT_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[;；,、+＋×✕*\s]+").expect("valid extent separator pattern"));

/// Physical description tokens with page counts removed ("216p ; 18cm" → {"18cm"})
pub fn extent_tokens(extent: &str) -> HashSet<String> {
    let normalized = normalize_text(extent).to_lowercase();
    let without_pages = PAGE_TOKEN.replace_all(&normalized, " ");
    let compact_cm = CM_TOKEN.replace_all(&without_pages, "${1}cm");
    EXTENT_SEPARATORS
        .split(&compact_cm)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

fn extent(a: &BookRecord, b: &BookRecord) -> i32 {
    let (Some(ea), Some(eb)) = (a.extent.as_deref(), b.extent.as_deref()) else {
        return 0;
    };
    let shared = extent_tokens(ea).intersection(&extent_tokens(eb)).count();
    shared as i32
}

/// Classification code without its scheme prefix ("ccode:0979" → "0979")
fn bare_classification(code: &str) -> &str {
    code.split_once(':').map_or(code, |(_, rest)| rest).trim()
}

fn classification(a: &BookRecord, b: &BookRecord) -> i32 {
    match (a.classification.as_deref(), b.classification.as_deref()) {
        (Some(x), Some(y)) => {
            let (x, y) = (bare_classification(x), bare_classification(y));
            i32::from(!x.is_empty() && x == y)
        }
        _ => 0,
    }
}

static DATE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})(?:[-/.年]?(\d{1,2}))?(?:[-/.月]?(\d{1,2}))?")
        .expect("valid date pattern")
});

/// Lenient publication date: "2012-06-15", "20120615", "2012年6月", "2012"
///
/// Missing month or day default to 1.
pub fn parse_publication_date(text: &str) -> Option<NaiveDate> {
    let normalized = normalize_text(text);
    let caps = DATE_PREFIX.captures(&normalized)?;
    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let month: u32 = caps.get(2).map_or(Some(1), |m| m.as_str().parse().ok())?;
    let day: u32 = caps.get(3).map_or(Some(1), |m| m.as_str().parse().ok())?;
    NaiveDate::from_ymd_opt(year, month.max(1), day.max(1))
}

fn publication_window(a: &BookRecord, b: &BookRecord) -> i32 {
    if a.edition == b.edition {
        return 0;
    }
    let dates = a
        .published
        .as_deref()
        .and_then(parse_publication_date)
        .zip(b.published.as_deref().and_then(parse_publication_date));
    match dates {
        Some((da, db)) => i32::from((da - db).num_days().abs() <= PUBLICATION_WINDOW_DAYS),
        None => 0,
    }
}

fn series_tokens(series: &str) -> HashSet<String> {
    series
        .split([';', '；'])
        .map(normalize_text)
        .filter(|token| !token.is_empty())
        .collect()
}

fn series_title(a: &BookRecord, b: &BookRecord) -> i32 {
    let (Some(sa), Some(sb)) = (a.series_title.as_deref(), b.series_title.as_deref()) else {
        return 0;
    };
    series_tokens(sa).intersection(&series_tokens(sb)).count() as i32
}
