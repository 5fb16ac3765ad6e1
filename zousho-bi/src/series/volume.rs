//! Volume label normalization
//!
//! Volume fields are free text ("3", "（３）", "[上巻] 2"). Everything here
//! works on the normalized form: half-width digits, no brackets, trimmed.

use once_cell::sync::Lazy;
use regex::Regex;
use zousho_common::BookRecord;

/// Volume number for records whose label carries no number
pub const UNKNOWN_VOLUME: i64 = -1;

const BRACKETS: &[char] = &[
    '(', ')', '（', '）', '[', ']', '［', '］', '{', '}', '｛', '｝', '「', '」', '『', '』', '【',
    '】', '〈', '〉', '《', '》', '<', '>',
];

static TRAILING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)$").expect("valid trailing number pattern"));

/// Half-width digits, brackets removed, trimmed
pub fn normalize_text(text: &str) -> String {
    text.chars()
        .filter(|c| !BRACKETS.contains(c))
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            _ => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Trailing integer of a normalized label, if any
fn trailing_number(normalized: &str) -> Option<i64> {
    TRAILING_NUMBER
        .captures(normalized)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Inferred volume number: from the volume label, else the volume title
pub fn volume_number(record: &BookRecord) -> i64 {
    [record.volume.as_deref(), record.volume_title.as_deref()]
        .into_iter()
        .flatten()
        .find_map(|text| trailing_number(&normalize_text(text)))
        .unwrap_or(UNKNOWN_VOLUME)
}

/// Label text left after removing the trailing number ("上巻 2" → "上巻")
pub fn residual(text: Option<&str>) -> String {
    let normalized = normalize_text(text.unwrap_or_default());
    TRAILING_NUMBER.replace(&normalized, "").trim().to_string()
}

/// Whether a group whose last member has volume `last` continues with `incoming`
///
/// Same number, next number, and the 1 ↔ unknown equivalences.
pub fn continues(last: i64, incoming: i64) -> bool {
    last == incoming
        || last == incoming - 1
        || (last == 1 && incoming == UNKNOWN_VOLUME)
        || (last == UNKNOWN_VOLUME && (incoming == 1 || incoming == 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(volume: Option<&str>, volume_title: Option<&str>) -> BookRecord {
        BookRecord {
            volume: volume.map(str::to_string),
            volume_title: volume_title.map(str::to_string),
            ..BookRecord::new("r")
        }
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text(" （１２） "), "12");
        assert_eq!(normalize_text("［上巻］"), "上巻");
        assert_eq!(normalize_text("vol.3"), "vol.3");
    }

    #[test]
    fn test_volume_number() {
        assert_eq!(volume_number(&record(Some("3"), None)), 3);
        assert_eq!(volume_number(&record(Some("（１２）"), None)), 12);
        assert_eq!(volume_number(&record(Some("上巻"), Some("第2部 2"))), 2);
        assert_eq!(volume_number(&record(Some("上巻"), None)), UNKNOWN_VOLUME);
        assert_eq!(volume_number(&record(None, None)), UNKNOWN_VOLUME);
    }

    #[test]
    fn test_residual() {
        assert_eq!(residual(Some("新装版 3")), "新装版");
        assert_eq!(residual(Some("3")), "");
        assert_eq!(residual(None), "");
    }

    #[test]
    fn test_continues() {
        assert!(continues(2, 3));
        assert!(continues(3, 3));
        assert!(!continues(3, 2));
        assert!(!continues(1, 3));
        assert!(continues(1, UNKNOWN_VOLUME));
        assert!(continues(UNKNOWN_VOLUME, 2));
        assert!(!continues(UNKNOWN_VOLUME, 3));
        assert!(continues(UNKNOWN_VOLUME, UNKNOWN_VOLUME));
    }
}
