//! ISBN canonicalization
//!
//! Every lookup in zousho is keyed by a validated 13-digit ISBN. Raw input
//! arrives from barcode scans, pasted text and provider payloads in any of the
//! usual notations (hyphenated, spaced, full-width digits, ISBN-10), so all of
//! it goes through [`Isbn::parse`] first. Parsing never panics and never
//! produces an [`Isbn`] holding an invalid value.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Prefix shared by every ISBN-10 when expressed as ISBN-13
const BOOKLAND_PREFIX: &str = "978";

/// Prefix of the ISBN-13 range with no ISBN-10 equivalent
const MUSICLAND_PREFIX: &str = "979";

/// Registration group handled by [`with_hyphens`]
const JAPAN_GROUP: char = '4';

/// Publisher-code ranges for registration group 4.
///
/// `(code length, lowest code, highest code)`. Publisher and title digits
/// always add up to 8, so a longer publisher code leaves a shorter title code.
const JAPAN_PUBLISHER_RANGES: [(usize, u32, u32); 6] = [
    (2, 0, 19),
    (3, 200, 699),
    (4, 7000, 8499),
    (5, 85000, 89999),
    (6, 900000, 949999),
    (7, 9500000, 9999999),
];

/// Validated 13-digit ISBN
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Isbn(String);

impl Isbn {
    /// Parse an ISBN-10 or ISBN-13 in any common notation
    ///
    /// Returns `None` when the input has the wrong length, contains anything
    /// other than digits (plus a trailing `X` in the 10-digit form), or fails
    /// its check digit.
    pub fn parse(raw: &str) -> Option<Self> {
        let digits = normalize(raw)?;
        match digits.len() {
            10 => {
                if !is_valid_isbn10(&digits) {
                    return None;
                }
                let body = format!("{}{}", BOOKLAND_PREFIX, &digits[..9]);
                let check = isbn13_check_digit(&body)?;
                Some(Self(format!("{}{}", body, check)))
            }
            13 => {
                if !digits.starts_with(BOOKLAND_PREFIX) && !digits.starts_with(MUSICLAND_PREFIX) {
                    return None;
                }
                if !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                let check = isbn13_check_digit(&digits[..12])?;
                if digits.ends_with(check) {
                    Some(Self(digits))
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// The 13 canonical digits
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Legacy 10-digit form, or `None` for the 979 range
    pub fn to_isbn10(&self) -> Option<String> {
        let body = self.0.strip_prefix(BOOKLAND_PREFIX)?;
        let body = &body[..9];
        let check = isbn10_check_digit(body)?;
        Some(format!("{}{}", body, check))
    }

    /// Registration group digit for the 978 range
    pub fn group(&self) -> Option<char> {
        self.0
            .strip_prefix(BOOKLAND_PREFIX)
            .and_then(|rest| rest.chars().next())
    }

    /// Hyphenated form, see [`with_hyphens`]
    pub fn hyphenated(&self, length: usize) -> Option<String> {
        with_hyphens(&self.0, length)
    }
}

impl fmt::Display for Isbn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Isbn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| Error::InvalidInput(format!("Invalid ISBN: {}", s)))
    }
}

impl TryFrom<String> for Isbn {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Isbn> for String {
    fn from(isbn: Isbn) -> Self {
        isbn.0
    }
}

impl AsRef<str> for Isbn {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Canonical 13-digit form of `raw`
pub fn to13(raw: &str) -> Option<String> {
    Isbn::parse(raw).map(String::from)
}

/// 10-digit form of `raw` (which may itself be ISBN-10 or ISBN-13)
pub fn to10(raw: &str) -> Option<String> {
    Isbn::parse(raw)?.to_isbn10()
}

/// Hyphenate an ISBN from registration group 4
///
/// `length` selects the output form (10 or 13). Identifiers outside group 4,
/// or 979 identifiers requested as ISBN-10, return `None`.
///
/// ```
/// use zousho_common::isbn::with_hyphens;
///
/// assert_eq!(with_hyphens("4873113946", 13).as_deref(), Some("978-4-87311-394-4"));
/// assert_eq!(with_hyphens("9784873113944", 10).as_deref(), Some("4-87311-394-6"));
/// ```
pub fn with_hyphens(raw: &str, length: usize) -> Option<String> {
    let isbn = Isbn::parse(raw)?;
    if isbn.group() != Some(JAPAN_GROUP) {
        return None;
    }

    // 8 publisher + title digits after "978" + group
    let body = &isbn.as_str()[4..12];
    let publisher_len = japan_publisher_length(body)?;
    let (publisher, title) = body.split_at(publisher_len);

    match length {
        13 => {
            let check = &isbn.as_str()[12..];
            Some(format!(
                "{}-{}-{}-{}-{}",
                BOOKLAND_PREFIX, JAPAN_GROUP, publisher, title, check
            ))
        }
        10 => {
            let isbn10 = isbn.to_isbn10()?;
            let check = &isbn10[9..];
            Some(format!("{}-{}-{}-{}", JAPAN_GROUP, publisher, title, check))
        }
        _ => None,
    }
}

fn japan_publisher_length(body: &str) -> Option<usize> {
    JAPAN_PUBLISHER_RANGES
        .iter()
        .find(|(len, low, high)| {
            body.get(..*len)
                .and_then(|code| code.parse::<u32>().ok())
                .is_some_and(|code| (*low..=*high).contains(&code))
        })
        .map(|(len, _, _)| *len)
}

/// Strip separators and fold full-width characters
///
/// Returns `None` as soon as a character outside digits, `X` and the known
/// separators shows up.
fn normalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let without_label = strip_label(trimmed);

    let mut digits = String::with_capacity(13);
    for c in without_label.chars() {
        match c {
            '0'..='9' => digits.push(c),
            '０'..='９' => {
                let offset = c as u32 - '０' as u32;
                digits.push(char::from_digit(offset, 10)?);
            }
            'X' | 'x' | 'Ｘ' | 'ｘ' => digits.push('X'),
            '-' | ' ' | '\u{3000}' | '‐' | '‑' | '‒' | '–' | '—' | '−' | 'ー' | '－' => {}
            _ => return None,
        }
    }
    Some(digits)
}

fn strip_label(input: &str) -> &str {
    let upper = input.get(..4).map(|p| p.eq_ignore_ascii_case("isbn"));
    if upper != Some(true) {
        return input;
    }
    let rest = &input[4..];
    let rest = rest
        .strip_prefix("-13")
        .or_else(|| rest.strip_prefix("-10"))
        .unwrap_or(rest);
    rest.trim_start_matches([':', '：', ' '])
}

fn is_valid_isbn10(digits: &str) -> bool {
    let (body, check) = digits.split_at(9);
    if !body.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    isbn10_check_digit(body).is_some_and(|expected| check.starts_with(expected))
}

/// Weighted mod-11 check character for the first 9 digits (`X` = 10)
fn isbn10_check_digit(body: &str) -> Option<char> {
    let mut sum = 0u32;
    for (i, c) in body.chars().take(9).enumerate() {
        sum += c.to_digit(10)? * (10 - i as u32);
    }
    match (11 - sum % 11) % 11 {
        10 => Some('X'),
        n => char::from_digit(n, 10),
    }
}

/// Alternating 1/3 weighted mod-10 check digit for the first 12 digits
fn isbn13_check_digit(body: &str) -> Option<char> {
    let mut sum = 0u32;
    for (i, c) in body.chars().take(12).enumerate() {
        let weight = if i % 2 == 0 { 1 } else { 3 };
        sum += c.to_digit(10)? * weight;
    }
    char::from_digit((10 - sum % 10) % 10, 10)
}
