//! Character n-gram similarity
//!
//! Titles from different providers differ in small ways (spacing, a dropped
//! subtitle, punctuation variants). Comparing multisets of 1-, 2- and 3-character
//! substrings tolerates that without a language-aware tokenizer.

use std::collections::HashMap;

/// Longest n-gram taken from each string
const MAX_GRAM: usize = 3;

/// Similarity in `[0.0, 1.0]` between two strings
///
/// Shared occurrences (the smaller count of each n-gram present on both sides)
/// divided by the geometric mean of each side's total n-gram count. Empty input
/// yields 0, identical non-empty input yields 1.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    let grams_a = ngram_counts(a);
    let grams_b = ngram_counts(b);

    let total_a: usize = grams_a.values().sum();
    let total_b: usize = grams_b.values().sum();
    if total_a == 0 || total_b == 0 {
        return 0.0;
    }

    let shared: usize = grams_a
        .iter()
        .filter_map(|(gram, count_a)| grams_b.get(gram).map(|count_b| (*count_a).min(*count_b)))
        .sum();

    shared as f64 / ((total_a * total_b) as f64).sqrt()
}

/// Occurrence count of every 1..=3 character substring
fn ngram_counts(s: &str) -> HashMap<&str, usize> {
    // Byte offsets of each char boundary, plus the end of the string
    let bounds: Vec<usize> = s
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(s.len()))
        .collect();
    let char_count = bounds.len() - 1;

    let mut counts = HashMap::new();
    for n in 1..=MAX_GRAM {
        if n > char_count {
            break;
        }
        for start in 0..=(char_count - n) {
            let gram = &s[bounds[start]..bounds[start + n]];
            *counts.entry(gram).or_insert(0) += 1;
        }
    }
    counts
}
