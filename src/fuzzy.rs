//! Approximate text comparison for transcripts and generated speech.
//!
//! Similarity is the Sørensen–Dice coefficient over character bigrams of the
//! normalized strings.

use std::collections::HashMap;

/// Lowercase, collapse whitespace runs to one space, trim.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().map(str::to_lowercase).collect::<Vec<_>>().join(" ")
}

fn bigrams(text: &str) -> HashMap<(char, char), usize> {
    let chars: Vec<char> = text.chars().collect();
    let mut counts = HashMap::new();
    for pair in chars.windows(2) {
        *counts.entry((pair[0], pair[1])).or_insert(0) += 1;
    }
    counts
}

/// Similarity in `[0, 1]`; equal normalized strings score `1.0`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize_text(a);
    let b = normalize_text(b);
    if a == b {
        return 1.0;
    }
    if a.chars().count() < 2 || b.chars().count() < 2 {
        return 0.0;
    }

    let left = bigrams(&a);
    let right = bigrams(&b);
    let total: usize = left.values().sum::<usize>() + right.values().sum::<usize>();
    let shared: usize = left
        .iter()
        .map(|(pair, n)| right.get(pair).map_or(0, |m| (*n).min(*m)))
        .sum();
    (2 * shared) as f64 / total as f64
}

/// `similarity(actual, expected) >= threshold`.
pub fn fuzzy_text_match(actual: &str, expected: &str, threshold: f64) -> bool {
    similarity(actual, expected) >= threshold
}
