use crate::matching::normalize::normalize;
use std::collections::BTreeSet;

/// Minimum similarity ratio for [`matches_loosely`].
pub const FUZZY_THRESHOLD: f64 = 0.8;

/// A single shared token only counts when it is longer than this ("real", "city" are not).
const SIGNIFICANT_TOKEN_MIN_CHARS: usize = 5;

/// Whether two team names denote the same club.
///
/// Checks, in order: equal normalized names, one normalized name containing the other, at
/// least two shared tokens, or exactly one shared token of five characters or more. Every
/// step is symmetric, so `matches(a, b) == matches(b, a)`.
pub fn matches(a: &str, b: &str) -> bool {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }

    if a == b {
        return true;
    }

    if a.contains(b.as_str()) || b.contains(a.as_str()) {
        return true;
    }

    let ta: BTreeSet<&str> = a.split_whitespace().collect();
    let tb: BTreeSet<&str> = b.split_whitespace().collect();
    let common: Vec<&str> = ta.intersection(&tb).copied().collect();

    match common.as_slice() {
        [] => false,
        [only] => only.chars().count() >= SIGNIFICANT_TOKEN_MIN_CHARS,
        _ => true,
    }
}

/// Edit-distance similarity of the normalized names, in `0.0..=1.0`. Symmetric.
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&normalize(a), &normalize(b))
}

/// [`matches`], or a similarity of at least [`FUZZY_THRESHOLD`] for spelling variants such as
/// "Kobenhavn" / "København".
pub fn matches_loosely(a: &str, b: &str) -> bool {
    matches(a, b) || similarity(a, b) >= FUZZY_THRESHOLD
}
