//! Topic similarity scoring.
//!
//! The combined score is the mean of word-set Jaccard similarity and
//! normalized Levenshtein similarity, both over lowercased text and scaled
//! to 0–100.

use std::collections::HashSet;

/// Intersection over union of whitespace-separated word sets, in `0.0..=1.0`.
/// Two empty strings score 0.
pub fn word_jaccard(a: &str, b: &str) -> f64 {
    let words_a: HashSet<&str> = a.split_whitespace().collect();
    let words_b: HashSet<&str> = b.split_whitespace().collect();

    let union = words_a.union(&words_b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = words_a.intersection(&words_b).count();
    intersection as f64 / union as f64
}

/// Edit-distance similarity in `0.0..=1.0`.
pub fn edit_ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// Combined similarity of two topics on a 0–100 scale.
///
/// # Examples
///
/// ```
/// use amendment_extract::similarity::topic_similarity;
///
/// assert_eq!(topic_similarity("On Water", "on water"), 100.0);
/// assert!(topic_similarity("On Climate Finance Reform", "On Climate Finance") > 70.0);
/// assert!(topic_similarity("Space Debris", "On Climate Finance Reform") < 25.0);
/// ```
pub fn topic_similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    let jaccard = word_jaccard(&a, &b) * 100.0;
    let edit = edit_ratio(&a, &b) * 100.0;
    (jaccard + edit) / 2.0
}
