//! Pluggable similarity strategies.
//!
//! A [`Scorer`] compares a normalized keyword against a normalized entry name
//! and returns a similarity in `[0.0, 1.0]`, where `1.0` means the names are
//! identical after normalization. The [`Matcher`](super::Matcher) only orders
//! and truncates; swapping the scorer changes the metric without touching it.

use std::fmt::Debug;

use super::NormalizedName;

/// Similarity metric between a keyword and a candidate name.
pub trait Scorer: Debug + Send + Sync {
    /// Scores `candidate` against `keyword`. Must return a value in `[0.0, 1.0]`
    /// and exactly `1.0` when both names normalize to the same tokens.
    fn score(&self, keyword: &NormalizedName, candidate: &NormalizedName) -> f64;
}

/// Token-overlap similarity with fuzzy token comparison.
///
/// Every keyword token is paired with its closest candidate token (recall)
/// and every candidate token with its closest keyword token (precision), using
/// normalized Levenshtein similarity per pair. Recall is weighted double so a
/// keyword that names only part of a long title still scores well.
///
/// Candidate tags only take part when the keyword mentions them: `"game usa"`
/// favours `Game (USA)` over `Game (Europe)`, while `"game"` treats both the
/// same and leaves the decision to the shorter-name tie-break.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenOverlapScorer;

impl Scorer for TokenOverlapScorer {
    fn score(&self, keyword: &NormalizedName, candidate: &NormalizedName) -> f64 {
        let keyword_tokens: Vec<&str> = keyword.tokens().collect();
        let candidate_tokens: Vec<&str> = candidate
            .base()
            .iter()
            .map(String::as_str)
            .chain(
                candidate
                    .tags()
                    .iter()
                    .map(String::as_str)
                    .filter(|tag| keyword_tokens.contains(tag)),
            )
            .collect();

        if keyword_tokens.is_empty() || candidate_tokens.is_empty() {
            return 0.0;
        }

        let recall = mean_best_similarity(&keyword_tokens, &candidate_tokens);
        let precision = mean_best_similarity(&candidate_tokens, &keyword_tokens);
        ((2.0 * recall + precision) / 3.0).clamp(0.0, 1.0)
    }
}

/// Whole-string normalized Levenshtein similarity.
///
/// Stricter than [`TokenOverlapScorer`]: word order and extra words both cost.
#[derive(Debug, Clone, Copy, Default)]
pub struct LevenshteinScorer;

impl Scorer for LevenshteinScorer {
    fn score(&self, keyword: &NormalizedName, candidate: &NormalizedName) -> f64 {
        let keyword = keyword.joined();
        if keyword.is_empty() {
            return 0.0;
        }
        strsim::normalized_levenshtein(&keyword, &candidate.joined()).clamp(0.0, 1.0)
    }
}

fn mean_best_similarity(from: &[&str], to: &[&str]) -> f64 {
    let total: f64 = from
        .iter()
        .map(|token| {
            to.iter()
                .map(|other| strsim::normalized_levenshtein(token, other))
                .fold(0.0, f64::max)
        })
        .sum();
    total / from.len() as f64
}
