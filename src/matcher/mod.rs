//! Fuzzy matching of keywords against listing entries.
//!
//! Ranks entries by similarity to a keyword using a pluggable [`Scorer`],
//! with a deterministic order for equal scores.

mod normalize;
mod scorer;

use std::cmp::Ordering;
use std::sync::Arc;

use thiserror::Error;
use tracing::trace;

use crate::index::IndexEntry;

pub use normalize::NormalizedName;
pub use scorer::{LevenshteinScorer, Scorer, TokenOverlapScorer};

/// Errors raised by the matcher.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MatchError {
    /// The keyword has nothing left to compare after normalization.
    #[error("keyword '{keyword}' is empty after normalization")]
    InvalidKeyword {
        /// The keyword as supplied.
        keyword: String,
    },
}

/// A scored entry.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    /// The matched listing entry.
    pub entry: IndexEntry,
    /// Similarity in `[0.0, 1.0]`.
    pub score: f64,
}

/// Scores listing entries against keywords.
#[derive(Debug, Clone)]
pub struct Matcher {
    scorer: Arc<dyn Scorer>,
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(TokenOverlapScorer)
    }
}

impl Matcher {
    /// Creates a matcher using the given scoring strategy.
    #[must_use]
    pub fn new(scorer: impl Scorer + 'static) -> Self {
        Self {
            scorer: Arc::new(scorer),
        }
    }

    /// Returns the best `top_n` entries for `keyword`, best first.
    ///
    /// Equal scores are ordered by the shorter normalized name (fewer extra
    /// tags), then by display name, then by URL, so the result is fully
    /// deterministic for a given input.
    ///
    /// # Errors
    ///
    /// Returns [`MatchError::InvalidKeyword`] if `keyword` normalizes to
    /// nothing. An empty `entries` slice is not an error.
    pub fn top_matches(
        &self,
        keyword: &str,
        entries: &[IndexEntry],
        top_n: usize,
    ) -> Result<Vec<MatchCandidate>, MatchError> {
        let normalized_keyword = NormalizedName::new(keyword);
        if normalized_keyword.is_empty() {
            return Err(MatchError::InvalidKeyword {
                keyword: keyword.to_string(),
            });
        }

        let mut scored: Vec<(MatchCandidate, usize)> = entries
            .iter()
            .map(|entry| {
                let normalized = NormalizedName::new(&entry.display_name);
                let score = self.scorer.score(&normalized_keyword, &normalized);
                trace!(keyword, name = %entry.display_name, score, "scored entry");
                let candidate = MatchCandidate {
                    entry: entry.clone(),
                    score,
                };
                (candidate, normalized.joined().chars().count())
            })
            .collect();

        scored.sort_by(compare_scored);
        scored.truncate(top_n);
        Ok(scored.into_iter().map(|(candidate, _)| candidate).collect())
    }
}

/// Orders scored candidates best first.
fn compare_scored(left: &(MatchCandidate, usize), right: &(MatchCandidate, usize)) -> Ordering {
    let ((left, left_len), (right, right_len)) = (left, right);
    right
        .score
        .total_cmp(&left.score)
        .then_with(|| left_len.cmp(right_len))
        .then_with(|| left.entry.display_name.cmp(&right.entry.display_name))
        .then_with(|| left.entry.url.cmp(&right.entry.url))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn entry(name: &str) -> IndexEntry {
        IndexEntry::new(name, format!("https://example.org/{}", name.replace(' ', "%20")))
    }

    fn entries(names: &[&str]) -> Vec<IndexEntry> {
        names.iter().map(|name| entry(name)).collect()
    }

    #[test]
    fn test_top_matches_prefers_mentioned_region() {
        let list = entries(&["Super Game (Europe).zip", "Super Game (USA).zip"]);
        let result = Matcher::default()
            .top_matches("super game usa", &list, 1)
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].entry.display_name, "Super Game (USA).zip");
        assert!(result[0].score >= 0.8);
    }

    #[test]
    fn test_top_matches_respects_top_n_and_sorting() {
        let list = entries(&[
            "Alpha Quest (USA).zip",
            "Beta Racer (USA).zip",
            "Alpha Quest II (USA).zip",
            "Gamma (Japan).zip",
        ]);
        let result = Matcher::default().top_matches("alpha quest", &list, 3).unwrap();
        assert_eq!(result.len(), 3);
        assert!(result.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(result[0].entry.display_name, "Alpha Quest (USA).zip");
    }

    #[test]
    fn test_top_matches_returns_all_when_fewer_than_top_n() {
        let list = entries(&["One.zip", "Two.zip"]);
        let result = Matcher::default().top_matches("one", &list, 10).unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_top_matches_tie_prefers_shorter_normalized_name() {
        let list = entries(&["Super Game (USA) (Rev 1).zip", "Super Game (USA).zip"]);
        let result = Matcher::default().top_matches("super game", &list, 2).unwrap();
        assert_eq!(result[0].score, result[1].score);
        assert_eq!(result[0].entry.display_name, "Super Game (USA).zip");
    }

    #[test]
    fn test_top_matches_tie_on_length_falls_back_to_lexical_order() {
        let list = entries(&["Game (USA).zip", "Game (EUR).zip"]);
        let result = Matcher::default().top_matches("game", &list, 2).unwrap();
        assert_eq!(result[0].entry.display_name, "Game (EUR).zip");
        assert_eq!(result[1].entry.display_name, "Game (USA).zip");
    }

    #[test]
    fn test_top_matches_empty_entries_is_empty_result() {
        let result = Matcher::default().top_matches("anything", &[], 5).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_top_matches_empty_keyword_is_invalid() {
        let list = entries(&["One.zip"]);
        let result = Matcher::default().top_matches("  ()  ", &list, 1);
        assert_eq!(
            result,
            Err(MatchError::InvalidKeyword {
                keyword: "  ()  ".to_string()
            })
        );
    }

    #[test]
    fn test_top_matches_is_deterministic() {
        let list = entries(&["B (USA).zip", "A (USA).zip", "C (USA).zip", "A (Europe).zip"]);
        let matcher = Matcher::default();
        let first = matcher.top_matches("a", &list, 4).unwrap();
        let second = matcher.top_matches("a", &list, 4).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_matcher_accepts_alternate_scorer() {
        let list = entries(&["game super.zip", "super game.zip"]);
        let result = Matcher::new(LevenshteinScorer)
            .top_matches("super game", &list, 1)
            .unwrap();
        assert_eq!(result[0].entry.display_name, "super game.zip");
        assert_eq!(result[0].score, 1.0);
    }
}
