//! Keyword-to-URL resolution.
//!
//! [`LinkResolver`] runs the [`Matcher`] for each keyword against one parsed
//! listing and picks the single best candidate when it clears the configured
//! minimum score. Each keyword is resolved independently: an invalid or
//! unmatched keyword is recorded in the [`ResolutionReport`] and the batch
//! continues.
//!
//! # Example
//!
//! ```
//! use indexdl_core::index::IndexEntry;
//! use indexdl_core::resolver::LinkResolver;
//!
//! let entries = vec![
//!     IndexEntry::new("Super Game (USA).zip", "https://example.org/sg-usa.zip"),
//!     IndexEntry::new("Super Game (Europe).zip", "https://example.org/sg-eur.zip"),
//! ];
//! let resolver = LinkResolver::new(1, 0.6);
//! let report = resolver.resolve(&["super game usa".to_string()], &entries);
//! let link = &report.links()[0];
//! assert!(link.matched);
//! assert_eq!(link.url, "https://example.org/sg-usa.zip");
//! ```

pub mod keywords;
pub mod link_file;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::index::IndexEntry;
use crate::matcher::{MatchCandidate, MatchError, Matcher};

/// Default number of candidates considered per keyword.
pub const DEFAULT_TOP_N: usize = 1;

/// Default minimum score for a candidate to count as a match.
pub const DEFAULT_MIN_SCORE: f64 = 0.6;

/// Per-keyword resolution failures. These never abort the batch.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolveError {
    /// The keyword normalizes to nothing.
    #[error("invalid keyword '{keyword}': nothing to match after normalization")]
    InvalidKeyword {
        /// The keyword as supplied.
        keyword: String,
    },

    /// No candidate reached the minimum score.
    #[error(
        "no match for '{keyword}' (best score {}, minimum {min_score:.2})",
        format_best(.best_score.as_ref())
    )]
    NoMatch {
        /// The keyword as supplied.
        keyword: String,
        /// Best score seen, if the listing had any entries.
        best_score: Option<f64>,
        /// The threshold that was not met.
        min_score: f64,
    },
}

fn format_best(best: Option<&f64>) -> String {
    best.map_or_else(|| "n/a".to_string(), |score| format!("{score:.2}"))
}

impl From<MatchError> for ResolveError {
    fn from(error: MatchError) -> Self {
        match error {
            MatchError::InvalidKeyword { keyword } => Self::InvalidKeyword { keyword },
        }
    }
}

/// The chosen URL for one keyword.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedLink {
    /// The keyword as supplied.
    pub keyword: String,
    /// Chosen URL, empty when `matched` is false.
    pub url: String,
    /// Score of the chosen candidate (best seen score when unmatched).
    pub score: f64,
    /// Whether a candidate cleared the minimum score.
    pub matched: bool,
}

impl ResolvedLink {
    /// Creates a matched link.
    #[must_use]
    pub fn matched(keyword: impl Into<String>, url: impl Into<String>, score: f64) -> Self {
        Self {
            keyword: keyword.into(),
            url: url.into(),
            score,
            matched: true,
        }
    }

    /// Creates an unmatched link with an empty URL.
    #[must_use]
    pub fn unmatched(keyword: impl Into<String>, best_score: f64) -> Self {
        Self {
            keyword: keyword.into(),
            url: String::new(),
            score: best_score,
            matched: false,
        }
    }
}

/// Full outcome for one keyword.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordResolution {
    /// The selected link (or the unmatched marker).
    pub link: ResolvedLink,
    /// Every candidate at or above the minimum score, best first. The first
    /// element is the chosen one; the rest are kept for manual review.
    pub candidates: Vec<MatchCandidate>,
    /// Why the keyword did not resolve, if it did not.
    pub error: Option<ResolveError>,
}

impl KeywordResolution {
    /// Candidates other than the chosen one.
    #[must_use]
    pub fn alternatives(&self) -> &[MatchCandidate] {
        self.candidates.get(1..).unwrap_or_default()
    }
}

/// Resolution results for a keyword batch, in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionReport {
    /// One entry per input keyword.
    pub resolutions: Vec<KeywordResolution>,
}

impl ResolutionReport {
    /// All resolved links in input order, matched or not.
    #[must_use]
    pub fn links(&self) -> Vec<ResolvedLink> {
        self.resolutions.iter().map(|r| r.link.clone()).collect()
    }

    /// Links that cleared the minimum score.
    pub fn matched(&self) -> impl Iterator<Item = &ResolvedLink> {
        self.resolutions
            .iter()
            .map(|r| &r.link)
            .filter(|link| link.matched)
    }

    /// Keywords that did not resolve, with the reason.
    pub fn unmatched(&self) -> impl Iterator<Item = (&str, &ResolveError)> {
        self.resolutions
            .iter()
            .filter_map(|r| r.error.as_ref().map(|e| (r.link.keyword.as_str(), e)))
    }

    /// Number of matched keywords.
    #[must_use]
    pub fn matched_count(&self) -> usize {
        self.matched().count()
    }

    /// Number of keywords in the batch.
    #[must_use]
    pub fn keyword_count(&self) -> usize {
        self.resolutions.len()
    }
}

/// Maps keywords to listing URLs.
#[derive(Debug, Clone)]
pub struct LinkResolver {
    matcher: Matcher,
    top_n: usize,
    min_score: f64,
}

impl Default for LinkResolver {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_N, DEFAULT_MIN_SCORE)
    }
}

impl LinkResolver {
    /// Creates a resolver with the default matcher.
    ///
    /// `top_n` is raised to at least 1 and `min_score` clamped to `[0.0, 1.0]`.
    #[must_use]
    pub fn new(top_n: usize, min_score: f64) -> Self {
        Self::with_matcher(Matcher::default(), top_n, min_score)
    }

    /// Creates a resolver with a custom matcher.
    #[must_use]
    pub fn with_matcher(matcher: Matcher, top_n: usize, min_score: f64) -> Self {
        Self {
            matcher,
            top_n: top_n.max(1),
            min_score: if min_score.is_nan() {
                DEFAULT_MIN_SCORE
            } else {
                min_score.clamp(0.0, 1.0)
            },
        }
    }

    /// Returns the number of candidates kept per keyword.
    #[must_use]
    pub fn top_n(&self) -> usize {
        self.top_n
    }

    /// Returns the minimum score for a match.
    #[must_use]
    pub fn min_score(&self) -> f64 {
        self.min_score
    }

    /// Resolves every keyword against `entries`, preserving input order.
    ///
    /// Duplicate keywords are resolved independently and appear once per
    /// occurrence.
    #[instrument(
        skip(self, keywords, entries),
        fields(keywords = keywords.len(), entries = entries.len())
    )]
    pub fn resolve(&self, keywords: &[String], entries: &[IndexEntry]) -> ResolutionReport {
        let resolutions: Vec<KeywordResolution> = keywords
            .iter()
            .map(|keyword| self.resolve_one(keyword, entries))
            .collect();

        let report = ResolutionReport { resolutions };
        info!(
            matched = report.matched_count(),
            total = report.keyword_count(),
            "resolution complete"
        );
        report
    }

    /// Resolves a single keyword.
    #[must_use]
    pub fn resolve_one(&self, keyword: &str, entries: &[IndexEntry]) -> KeywordResolution {
        let ranked = match self.matcher.top_matches(keyword, entries, self.top_n) {
            Ok(ranked) => ranked,
            Err(error) => {
                warn!(keyword, error = %error, "skipping keyword");
                return KeywordResolution {
                    link: ResolvedLink::unmatched(keyword, 0.0),
                    candidates: Vec::new(),
                    error: Some(error.into()),
                };
            }
        };

        let best_score = ranked.first().map(|c| c.score);
        let candidates: Vec<MatchCandidate> = ranked
            .into_iter()
            .filter(|c| c.score >= self.min_score)
            .collect();

        match candidates.first() {
            Some(chosen) => {
                debug!(
                    keyword,
                    url = %chosen.entry.url,
                    score = chosen.score,
                    alternatives = candidates.len() - 1,
                    "keyword resolved"
                );
                KeywordResolution {
                    link: ResolvedLink::matched(keyword, &chosen.entry.url, chosen.score),
                    candidates,
                    error: None,
                }
            }
            None => {
                debug!(keyword, ?best_score, "no candidate above threshold");
                KeywordResolution {
                    link: ResolvedLink::unmatched(keyword, best_score.unwrap_or(0.0)),
                    candidates: Vec::new(),
                    error: Some(ResolveError::NoMatch {
                        keyword: keyword.to_string(),
                        best_score,
                        min_score: self.min_score,
                    }),
                }
            }
        }
    }
}
