//! Error types for listing fetch and parse operations.

use thiserror::Error;

/// Errors raised while fetching or interpreting a directory listing page.
///
/// These are never retried: a listing that cannot be read usually means the
/// source site changed its layout or the base URL is wrong.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The page contained no hyperlinks at all.
    #[error("listing page has no links; is {base_url} a directory listing?")]
    NoAnchors {
        /// The page URL the HTML was fetched from.
        base_url: String,
    },

    /// The listing URL could not be parsed.
    #[error("invalid listing URL '{url}': {reason}")]
    InvalidBaseUrl {
        /// The rejected URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The listing server answered with a non-success status.
    #[error("HTTP {status} fetching listing {url}")]
    HttpStatus {
        /// The listing URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The request failed before a response arrived.
    #[error("failed to fetch listing {url}: {source}")]
    Fetch {
        /// The listing URL.
        url: String,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },
}

impl IndexError {
    /// Creates an `InvalidBaseUrl` error.
    #[must_use]
    pub fn invalid_base_url(url: &str, reason: impl std::fmt::Display) -> Self {
        Self::InvalidBaseUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}
