//! Directory listing parsing.
//!
//! A listing page is a flat HTML document whose anchors point at the files
//! (and subdirectories) of one archive directory. [`parse_listing`] turns such
//! a page into an ordered list of [`IndexEntry`] values with absolute URLs;
//! [`fetch_listing`] retrieves the raw page through the shared [`HttpClient`].
//!
//! # Example
//!
//! ```
//! use indexdl_core::index::parse_listing;
//!
//! let html = r#"<a href="../">Parent directory/</a>
//!               <a href="Game%20(USA).zip">Game (USA).zip</a>"#;
//! let entries = parse_listing(html, "https://example.org/roms/").unwrap();
//! assert_eq!(entries.len(), 1);
//! assert_eq!(entries[0].display_name, "Game (USA).zip");
//! assert_eq!(entries[0].url, "https://example.org/roms/Game%20(USA).zip");
//! ```
//!
//! [`HttpClient`]: crate::download::HttpClient

mod error;
mod fetch;

use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::{debug, instrument, trace};
use url::Url;

pub use error::IndexError;
pub use fetch::fetch_listing;

#[allow(clippy::expect_used)]
static ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a[href]").expect("anchor selector is valid") // Static selector, safe to panic
});

/// One downloadable link scraped from a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Human-readable name as shown on the listing.
    pub display_name: String,
    /// Absolute URL of the linked resource.
    pub url: String,
}

impl IndexEntry {
    /// Creates an entry from a display name and absolute URL.
    #[must_use]
    pub fn new(display_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            url: url.into(),
        }
    }
}

/// Parses a listing page into entries, in document order.
///
/// Navigation links are skipped: parent-directory links, sort links carrying
/// a query string, fragment links, non-HTTP schemes, and links that point back
/// at the listing itself or one of its ancestors.
///
/// # Errors
///
/// Returns [`IndexError::InvalidBaseUrl`] if `base_url` is not an absolute URL,
/// and [`IndexError::NoAnchors`] if the page has no hyperlinks at all.
#[instrument(skip(raw_html), fields(html_len = raw_html.len()))]
pub fn parse_listing(raw_html: &str, base_url: &str) -> Result<Vec<IndexEntry>, IndexError> {
    let base = Url::parse(base_url).map_err(|e| IndexError::invalid_base_url(base_url, e))?;
    let document = Html::parse_document(raw_html);

    let mut anchors_seen = 0usize;
    let mut entries = Vec::new();

    for anchor in document.select(&ANCHOR_SELECTOR) {
        anchors_seen += 1;
        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            continue;
        };
        if is_navigation_href(href) {
            trace!(href, "skipping navigation link");
            continue;
        }

        let Ok(mut resolved) = base.join(href) else {
            debug!(href, "skipping unresolvable link");
            continue;
        };
        resolved.set_fragment(None);

        if !matches!(resolved.scheme(), "http" | "https") || resolved.query().is_some() {
            trace!(href, "skipping non-file link");
            continue;
        }
        if is_self_or_ancestor(&resolved, &base) {
            trace!(href, "skipping parent directory link");
            continue;
        }

        let text = collapse_whitespace(&anchor.text().collect::<String>());
        let display_name = anchor
            .value()
            .attr("title")
            .map(collapse_whitespace)
            .filter(|title| !title.is_empty())
            .or_else(|| (!text.is_empty()).then_some(text))
            .unwrap_or_else(|| name_from_url(&resolved));

        entries.push(IndexEntry::new(display_name, resolved.to_string()));
    }

    if anchors_seen == 0 {
        return Err(IndexError::NoAnchors {
            base_url: base_url.to_string(),
        });
    }

    debug!(anchors = anchors_seen, entries = entries.len(), "parsed listing");
    Ok(entries)
}

fn is_navigation_href(href: &str) -> bool {
    href.is_empty()
        || href.starts_with('?')
        || href.starts_with('#')
        || matches!(href, "." | "./" | ".." | "../")
}

fn is_self_or_ancestor(candidate: &Url, base: &Url) -> bool {
    if candidate.scheme() != base.scheme()
        || candidate.host_str() != base.host_str()
        || candidate.port_or_known_default() != base.port_or_known_default()
    {
        return false;
    }
    let candidate_path = candidate.path();
    let base_path = base.path();
    candidate_path == base_path
        || (candidate_path.ends_with('/') && base_path.starts_with(candidate_path))
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn name_from_url(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).next_back())
        .unwrap_or_default();
    urlencoding::decode(segment)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}
