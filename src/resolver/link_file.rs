//! Link list persistence.
//!
//! A link file records the outcome of resolution so downloads can run later
//! without resolving again. The format is line based:
//!
//! ```text
//! # indexdl link list: keyword<TAB>url
//! super game usa	https://example.org/Super%20Game%20(USA).zip
//! #alt	0.833	https://example.org/Super%20Game%20(Europe).zip
//! #unmatched	zzzznonexistent
//! ```
//!
//! Lines starting with `#` are comments; `#alt` lines list runner-up
//! candidates for manual review. A keyword that itself starts with `#` or
//! `\` is written with a leading `\` so it is not mistaken for a comment.
//!
//! The reader also accepts the older layout of `--- keyword ---` headers
//! followed by bare URLs.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use url::Url;

use super::{ResolutionReport, ResolvedLink};

const HEADER: &str = "# indexdl link list: keyword<TAB>url";

/// Errors reading or writing link files.
#[derive(Debug, Error)]
pub enum LinkFileError {
    /// The file could not be read or written.
    #[error("IO error on link file {path}: {source}")]
    Io {
        /// Link file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A line could not be interpreted.
    #[error("malformed link file line {line}: {reason}")]
    Malformed {
        /// 1-based line number.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },
}

/// Renders a resolution report in link file format.
#[must_use]
pub fn render_link_file(report: &ResolutionReport) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');

    for resolution in &report.resolutions {
        let keyword = escape_keyword(&resolution.link.keyword.replace('\t', " "));
        if resolution.link.matched {
            out.push_str(&format!("{keyword}\t{}\n", resolution.link.url));
            for alt in resolution.alternatives() {
                out.push_str(&format!("#alt\t{:.3}\t{}\n", alt.score, alt.entry.url));
            }
        } else {
            out.push_str(&format!("#unmatched\t{keyword}\n"));
        }
    }
    out
}

/// Writes a resolution report to `path`.
///
/// # Errors
///
/// Returns [`LinkFileError::Io`] if the file cannot be written.
pub fn write_link_file(path: &Path, report: &ResolutionReport) -> Result<(), LinkFileError> {
    std::fs::write(path, render_link_file(report)).map_err(|source| LinkFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), links = report.matched_count(), "wrote link file");
    Ok(())
}

/// Parses link file text into matched links, in file order.
///
/// Links read from a file carry a score of `1.0`: they were either chosen by a
/// previous resolution or edited by hand.
///
/// # Errors
///
/// Returns [`LinkFileError::Malformed`] for lines whose URL is not an absolute
/// `http`/`https` URL, or that are neither comments, headers nor links.
pub fn parse_link_file(text: &str) -> Result<Vec<ResolvedLink>, LinkFileError> {
    let mut links = Vec::new();
    let mut current_keyword: Option<String> = None;

    for (index, raw_line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(keyword) = legacy_header(line) {
            current_keyword = Some(keyword.to_string());
            continue;
        }

        let (keyword, url) = match line.split_once('\t') {
            Some((keyword, url)) => (unescape_keyword(keyword.trim()).to_string(), url.trim()),
            None if looks_like_url(line) => {
                let keyword = current_keyword
                    .clone()
                    .unwrap_or_else(|| keyword_from_url(line));
                (keyword, line)
            }
            None => {
                return Err(LinkFileError::Malformed {
                    line: line_no,
                    reason: "expected `keyword<TAB>url` or a bare URL".to_string(),
                });
            }
        };

        validate_url(url).map_err(|reason| LinkFileError::Malformed {
            line: line_no,
            reason,
        })?;
        links.push(ResolvedLink::matched(keyword, url, 1.0));
    }

    Ok(links)
}

/// Reads and parses a link file.
///
/// # Errors
///
/// Returns [`LinkFileError::Io`] if the file cannot be read and
/// [`LinkFileError::Malformed`] for invalid lines.
pub fn read_link_file(path: &Path) -> Result<Vec<ResolvedLink>, LinkFileError> {
    let text = std::fs::read_to_string(path).map_err(|source| LinkFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_link_file(&text)
}

fn escape_keyword(keyword: &str) -> String {
    if keyword.starts_with(['#', '\\']) {
        format!("\\{keyword}")
    } else {
        keyword.to_string()
    }
}

fn unescape_keyword(keyword: &str) -> &str {
    keyword
        .strip_prefix('\\')
        .filter(|rest| rest.starts_with(['#', '\\']))
        .unwrap_or(keyword)
}

fn legacy_header(line: &str) -> Option<&str> {
    let inner = line.strip_prefix("---")?.strip_suffix("---")?.trim();
    (!inner.is_empty()).then_some(inner)
}

fn looks_like_url(line: &str) -> bool {
    line.starts_with("http://") || line.starts_with("https://")
}

fn validate_url(url: &str) -> Result<(), String> {
    let parsed = Url::parse(url).map_err(|e| format!("invalid URL '{url}': {e}"))?;
    if matches!(parsed.scheme(), "http" | "https") {
        Ok(())
    } else {
        Err(format!("unsupported URL scheme '{}'", parsed.scheme()))
    }
}

fn keyword_from_url(url: &str) -> String {
    let segment = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(url);
    urlencoding::decode(segment)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}
