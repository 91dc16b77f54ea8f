//! Filename derivation and sanitization for download destinations.
//!
//! Destinations are always `download_dir/<name>` where `<name>` is the
//! percent-decoded last path segment of the URL, made safe for the local
//! filesystem. A single flat directory is used; URLs never introduce
//! subdirectories.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use url::Url;

/// Name used when a URL has no usable last segment.
pub const FALLBACK_FILENAME: &str = "download.bin";

/// Derives the local filename for `url`.
#[must_use]
pub fn filename_from_url(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return FALLBACK_FILENAME.to_string();
    };

    let Some(last) = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
    else {
        return FALLBACK_FILENAME.to_string();
    };

    let decoded = urlencoding::decode(last).map_or_else(|_| last.to_string(), |d| d.into_owned());
    let sanitized = sanitize_filename(&decoded);
    if sanitized.trim_matches('_').is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        sanitized
    }
}

/// Full destination path for `url` under `download_dir`.
#[must_use]
pub fn destination_for(download_dir: &Path, url: &str) -> PathBuf {
    download_dir.join(filename_from_url(url))
}

/// Destination for `url` that is not already in `taken`.
///
/// Collisions get a numeric suffix starting at 2: `game.zip`, `game_2.zip`,
/// `game_3.zip`. Only names claimed earlier in the same run count, so the
/// result depends on link order alone and never on what is already on disk.
pub(crate) fn unique_destination(
    download_dir: &Path,
    url: &str,
    taken: &HashSet<PathBuf>,
) -> PathBuf {
    let filename = filename_from_url(url);
    let base_path = download_dir.join(&filename);
    if !taken.contains(&base_path) {
        return base_path;
    }

    let (stem, ext) = match filename.rfind('.') {
        Some(pos) if pos > 0 => (&filename[..pos], &filename[pos..]),
        _ => (filename.as_str(), ""),
    };
    (2..)
        .map(|i| download_dir.join(format!("{stem}_{i}{ext}")))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or(base_path)
}

/// Sanitizes filename for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}
