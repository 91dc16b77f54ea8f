//! Keyword list input.

use std::path::Path;

/// Parses keyword text: one search term per line.
///
/// Blank lines and lines starting with `#` are ignored, so keyword files can
/// carry comments. A term that really starts with `#` is written as `\#...`.
#[must_use]
pub fn parse_keywords(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            line.strip_prefix('\\')
                .filter(|rest| rest.starts_with('#'))
                .unwrap_or(line)
        })
        .map(str::to_string)
        .collect()
}

/// Reads a keyword file.
///
/// # Errors
///
/// Returns the underlying IO error if the file cannot be read.
pub fn read_keywords(path: &Path) -> std::io::Result<Vec<String>> {
    Ok(parse_keywords(&std::fs::read_to_string(path)?))
}
