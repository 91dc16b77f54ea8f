//! Name normalization shared by keywords and listing entries.

use std::sync::LazyLock;

use regex::Regex;

/// Bracketed region/version tags such as `(USA)`, `(Rev 1)` or `[b]`.
#[allow(clippy::expect_used)]
static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // Static pattern, safe to panic
    Regex::new(r"\([^()]*\)|\[[^\[\]]*\]").expect("tag regex is valid")
});

/// Longest suffix treated as a file extension.
const MAX_EXTENSION_LEN: usize = 5;

/// A name split into comparable tokens.
///
/// `base` holds the lower-cased words of the name with its extension and
/// bracketed tags removed; `tags` holds the words found inside those tags.
/// Scorers decide how much weight tags get.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedName {
    base: Vec<String>,
    tags: Vec<String>,
}

impl NormalizedName {
    /// Normalizes a raw keyword or display name.
    #[must_use]
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim().trim_end_matches('/');
        let without_ext = strip_extension(trimmed);

        let mut tags = Vec::new();
        for tag in TAG_PATTERN.find_iter(without_ext) {
            tags.extend(tokenize(tag.as_str()));
        }
        let base = tokenize(&TAG_PATTERN.replace_all(without_ext, " "));

        Self { base, tags }
    }

    /// Words outside bracketed tags.
    #[must_use]
    pub fn base(&self) -> &[String] {
        &self.base
    }

    /// Words inside bracketed tags.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// All tokens, base first.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.base.iter().chain(self.tags.iter()).map(String::as_str)
    }

    /// Returns true when normalization left nothing to compare.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.base.is_empty() && self.tags.is_empty()
    }

    /// Tokens joined by single spaces.
    #[must_use]
    pub fn joined(&self) -> String {
        self.tokens().collect::<Vec<_>>().join(" ")
    }
}

fn strip_extension(name: &str) -> &str {
    let Some(dot) = name.rfind('.') else {
        return name;
    };
    if dot == 0 {
        return name;
    }
    let ext = &name[dot + 1..];
    let looks_like_extension = (1..=MAX_EXTENSION_LEN).contains(&ext.len())
        && ext.chars().all(|c| c.is_ascii_alphanumeric())
        && ext.chars().any(|c| c.is_ascii_alphabetic());
    if looks_like_extension { &name[..dot] } else { name }
}

fn tokenize(value: &str) -> Vec<String> {
    value
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn test_normalize_strips_extension_and_tags() {
        let name = NormalizedName::new("Super Game (USA) (Rev 1).zip");
        assert_eq!(name.base(), strings(&["super", "game"]).as_slice());
        assert_eq!(name.tags(), strings(&["usa", "rev", "1"]).as_slice());
    }

    #[test]
    fn test_normalize_collapses_whitespace_and_case() {
        let name = NormalizedName::new("  SUPER\t  game  ");
        assert_eq!(name.joined(), "super game");
    }

    #[test]
    fn test_normalize_square_bracket_tags() {
        let name = NormalizedName::new("Game [b] [!].7z");
        assert_eq!(name.base(), strings(&["game"]).as_slice());
        assert_eq!(name.tags(), strings(&["b"]).as_slice());
    }

    #[test]
    fn test_normalize_keeps_numeric_suffix_that_is_not_an_extension() {
        let name = NormalizedName::new("Tool v1.2");
        assert_eq!(name.joined(), "tool v1 2");
    }

    #[test]
    fn test_normalize_keeps_dotted_words() {
        let name = NormalizedName::new("Dr. Mario (Japan).nes");
        assert_eq!(name.base(), strings(&["dr", "mario"]).as_slice());
        assert_eq!(name.tags(), strings(&["japan"]).as_slice());
    }

    #[test]
    fn test_normalize_directory_entry() {
        let name = NormalizedName::new("Extras/");
        assert_eq!(name.joined(), "extras");
    }

    #[test]
    fn test_normalize_punctuation_only_is_empty() {
        assert!(NormalizedName::new("  -- !! ").is_empty());
        assert!(NormalizedName::new("").is_empty());
    }

    #[test]
    fn test_normalize_keyword_with_tag_keeps_tag_words() {
        let name = NormalizedName::new("(USA)");
        assert!(!name.is_empty());
        assert_eq!(name.tags(), strings(&["usa"]).as_slice());
    }
}
