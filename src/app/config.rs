//! Config file loading and merging with CLI flags.
//!
//! Precedence for every option: CLI flag > config file > built-in default.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use indexdl_core::DEFAULT_CONCURRENCY;
use indexdl_core::download::{DEFAULT_BACKOFF_BASE, DEFAULT_MAX_RETRIES};
use indexdl_core::resolver::{DEFAULT_MIN_SCORE, DEFAULT_TOP_N};

use crate::cli::Args;

/// Link file written by resolution when none is configured.
pub(crate) const DEFAULT_OUTPUT_LINK_FILE: &str = "links.txt";

/// File-backed defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct FileConfig {
    pub base_url: Option<String>,
    pub keywords_file: Option<PathBuf>,
    pub output_link_file: Option<PathBuf>,
    pub link_file_in: Option<PathBuf>,
    pub concurrency: Option<u8>,
    pub download_path: Option<PathBuf>,
    pub top_n: Option<u64>,
    pub min_score: Option<f64>,
    pub max_retries: Option<u8>,
    pub backoff_base_ms: Option<u64>,
}

impl FileConfig {
    /// Validates config values against the same ranges as the CLI.
    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency
            && !(1..=100).contains(&concurrency)
        {
            bail!("Invalid config value for `concurrency`: {concurrency}. Expected range: 1..=100");
        }
        if let Some(top_n) = self.top_n
            && top_n == 0
        {
            bail!("Invalid config value for `top_n`: 0. Expected a positive integer");
        }
        if let Some(min_score) = self.min_score
            && !(0.0..=1.0).contains(&min_score)
        {
            bail!("Invalid config value for `min_score`: {min_score}. Expected range: 0.0..=1.0");
        }
        if let Some(max_retries) = self.max_retries
            && max_retries > 10
        {
            bail!("Invalid config value for `max_retries`: {max_retries}. Expected range: 0..=10");
        }
        if let Some(backoff) = self.backoff_base_ms
            && backoff > 60_000
        {
            bail!(
                "Invalid config value for `backoff_base_ms`: {backoff}. Expected range: 0..=60000"
            );
        }
        Ok(())
    }
}

/// Effective options for one run.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RunSettings {
    pub base_url: Option<String>,
    pub keywords_file: Option<PathBuf>,
    pub output_link_file: PathBuf,
    pub link_file_in: Option<PathBuf>,
    pub download: bool,
    pub concurrency: usize,
    pub download_path: PathBuf,
    pub top_n: usize,
    pub min_score: f64,
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub report: Option<PathBuf>,
}

/// Merges CLI flags over file config over defaults.
pub(crate) fn resolve_settings(args: &Args, file: Option<&FileConfig>) -> RunSettings {
    let file = file.cloned().unwrap_or_default();

    RunSettings {
        base_url: args.base_url.clone().or(file.base_url),
        keywords_file: args.keywords_file.clone().or(file.keywords_file),
        output_link_file: args
            .output_link_file
            .clone()
            .or(file.output_link_file)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_LINK_FILE)),
        link_file_in: args.link_file_in.clone().or(file.link_file_in),
        download: args.download,
        concurrency: args
            .concurrency
            .or(file.concurrency)
            .map_or(DEFAULT_CONCURRENCY, usize::from),
        download_path: args
            .download_path
            .clone()
            .or(file.download_path)
            .unwrap_or_else(|| PathBuf::from(".")),
        top_n: args
            .top_n
            .map(u64::from)
            .or(file.top_n)
            .map_or(DEFAULT_TOP_N, |n| usize::try_from(n).unwrap_or(usize::MAX)),
        min_score: args.min_score.or(file.min_score).unwrap_or(DEFAULT_MIN_SCORE),
        max_retries: args
            .max_retries
            .or(file.max_retries)
            .map_or(DEFAULT_MAX_RETRIES, u32::from),
        backoff_base: args
            .backoff_base_ms
            .or(file.backoff_base_ms)
            .map_or(DEFAULT_BACKOFF_BASE, Duration::from_millis),
        report: args.report.clone(),
    }
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/indexdl/config.toml`
/// 2. `$HOME/.config/indexdl/config.toml`
pub(crate) fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("indexdl")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("indexdl")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the explicit config file, or the default one if it exists.
///
/// An explicit path that does not exist is an error; a missing default file
/// is not.
pub(crate) fn load_config(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    if let Some(path) = explicit {
        return load_file_config(path).map(Some);
    }

    match resolve_default_config_path() {
        Some(path) if path.exists() => load_file_config(&path).map(Some),
        _ => Ok(None),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!(
                "Invalid config syntax on line {}: expected key = value",
                line_index + 1
            );
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let line_no = line_index + 1;
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "base_url" => cfg.base_url = Some(parse_string_literal(value).with_context(invalid)?),
            "keywords_file" => {
                cfg.keywords_file =
                    Some(PathBuf::from(parse_string_literal(value).with_context(invalid)?));
            }
            "output_link_file" => {
                cfg.output_link_file =
                    Some(PathBuf::from(parse_string_literal(value).with_context(invalid)?));
            }
            "link_file_in" => {
                cfg.link_file_in =
                    Some(PathBuf::from(parse_string_literal(value).with_context(invalid)?));
            }
            "download_path" => {
                cfg.download_path =
                    Some(PathBuf::from(parse_string_literal(value).with_context(invalid)?));
            }
            "concurrency" => cfg.concurrency = Some(parse_integer_u8(value).with_context(invalid)?),
            "max_retries" => cfg.max_retries = Some(parse_integer_u8(value).with_context(invalid)?),
            "top_n" => cfg.top_n = Some(parse_integer_u64(value).with_context(invalid)?),
            "backoff_base_ms" => {
                cfg.backoff_base_ms = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "min_score" => cfg.min_score = Some(parse_float(value).with_context(invalid)?),
            unknown => {
                bail!("Unknown configuration key: '{unknown}' on line {line_no}");
            }
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    if raw_value.len() < 2 || !raw_value.starts_with('"') || !raw_value.ends_with('"') {
        bail!("Expected double-quoted string");
    }
    Ok(raw_value[1..raw_value.len() - 1].to_string())
}

fn parse_integer_u8(raw_value: &str) -> Result<u8> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<u16>()?;
    u8::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u8"))
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let token = raw_value.trim();
    if token.is_empty() {
        bail!("Expected integer value");
    }
    let value = token.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_float(raw_value: &str) -> Result<f64> {
    let value: f64 = raw_value.trim().parse()?;
    if !value.is_finite() {
        bail!("Expected a finite number");
    }
    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::Parser;

    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["indexdl"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_config_all_fields() {
        let cfg = parse_config_str(
            r#"
            # archive defaults
            base_url = "http://archive.example/files/"
            keywords_file = "keywords.txt"
            output_link_file = "out.txt"   # trailing comment
            download_path = "dl"
            concurrency = 8
            top_n = 3
            min_score = 0.7
            max_retries = 5
            backoff_base_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(cfg.base_url.as_deref(), Some("http://archive.example/files/"));
        assert_eq!(cfg.keywords_file, Some(PathBuf::from("keywords.txt")));
        assert_eq!(cfg.output_link_file, Some(PathBuf::from("out.txt")));
        assert_eq!(cfg.download_path, Some(PathBuf::from("dl")));
        assert_eq!(cfg.concurrency, Some(8));
        assert_eq!(cfg.top_n, Some(3));
        assert_eq!(cfg.min_score, Some(0.7));
        assert_eq!(cfg.max_retries, Some(5));
        assert_eq!(cfg.backoff_base_ms, Some(250));
    }

    #[test]
    fn test_parse_config_hash_inside_string_kept() {
        let cfg = parse_config_str(r#"base_url = "http://h/files/#top""#).unwrap();
        assert_eq!(cfg.base_url.as_deref(), Some("http://h/files/#top"));
    }

    #[test]
    fn test_parse_config_rejects_unknown_key() {
        let err = parse_config_str("color = true").unwrap_err();
        assert!(err.to_string().contains("Unknown configuration key"));
    }

    #[test]
    fn test_parse_config_rejects_missing_equals() {
        let err = parse_config_str("concurrency 5").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_parse_config_rejects_unquoted_string() {
        assert!(parse_config_str("base_url = http://h/").is_err());
    }

    #[test]
    fn test_parse_config_validates_ranges() {
        for raw in [
            "concurrency = 0",
            "concurrency = 101",
            "min_score = 1.5",
            "max_retries = 11",
            "top_n = 0",
            "backoff_base_ms = 60001",
        ] {
            assert!(parse_config_str(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn test_resolve_settings_defaults() {
        let settings = resolve_settings(&args(&[]), None);
        assert_eq!(settings.concurrency, 5);
        assert_eq!(settings.top_n, 1);
        assert!((settings.min_score - 0.6).abs() < f64::EPSILON);
        assert_eq!(settings.max_retries, 3);
        assert_eq!(settings.backoff_base, Duration::from_secs(1));
        assert_eq!(settings.output_link_file, PathBuf::from("links.txt"));
        assert_eq!(settings.download_path, PathBuf::from("."));
        assert!(!settings.download);
    }

    #[test]
    fn test_resolve_settings_file_overrides_defaults() {
        let file = FileConfig {
            concurrency: Some(9),
            min_score: Some(0.8),
            download_path: Some(PathBuf::from("from-file")),
            ..FileConfig::default()
        };
        let settings = resolve_settings(&args(&[]), Some(&file));
        assert_eq!(settings.concurrency, 9);
        assert!((settings.min_score - 0.8).abs() < f64::EPSILON);
        assert_eq!(settings.download_path, PathBuf::from("from-file"));
    }

    #[test]
    fn test_resolve_settings_cli_overrides_file() {
        let file = FileConfig {
            concurrency: Some(9),
            base_url: Some("http://file/".to_string()),
            ..FileConfig::default()
        };
        let settings = resolve_settings(&args(&["-c", "2", "-u", "http://cli/"]), Some(&file));
        assert_eq!(settings.concurrency, 2);
        assert_eq!(settings.base_url.as_deref(), Some("http://cli/"));
    }

    #[test]
    fn test_load_config_explicit_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load_config(Some(&missing)).is_err());
    }

    #[test]
    fn test_load_config_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "top_n = 4\n").unwrap();
        let cfg = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(cfg.top_n, Some(4));
    }
}
