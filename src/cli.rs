//! CLI argument definitions using clap derive macros.
//!
//! Options that can also come from the config file are `Option`s so the
//! merge step can tell "not given" apart from "given the default".

use std::path::PathBuf;

use clap::Parser;

/// Fuzzy-match files on a directory-listing archive and download them.
///
/// Resolves each keyword to the best-matching link on the listing page,
/// writes the picks to a link file, and optionally downloads them. A link
/// file written earlier can be downloaded directly with --link-file.
#[derive(Parser, Debug)]
#[command(name = "indexdl")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// URL of the directory listing to match against
    #[arg(short = 'u', long = "url")]
    pub base_url: Option<String>,

    /// File with one search keyword per line
    #[arg(short = 'k', long = "keywords")]
    pub keywords_file: Option<PathBuf>,

    /// Where to write resolved links (default: links.txt)
    #[arg(short = 'o', long = "output")]
    pub output_link_file: Option<PathBuf>,

    /// Skip resolution and download the links in this file
    #[arg(short = 'l', long = "link-file")]
    pub link_file_in: Option<PathBuf>,

    /// Download matched links right after resolution
    #[arg(short = 'd', long)]
    pub download: bool,

    /// Maximum concurrent downloads (1-100, default 5)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Directory to save downloads to (default: current directory)
    #[arg(short = 'p', long = "path")]
    pub download_path: Option<PathBuf>,

    /// Candidates to keep per keyword; extras are listed for review (default 1)
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub top_n: Option<u16>,

    /// Minimum similarity score for a match, 0.0-1.0 (default 0.6)
    #[arg(long, value_parser = parse_min_score)]
    pub min_score: Option<f64>,

    /// Maximum retries for transient failures (0-10, default 3)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub max_retries: Option<u8>,

    /// Base delay before the first retry in milliseconds (default 1000)
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=60_000))]
    pub backoff_base_ms: Option<u64>,

    /// Write a JSON report of the run to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Read defaults from this config file instead of the standard location
    #[arg(long)]
    pub config: Option<PathBuf>,
}

fn parse_min_score(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("'{raw}' is not a number"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is outside 0.0..=1.0"))
    }
}
