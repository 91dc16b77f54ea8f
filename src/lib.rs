//! Indexdl Core Library
//!
//! This library finds files on a static directory-listing archive whose names
//! fuzzily match user-supplied keywords, and downloads them concurrently with
//! retry and cancellation.
//!
//! # Architecture
//!
//! The pipeline runs in two stages:
//! - [`index`] - Fetches and parses a flat directory listing into entries
//! - [`matcher`] - Normalizes names and scores keyword/entry similarity
//! - [`resolver`] - Picks a link per keyword; reads and writes link files
//! - [`download`] - Bounded worker pool that streams links to disk
//!
//! Resolved links can be persisted to a link file and fed back to the
//! download stage later without repeating resolution.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod index;
pub mod matcher;
pub mod resolver;

// Re-export commonly used types
pub use download::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES, DownloadError, DownloadManager, DownloadSummary,
    DownloadTask, FailureType, HttpClient, ManagerError, ProgressSink, RetryPolicy, TaskId,
    TaskState, Transport, tasks_from_links,
};
pub use index::{IndexEntry, IndexError, fetch_listing, parse_listing};
pub use matcher::{MatchCandidate, MatchError, Matcher, Scorer};
pub use resolver::{LinkResolver, ResolutionReport, ResolveError, ResolvedLink};
