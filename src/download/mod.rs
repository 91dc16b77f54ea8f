//! Concurrent download stage: tasks, retry policy, transport and manager.
//!
//! # Features
//!
//! - Fixed-size worker pool pulling from one shared queue
//! - Streaming writes (memory-efficient for large files)
//! - Exponential backoff for transient failures, Retry-After for 429
//! - Size verification against the expected size or Content-Length
//! - Partial files removed on every failed attempt
//! - Cooperative cancellation with a bounded grace period
//!
//! # Example
//!
//! ```
//! use std::path::Path;
//! use indexdl_core::download::{TaskState, tasks_from_links};
//! use indexdl_core::resolver::ResolvedLink;
//!
//! let links = vec![
//!     ResolvedLink::matched("zelda", "http://host/files/Zelda%20(USA).zip", 0.9),
//!     ResolvedLink::unmatched("nothing", 0.1),
//! ];
//! let tasks = tasks_from_links(&links, Path::new("/downloads"));
//! assert_eq!(tasks.len(), 1);
//! assert_eq!(tasks[0].dest_path, Path::new("/downloads/Zelda (USA).zip"));
//! assert_eq!(tasks[0].state, TaskState::Pending);
//! ```

mod client;
mod constants;
mod error;
mod filename;
mod manager;
mod path_lock;
mod progress;
mod retry;
mod sleeper;
mod summary;
mod task;
mod transport;

pub use client::{HttpClient, default_user_agent};
pub use constants::DEFAULT_GRACE_PERIOD;
pub use error::DownloadError;
pub use filename::{FALLBACK_FILENAME, destination_for, filename_from_url};
pub use manager::{DEFAULT_CONCURRENCY, DownloadManager, ManagerError};
pub use path_lock::PathLocks;
pub use progress::{NoopProgress, ProgressSink};
pub use retry::{
    DEFAULT_BACKOFF_BASE, DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy,
    classify_error, parse_retry_after, retry_after_delay,
};
pub use sleeper::{Sleeper, TokioSleeper};
pub use summary::{DownloadSummary, TaskOutcome};
pub use task::{DownloadTask, TaskError, TaskId, TaskState, tasks_from_links};
pub use transport::{ByteStream, RemoteBody, Transport};
