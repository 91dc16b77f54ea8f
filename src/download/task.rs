//! Download task model and its state machine.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use super::filename::unique_destination;
use super::retry::FailureType;
use crate::resolver::ResolvedLink;

/// Identifier of a task within one run (its position in the input list).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TaskId(pub usize);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a [`DownloadTask`].
///
/// ```text
/// Pending -> InProgress -> Succeeded
///                       -> Retrying -> InProgress
///                       -> Failed
/// (any non-terminal)    -> Interrupted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting in the queue.
    Pending,
    /// A worker is transferring it.
    InProgress,
    /// Waiting out a backoff before the next attempt.
    Retrying,
    /// File written and verified.
    Succeeded,
    /// Gave up after a permanent error or exhausted retries.
    Failed,
    /// The run was cancelled before the task could finish.
    Interrupted,
}

impl TaskState {
    /// Returns true for states a task never leaves.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Interrupted)
    }

    /// Returns true if `self -> next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending | Self::Retrying, Self::InProgress)
                | (
                    Self::InProgress,
                    Self::Succeeded | Self::Retrying | Self::Failed
                )
                | (
                    Self::Pending | Self::InProgress | Self::Retrying,
                    Self::Interrupted
                )
        )
    }

    /// Lower-case label used in summaries.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Retrying => "retrying",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last error a task hit, kept after the underlying error is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskError {
    /// Retry classification of the error.
    pub kind: FailureType,
    /// Rendered error message.
    pub message: String,
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// One file transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// Run-local identifier.
    pub id: TaskId,
    /// Remote URL.
    pub url: String,
    /// Local destination path.
    pub dest_path: PathBuf,
    /// Size the file must have once written, if known up front.
    pub expected_size: Option<u64>,
    /// Attempts started so far.
    pub attempt: u32,
    /// Current lifecycle state.
    pub state: TaskState,
    /// Most recent failure, if any.
    pub last_error: Option<TaskError>,
}

impl DownloadTask {
    /// Creates a pending task.
    #[must_use]
    pub fn new(id: TaskId, url: impl Into<String>, dest_path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            url: url.into(),
            dest_path: dest_path.into(),
            expected_size: None,
            attempt: 0,
            state: TaskState::Pending,
            last_error: None,
        }
    }

    /// Sets the size the written file is verified against.
    #[must_use]
    pub fn with_expected_size(mut self, size: u64) -> Self {
        self.expected_size = Some(size);
        self
    }

    /// Moves the task to `next`.
    ///
    /// Illegal transitions are ignored and reported as `false`; the task
    /// stays in its current state.
    pub fn transition(&mut self, next: TaskState) -> bool {
        if self.state.can_transition_to(next) {
            self.state = next;
            true
        } else {
            tracing::warn!(
                task = %self.id,
                from = %self.state,
                to = %next,
                "ignoring illegal task transition"
            );
            false
        }
    }
}

/// Builds one task per distinct matched URL, targeting `download_dir`.
///
/// Unmatched links are skipped, and a URL already seen earlier in `links`
/// does not get a second task. URLs whose file names collide get numbered
/// destinations (`game.zip`, `game_2.zip`, ...) so no two tasks share a path.
/// Task ids are assigned densely in input order.
#[must_use]
pub fn tasks_from_links(links: &[ResolvedLink], download_dir: &Path) -> Vec<DownloadTask> {
    let mut seen_urls = HashSet::new();
    let mut taken = HashSet::new();
    let mut tasks = Vec::new();

    for link in links.iter().filter(|link| link.matched) {
        if !seen_urls.insert(link.url.as_str()) {
            debug!(keyword = %link.keyword, url = %link.url, "skipping duplicate link");
            continue;
        }
        let dest_path = unique_destination(download_dir, &link.url, &taken);
        taken.insert(dest_path.clone());
        tasks.push(DownloadTask::new(
            TaskId(tasks.len()),
            link.url.clone(),
            dest_path,
        ));
    }
    tasks
}
