//! Aggregated results of a download run.

use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

use super::task::{DownloadTask, TaskError, TaskId, TaskState};

/// Final record of a single task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskOutcome {
    /// Task identifier.
    pub id: TaskId,
    /// Remote URL.
    pub url: String,
    /// Destination path.
    pub dest_path: PathBuf,
    /// Terminal state (`succeeded`, `failed` or `interrupted`).
    pub state: TaskState,
    /// Attempts started, including the first.
    pub attempts: u32,
    /// Bytes written by the last attempt that kept its file.
    pub bytes: u64,
    /// Last error seen, if any.
    pub last_error: Option<TaskError>,
}

impl TaskOutcome {
    /// Builds an outcome from a task that reached a terminal state.
    #[must_use]
    pub fn from_task(task: &DownloadTask, bytes: u64) -> Self {
        Self {
            id: task.id,
            url: task.url.clone(),
            dest_path: task.dest_path.clone(),
            state: task.state,
            attempts: task.attempt,
            bytes,
            last_error: task.last_error.clone(),
        }
    }
}

/// Aggregate result of [`DownloadManager::run`](super::DownloadManager::run).
///
/// Immutable once returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DownloadSummary {
    /// Tasks that finished with a verified file.
    pub succeeded: usize,
    /// Tasks that gave up.
    pub failed: usize,
    /// Retry attempts made across all tasks.
    pub retried: usize,
    /// Tasks cut short by cancellation.
    pub interrupted: usize,
    /// Per-task outcomes ordered by task id.
    pub outcomes: Vec<TaskOutcome>,
}

impl DownloadSummary {
    /// Total tasks accounted for.
    #[must_use]
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Outcomes of failed tasks, with their final error.
    pub fn failures(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.state == TaskState::Failed)
    }

    /// Outcomes of interrupted tasks.
    pub fn interruptions(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.state == TaskState::Interrupted)
    }

    /// Looks up the outcome of one task.
    #[must_use]
    pub fn outcome(&self, id: TaskId) -> Option<&TaskOutcome> {
        self.outcomes.iter().find(|o| o.id == id)
    }

    /// Returns true when every task succeeded.
    #[must_use]
    pub fn is_complete_success(&self) -> bool {
        self.failed == 0 && self.interrupted == 0
    }
}

/// Thread-safe accumulator the workers report into.
#[derive(Debug, Default)]
pub(crate) struct SummaryBuilder {
    outcomes: Mutex<Vec<TaskOutcome>>,
    retried: AtomicUsize,
}

impl SummaryBuilder {
    pub(crate) fn record(&self, outcome: TaskOutcome) {
        self.outcomes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(outcome);
    }

    pub(crate) fn increment_retried(&self) {
        self.retried.fetch_add(1, Ordering::SeqCst);
    }

    /// Takes the recorded outcomes and builds the final summary.
    pub(crate) fn finish(&self) -> DownloadSummary {
        let mut outcomes = std::mem::take(
            &mut *self
                .outcomes
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner),
        );
        outcomes.sort_by_key(|o| o.id);

        let count = |state: TaskState| outcomes.iter().filter(|o| o.state == state).count();
        DownloadSummary {
            succeeded: count(TaskState::Succeeded),
            failed: count(TaskState::Failed),
            retried: self.retried.load(Ordering::SeqCst),
            interrupted: count(TaskState::Interrupted),
            outcomes,
        }
    }
}
