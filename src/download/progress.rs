//! Progress reporting hooks consumed by the download manager.

use std::fmt::Debug;

use super::task::{DownloadTask, TaskId, TaskState};

/// Receives byte-count updates and completion events from workers.
///
/// Calls arrive from many workers concurrently; implementations must be
/// cheap and must not block.
pub trait ProgressSink: Debug + Send + Sync {
    /// A worker picked up `task` and is about to start an attempt.
    fn on_start(&self, _task: &DownloadTask) {}

    /// `bytes_transferred` bytes of the current attempt are on disk.
    fn on_progress(&self, task_id: TaskId, bytes_transferred: u64, total_bytes: Option<u64>);

    /// The task reached its final state.
    fn on_complete(&self, task_id: TaskId, final_state: TaskState);
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_progress(&self, _task_id: TaskId, _bytes_transferred: u64, _total_bytes: Option<u64>) {}

    fn on_complete(&self, _task_id: TaskId, _final_state: TaskState) {}
}
