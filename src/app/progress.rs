//! Terminal progress bars for download runs.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use indexdl_core::download::{DownloadTask, ProgressSink, TaskId, TaskState};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{msg:30!} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})";
const SPINNER_TEMPLATE: &str = "{spinner} {msg:30!} {bytes} ({bytes_per_sec})";
const OVERALL_TEMPLATE: &str = "[{pos}/{len}] {msg}";

/// One bar per active transfer plus an overall counter.
pub(crate) struct TerminalProgress {
    multi: MultiProgress,
    overall: ProgressBar,
    bars: Mutex<HashMap<TaskId, ProgressBar>>,
}

impl fmt::Debug for TerminalProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TerminalProgress")
            .field("total", &self.overall.length())
            .finish_non_exhaustive()
    }
}

impl TerminalProgress {
    /// Creates the display for `total` tasks; draws nothing unless `visible`.
    pub(crate) fn new(total: usize, visible: bool) -> Self {
        let target = if visible {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        let multi = MultiProgress::with_draw_target(target);
        let overall = multi.add(ProgressBar::new(total as u64));
        overall.set_style(
            ProgressStyle::with_template(OVERALL_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        overall.set_message("downloading");
        Self {
            multi,
            overall,
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn bars(&self) -> MutexGuard<'_, HashMap<TaskId, ProgressBar>> {
        self.bars.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Clears every bar from the terminal.
    pub(crate) fn finish(&self) {
        for (_, bar) in self.bars().drain() {
            bar.finish_and_clear();
        }
        self.overall.finish_and_clear();
    }
}

impl ProgressSink for TerminalProgress {
    fn on_start(&self, task: &DownloadTask) {
        let bar = self.multi.add(ProgressBar::no_length());
        bar.set_style(
            ProgressStyle::with_template(SPINNER_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        let name = task
            .dest_path
            .file_name()
            .map_or_else(|| task.url.clone(), |n| n.to_string_lossy().into_owned());
        bar.set_message(name);
        self.bars().insert(task.id, bar);
    }

    fn on_progress(&self, task_id: TaskId, bytes_transferred: u64, total_bytes: Option<u64>) {
        let bars = self.bars();
        let Some(bar) = bars.get(&task_id) else {
            return;
        };
        if let Some(total) = total_bytes
            && bar.length() != Some(total)
        {
            bar.set_length(total);
            bar.set_style(
                ProgressStyle::with_template(BAR_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
        }
        bar.set_position(bytes_transferred);
    }

    fn on_complete(&self, task_id: TaskId, final_state: TaskState) {
        if let Some(bar) = self.bars().remove(&task_id) {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
        self.overall.inc(1);
        if final_state != TaskState::Succeeded {
            self.overall
                .set_message(format!("downloading (last: task {task_id} {final_state})"));
        }
    }
}
