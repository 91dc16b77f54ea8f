//! Concurrent download manager with retry and cancellation.
//!
//! The manager runs a fixed pool of workers that pull [`DownloadTask`]s from a
//! shared FIFO queue. Each worker streams its task to disk through a
//! [`Transport`], retries transient failures with exponential backoff, and
//! reports into a shared summary.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use indexdl_core::download::{
//!     DownloadManager, HttpClient, NoopProgress, RetryPolicy, tasks_from_links,
//! };
//! use indexdl_core::resolver::ResolvedLink;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let links = vec![ResolvedLink::matched("game", "https://example.com/files/game.zip", 1.0)];
//! let tasks = tasks_from_links(&links, Path::new("./downloads"));
//!
//! let manager = DownloadManager::new(5, RetryPolicy::default())?;
//! let summary = manager
//!     .run(tasks, Arc::new(HttpClient::new()), Arc::new(NoopProgress))
//!     .await;
//! println!("succeeded: {}, failed: {}", summary.succeeded, summary.failed);
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::constants::DEFAULT_GRACE_PERIOD;
use super::path_lock::PathLocks;
use super::progress::ProgressSink;
use super::retry::{RetryDecision, RetryPolicy, classify_error, retry_after_delay};
use super::sleeper::{Sleeper, TokioSleeper};
use super::summary::{DownloadSummary, SummaryBuilder, TaskOutcome};
use super::task::{DownloadTask, TaskError, TaskId, TaskState};
use super::transport::{RemoteBody, Transport};
use super::DownloadError;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Default number of workers.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Error type for download manager construction.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// Bounded worker pool that turns download tasks into files on disk.
///
/// # Concurrency Model
///
/// - Exactly `concurrency` workers are spawned per run
/// - Workers pull from one shared queue until it is empty
/// - A backoff sleep only suspends the worker that is retrying
/// - [`PathLocks`] keeps two workers off the same destination path
///
/// # Cancellation
///
/// When the run token is cancelled no further tasks are dispatched. Active
/// transfers and backoff sleeps notice the token, remove their partial file
/// and end as [`TaskState::Interrupted`]. Workers still running after the
/// grace period are aborted and their destination files removed.
#[derive(Debug, Clone)]
pub struct DownloadManager {
    concurrency: usize,
    retry_policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    grace_period: Duration,
    path_locks: PathLocks,
}

impl DownloadManager {
    /// Creates a manager with the given pool size and retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`ManagerError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-100).
    #[instrument(level = "debug", skip(retry_policy))]
    pub fn new(concurrency: usize, retry_policy: RetryPolicy) -> Result<Self, ManagerError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(ManagerError::InvalidConcurrency { value: concurrency });
        }

        debug!(
            concurrency,
            max_retries = retry_policy.max_retries(),
            "creating download manager"
        );

        Ok(Self {
            concurrency,
            retry_policy,
            sleeper: Arc::new(TokioSleeper),
            grace_period: DEFAULT_GRACE_PERIOD,
            path_locks: PathLocks::new(),
        })
    }

    /// Replaces the backoff sleeper.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Sets how long in-flight work may take to wind down after cancellation.
    #[must_use]
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the configured retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Runs every task to a terminal state.
    ///
    /// Individual task failures never make this fail; they are counted in
    /// the returned summary.
    pub async fn run(
        &self,
        tasks: Vec<DownloadTask>,
        transport: Arc<dyn Transport>,
        progress: Arc<dyn ProgressSink>,
    ) -> DownloadSummary {
        self.run_cancellable(tasks, transport, progress, CancellationToken::new())
            .await
    }

    /// Runs every task until done or until `cancel` fires.
    ///
    /// Tasks that had not finished when the run was cancelled, including
    /// ones never dispatched, are reported as [`TaskState::Interrupted`].
    #[instrument(
        skip_all,
        fields(tasks = tasks.len(), concurrency = self.concurrency)
    )]
    pub async fn run_cancellable(
        &self,
        tasks: Vec<DownloadTask>,
        transport: Arc<dyn Transport>,
        progress: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> DownloadSummary {
        let ctx = Arc::new(RunContext::new(
            self,
            tasks,
            transport,
            progress,
            cancel.clone(),
        ));

        info!("starting download run");

        let mut workers = JoinSet::new();
        for worker_id in 0..self.concurrency {
            workers.spawn(worker_loop(Arc::clone(&ctx), worker_id));
        }

        let finished = tokio::select! {
            () = drain_workers(&mut workers) => true,
            () = cancel.cancelled() => false,
        };

        if !finished {
            info!(
                grace_ms = self.grace_period.as_millis(),
                "cancellation requested, waiting for in-flight transfers"
            );
            if tokio::time::timeout(self.grace_period, drain_workers(&mut workers))
                .await
                .is_err()
            {
                warn!("grace period elapsed, aborting remaining workers");
                workers.abort_all();
                drain_workers(&mut workers).await;
            }
        }

        ctx.interrupt_leftovers().await;

        let summary = ctx.summary.finish();
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            retried = summary.retried,
            interrupted = summary.interrupted,
            "download run finished"
        );
        summary
    }
}

async fn drain_workers(workers: &mut JoinSet<()>) {
    while let Some(result) = workers.join_next().await {
        if let Err(error) = result
            && !error.is_cancelled()
        {
            warn!(error = %error, "download worker panicked");
        }
    }
}

/// A task some worker currently holds.
struct InFlight {
    task: DownloadTask,
    /// The destination file may exist with content from this attempt.
    writing: bool,
}

/// State shared by the workers of one run.
struct RunContext {
    queue: Mutex<VecDeque<DownloadTask>>,
    in_flight: Mutex<HashMap<TaskId, InFlight>>,
    /// Destinations finished in this run, with the URL that wrote them.
    completed: Mutex<HashMap<PathBuf, String>>,
    summary: SummaryBuilder,
    transport: Arc<dyn Transport>,
    progress: Arc<dyn ProgressSink>,
    sleeper: Arc<dyn Sleeper>,
    retry_policy: RetryPolicy,
    path_locks: PathLocks,
    cancel: CancellationToken,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RunContext {
    fn new(
        manager: &DownloadManager,
        tasks: Vec<DownloadTask>,
        transport: Arc<dyn Transport>,
        progress: Arc<dyn ProgressSink>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            queue: Mutex::new(tasks.into_iter().collect()),
            in_flight: Mutex::new(HashMap::new()),
            completed: Mutex::new(HashMap::new()),
            summary: SummaryBuilder::default(),
            transport,
            progress,
            sleeper: Arc::clone(&manager.sleeper),
            retry_policy: manager.retry_policy.clone(),
            path_locks: manager.path_locks.clone(),
            cancel,
        }
    }

    /// Pops the next task and registers it as in flight in one step.
    fn next_task(&self) -> Option<DownloadTask> {
        let task = lock(&self.queue).pop_front()?;
        lock(&self.in_flight).insert(
            task.id,
            InFlight {
                task: task.clone(),
                writing: false,
            },
        );
        Some(task)
    }

    fn update_in_flight(&self, task: &DownloadTask, writing: bool) {
        if let Some(entry) = lock(&self.in_flight).get_mut(&task.id) {
            entry.task = task.clone();
            entry.writing = writing;
        }
    }

    /// Remembers that `task` produced its destination file.
    fn mark_completed(&self, task: &DownloadTask) {
        lock(&self.completed).insert(task.dest_path.clone(), task.url.clone());
    }

    /// URL of the task that already finished `path` in this run, if any.
    fn completed_by(&self, path: &Path) -> Option<String> {
        lock(&self.completed).get(path).cloned()
    }

    /// Records a terminal outcome and drops the in-flight entry.
    fn finish(&self, outcome: TaskOutcome) {
        let id = outcome.id;
        let state = outcome.state;
        lock(&self.in_flight).remove(&id);
        self.summary.record(outcome);
        self.progress.on_complete(id, state);
    }

    /// Marks every task that never reached a terminal state as interrupted.
    ///
    /// Runs after all workers are gone, so in-flight entries belong to
    /// aborted workers and their files are removed here.
    async fn interrupt_leftovers(&self) {
        let stranded: Vec<InFlight> = lock(&self.in_flight).drain().map(|(_, v)| v).collect();
        for InFlight { mut task, writing } in stranded {
            if writing {
                remove_partial(&task.dest_path).await;
            }
            task.transition(TaskState::Interrupted);
            warn!(task = %task.id, url = %task.url, "transfer aborted after grace period");
            self.finish(TaskOutcome::from_task(&task, 0));
        }

        let undispatched: Vec<DownloadTask> = lock(&self.queue).drain(..).collect();
        if !undispatched.is_empty() {
            info!(count = undispatched.len(), "tasks never dispatched");
        }
        for mut task in undispatched {
            task.transition(TaskState::Interrupted);
            self.finish(TaskOutcome::from_task(&task, 0));
        }
    }
}

async fn worker_loop(ctx: Arc<RunContext>, worker_id: usize) {
    debug!(worker_id, "worker started");
    while !ctx.cancel.is_cancelled() {
        let Some(task) = ctx.next_task() else {
            break;
        };
        debug!(worker_id, task = %task.id, url = %task.url, "dequeued task");
        let outcome = process_task(&ctx, task).await;
        ctx.finish(outcome);
    }
    debug!(worker_id, "worker stopped");
}

/// Drives one task through attempts and backoffs to a terminal state.
async fn process_task(ctx: &RunContext, mut task: DownloadTask) -> TaskOutcome {
    let _path_guard = tokio::select! {
        biased;
        () = ctx.cancel.cancelled() => {
            task.transition(TaskState::Interrupted);
            return TaskOutcome::from_task(&task, 0);
        }
        guard = ctx.path_locks.acquire(&task.dest_path) => guard,
    };

    ctx.progress.on_start(&task);

    loop {
        task.transition(TaskState::InProgress);
        task.attempt += 1;
        ctx.update_in_flight(&task, false);

        let error = match attempt_transfer(ctx, &task).await {
            Ok(bytes) => {
                task.transition(TaskState::Succeeded);
                ctx.mark_completed(&task);
                info!(
                    task = %task.id,
                    path = %task.dest_path.display(),
                    bytes,
                    attempts = task.attempt,
                    "download completed"
                );
                return TaskOutcome::from_task(&task, bytes);
            }
            Err(error) => error,
        };

        if error.is_cancelled() {
            task.transition(TaskState::Interrupted);
            info!(task = %task.id, url = %task.url, "download interrupted");
            return TaskOutcome::from_task(&task, 0);
        }

        let kind = classify_error(&error);
        task.last_error = Some(TaskError {
            kind,
            message: error.to_string(),
        });

        match ctx.retry_policy.should_retry(kind, task.attempt) {
            RetryDecision::Retry { delay, attempt } => {
                let delay = retry_after_delay(&error).unwrap_or(delay);
                task.transition(TaskState::Retrying);
                ctx.update_in_flight(&task, false);
                ctx.summary.increment_retried();
                warn!(
                    task = %task.id,
                    url = %task.url,
                    error = %error,
                    next_attempt = attempt,
                    delay_ms = delay.as_millis(),
                    "download failed, retrying"
                );

                tokio::select! {
                    biased;
                    () = ctx.cancel.cancelled() => {
                        task.transition(TaskState::Interrupted);
                        info!(task = %task.id, "interrupted during backoff");
                        return TaskOutcome::from_task(&task, 0);
                    }
                    () = ctx.sleeper.sleep(delay) => {}
                }
            }
            RetryDecision::DoNotRetry { reason } => {
                task.transition(TaskState::Failed);
                warn!(
                    task = %task.id,
                    url = %task.url,
                    error = %error,
                    attempts = task.attempt,
                    reason = %reason,
                    "download failed"
                );
                return TaskOutcome::from_task(&task, 0);
            }
        }
    }
}

/// One attempt: open, write from scratch, verify.
///
/// On any error the destination file is removed before returning, so a retry
/// never sees bytes from an earlier attempt. A destination another task
/// already finished is never opened.
async fn attempt_transfer(ctx: &RunContext, task: &DownloadTask) -> Result<u64, DownloadError> {
    if let Some(owner) = ctx.completed_by(&task.dest_path) {
        return Err(DownloadError::destination_taken(&task.dest_path, owner));
    }

    let body = tokio::select! {
        biased;
        () = ctx.cancel.cancelled() => return Err(DownloadError::cancelled(&task.url)),
        opened = ctx.transport.open(&task.url) => opened?,
    };

    if let Some(parent) = task.dest_path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DownloadError::io(parent, e))?;
    }

    ctx.update_in_flight(task, true);
    let result = write_body(ctx, task, body).await;
    if result.is_err() {
        remove_partial(&task.dest_path).await;
        ctx.update_in_flight(task, false);
    }
    result
}

async fn write_body(
    ctx: &RunContext,
    task: &DownloadTask,
    body: RemoteBody,
) -> Result<u64, DownloadError> {
    let path = task.dest_path.as_path();
    let file = File::create(path)
        .await
        .map_err(|e| DownloadError::io(path, e))?;
    let mut writer = BufWriter::new(file);

    let total = task.expected_size.or(body.content_length);
    let mut stream = body.stream;
    let mut written: u64 = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = ctx.cancel.cancelled() => return Err(DownloadError::cancelled(&task.url)),
            next = stream.next() => next,
        };
        let Some(chunk) = next else {
            break;
        };
        let chunk = chunk?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        written += chunk.len() as u64;
        ctx.progress.on_progress(task.id, written, total);
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(path, e))?;

    if let Some(expected) = total
        && expected != written
    {
        return Err(DownloadError::integrity(path, expected, written));
    }

    Ok(written)
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed partial file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove partial file"),
    }
}
