//! Shared test doubles: flaky HTTP responders, scripted transports and a
//! sleeper that records instead of waiting.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream;
use indexdl_core::download::{
    DownloadError, DownloadTask, ProgressSink, RemoteBody, Sleeper, TaskId, TaskState, Transport,
};
use wiremock::{Respond, ResponseTemplate};

/// Responder that fails the first `fail_count` requests with 500, then returns 200 with body.
pub struct FlakyResponder {
    request_count: Arc<AtomicUsize>,
    fail_count: usize,
    success_body: Vec<u8>,
}

impl FlakyResponder {
    pub fn new(fail_count: usize, success_body: &[u8]) -> (Self, Arc<AtomicUsize>) {
        let request_count = Arc::new(AtomicUsize::new(0));
        (
            Self {
                request_count: Arc::clone(&request_count),
                fail_count,
                success_body: success_body.to_vec(),
            },
            request_count,
        )
    }
}

impl Respond for FlakyResponder {
    fn respond(&self, _request: &wiremock::Request) -> ResponseTemplate {
        let n = self.request_count.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_count {
            ResponseTemplate::new(500).set_body_bytes(b"internal server error".to_vec())
        } else {
            ResponseTemplate::new(200).set_body_bytes(self.success_body.clone())
        }
    }
}

/// What a [`ScriptedTransport`] does for one `open` call.
#[derive(Debug, Clone)]
pub enum Script {
    /// Full body, announced length correct.
    Body(Vec<u8>),
    /// Non-success HTTP status.
    Status(u16),
    /// Sends these bytes, then the connection resets.
    ResetAfter(Vec<u8>),
    /// Sends these bytes, then never finishes.
    Stall(Vec<u8>),
    /// Full body delivered slowly, tracking overlapping streams per URL.
    Slow(Vec<u8>),
    /// Like `Slow`, but the body is one byte short of the announced length.
    SlowShort(Vec<u8>),
}

/// In-process transport replaying per-URL scripts.
///
/// Each `open` consumes the next script for the URL; the last script
/// repeats once the queue is down to one entry.
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Script>>>,
    opens: Mutex<HashMap<String, usize>>,
    active: Mutex<HashMap<String, Arc<ActiveCounter>>>,
    total_opens: AtomicUsize,
}

#[derive(Default)]
pub struct ActiveCounter {
    current: AtomicUsize,
    peak: AtomicUsize,
}

struct ActiveGuard(Arc<ActiveCounter>);

impl ActiveGuard {
    fn new(counter: Arc<ActiveCounter>) -> Self {
        let now = counter.current.fetch_add(1, Ordering::SeqCst) + 1;
        counter.peak.fetch_max(now, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, url: &str, steps: Vec<Script>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), steps.into());
        self
    }

    pub fn opens(&self, url: &str) -> usize {
        self.opens.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_opens(&self) -> usize {
        self.total_opens.load(Ordering::SeqCst)
    }

    pub fn peak_active(&self, url: &str) -> usize {
        self.active
            .lock()
            .unwrap()
            .get(url)
            .map_or(0, |c| c.peak.load(Ordering::SeqCst))
    }

    fn slow_body(&self, url: &str, body: Vec<u8>, missing: u64) -> RemoteBody {
        let counter = Arc::clone(
            self.active
                .lock()
                .unwrap()
                .entry(url.to_string())
                .or_default(),
        );
        let guard = ActiveGuard::new(counter);
        let announced = body.len() as u64 + missing;
        let body_stream = stream::unfold((Some(body), guard), |(body, guard)| async move {
            let body = body?;
            tokio::time::sleep(Duration::from_millis(30)).await;
            Some((chunk(body), (None, guard)))
        });
        RemoteBody::new(Some(announced), Box::pin(body_stream))
    }

    fn next_script(&self, url: &str) -> Option<Script> {
        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts.get_mut(url)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

fn chunk(bytes: Vec<u8>) -> Result<Bytes, DownloadError> {
    Ok(Bytes::from(bytes))
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self, url: &str) -> Result<RemoteBody, DownloadError> {
        *self.opens.lock().unwrap().entry(url.to_string()).or_default() += 1;
        self.total_opens.fetch_add(1, Ordering::SeqCst);

        let Some(script) = self.next_script(url) else {
            return Err(DownloadError::http_status(url, 404));
        };

        match script {
            Script::Body(body) => {
                let len = body.len() as u64;
                Ok(RemoteBody::new(
                    Some(len),
                    Box::pin(stream::iter(vec![chunk(body)])),
                ))
            }
            Script::Status(status) => Err(DownloadError::http_status(url, status)),
            Script::ResetAfter(partial) => {
                let reset =
                    std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset");
                let items = vec![chunk(partial), Err(DownloadError::network(url, reset))];
                Ok(RemoteBody::new(None, Box::pin(stream::iter(items))))
            }
            Script::Stall(partial) => Ok(RemoteBody::new(
                None,
                Box::pin(stream::iter(vec![chunk(partial)]).chain(stream::pending())),
            )),
            Script::Slow(body) => Ok(self.slow_body(url, body, 0)),
            Script::SlowShort(body) => Ok(self.slow_body(url, body, 1)),
        }
    }
}

/// Sleeper that records requested delays and returns immediately.
///
/// When `watch` is set it also records whether that file existed at the
/// start of each backoff.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
    watch: Option<PathBuf>,
    watched_existed: Mutex<Vec<bool>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watching(path: PathBuf) -> Self {
        Self {
            watch: Some(path),
            ..Self::default()
        }
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }

    pub fn watched_existed(&self) -> Vec<bool> {
        self.watched_existed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
        if let Some(path) = &self.watch {
            self.watched_existed.lock().unwrap().push(path.exists());
        }
    }
}

/// Progress sink that keeps every event for assertions.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    pub started: Mutex<Vec<TaskId>>,
    pub progress: Mutex<Vec<(TaskId, u64, Option<u64>)>>,
    pub completed: Mutex<Vec<(TaskId, TaskState)>>,
}

impl RecordingProgress {
    pub fn started_count(&self) -> usize {
        self.started.lock().unwrap().len()
    }
}

impl ProgressSink for RecordingProgress {
    fn on_start(&self, task: &DownloadTask) {
        self.started.lock().unwrap().push(task.id);
    }

    fn on_progress(&self, task_id: TaskId, bytes_transferred: u64, total_bytes: Option<u64>) {
        self.progress
            .lock()
            .unwrap()
            .push((task_id, bytes_transferred, total_bytes));
    }

    fn on_complete(&self, task_id: TaskId, final_state: TaskState) {
        self.completed.lock().unwrap().push((task_id, final_state));
    }
}

/// Minimal Apache-style autoindex page.
pub fn listing_html(names: &[&str]) -> String {
    let mut html = String::from(
        "<html><head><title>Index of /files</title></head><body><h1>Index of /files</h1><pre>\
         <a href=\"?C=N;O=D\">Name</a> <a href=\"?C=M;O=A\">Last modified</a>\n\
         <a href=\"../\">Parent Directory</a>\n",
    );
    for name in names {
        let href = urlencoding::encode(name);
        html.push_str(&format!("<a href=\"{href}\">{name}</a>  2024-01-01 00:00  1.0M\n"));
    }
    html.push_str("</pre></body></html>");
    html
}
