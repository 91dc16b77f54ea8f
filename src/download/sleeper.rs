//! Backoff sleeping behind a trait so tests can skip real waits.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

/// Suspends the calling worker for a backoff delay.
#[async_trait]
pub trait Sleeper: Debug + Send + Sync {
    /// Waits for `duration`. Must only suspend the calling task.
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
