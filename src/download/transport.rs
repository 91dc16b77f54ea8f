//! Seam between the download manager and the network.
//!
//! The manager only ever sees a [`Transport`] that opens a URL and hands back
//! a byte stream. [`HttpClient`](super::HttpClient) is the production
//! implementation; tests substitute scripted transports.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;

use super::DownloadError;

/// Chunked body of a remote file.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, DownloadError>> + Send>>;

/// An opened remote resource, ready to be streamed to disk.
pub struct RemoteBody {
    /// Size announced by the server (Content-Length), if any.
    pub content_length: Option<u64>,
    /// Body chunks in order.
    pub stream: ByteStream,
}

impl RemoteBody {
    /// Wraps a stream with an optional announced length.
    #[must_use]
    pub fn new(content_length: Option<u64>, stream: ByteStream) -> Self {
        Self {
            content_length,
            stream,
        }
    }
}

impl fmt::Debug for RemoteBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteBody")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Opens remote files for streaming.
///
/// Implementations map non-success responses to
/// [`DownloadError::HttpStatus`] so the retry classifier can see them.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Starts fetching `url`.
    ///
    /// # Errors
    ///
    /// Returns a [`DownloadError`] when the request cannot be sent or the
    /// server answers with a non-success status.
    async fn open(&self, url: &str) -> Result<RemoteBody, DownloadError>;
}
