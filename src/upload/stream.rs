//! Scoped upload stream
//!
//! An [`UploadStream`] is the readable view of one uploaded file part. It is
//! released exactly once: either explicitly through [`UploadStream::close`]
//! or when it is dropped, which covers early returns, storage failures and
//! unwinding panics alike.
//!
//! Every open stream is counted by the [`StreamTracker`] it was opened from,
//! so a leaked stream shows up as a non-zero [`StreamTracker::open_streams`].

use crate::metrics;
use bytes::Bytes;
use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// Counts streams that are currently open.
#[derive(Debug, Clone, Default)]
pub struct StreamTracker {
    inner: Arc<TrackerState>,
}

#[derive(Debug, Default)]
struct TrackerState {
    open: AtomicUsize,
    released: AtomicU64,
}

impl StreamTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a stream over a received file part.
    pub fn open(
        &self,
        filename: impl Into<String>,
        content_type: Option<String>,
        data: Bytes,
    ) -> UploadStream {
        self.inner.open.fetch_add(1, Ordering::SeqCst);
        metrics::OPEN_UPLOAD_STREAMS.inc();

        let filename = filename.into();
        tracing::debug!(filename = %filename, bytes = data.len(), "Opened upload stream");

        UploadStream {
            filename,
            content_type,
            size: data.len() as u64,
            inner: Cursor::new(data),
            tracker: self.clone(),
            released: false,
        }
    }

    /// Number of streams opened and not yet released
    pub fn open_streams(&self) -> usize {
        self.inner.open.load(Ordering::SeqCst)
    }

    /// Number of streams released since the tracker was created
    pub fn released_streams(&self) -> u64 {
        self.inner.released.load(Ordering::SeqCst)
    }

    fn release(&self) {
        self.inner.open.fetch_sub(1, Ordering::SeqCst);
        self.inner.released.fetch_add(1, Ordering::SeqCst);
        metrics::OPEN_UPLOAD_STREAMS.dec();
    }
}

/// Single-pass readable stream over one uploaded file
pub struct UploadStream {
    filename: String,
    content_type: Option<String>,
    size: u64,
    inner: Cursor<Bytes>,
    tracker: StreamTracker,
    released: bool,
}

impl UploadStream {
    /// Client-supplied filename, unmodified
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Content type declared for the part, if any
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Total size of the part in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Take the remaining content without copying it.
    ///
    /// The returned buffer shares storage with the received part. The stream
    /// is left at its end.
    pub fn read_all(&mut self) -> Bytes {
        let len = self.inner.get_ref().len();
        let pos = (self.inner.position() as usize).min(len);
        let rest = self.inner.get_ref().slice(pos..);
        self.inner.set_position(len as u64);
        rest
    }

    /// Release the stream now instead of at the end of scope.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.tracker.release();
            tracing::debug!(filename = %self.filename, "Released upload stream");
        }
    }
}

impl AsyncRead for UploadStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl Drop for UploadStream {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for UploadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadStream")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("size", &self.size)
            .field("released", &self.released)
            .finish()
    }
}
