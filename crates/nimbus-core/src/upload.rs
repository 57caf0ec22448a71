//! Resumable chunked uploads
//!
//! [`ChunkedUpload`] drives a provider's upload-session protocol:
//!
//! 1. Creates a session for the target path.
//! 2. Reads the source in fragments of at most `chunk_size` bytes and sends
//!    each one through the [`RetryPacer`]. A fragment is held as [`Bytes`],
//!    so a retried attempt resends exactly the same data.
//! 3. Returns the item the provider reports after the final fragment.
//! 4. On any failure after the session exists, cancels it once (a failed
//!    cancel is only logged) and returns the original error.
//!
//! The provider side is the [`ChunkedUploader`] trait. Each of its methods is
//! a single attempt that classifies its own failure; the orchestrator owns
//! retrying.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::UploadConfig;
use crate::error::{Error, Result};
use crate::pacer::{Failure, RetryPacer};

/// Result of a single provider attempt
pub type AttemptResult<T> = std::result::Result<T, Failure<Error>>;

// ============================================================================
// Fragment
// ============================================================================

/// One contiguous byte range of an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Offset of the first byte within the upload
    pub offset: u64,
    /// Total declared size of the upload
    pub total: u64,
    /// The bytes themselves
    pub data: Bytes,
}

impl Fragment {
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Offset of the last byte, inclusive
    pub fn end(&self) -> u64 {
        (self.offset + self.len()).saturating_sub(1)
    }

    /// True if this fragment ends the upload
    pub fn is_last(&self) -> bool {
        self.offset + self.len() == self.total
    }

    /// `Content-Range` header value, e.g. `bytes 0-327679/1048576`
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.offset, self.end(), self.total)
    }
}

// ============================================================================
// Provider capability
// ============================================================================

/// Provider side of an upload-session protocol
#[async_trait]
pub trait ChunkedUploader: Send + Sync {
    /// Opaque session handle (usually an upload URL)
    type Session: Send + Sync;
    /// Item metadata the provider returns once the upload completes
    type Item: Send;

    /// Opens a session for `remote`
    async fn create_session(
        &self,
        remote: &str,
        mod_time: DateTime<Utc>,
    ) -> AttemptResult<Self::Session>;

    /// Sends one fragment; returns the finished item when the provider
    /// reports the upload complete
    async fn upload_fragment(
        &self,
        session: &Self::Session,
        fragment: Fragment,
    ) -> AttemptResult<Option<Self::Item>>;

    /// Abandons the session
    async fn cancel_session(&self, session: &Self::Session) -> AttemptResult<()>;
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Progress callback: `(bytes_sent, total_bytes)`
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send + Sync>;

/// A configured chunked upload, bound to one uploader and pacer
pub struct ChunkedUpload<'a, U: ChunkedUploader + ?Sized> {
    uploader: &'a U,
    pacer: &'a RetryPacer,
    chunk_size: u64,
    timeout: Duration,
    progress: Option<ProgressFn>,
}

impl<'a, U: ChunkedUploader + ?Sized> std::fmt::Debug for ChunkedUpload<'a, U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkedUpload")
            .field("chunk_size", &self.chunk_size)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<'a, U: ChunkedUploader + ?Sized> ChunkedUpload<'a, U> {
    /// Validates the chunk size; no provider call is made
    ///
    /// # Errors
    /// `Fatal` if `config.chunk_size` is zero or not a multiple of
    /// `config.alignment`.
    pub fn new(
        uploader: &'a U,
        pacer: &'a RetryPacer,
        config: &UploadConfig,
        timeout: Duration,
    ) -> Result<Self> {
        if config.alignment == 0 {
            return Err(Error::Fatal("upload alignment must be non-zero".into()));
        }
        if config.chunk_size == 0 || config.chunk_size % config.alignment != 0 {
            return Err(Error::Fatal(format!(
                "chunk size {} is not a positive multiple of {} bytes",
                config.chunk_size, config.alignment
            )));
        }

        Ok(Self {
            uploader,
            pacer,
            chunk_size: config.chunk_size,
            timeout,
            progress: None,
        })
    }

    /// Reports progress after every fragment
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Uploads `size` bytes read from `input` to `remote`
    ///
    /// # Errors
    /// - `Fatal` for a zero-length upload (a session cannot finish without
    ///   a fragment)
    /// - `Timeout` if the whole upload outlives the configured timeout
    /// - `Io` if `input` ends before `size` bytes were read
    /// - whatever the uploader reports for a terminal or exhausted failure
    pub async fn upload<R>(
        &self,
        remote: &str,
        mod_time: DateTime<Utc>,
        size: u64,
        mut input: R,
    ) -> Result<U::Item>
    where
        R: AsyncRead + Unpin + Send,
    {
        if size == 0 {
            return Err(Error::Fatal(format!(
                "zero-length upload of {remote} cannot use an upload session"
            )));
        }

        let deadline = Instant::now() + self.timeout;
        info!(
            remote,
            size,
            chunk_size = self.chunk_size,
            fragments = size.div_ceil(self.chunk_size),
            "Starting chunked upload"
        );

        let session = match tokio::time::timeout_at(
            deadline,
            self.pacer
                .call(|| self.uploader.create_session(remote, mod_time)),
        )
        .await
        {
            Ok(session) => session?,
            Err(_) => return Err(Error::Timeout(self.timeout)),
        };

        let outcome = match tokio::time::timeout_at(
            deadline,
            self.send_fragments(&session, remote, size, &mut input),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::Timeout(self.timeout)),
        };

        match outcome {
            Ok(item) => {
                info!(remote, size, "Chunked upload completed");
                Ok(item)
            }
            Err(err) => {
                warn!(remote, error = %err, "Chunked upload failed, cancelling session");
                self.cancel(&session, remote).await;
                Err(err)
            }
        }
    }

    async fn send_fragments<R>(
        &self,
        session: &U::Session,
        remote: &str,
        size: u64,
        input: &mut R,
    ) -> Result<U::Item>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut position = 0u64;

        loop {
            let len = self.chunk_size.min(size - position);
            let data = read_fragment(input, len).await?;
            let fragment = Fragment {
                offset: position,
                total: size,
                data,
            };
            debug!(remote, range = %fragment.content_range(), "Uploading fragment");

            let item = self
                .pacer
                .call(|| self.uploader.upload_fragment(session, fragment.clone()))
                .await?;

            position += len;
            if let Some(progress) = &self.progress {
                progress(position, size);
            }

            if position == size {
                return item.ok_or_else(|| {
                    Error::Fatal(format!(
                        "upload of {remote} finished without returning an item"
                    ))
                });
            }
        }
    }

    async fn cancel(&self, session: &U::Session, remote: &str) {
        let result: Result<()> = self
            .pacer
            .call(|| self.uploader.cancel_session(session))
            .await;
        if let Err(err) = result {
            warn!(remote, error = %err, "Failed to cancel upload session");
        }
    }
}

/// Reads exactly `len` bytes; a short stream is an `UnexpectedEof` I/O error
async fn read_fragment<R>(input: &mut R, len: u64) -> Result<Bytes>
where
    R: AsyncRead + Unpin + Send,
{
    let len = usize::try_from(len)
        .map_err(|_| Error::Fatal(format!("fragment of {len} bytes does not fit in memory")))?;
    let mut buf = BytesMut::zeroed(len);
    input.read_exact(&mut buf).await?;
    Ok(buf.freeze())
}
