use std::io::ErrorKind;

use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::codec::{FrameConfig, LENGTH_PREFIX_SIZE};
use crate::error::{FrameError, Result};

/// Reads complete messages from any `AsyncRead` stream.
///
/// Handles partial reads internally: callers always get whole message
/// bodies. Waiting for data is never an error; the reader suspends until the
/// stream is readable again.
pub struct FrameReader<T> {
    inner: T,
    scratch: BytesMut,
    config: FrameConfig,
    cancel: CancellationToken,
}

enum Fill {
    Complete,
    /// Stream ended or was cancelled after `received` bytes.
    Ended { received: usize, cancelled: bool },
}

impl<T: AsyncRead + Unpin> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            scratch: BytesMut::with_capacity(config.scratch_capacity),
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop reading as soon as `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Read the next complete message.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly on a message boundary
    /// or the reader is cancelled.
    pub async fn read_message(&mut self) -> Result<Option<Bytes>> {
        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        match self.fill(&mut prefix).await? {
            Fill::Complete => {}
            Fill::Ended {
                received: 0,
                cancelled,
            } => {
                debug!(cancelled, "message stream ended");
                return Ok(None);
            }
            Fill::Ended {
                cancelled: true, ..
            } => return Ok(None),
            Fill::Ended { received, .. } => {
                warn!(received, "stream ended inside a length prefix");
                return Err(FrameError::IncompletePrefix { received });
            }
        }

        let len = u32::from_be_bytes(prefix) as usize;
        if len > self.config.max_message_size {
            return Err(FrameError::MessageTooLarge {
                size: len,
                max: self.config.max_message_size,
            });
        }

        // The scratch buffer keeps its capacity between messages and grows
        // to the declared length when needed.
        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        scratch.resize(len, 0);
        let filled = self.fill(&mut scratch[..]).await;
        let message = match filled {
            Ok(Fill::Complete) => Ok(Some(Bytes::copy_from_slice(&scratch[..len]))),
            Ok(Fill::Ended {
                cancelled: true, ..
            }) => Ok(None),
            Ok(Fill::Ended { received, .. }) => {
                warn!(received, expected = len, "stream ended inside a message body");
                Err(FrameError::ConnectionClosed)
            }
            Err(err) => Err(err),
        };
        self.scratch = scratch;

        if let Ok(Some(body)) = &message {
            trace!(len = body.len(), "read message");
        }
        message
    }

    /// Turn the reader into a lazy stream of message bodies.
    ///
    /// The stream ends on a clean close or cancellation. On the first
    /// framing or transport error it yields that error once, then ends; it
    /// cannot be restarted.
    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes>> {
        futures_util::stream::unfold(Some(self), |state| async move {
            let Some(mut reader) = state else {
                return None;
            };
            match reader.read_message().await {
                Ok(Some(message)) => Some((Ok(message), Some(reader))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }

    /// Read until `dst` is full, the stream ends, or the reader is cancelled.
    ///
    /// Zero-byte reads are retried up to `zero_read_retries` times, pausing
    /// `retry_interval` between attempts, before the stream counts as ended.
    async fn fill(&mut self, dst: &mut [u8]) -> Result<Fill> {
        let mut offset = 0usize;
        let mut zero_reads = 0u32;

        while offset < dst.len() {
            let read = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    return Ok(Fill::Ended { received: offset, cancelled: true });
                }
                read = self.inner.read(&mut dst[offset..]) => read,
            };

            match read {
                Ok(0) => {
                    zero_reads += 1;
                    if zero_reads > self.config.zero_read_retries {
                        return Ok(Fill::Ended {
                            received: offset,
                            cancelled: false,
                        });
                    }
                    debug!(zero_reads, offset, "read made no progress, retrying");
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => {
                            return Ok(Fill::Ended { received: offset, cancelled: true });
                        }
                        _ = tokio::time::sleep(self.config.retry_interval) => {}
                    }
                }
                Ok(n) => {
                    zero_reads = 0;
                    offset += n;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        Ok(Fill::Complete)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum message size for subsequent reads.
    pub fn set_max_message_size(&mut self, max_message_size: usize) {
        self.config.max_message_size = max_message_size;
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
