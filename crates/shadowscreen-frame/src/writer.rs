use std::io::ErrorKind;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use crate::codec::{checked_len, FrameConfig, LENGTH_PREFIX_SIZE};
use crate::error::{FrameError, Result};

/// Writes complete messages to any `AsyncWrite` stream.
///
/// Each `send` waits for write readiness before every write attempt. The
/// length prefix must be accepted in one write; the body may be accepted in
/// any number of partial writes. Taking `&mut self` keeps two messages from
/// ever interleaving on the stream.
pub struct FrameWriter<T> {
    inner: T,
    config: FrameConfig,
    cancel: CancellationToken,
}

impl<T: AsyncWrite + Unpin> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop waiting for readiness as soon as `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Send one message: length prefix, body, flush.
    pub async fn send(&mut self, message: &[u8]) -> Result<()> {
        let len = checked_len(message.len(), self.config.max_message_size)?;

        let prefix = len.to_be_bytes();
        let written = self.write_some(&prefix).await?;
        match written {
            0 => {
                warn!("stream accepted no bytes of the length prefix");
                return Err(FrameError::WriteZero {
                    remaining: LENGTH_PREFIX_SIZE + message.len(),
                });
            }
            LENGTH_PREFIX_SIZE => {}
            partial => {
                warn!(written = partial, "length prefix fragmented");
                return Err(FrameError::FragmentedLength { written: partial });
            }
        }

        let mut offset = 0usize;
        while offset < message.len() {
            let sent = self.write_some(&message[offset..]).await?;
            if sent == 0 {
                let remaining = message.len() - offset;
                warn!(remaining, "stream accepted no bytes of the message body");
                return Err(FrameError::WriteZero { remaining });
            }
            offset += sent;
            trace!(sent, remaining = message.len() - offset, "wrote body chunk");
        }

        self.flush().await
    }

    /// Flush the underlying stream.
    pub async fn flush(&mut self) -> Result<()> {
        loop {
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(FrameError::Cancelled),
                result = self.inner.flush() => result,
            };
            match result {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Shut down the write side of the stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await.map_err(FrameError::Io)
    }

    /// Wait for write readiness and perform one best-effort write.
    async fn write_some(&mut self, buf: &[u8]) -> Result<usize> {
        loop {
            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(FrameError::Cancelled),
                result = self.inner.write(buf) => result,
            };
            match result {
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// The cancellation token this writer observes.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum message size for subsequent sends.
    pub fn set_max_message_size(&mut self, max_message_size: usize) {
        self.config.max_message_size = max_message_size;
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::task::{Context, Poll, Waker};

    use bytes::BytesMut;

    use super::*;
    use crate::codec::{decode_message, encode_message};

    /// Accepts at most `max_chunk` bytes per write and can be held
    /// not-ready from the outside.
    #[derive(Clone, Default)]
    pub(crate) struct ThrottledSink {
        pub(crate) state: Arc<Mutex<SinkState>>,
    }

    #[derive(Default)]
    pub(crate) struct SinkState {
        pub(crate) data: Vec<u8>,
        pub(crate) max_chunk: Option<usize>,
        pub(crate) blocked: bool,
        pub(crate) waker: Option<Waker>,
        pub(crate) writes: usize,
    }

    impl ThrottledSink {
        pub(crate) fn chunked(max_chunk: usize) -> Self {
            let sink = Self::default();
            sink.state.lock().unwrap().max_chunk = Some(max_chunk);
            sink
        }

        pub(crate) fn set_blocked(&self, blocked: bool) {
            let mut state = self.state.lock().unwrap();
            state.blocked = blocked;
            if !blocked {
                if let Some(waker) = state.waker.take() {
                    waker.wake();
                }
            }
        }

        pub(crate) fn data(&self) -> Vec<u8> {
            self.state.lock().unwrap().data.clone()
        }
    }

    impl AsyncWrite for ThrottledSink {
        fn poll_write(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            let mut state = self.state.lock().unwrap();
            if state.blocked {
                state.waker = Some(cx.waker().clone());
                return Poll::Pending;
            }
            let n = state.max_chunk.map_or(buf.len(), |max| buf.len().min(max));
            state.data.extend_from_slice(&buf[..n]);
            state.writes += 1;
            Poll::Ready(Ok(n))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn decode_all(wire: &[u8]) -> Vec<Vec<u8>> {
        let mut buf = BytesMut::from(wire);
        let mut out = Vec::new();
        while let Some(message) = decode_message(&mut buf, usize::MAX).unwrap() {
            out.push(message.to_vec());
        }
        assert!(buf.is_empty(), "trailing bytes after last message");
        out
    }

    #[tokio::test]
    async fn write_single_message() {
        let mut writer = FrameWriter::new(Vec::<u8>::new());
        writer.send(b"hello").await.unwrap();

        let wire = writer.into_inner();
        assert_eq!(&wire[..4], &[0, 0, 0, 5]);
        assert_eq!(decode_all(&wire), vec![b"hello".to_vec()]);
    }

    #[tokio::test]
    async fn write_matches_codec_encoding() {
        let mut writer = FrameWriter::new(Vec::<u8>::new());
        writer.send(b"same bytes").await.unwrap();

        let mut expected = BytesMut::new();
        encode_message(b"same bytes", &mut expected).unwrap();
        assert_eq!(writer.into_inner(), expected.to_vec());
    }

    #[tokio::test]
    async fn write_empty_message() {
        let mut writer = FrameWriter::new(Vec::<u8>::new());
        writer.send(b"").await.unwrap();
        assert_eq!(writer.into_inner(), vec![0, 0, 0, 0]);
    }

    #[tokio::test]
    async fn partial_body_writes_complete() {
        let sink = ThrottledSink::chunked(4);
        let mut writer = FrameWriter::new(sink.clone());
        let body: Vec<u8> = (0..=255).collect();

        writer.send(&body).await.unwrap();

        assert_eq!(decode_all(&sink.data()), vec![body]);
        // One prefix write plus 64 body chunks.
        assert_eq!(sink.state.lock().unwrap().writes, 65);
    }

    #[tokio::test]
    async fn fragmented_prefix_is_fatal() {
        let sink = ThrottledSink::chunked(2);
        let mut writer = FrameWriter::new(sink.clone());

        let err = writer.send(b"payload").await.unwrap_err();
        assert!(matches!(err, FrameError::FragmentedLength { written: 2 }));
        assert!(err.is_protocol_error());
        assert_eq!(sink.data().len(), 2, "no body bytes after a fragmented prefix");
    }

    #[tokio::test]
    async fn zero_write_is_transport_error() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send(b"x").await.unwrap_err();
        assert!(matches!(err, FrameError::WriteZero { remaining: 5 }));
        assert!(err.is_transport_error());
    }

    #[tokio::test]
    async fn message_too_large_rejected() {
        let config = FrameConfig {
            max_message_size: 4,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Vec::<u8>::new(), config);

        let err = writer.send(b"oversized").await.unwrap_err();
        assert!(matches!(err, FrameError::MessageTooLarge { size: 9, max: 4 }));
        assert!(writer.into_inner().is_empty());
    }

    #[tokio::test]
    async fn no_bytes_while_not_ready() {
        let sink = ThrottledSink::default();
        sink.set_blocked(true);
        let mut writer = FrameWriter::new(sink.clone());

        let task = tokio::spawn(async move {
            writer.send(b"held back").await.unwrap();
        });

        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(sink.data().is_empty());
        assert!(!task.is_finished());

        sink.set_blocked(false);
        task.await.unwrap();
        assert_eq!(decode_all(&sink.data()), vec![b"held back".to_vec()]);
    }

    #[tokio::test]
    async fn cancellation_interrupts_wait() {
        let sink = ThrottledSink::default();
        sink.set_blocked(true);
        let cancel = CancellationToken::new();
        let mut writer = FrameWriter::new(sink.clone()).with_cancellation(cancel.clone());

        let task = tokio::spawn(async move { writer.send(b"never").await });
        tokio::task::yield_now().await;
        cancel.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, FrameError::Cancelled));
        assert!(sink.data().is_empty());
    }

    #[tokio::test]
    async fn interrupted_write_retries() {
        let writer_impl = InterruptedOnce {
            interrupted: Arc::new(AtomicBool::new(false)),
            data: Vec::new(),
        };
        let flag = Arc::clone(&writer_impl.interrupted);
        let mut writer = FrameWriter::new(writer_impl);

        writer.send(b"retry").await.unwrap();

        assert!(flag.load(Ordering::SeqCst));
        assert_eq!(decode_all(&writer.into_inner().data), vec![b"retry".to_vec()]);
    }

    #[tokio::test]
    async fn accessors_and_into_inner() {
        let mut writer = FrameWriter::new(Vec::<u8>::new());
        writer.set_max_message_size(8);
        assert_eq!(writer.config().max_message_size, 8);
        assert!(!writer.cancellation_token().is_cancelled());
        let _ = writer.get_ref();
        let _ = writer.get_mut();
        let _inner = writer.into_inner();
    }

    struct ZeroWriter;

    impl AsyncWrite for ZeroWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Ok(0))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    struct InterruptedOnce {
        interrupted: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl AsyncWrite for InterruptedOnce {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            let this = self.get_mut();
            if !this.interrupted.swap(true, Ordering::SeqCst) {
                return Poll::Ready(Err(std::io::Error::from(ErrorKind::Interrupted)));
            }
            this.data.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }
}
