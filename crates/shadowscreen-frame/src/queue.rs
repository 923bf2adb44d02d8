//! Single-writer output queue.
//!
//! Any number of producers call [`OutputQueue::enqueue`] without blocking.
//! One drain task owns the stream and sends queued messages strictly in
//! FIFO order, one at a time.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::io::AsyncWrite;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::{FrameError, Result};
use crate::writer::FrameWriter;

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Bytes>,
    /// A message has been taken from `pending` and is being written.
    in_flight: bool,
    /// A send failed; nothing further will be written.
    broken: bool,
    /// Drain what is pending, then stop.
    closing: bool,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<QueueState>,
    wake: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Producer handle for one stream's pending write queue.
///
/// Cloning shares the same queue and drain task. Dropping the last clone
/// closes the queue: what is already queued is still flushed.
#[derive(Debug, Clone)]
pub struct OutputQueue {
    producer: Arc<Producer>,
}

/// Shared by every `OutputQueue` clone; the drain task only holds `Shared`.
#[derive(Debug)]
struct Producer {
    shared: Arc<Shared>,
}

impl Drop for Producer {
    fn drop(&mut self) {
        self.shared.lock().closing = true;
        self.shared.wake.notify_one();
    }
}

enum Next {
    Send(Bytes),
    Closed,
    Idle,
}

/// Completion handle for the drain task.
///
/// Resolves to the error that broke the stream, or `Ok(())` once the queue
/// is closed and flushed.
#[derive(Debug)]
pub struct DrainHandle {
    task: JoinHandle<Result<()>>,
}

impl OutputQueue {
    /// Start the drain task for `writer` on the current tokio runtime.
    ///
    /// Cancelling the writer's token stops the drain task promptly, even
    /// while it waits for readiness or for new messages.
    pub fn spawn<W>(writer: FrameWriter<W>) -> (Self, DrainHandle)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState::default()),
            wake: Notify::new(),
        });
        let cancel = writer.cancellation_token().clone();
        let task = tokio::spawn(drain(Arc::clone(&shared), writer, cancel));
        (
            Self {
                producer: Arc::new(Producer { shared }),
            },
            DrainHandle { task },
        )
    }

    /// Append `message` to the tail of the queue and return immediately.
    ///
    /// Once the stream is broken the message is dropped: enqueue still
    /// succeeds locally, but nothing more is flushed.
    pub fn enqueue(&self, message: impl Into<Bytes>) {
        let message = message.into();
        {
            let mut state = self.producer.shared.lock();
            if state.broken {
                trace!(len = message.len(), "dropping message for broken stream");
                return;
            }
            if state.closing {
                debug!(len = message.len(), "dropping message enqueued after close");
                return;
            }
            state.pending.push_back(message);
        }
        self.producer.shared.wake.notify_one();
    }

    /// Flush everything already queued, then let the drain task finish.
    pub fn close(&self) {
        self.producer.shared.lock().closing = true;
        self.producer.shared.wake.notify_one();
    }

    /// Messages waiting behind the one in flight.
    pub fn pending(&self) -> usize {
        self.producer.shared.lock().pending.len()
    }

    /// True while a message is being written.
    pub fn is_in_flight(&self) -> bool {
        self.producer.shared.lock().in_flight
    }

    /// True once a send has failed on this stream.
    pub fn is_broken(&self) -> bool {
        self.producer.shared.lock().broken
    }
}

impl DrainHandle {
    /// Wait for the drain task to finish.
    pub async fn join(self) -> Result<()> {
        self.task
            .await
            .map_err(|err| FrameError::DrainTask(err.to_string()))?
    }

    /// True once the drain task has stopped.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the drain task without flushing.
    pub fn abort(&self) {
        self.task.abort();
    }
}

async fn drain<W>(
    shared: Arc<Shared>,
    mut writer: FrameWriter<W>,
    cancel: CancellationToken,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    debug!("output queue drain started");
    loop {
        let next = {
            let mut state = shared.lock();
            match state.pending.pop_front() {
                Some(message) => {
                    state.in_flight = true;
                    Next::Send(message)
                }
                None if state.closing => Next::Closed,
                None => Next::Idle,
            }
        };

        let message = match next {
            Next::Send(message) => message,
            Next::Closed => {
                debug!("output queue drained and closed");
                if let Err(err) = writer.shutdown().await {
                    debug!(%err, "shutdown after close failed");
                }
                return Ok(());
            }
            Next::Idle => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("output queue drain cancelled while idle");
                        return Err(FrameError::Cancelled);
                    }
                    _ = shared.wake.notified() => {}
                }
                continue;
            }
        };

        let result = writer.send(&message).await;
        let mut state = shared.lock();
        state.in_flight = false;
        if let Err(err) = result {
            state.broken = true;
            let dropped = state.pending.len();
            state.pending.clear();
            drop(state);
            warn!(%err, dropped, "output stream broken; draining stopped");
            return Err(err);
        }
        trace!(len = message.len(), pending = state.pending.len(), "message sent");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::BytesMut;
    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::codec::decode_message;
    use crate::writer::tests::ThrottledSink;

    fn decode_all(wire: &[u8]) -> Vec<Vec<u8>> {
        let mut buf = BytesMut::from(wire);
        let mut out = Vec::new();
        while let Some(message) = decode_message(&mut buf, usize::MAX).unwrap() {
            out.push(message.to_vec());
        }
        assert!(buf.is_empty());
        out
    }

    #[tokio::test]
    async fn drains_in_fifo_order() {
        let sink = ThrottledSink::chunked(5);
        let (queue, drain) = OutputQueue::spawn(FrameWriter::new(sink.clone()));

        queue.enqueue(Bytes::from_static(b"m1"));
        queue.enqueue(b"m2-longer-body".to_vec());
        queue.enqueue(Bytes::new());
        queue.enqueue(b"m3".to_vec());
        queue.close();
        drain.join().await.unwrap();

        assert_eq!(
            decode_all(&sink.data()),
            vec![
                b"m1".to_vec(),
                b"m2-longer-body".to_vec(),
                Vec::new(),
                b"m3".to_vec()
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_producers_never_interleave() {
        let sink = ThrottledSink::chunked(7);
        let (queue, drain) = OutputQueue::spawn(FrameWriter::new(sink.clone()));

        let mut producers = Vec::new();
        for producer in 0..4u8 {
            let queue = queue.clone();
            producers.push(tokio::spawn(async move {
                for i in 0..50u8 {
                    queue.enqueue(vec![producer, i, producer, i, producer]);
                    if i % 8 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            }));
        }
        for producer in producers {
            producer.await.unwrap();
        }
        queue.close();
        drain.join().await.unwrap();

        let messages = decode_all(&sink.data());
        assert_eq!(messages.len(), 200);
        for producer in 0..4u8 {
            let sequence: Vec<u8> = messages
                .iter()
                .filter(|m| m[0] == producer)
                .map(|m| {
                    assert_eq!(m, &vec![producer, m[1], producer, m[1], producer]);
                    m[1]
                })
                .collect();
            assert_eq!(sequence, (0..50u8).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn backpressure_holds_then_resumes() {
        let sink = ThrottledSink::default();
        sink.set_blocked(true);
        let (queue, drain) = OutputQueue::spawn(FrameWriter::new(sink.clone()));

        queue.enqueue(b"first".to_vec());
        queue.enqueue(b"second".to_vec());
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(sink.data().is_empty());
        assert!(queue.is_in_flight());
        assert_eq!(queue.pending(), 1);

        sink.set_blocked(false);
        queue.close();
        drain.join().await.unwrap();

        assert_eq!(
            decode_all(&sink.data()),
            vec![b"first".to_vec(), b"second".to_vec()]
        );
        assert!(!queue.is_in_flight());
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test]
    async fn send_failure_breaks_queue() {
        let sink = ThrottledSink::chunked(2);
        let (queue, drain) = OutputQueue::spawn(FrameWriter::new(sink.clone()));

        queue.enqueue(b"doomed".to_vec());
        let err = drain.join().await.unwrap_err();
        assert!(matches!(err, FrameError::FragmentedLength { written: 2 }));
        assert!(queue.is_broken());

        // Still accepted locally, never flushed.
        queue.enqueue(b"ignored".to_vec());
        assert_eq!(queue.pending(), 0);
        assert_eq!(sink.data().len(), 2);
    }

    #[tokio::test]
    async fn cancellation_stops_idle_drain() {
        let cancel = CancellationToken::new();
        let writer = FrameWriter::new(ThrottledSink::default()).with_cancellation(cancel.clone());
        let (_queue, drain) = OutputQueue::spawn(writer);

        tokio::task::yield_now().await;
        assert!(!drain.is_finished());

        cancel.cancel();
        assert!(matches!(drain.join().await, Err(FrameError::Cancelled)));
    }

    #[tokio::test]
    async fn abort_surfaces_as_drain_task_error() {
        let (_queue, drain) = OutputQueue::spawn(FrameWriter::new(ThrottledSink::default()));
        drain.abort();
        assert!(matches!(drain.join().await, Err(FrameError::DrainTask(_))));
    }

    #[tokio::test]
    async fn enqueue_after_close_is_dropped() {
        let sink = ThrottledSink::default();
        let (queue, drain) = OutputQueue::spawn(FrameWriter::new(sink.clone()));

        queue.enqueue(b"kept".to_vec());
        queue.close();
        queue.enqueue(b"late".to_vec());
        drain.join().await.unwrap();

        assert_eq!(decode_all(&sink.data()), vec![b"kept".to_vec()]);
    }

    #[tokio::test]
    async fn dropping_last_handle_flushes_and_closes() {
        let (client, mut server) = tokio::io::duplex(1024);
        let (queue, drain) = OutputQueue::spawn(FrameWriter::new(client));

        let producer = queue.clone();
        queue.enqueue(b"m1".to_vec());
        drop(queue);
        producer.enqueue(b"m2".to_vec());
        drop(producer);

        tokio::time::timeout(Duration::from_secs(5), drain.join())
            .await
            .expect("drain should stop once every handle is gone")
            .unwrap();

        let mut wire = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), server.read_to_end(&mut wire))
            .await
            .expect("peer should see end of stream")
            .unwrap();
        assert_eq!(decode_all(&wire), vec![b"m1".to_vec(), b"m2".to_vec()]);
    }
}
