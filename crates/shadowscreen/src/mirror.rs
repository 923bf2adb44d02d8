//! Record pipeline: encode and enqueue on the producer side, read, decode and
//! gap-check on the consumer side.

use std::pin::Pin;

use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use shadowscreen_frame::{
    DrainHandle, FrameConfig, FrameError, FrameReader, FrameWriter, OutputQueue,
};
use shadowscreen_record::{FrameRecord, Gap, GapDetector, RecordError};
use shadowscreen_transport::{Endpoint, MirrorListener, TransportError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Errors surfaced by the record pipeline.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Record(#[from] RecordError),
}

impl MirrorError {
    /// True when the stream cannot deliver anything further.
    ///
    /// Record errors concern a single message; the stream keeps going.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, MirrorError::Record(_))
    }
}

pub type Result<T> = std::result::Result<T, MirrorError>;

/// Producer side: serializes records and hands them to an [`OutputQueue`].
#[derive(Debug, Clone)]
pub struct RecordSink {
    queue: OutputQueue,
}

impl RecordSink {
    /// Wrap an existing queue.
    pub fn new(queue: OutputQueue) -> Self {
        Self { queue }
    }

    /// Start a drain task for `writer` and return a sink feeding it.
    pub fn spawn<W>(writer: FrameWriter<W>) -> (Self, DrainHandle)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (queue, drain) = OutputQueue::spawn(writer);
        (Self::new(queue), drain)
    }

    /// Connect to a consumer at `endpoint` and start draining into it.
    pub async fn connect(
        endpoint: &Endpoint,
        config: FrameConfig,
        cancel: CancellationToken,
    ) -> Result<(Self, DrainHandle)> {
        let stream = shadowscreen_transport::connect(endpoint).await?;
        info!(%endpoint, transport = stream.transport_name(), "connected to consumer");
        let writer = FrameWriter::with_config(stream, config).with_cancellation(cancel);
        Ok(Self::spawn(writer))
    }

    /// Encode `record` and enqueue it. Never waits on the stream.
    pub fn submit(&self, record: &FrameRecord) -> Result<()> {
        let message = record.encode()?;
        self.queue.enqueue(message);
        Ok(())
    }

    /// Flush what is queued, then let the drain task finish.
    pub fn close(&self) {
        self.queue.close();
    }

    pub fn queue(&self) -> &OutputQueue {
        &self.queue
    }
}

/// One record delivered to the consumer, in stream order.
#[derive(Debug, Clone)]
pub struct ReceivedFrame {
    pub record: FrameRecord,
    /// Set when the sequence number was not the one expected.
    pub gap: Option<Gap>,
    /// The message body the record was decoded from.
    pub message: Bytes,
}

type MessageStream = Pin<Box<dyn Stream<Item = shadowscreen_frame::Result<Bytes>> + Send>>;

/// Consumer side: turns a stream of framed messages into decoded records.
///
/// A message that fails to decode is reported as [`MirrorError::Record`] and
/// skipped; the next call continues with the following message. Framing and
/// transport errors are reported once and end the source.
pub struct RecordSource {
    messages: MessageStream,
    gaps: GapDetector,
    finished: bool,
}

impl RecordSource {
    /// Build a source over any stream of framed messages, for example a
    /// `FramedRead` with `AtomCodec` over a dump file.
    pub fn new<S>(messages: S) -> Self
    where
        S: Stream<Item = shadowscreen_frame::Result<Bytes>> + Send + 'static,
    {
        Self {
            messages: Box::pin(messages),
            gaps: GapDetector::new(),
            finished: false,
        }
    }

    /// Build a source reading from a live stream.
    pub fn from_reader<T>(reader: FrameReader<T>) -> Self
    where
        T: AsyncRead + Unpin + Send + 'static,
    {
        Self::new(reader.into_stream())
    }

    /// Accept the next producer on `listener` and read records from it.
    pub async fn accept(
        listener: &MirrorListener,
        config: FrameConfig,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let stream = listener.accept().await?;
        info!(transport = stream.transport_name(), "producer connected");
        let reader = FrameReader::with_config(stream, config).with_cancellation(cancel);
        Ok(Self::from_reader(reader))
    }

    /// Next record, `None` once the stream has ended.
    pub async fn next_frame(&mut self) -> Option<Result<ReceivedFrame>> {
        if self.finished {
            return None;
        }
        let message = match self.messages.next().await {
            Some(Ok(message)) => message,
            Some(Err(err)) => {
                self.finished = true;
                return Some(Err(err.into()));
            }
            None => {
                self.finished = true;
                debug!(gaps = self.gaps.gap_count(), "record source ended");
                return None;
            }
        };

        match FrameRecord::decode(message.clone()) {
            Ok(record) => {
                let gap = self.gaps.observe(record.sequence_number);
                Some(Ok(ReceivedFrame {
                    record,
                    gap,
                    message,
                }))
            }
            Err(err) => {
                warn!(%err, len = message.len(), "discarding malformed frame record");
                Some(Err(err.into()))
            }
        }
    }

    /// Sequence gaps observed so far.
    pub fn gap_count(&self) -> u64 {
        self.gaps.gap_count()
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<ReceivedFrame>> + Send {
        stream::unfold(self, |mut source| async move {
            let item = source.next_frame().await;
            item.map(|item| (item, source))
        })
    }
}

impl std::fmt::Debug for RecordSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordSource")
            .field("gaps", &self.gaps)
            .field("finished", &self.finished)
            .finish()
    }
}
