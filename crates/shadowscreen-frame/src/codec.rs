use std::time::Duration;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{FrameError, Result};

/// Length prefix: one big-endian `u32`.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum message size: 16 MiB.
pub const DEFAULT_MAX_MESSAGE: usize = 16 * 1024 * 1024;

/// Default initial size of the reader's scratch buffer.
pub const DEFAULT_SCRATCH_CAPACITY: usize = 1_000_000;

/// Encode one message into the wire format.
///
/// Wire format:
/// ```text
/// ┌───────────────┬──────────────────┐
/// │ Length (4B BE)│ Body             │
/// │               │ (Length bytes)   │
/// └───────────────┴──────────────────┘
/// ```
pub fn encode_message(body: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = checked_len(body.len(), u32::MAX as usize)?;
    dst.reserve(LENGTH_PREFIX_SIZE + body.len());
    dst.put_u32(len);
    dst.put_slice(body);
    Ok(())
}

/// Decode one message from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete message yet.
/// On success, consumes the message bytes from the buffer.
pub fn decode_message(src: &mut BytesMut, max_message: usize) -> Result<Option<Bytes>> {
    if src.len() < LENGTH_PREFIX_SIZE {
        return Ok(None);
    }

    let len = (&src[..LENGTH_PREFIX_SIZE]).get_u32() as usize;
    if len > max_message {
        return Err(FrameError::MessageTooLarge {
            size: len,
            max: max_message,
        });
    }

    let total = LENGTH_PREFIX_SIZE + len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(LENGTH_PREFIX_SIZE);
    Ok(Some(src.split_to(len).freeze()))
}

/// Validate a body length against `max` and the 32-bit length field.
pub(crate) fn checked_len(size: usize, max: usize) -> Result<u32> {
    let max = max.min(u32::MAX as usize);
    if size > max {
        return Err(FrameError::MessageTooLarge { size, max });
    }
    Ok(size as u32)
}

/// Configuration for framing on one stream.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum message body size in bytes. Default: 16 MiB.
    pub max_message_size: usize,
    /// Initial capacity of the reader's scratch buffer. Default: 1,000,000.
    pub scratch_capacity: usize,
    /// Consecutive zero-byte reads tolerated before the stream is treated
    /// as closed. Default: 3.
    pub zero_read_retries: u32,
    /// Pause between zero-byte read retries. Default: 10 ms.
    pub retry_interval: Duration,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE,
            scratch_capacity: DEFAULT_SCRATCH_CAPACITY,
            zero_read_retries: 3,
            retry_interval: Duration::from_millis(10),
        }
    }
}

/// `tokio_util` codec for the same wire format, for buffered sources such
/// as recorded dump files.
#[derive(Debug, Clone)]
pub struct AtomCodec {
    max_message_size: usize,
}

impl AtomCodec {
    pub fn new() -> Self {
        Self::with_max_message_size(DEFAULT_MAX_MESSAGE)
    }

    pub fn with_max_message_size(max_message_size: usize) -> Self {
        Self { max_message_size }
    }
}

impl Default for AtomCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for AtomCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        decode_message(src, self.max_message_size)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if src.is_empty() => Ok(None),
            None if src.len() < LENGTH_PREFIX_SIZE => {
                Err(FrameError::IncompletePrefix { received: src.len() })
            }
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Encoder<Bytes> for AtomCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<()> {
        checked_len(item.len(), self.max_message_size)?;
        encode_message(&item, dst)
    }
}
