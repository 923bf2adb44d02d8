/// Errors that can occur while framing, sending or receiving messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The 4-byte length prefix was only partially accepted by the stream.
    #[error("length prefix fragmented ({written} of 4 bytes accepted)")]
    FragmentedLength { written: usize },

    /// The stream stopped making progress partway through a length prefix.
    #[error("incomplete length prefix ({received} of 4 bytes received)")]
    IncompletePrefix { received: usize },

    /// The message exceeds the configured maximum size.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream accepted zero bytes of a write.
    #[error("stream accepted no bytes ({remaining} bytes unsent)")]
    WriteZero { remaining: usize },

    /// The connection was closed before a complete message was received.
    #[error("connection closed (incomplete message)")]
    ConnectionClosed,

    /// The operation was cancelled by its owner.
    #[error("operation cancelled")]
    Cancelled,

    /// The output queue's drain task panicked or was aborted.
    #[error("drain task failed: {0}")]
    DrainTask(String),
}

impl FrameError {
    /// Returns true for violations of the framing protocol itself.
    pub fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            FrameError::FragmentedLength { .. }
                | FrameError::IncompletePrefix { .. }
                | FrameError::MessageTooLarge { .. }
        )
    }

    /// Returns true when the underlying stream failed or closed.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            FrameError::Io(_) | FrameError::WriteZero { .. } | FrameError::ConnectionClosed
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
