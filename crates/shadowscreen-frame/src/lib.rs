//! Length-prefixed message framing ("ATOM") for mirrored video streams.
//!
//! Every message is framed with a 4-byte big-endian body length followed by
//! the body. There is no magic number, version or checksum: boundaries are
//! purely length-delimited.
//!
//! - [`FrameWriter`] sends one message at a time, never fragmenting the
//!   length prefix and never interleaving two bodies.
//! - [`FrameReader`] turns a stream back into whole messages.
//! - [`OutputQueue`] lets any number of producers hand off messages without
//!   blocking while a single drain task writes them in FIFO order.

pub mod codec;
pub mod error;
pub mod queue;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_message, encode_message, AtomCodec, FrameConfig, DEFAULT_MAX_MESSAGE,
    DEFAULT_SCRATCH_CAPACITY, LENGTH_PREFIX_SIZE,
};
pub use error::{FrameError, Result};
pub use queue::{DrainHandle, OutputQueue};
pub use reader::FrameReader;
pub use writer::FrameWriter;
