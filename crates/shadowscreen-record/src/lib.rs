//! Frame-record container format for mirrored video frames.
//!
//! A frame record bundles one encoded access unit with the metadata a
//! consumer needs to rebuild a decoder configuration:
//! - a 4-byte big-endian sequence number
//! - an 8-byte big-endian IEEE-754 presentation time (seconds)
//! - a 1-byte NAL unit length-prefix width
//! - three length-prefixed parameter sets (video, sequence, picture)
//! - the payload, which runs to the end of the record
//!
//! The payload carries no length of its own: the enclosing message framing
//! already knows the total size.

pub mod byte_order;
pub mod error;
pub mod record;
pub mod sequence;

pub use error::{RecordError, Result};
pub use record::{FrameRecord, ParameterSetKind, ParameterSets, HEADER_SIZE, PARAMETER_SET_COUNT};
pub use sequence::{Gap, GapDetector, SequenceCounter};
