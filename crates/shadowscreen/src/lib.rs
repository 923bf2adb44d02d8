//! Real-time screen mirroring over a single ordered byte stream.
//!
//! A producer serializes each encoded video frame into a [`record::FrameRecord`],
//! hands it to a [`mirror::RecordSink`] and moves on; a single drain task
//! writes length-prefixed messages to the stream in order. The consumer reads
//! the stream back through a [`mirror::RecordSource`], which decodes each
//! message and flags sequence gaps.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP and Unix domain socket endpoints
//! - [`frame`]: length-prefixed message framing and the output queue
//! - [`record`]: the frame-record container format
//! - [`mirror`]: record pipeline gluing the three together

pub mod mirror;

/// Re-export transport types.
pub mod transport {
    pub use shadowscreen_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use shadowscreen_frame::*;
}

/// Re-export record types.
pub mod record {
    pub use shadowscreen_record::*;
}
