//! Stream transports for shadowscreen.
//!
//! Supplies already-open, ordered, bidirectional byte streams to the framing
//! layer:
//! - TCP (any platform)
//! - Unix domain sockets (Linux/macOS)
//!
//! Everything above this crate only sees [`MirrorStream`], which implements
//! tokio's `AsyncRead + AsyncWrite`. Readiness is tokio's native readiness.

pub mod endpoint;
pub mod error;
pub mod listener;
pub mod stream;
pub mod tcp;

#[cfg(unix)]
pub mod uds;

pub use endpoint::Endpoint;
pub use error::{Result, TransportError};
pub use listener::{connect, MirrorListener};
pub use stream::MirrorStream;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
