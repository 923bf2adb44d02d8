use std::fmt;
use std::io;

use shadowscreen::frame::FrameError;
use shadowscreen::mirror::MirrorError;
use shadowscreen::record::RecordError;
use shadowscreen::transport::TransportError;

// Process exit codes. 64 and 124 follow sysexits / timeout(1).
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source) => io_error(context, source),
        TransportError::InvalidEndpoint { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::MessageTooLarge { .. }
        | FrameError::FragmentedLength { .. }
        | FrameError::IncompletePrefix { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed | FrameError::WriteZero { .. } => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn record_error(context: &str, err: RecordError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}

pub fn mirror_error(context: &str, err: MirrorError) -> CliError {
    match err {
        MirrorError::Transport(err) => transport_error(context, err),
        MirrorError::Frame(err) => frame_error(context, err),
        MirrorError::Record(err) => record_error(context, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_framing_violations_to_data_invalid() {
        let err = frame_error("read failed", FrameError::IncompletePrefix { received: 2 });
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.starts_with("read failed: "));
    }

    #[test]
    fn maps_refused_connect_to_failure() {
        let err = transport_error(
            "connect failed",
            TransportError::Connect {
                endpoint: "tcp://127.0.0.1:1".to_string(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            },
        );
        assert_eq!(err.code, FAILURE);
    }

    #[test]
    fn maps_bad_endpoint_to_usage() {
        let err = transport_error(
            "invalid endpoint",
            TransportError::InvalidEndpoint {
                input: "ftp://x".to_string(),
                reason: "unsupported scheme",
            },
        );
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn record_errors_are_data_invalid() {
        let err = mirror_error(
            "decode failed",
            MirrorError::Record(RecordError::HeaderTooShort { len: 3, min: 13 }),
        );
        assert_eq!(err.code, DATA_INVALID);
    }
}
