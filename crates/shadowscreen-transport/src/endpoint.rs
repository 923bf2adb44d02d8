use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::TransportError;

const TCP_SCHEME: &str = "tcp://";
const UNIX_SCHEME: &str = "unix://";

/// Where a mirroring peer listens or connects.
///
/// Accepted forms:
/// - `tcp://HOST:PORT`
/// - `unix:///absolute/path.sock`
/// - a bare filesystem path (treated as a Unix domain socket)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// TCP `host:port` address, resolved at bind/connect time.
    Tcp(String),
    /// Filesystem-path Unix domain socket.
    Unix(PathBuf),
}

impl Endpoint {
    /// Transport name for diagnostics.
    pub fn transport_name(&self) -> &'static str {
        match self {
            Endpoint::Tcp(_) => "tcp",
            Endpoint::Unix(_) => "unix-domain-socket",
        }
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(TransportError::InvalidEndpoint {
                input: input.to_string(),
                reason: "endpoint must not be empty",
            });
        }

        if let Some(addr) = trimmed.strip_prefix(TCP_SCHEME) {
            match addr.rsplit_once(':') {
                Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                    Ok(Endpoint::Tcp(addr.to_string()))
                }
                _ => Err(TransportError::InvalidEndpoint {
                    input: input.to_string(),
                    reason: "expected tcp://HOST:PORT",
                }),
            }
        } else if let Some(path) = trimmed.strip_prefix(UNIX_SCHEME) {
            if path.is_empty() {
                return Err(TransportError::InvalidEndpoint {
                    input: input.to_string(),
                    reason: "unix endpoint needs a socket path",
                });
            }
            Ok(Endpoint::Unix(PathBuf::from(path)))
        } else if trimmed.contains("://") {
            Err(TransportError::InvalidEndpoint {
                input: input.to_string(),
                reason: "unknown scheme (expected tcp:// or unix://)",
            })
        } else {
            Ok(Endpoint::Unix(PathBuf::from(trimmed)))
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "{TCP_SCHEME}{addr}"),
            Endpoint::Unix(path) => write!(f, "{UNIX_SCHEME}{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tcp_endpoint() {
        let endpoint: Endpoint = "tcp://127.0.0.1:7878".parse().unwrap();
        assert_eq!(endpoint, Endpoint::Tcp("127.0.0.1:7878".to_string()));
        assert_eq!(endpoint.transport_name(), "tcp");
    }

    #[test]
    fn parses_unix_scheme_and_bare_path() {
        let scheme: Endpoint = "unix:///tmp/mirror.sock".parse().unwrap();
        let bare: Endpoint = "/tmp/mirror.sock".parse().unwrap();
        assert_eq!(scheme, bare);
        assert_eq!(bare.to_string(), "unix:///tmp/mirror.sock");
    }

    #[test]
    fn rejects_bad_endpoints() {
        for input in ["", "tcp://nohost", "tcp://:80", "tcp://host:notaport", "udp://x:1", "unix://"] {
            let result = input.parse::<Endpoint>();
            assert!(
                matches!(result, Err(TransportError::InvalidEndpoint { .. })),
                "{input:?} should be rejected"
            );
        }
    }
}
