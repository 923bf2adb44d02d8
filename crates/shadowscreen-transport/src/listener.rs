use crate::endpoint::Endpoint;
use crate::error::Result;
use crate::stream::MirrorStream;
use crate::tcp::TcpTransport;

#[cfg(not(unix))]
use crate::error::TransportError;
#[cfg(unix)]
use crate::uds::UnixDomainSocket;

/// A bound listener for any supported [`Endpoint`].
pub enum MirrorListener {
    Tcp(TcpTransport),
    #[cfg(unix)]
    Unix(UnixDomainSocket),
}

impl MirrorListener {
    /// Bind and listen on `endpoint`.
    pub async fn bind(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            Endpoint::Tcp(addr) => Ok(Self::Tcp(TcpTransport::bind(addr).await?)),
            #[cfg(unix)]
            Endpoint::Unix(path) => Ok(Self::Unix(UnixDomainSocket::bind(path)?)),
            #[cfg(not(unix))]
            Endpoint::Unix(_) => Err(TransportError::Unsupported("unix")),
        }
    }

    /// Accept the next incoming connection.
    pub async fn accept(&self) -> Result<MirrorStream> {
        match self {
            Self::Tcp(transport) => transport.accept().await,
            #[cfg(unix)]
            Self::Unix(socket) => socket.accept().await,
        }
    }

    /// The endpoint actually bound (TCP reports the resolved port).
    pub fn local_endpoint(&self) -> Endpoint {
        match self {
            Self::Tcp(transport) => Endpoint::Tcp(transport.local_addr().to_string()),
            #[cfg(unix)]
            Self::Unix(socket) => Endpoint::Unix(socket.path().to_path_buf()),
        }
    }
}

/// Connect to a listening peer at `endpoint`.
pub async fn connect(endpoint: &Endpoint) -> Result<MirrorStream> {
    match endpoint {
        Endpoint::Tcp(addr) => TcpTransport::connect(addr).await,
        #[cfg(unix)]
        Endpoint::Unix(path) => UnixDomainSocket::connect(path).await,
        #[cfg(not(unix))]
        Endpoint::Unix(_) => Err(TransportError::Unsupported("unix")),
    }
}
