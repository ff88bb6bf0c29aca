//! TCP connections for `tcp://host:port` addresses.
//!
//! The host is resolved with the system resolver, and each resolved address is tried in turn
//! until one connects. Sockets are opened with [`socket2`] so keep-alive can be configured
//! before the connection is made.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpSocket, TcpStream};
use tracing::{Instrument as _, trace, warn};

/// Configuration for TCP connections.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct TcpConfig {
    /// Whether to disable Nagle's algorithm.
    pub nodelay: bool,

    /// The idle time before TCP keep-alive probes are sent, or `None` to leave keep-alive off.
    pub keep_alive: Option<Duration>,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            nodelay: true,
            keep_alive: Some(Duration::from_secs(90)),
        }
    }
}

/// Resolve `host` and connect to the first address which accepts the connection.
///
/// An empty host or a missing port fails with [`io::ErrorKind::InvalidInput`]. When every
/// resolved address fails, the error from the last attempt is returned.
pub(crate) async fn connect(
    host: &str,
    port: Option<u16>,
    config: &TcpConfig,
) -> io::Result<TcpStream> {
    if host.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "missing address"));
    }
    let Some(port) = port else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("missing port in address {host}"),
        ));
    };

    let addrs = tokio::net::lookup_host((host, port)).await?;

    let mut last_error = None;
    for addr in addrs {
        let span = tracing::trace_span!("connect", remote.addr = %addr);
        match connect_to_addr(addr, config).instrument(span).await {
            Ok(stream) => return Ok(stream),
            Err(error) => last_error = Some(error),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no addresses found for {host}:{port}"),
        )
    }))
}

async fn connect_to_addr(addr: SocketAddr, config: &TcpConfig) -> io::Result<TcpStream> {
    let socket = open(&addr, config)?;
    let stream = socket.connect(addr).await?;

    if config.nodelay {
        if let Err(e) = stream.set_nodelay(true) {
            warn!("tcp set_nodelay error: {}", e);
        }
    }

    trace!("tcp connected");
    Ok(stream)
}

fn open(addr: &SocketAddr, config: &TcpConfig) -> io::Result<TcpSocket> {
    use socket2::{Domain, Protocol, Socket, TcpKeepalive, Type};

    let socket = Socket::new(Domain::for_address(*addr), Type::STREAM, Some(Protocol::TCP))?;
    trace!("tcp socket opened");

    // Tokio requires the socket to be non-blocking before it takes ownership.
    socket.set_nonblocking(true)?;

    if let Some(dur) = config.keep_alive {
        let conf = TcpKeepalive::new().with_time(dur);
        if let Err(e) = socket.set_tcp_keepalive(&conf) {
            warn!("tcp set_keepalive error: {}", e);
        }
    }

    Ok(TcpSocket::from_std_stream(socket.into()))
}
