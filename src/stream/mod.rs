//! The stream returned by a successful dial.
//!
//! [`Connection`] wraps whichever platform stream the address resolved to, and forwards
//! [`AsyncRead`] and [`AsyncWrite`] to it. Dropping a connection closes it.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tokio::io::AsyncWriteExt as _;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut conn = dialtone::dial("/run/svc.sock", Duration::from_secs(1)).await?;
//! conn.write_all(b"ping").await?;
//! conn.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use std::io;
use std::net::SocketAddr;
#[cfg(windows)]
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
#[cfg(windows)]
use tokio::net::windows::named_pipe::NamedPipeClient;

use crate::address::TransportKind;
use crate::info::{ConnectionInfo, Endpoint, HasConnectionInfo};

/// An established, caller-owned duplex byte stream.
#[derive(Debug)]
#[non_exhaustive]
pub enum Connection {
    /// A TCP connection.
    Tcp(TcpStream),

    /// A local (Unix-domain) stream socket.
    #[cfg(unix)]
    Unix(UnixStream),

    /// An AF_UNIX stream socket, driven through tokio's TCP stream type, along with the path
    /// it was connected to.
    #[cfg(windows)]
    Local {
        /// The socket.
        stream: TcpStream,

        /// The socket path.
        path: PathBuf,
    },

    /// A named pipe client, along with the path it was opened from.
    #[cfg(windows)]
    Pipe {
        /// The pipe handle.
        stream: NamedPipeClient,

        /// The pipe path.
        path: String,
    },
}

macro_rules! dispatch {
    ($conn:expr, $stream:ident => $body:expr) => {
        match $conn {
            Connection::Tcp($stream) => $body,
            #[cfg(unix)]
            Connection::Unix($stream) => $body,
            #[cfg(windows)]
            Connection::Local {
                stream: $stream, ..
            } => $body,
            #[cfg(windows)]
            Connection::Pipe {
                stream: $stream, ..
            } => $body,
        }
    };
}

impl Connection {
    /// The transport this connection was made over.
    pub fn transport(&self) -> TransportKind {
        match self {
            Connection::Tcp(_) => TransportKind::Tcp,
            #[cfg(unix)]
            Connection::Unix(_) => TransportKind::Local,
            #[cfg(windows)]
            Connection::Local { .. } => TransportKind::Local,
            #[cfg(windows)]
            Connection::Pipe { .. } => TransportKind::Pipe,
        }
    }

    #[cfg(windows)]
    pub(crate) fn local(stream: TcpStream, path: &Path) -> Self {
        Connection::Local {
            stream,
            path: path.to_path_buf(),
        }
    }

    #[cfg(windows)]
    pub(crate) fn pipe(stream: NamedPipeClient, path: &str) -> Self {
        Connection::Pipe {
            stream,
            path: path.to_owned(),
        }
    }
}

impl From<TcpStream> for Connection {
    fn from(stream: TcpStream) -> Self {
        Connection::Tcp(stream)
    }
}

#[cfg(unix)]
impl From<UnixStream> for Connection {
    fn from(stream: UnixStream) -> Self {
        Connection::Unix(stream)
    }
}

/// Convert IPv4-mapped IPv6 addresses back into plain IPv4 addresses.
fn canonical(addr: SocketAddr) -> SocketAddr {
    SocketAddr::new(addr.ip().to_canonical(), addr.port())
}

#[cfg(unix)]
fn local_endpoint(addr: tokio::net::unix::SocketAddr) -> Endpoint {
    Endpoint::Local(addr.as_pathname().map(|path| path.to_path_buf()))
}

impl HasConnectionInfo for Connection {
    type Addr = Endpoint;

    fn info(&self) -> io::Result<ConnectionInfo<Self::Addr>> {
        match self {
            Connection::Tcp(stream) => Ok(ConnectionInfo {
                local_addr: Endpoint::Tcp(canonical(stream.local_addr()?)),
                remote_addr: Endpoint::Tcp(canonical(stream.peer_addr()?)),
            }),
            #[cfg(unix)]
            Connection::Unix(stream) => Ok(ConnectionInfo {
                local_addr: local_endpoint(stream.local_addr()?),
                remote_addr: local_endpoint(stream.peer_addr()?),
            }),
            #[cfg(windows)]
            Connection::Local { path, .. } => Ok(ConnectionInfo {
                local_addr: Endpoint::Local(None),
                remote_addr: Endpoint::Local(Some(path.clone())),
            }),
            #[cfg(windows)]
            Connection::Pipe { path, .. } => Ok(ConnectionInfo {
                local_addr: Endpoint::Pipe(path.clone()),
                remote_addr: Endpoint::Pipe(path.clone()),
            }),
        }
    }
}

impl AsyncRead for Connection {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        dispatch!(self.get_mut(), stream => Pin::new(stream).poll_read(cx, buf))
    }
}

impl AsyncWrite for Connection {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize, io::Error>> {
        dispatch!(self.get_mut(), stream => Pin::new(stream).poll_write(cx, buf))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        dispatch!(self.get_mut(), stream => Pin::new(stream).poll_flush(cx))
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        dispatch!(self.get_mut(), stream => Pin::new(stream).poll_shutdown(cx))
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<Result<usize, io::Error>> {
        dispatch!(self.get_mut(), stream => Pin::new(stream).poll_write_vectored(cx, bufs))
    }

    fn is_write_vectored(&self) -> bool {
        dispatch!(self, stream => stream.is_write_vectored())
    }
}
