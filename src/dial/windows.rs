//! Windows transports: named pipes and AF_UNIX stream sockets.

use std::borrow::Cow;
use std::io;
use std::path::Path;
use std::time::Duration;

use socket2::{Domain, SockAddr, Socket, Type};
use tokio::net::TcpStream;
use tokio::net::windows::named_pipe::ClientOptions;

use crate::stream::Connection;

/// All instances of the pipe are in use.
const ERROR_PIPE_BUSY: i32 = 231;

/// How long to wait before retrying a busy pipe.
const BUSY_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Addresses are handed to the OS as-is.
pub(super) fn normalize_address(address: &str) -> Cow<'_, str> {
    Cow::Borrowed(address)
}

/// Connect an AF_UNIX stream socket.
///
/// Tokio has no Unix-domain stream type on Windows, but an AF_UNIX socket is an ordinary
/// `SOCKET`, so it is registered through [`TcpStream`] for readiness and plain send/recv I/O.
/// Address queries on that stream do not apply; the path is kept alongside instead.
pub(super) async fn connect_local(path: &Path) -> io::Result<Connection> {
    let addr = SockAddr::unix(path)?;
    let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
    socket.set_nonblocking(true)?;

    let in_progress = match socket.connect(&addr) {
        Ok(()) => false,
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => true,
        Err(e) => return Err(e),
    };

    let stream = TcpStream::from_std(std::net::TcpStream::from(socket))?;
    if in_progress {
        stream.writable().await?;
        if let Some(e) = stream.take_error()? {
            return Err(e);
        }
    }

    tracing::trace!("unix connected");
    Ok(Connection::local(stream, path))
}

/// Open a named pipe, waiting while every instance of it is busy.
///
/// The wait is unbounded here; the caller's deadline ends it.
pub(super) async fn connect_pipe(path: &str) -> io::Result<Connection> {
    loop {
        match ClientOptions::new().open(path) {
            Ok(client) => {
                tracing::trace!("pipe connected");
                return Ok(Connection::pipe(client, path));
            }
            Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY) => {
                tracing::trace!("pipe busy");
            }
            Err(e) => return Err(e),
        }

        tokio::time::sleep(BUSY_RETRY_INTERVAL).await;
    }
}

/// `ERROR_FILE_NOT_FOUND` and `ERROR_PATH_NOT_FOUND` both surface as
/// [`io::ErrorKind::NotFound`].
pub(super) fn is_not_exist(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::NotFound
}
