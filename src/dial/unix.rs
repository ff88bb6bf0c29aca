//! Unix transports: local stream sockets.
//!
//! Named pipes in the Windows sense do not exist here, so pipe addresses are rejected.

use std::borrow::Cow;
use std::io;
use std::path::Path;

use tokio::net::UnixStream;

use crate::stream::Connection;

/// Scheme prefix accepted (and stripped) in front of local socket paths.
const UNIX_PREFIX: &str = "unix://";

/// Strip any leading `unix://` prefixes, leaving the socket path.
pub(super) fn normalize_address(address: &str) -> Cow<'_, str> {
    let mut path = address;
    while let Some(rest) = path.strip_prefix(UNIX_PREFIX) {
        path = rest;
    }

    if path.len() == address.len() {
        Cow::Borrowed(address)
    } else {
        Cow::Owned(path.to_owned())
    }
}

pub(super) async fn connect_local(path: &Path) -> io::Result<Connection> {
    let stream = UnixStream::connect(path).await?;
    tracing::trace!("unix connected");
    Ok(Connection::Unix(stream))
}

pub(super) async fn connect_pipe(path: &str) -> io::Result<Connection> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("named pipes are not supported on this platform: {path}"),
    ))
}

/// `ENOENT` from `connect(2)` surfaces as [`io::ErrorKind::NotFound`].
pub(super) fn is_not_exist(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::NotFound
}
