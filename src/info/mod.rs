//! Connection Information

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Information about a connection to a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo<Addr> {
    /// The local address for this connection.
    pub local_addr: Addr,

    /// The remote address for this connection.
    pub remote_addr: Addr,
}

impl<Addr> ConnectionInfo<Addr> {
    /// The local address for this connection
    pub fn local_addr(&self) -> &Addr {
        &self.local_addr
    }

    /// The remote address for this connection
    pub fn remote_addr(&self) -> &Addr {
        &self.remote_addr
    }
}

/// One end of an established connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// A TCP socket address.
    Tcp(SocketAddr),

    /// A local socket, which may be unnamed (client ends usually are).
    Local(Option<PathBuf>),

    /// A named pipe path. Both ends of a pipe share the same name.
    Pipe(String),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => write!(f, "{addr}"),
            Endpoint::Local(Some(path)) => write!(f, "{}", path.display()),
            Endpoint::Local(None) => f.write_str("(unnamed)"),
            Endpoint::Pipe(path) => f.write_str(path),
        }
    }
}

/// Trait for types which can provide connection information.
pub trait HasConnectionInfo {
    /// The address type for this connection.
    type Addr: fmt::Display + fmt::Debug + Send;

    /// Get the connection information for this stream.
    ///
    /// This asks the operating system, and so can fail once the connection has been torn down.
    fn info(&self) -> io::Result<ConnectionInfo<Self::Addr>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::Ipv4Addr;

    #[test]
    fn endpoint_display() {
        let tcp = Endpoint::Tcp(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 9090));
        assert_eq!(tcp.to_string(), "127.0.0.1:9090");
        assert_eq!(Endpoint::Local(None).to_string(), "(unnamed)");
        assert_eq!(
            Endpoint::Local(Some(PathBuf::from("/run/svc.sock"))).to_string(),
            "/run/svc.sock"
        );
        assert_eq!(
            Endpoint::Pipe(r"\\.\pipe\svc".into()).to_string(),
            r"\\.\pipe\svc"
        );
    }
}
