//! Dialing an address string.
//!
//! [`dial`] and [`Dialer`] classify an address (see [`Address`]) and connect with the matching
//! transport, bounded by a single timeout:
//!
//! 1. `\\`-prefixed addresses are opened as named pipes, without URL parsing.
//! 2. `tcp://host:port` addresses are resolved and connected over TCP.
//! 3. Anything else is connected as a local stream socket at the literal address.
//!
//! The platform specific halves live in `unix` and `windows`, one of which is compiled in.
//! Both provide the same four functions, so the dispatch here is platform independent.

use std::borrow::Cow;
use std::error::Error as StdError;
use std::io;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::FutureExt as _;
use thiserror::Error;
use tracing::{Instrument as _, trace};

use crate::BoxFuture;
use crate::address::{Address, MalformedAddress};
use crate::log::LogContext;
use crate::stream::Connection;

pub mod tcp;
#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
use self::unix as platform;
#[cfg(windows)]
use self::windows as platform;

pub use self::tcp::TcpConfig;

/// Error returned when a dial fails.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DialError {
    /// The address could not be classified. No connection was attempted.
    #[error(transparent)]
    MalformedAddress(#[from] MalformedAddress),

    /// The underlying connect failed, or the deadline expired
    /// ([`io::ErrorKind::TimedOut`]).
    #[error(transparent)]
    Dial(#[from] io::Error),
}

impl DialError {
    /// Did this dial fail because the endpoint does not exist?
    ///
    /// This is true for a missing socket file or pipe, which usually means the server has not
    /// started listening yet and a retry may succeed.
    pub fn is_not_exist(&self) -> bool {
        match self {
            DialError::Dial(error) => platform::is_not_exist(error),
            DialError::MalformedAddress(_) => false,
        }
    }

    /// Did this dial fail because the address was malformed?
    pub fn is_malformed(&self) -> bool {
        matches!(self, DialError::MalformedAddress(_))
    }

    /// Did this dial run out of time?
    pub fn is_timeout(&self) -> bool {
        matches!(self, DialError::Dial(error) if error.kind() == io::ErrorKind::TimedOut)
    }
}

impl From<DialError> for io::Error {
    fn from(value: DialError) -> Self {
        match value {
            DialError::Dial(error) => error,
            DialError::MalformedAddress(error) => io::Error::new(io::ErrorKind::InvalidInput, error),
        }
    }
}

/// Classify an arbitrary error as "endpoint does not exist".
///
/// Walks the source chain looking for a [`DialError`] or [`io::Error`], so this works on
/// errors which have been boxed or wrapped by middleware.
pub fn is_not_exist(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(error) = current {
        if let Some(error) = error.downcast_ref::<DialError>() {
            return error.is_not_exist();
        }

        if let Some(error) = error.downcast_ref::<io::Error>() {
            return platform::is_not_exist(error);
        }

        current = error.source();
    }

    false
}

/// Normalize an address for this platform.
///
/// On Windows this is the identity. On Unix, leading `unix://` prefixes are stripped, leaving
/// the socket path. Normalizing twice gives the same result as normalizing once. Pass
/// addresses through this before storing or logging them.
pub fn normalize_address(address: &str) -> Cow<'_, str> {
    platform::normalize_address(address)
}

/// Dial `address`, giving up after `timeout`.
///
/// A zero timeout is not "no deadline": it is handed to the timer as-is, and the dial fails
/// with [`io::ErrorKind::TimedOut`] unless it completes immediately.
pub async fn dial(address: &str, timeout: Duration) -> Result<Connection, DialError> {
    Dialer::default().dial_timeout(address, timeout).await
}

/// Configuration for a [`Dialer`].
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct DialerConfig {
    /// The deadline for each dial, covering resolution and connection.
    pub timeout: Duration,

    /// Socket options for TCP connections.
    pub tcp: TcpConfig,
}

impl Default for DialerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            tcp: TcpConfig::default(),
        }
    }
}

impl DialerConfig {
    /// Use `timeout` as the deadline for each dial.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A reusable dialer.
///
/// The dialer holds only immutable configuration and a log context, so clones are cheap and
/// concurrent dials do not interact. It is also a [`tower::Service`] over address strings.
#[derive(Debug, Clone, Default)]
pub struct Dialer {
    config: Arc<DialerConfig>,
    log: LogContext,
}

impl Dialer {
    /// Create a new dialer.
    pub fn new(config: DialerConfig) -> Self {
        Self {
            config: Arc::new(config),
            log: LogContext::default(),
        }
    }

    /// Record dial attempts under the logger carried by `log`.
    pub fn with_log_context(mut self, log: LogContext) -> Self {
        self.log = log;
        self
    }

    /// Get the configuration for this dialer.
    pub fn config(&self) -> &DialerConfig {
        &self.config
    }

    /// Dial `address` using the configured timeout.
    pub fn dial(&self, address: &str) -> BoxFuture<'static, Result<Connection, DialError>> {
        self.dial_timeout(address, self.config.timeout)
    }

    /// Dial `address`, giving up after `timeout`.
    ///
    /// When the deadline fires, the connection attempt is dropped, closing any socket or pipe
    /// handle it had opened.
    pub fn dial_timeout(
        &self,
        address: &str,
        timeout: Duration,
    ) -> BoxFuture<'static, Result<Connection, DialError>> {
        let address = normalize_address(address).into_owned();
        let config = self.config.clone();

        let span = self
            .log
            .logger()
            .in_scope(|| tracing::trace_span!("dial", %address));

        async move {
            let target = Address::parse(&address)?;
            trace!(transport = %target.kind(), "dialing");

            let conn = with_deadline(timeout, connect(&target, &config.tcp)).await?;
            trace!("connected");
            Ok(conn)
        }
        .instrument(span)
        .boxed()
    }
}

/// Run a connection attempt, dropping it if `timeout` passes first.
async fn with_deadline<F, T>(timeout: Duration, attempt: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match tokio::time::timeout(timeout, attempt).await {
        Ok(result) => result,
        Err(elapsed) => {
            trace!(?timeout, "dial timed out");
            Err(io::Error::new(io::ErrorKind::TimedOut, elapsed))
        }
    }
}

async fn connect(target: &Address, tcp: &TcpConfig) -> io::Result<Connection> {
    match target {
        Address::Pipe(path) => platform::connect_pipe(path).await,
        Address::Tcp { host, port } => tcp::connect(host, *port, tcp).await.map(Connection::from),
        Address::Local(path) => platform::connect_local(path).await,
    }
}

impl<'a> tower::Service<&'a str> for Dialer {
    type Response = Connection;
    type Error = DialError;
    type Future = BoxFuture<'static, Result<Connection, DialError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: &'a str) -> Self::Future {
        self.dial(req)
    }
}

impl tower::Service<String> for Dialer {
    type Response = Connection;
    type Error = DialError;
    type Future = BoxFuture<'static, Result<Connection, DialError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: String) -> Self::Future {
        self.dial(&req)
    }
}
