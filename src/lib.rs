//! # Dialtone: one address string, three transports
//!
//! Dialtone turns an address string into a connected, bidirectional byte stream. The caller
//! hands over whatever address it was configured with, and the dialer infers which transport
//! to use:
//!
//! - **Named pipes**: addresses starting with `\\` (for example `\\.\pipe\service`) are opened
//!   as native named pipes. This check happens first and never involves URL parsing.
//! - **TCP**: `tcp://host:port` addresses are resolved and dialed over TCP.
//! - **Local sockets**: everything else (a bare path, or a URL with any other scheme) is dialed
//!   as a Unix-domain stream socket, using the literal address as the socket path.
//!
//! Every dial is bounded by a single timeout which covers resolution and connection. When the
//! deadline fires, the in-flight attempt is dropped, closing any half-open socket or pipe handle
//! before the error is returned.
//!
//! ## Dialing
//!
//! The simplest entry point is [`dial()`]:
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), dialtone::DialError> {
//! let conn = dialtone::dial("tcp://127.0.0.1:9090", Duration::from_secs(5)).await?;
//! println!("connected over {}", conn.transport());
//! # Ok(())
//! # }
//! ```
//!
//! For repeated use, a [`Dialer`] carries its configuration and an optional [`LogContext`],
//! and implements [`tower::Service`] so it can be composed with tower middleware.
//!
//! ## Errors
//!
//! A malformed address is reported as [`DialError::MalformedAddress`] without any network
//! activity. Connection failures are passed through as the underlying [`std::io::Error`].
//! Use [`is_not_exist`] to tell "nothing is listening there yet" apart from fatal failures
//! when writing a wait-and-retry loop.
//!
//! ## Platforms
//!
//! The contract is the same everywhere, but the transports available depend on the platform:
//! Unix targets support TCP and local sockets, Windows targets support TCP, local (AF_UNIX)
//! sockets and named pipes. Dialing a pipe address on Unix fails with
//! [`std::io::ErrorKind::Unsupported`].

use std::pin::Pin;

pub mod address;
pub mod dial;
pub mod info;
pub mod log;
pub mod stream;

pub use self::address::{Address, MalformedAddress, TransportKind};
pub use self::dial::{DialError, Dialer, DialerConfig, dial, is_not_exist, normalize_address};
pub use self::log::LogContext;
pub use self::stream::Connection;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Test fixtures
#[cfg(test)]
#[allow(dead_code)]
pub(crate) mod fixtures {

    use std::path::PathBuf;
    use std::sync::Once;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Registers a global default tracing subscriber when called for the first time. This is intended
    /// for use in tests.
    pub fn subscribe() {
        static INSTALL_TRACING_SUBSCRIBER: Once = Once::new();
        INSTALL_TRACING_SUBSCRIBER.call_once(|| {
            let subscriber = tracing_subscriber::FmtSubscriber::builder()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .finish();
            tracing::subscriber::set_global_default(subscriber).unwrap();
        });
    }

    /// A socket path in the temporary directory which is unique to this process and call.
    ///
    /// Any stale file at the path is removed first.
    pub fn socket_path(name: &str) -> PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let path =
            std::env::temp_dir().join(format!("dialtone-{}-{n}-{name}.sock", std::process::id()));
        let _ = std::fs::remove_file(&path);
        path
    }
}
