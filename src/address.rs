//! Address classification.
//!
//! An address string is classified into one of three transports before anything is dialed.
//! Classification is purely lexical: no resolution or I/O happens here, so a malformed address
//! is always reported before any network activity.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

/// Prefix which marks an address as a native named pipe path, e.g. `\\.\pipe\service`.
pub const PIPE_PREFIX: &str = r"\\";

/// The URL scheme which selects the TCP transport.
pub const TCP_SCHEME: &str = "tcp";

/// The kind of transport an address is dialed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// An OS-native named pipe.
    Pipe,

    /// A TCP connection.
    Tcp,

    /// A local (Unix-domain) stream socket.
    Local,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Pipe => f.write_str("pipe"),
            TransportKind::Tcp => f.write_str("tcp"),
            TransportKind::Local => f.write_str("local"),
        }
    }
}

/// A classified dial target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// A named pipe, holding the full address string.
    Pipe(String),

    /// A TCP endpoint.
    ///
    /// The host may be empty and the port missing; both are reported when dialing.
    Tcp {
        /// Host name or IP literal, without IPv6 brackets.
        host: String,

        /// Port number.
        port: Option<u16>,
    },

    /// A local stream socket, holding the literal address as its path.
    Local(PathBuf),
}

impl Address {
    /// Classify an address string.
    ///
    /// Pipe addresses are recognized by prefix before anything else, so they are never
    /// rejected by the URL parser. Every other address must parse as a URL or as a relative
    /// reference: control characters, a `:` in the first segment of a scheme-less path and
    /// broken `%` escapes are all malformed.
    ///
    /// Addresses with a `tcp` scheme become [`Address::Tcp`]. A missing host or port is not a
    /// parse failure, so it is left for the dial to report as [`std::io::ErrorKind::InvalidInput`].
    /// Any other address, with or without a scheme, is a local socket path.
    pub fn parse(address: &str) -> Result<Self, MalformedAddress> {
        let malformed = |kind| MalformedAddress::new(address, kind);

        if address.is_empty() {
            return Err(malformed(AddressErrorKind::Empty));
        }

        if address.starts_with(PIPE_PREFIX) {
            return Ok(Address::Pipe(address.to_owned()));
        }

        if address.bytes().any(|b| b < 0x20 || b == 0x7f) {
            return Err(malformed(AddressErrorKind::ControlCharacter));
        }

        let Some(scheme) = split_scheme(address).map_err(malformed)? else {
            check_relative(address).map_err(malformed)?;
            return Ok(Address::Local(PathBuf::from(address)));
        };
        let is_tcp = scheme.eq_ignore_ascii_case(TCP_SCHEME);

        let url = match Url::parse(address) {
            Ok(url) => url,
            Err(url::ParseError::EmptyHost) if is_tcp => {
                return Ok(Address::Tcp {
                    host: String::new(),
                    port: None,
                });
            }
            Err(url::ParseError::EmptyHost) => return Ok(Address::Local(PathBuf::from(address))),
            Err(error) => return Err(malformed(AddressErrorKind::Url(error))),
        };

        if !is_tcp {
            return Ok(Address::Local(PathBuf::from(address)));
        }

        let host = url.host_str().unwrap_or_default();
        Ok(Address::Tcp {
            host: host.trim_start_matches('[').trim_end_matches(']').to_owned(),
            port: url.port(),
        })
    }

    /// The transport this address will be dialed with.
    pub fn kind(&self) -> TransportKind {
        match self {
            Address::Pipe(_) => TransportKind::Pipe,
            Address::Tcp { .. } => TransportKind::Tcp,
            Address::Local(_) => TransportKind::Local,
        }
    }
}

impl FromStr for Address {
    type Err = MalformedAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Pipe(path) => f.write_str(path),
            Address::Tcp { host, port } => {
                write!(f, "{TCP_SCHEME}://")?;
                if host.contains(':') {
                    write!(f, "[{host}]")?;
                } else {
                    f.write_str(host)?;
                }
                match port {
                    Some(port) => write!(f, ":{port}"),
                    None => Ok(()),
                }
            }
            Address::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Find the URL scheme at the start of an address, if there is one.
///
/// A scheme is a letter followed by letters, digits, `+`, `-` or `.`, terminated by `:`.
/// Anything which does not look like a scheme is treated as a plain path, except for an
/// address starting with `:`, which names an empty scheme and is rejected.
fn split_scheme(address: &str) -> Result<Option<&str>, AddressErrorKind> {
    for (idx, c) in address.char_indices() {
        match c {
            'a'..='z' | 'A'..='Z' => {}
            '0'..='9' | '+' | '-' | '.' if idx > 0 => {}
            ':' if idx == 0 => return Err(AddressErrorKind::MissingScheme),
            ':' => return Ok(Some(&address[..idx])),
            _ => return Ok(None),
        }
    }

    Ok(None)
}

/// Check a scheme-less address as a URL relative reference.
///
/// The first path segment may not contain `:` (it would read as a scheme), and every `%`
/// in the path and fragment must start a two digit hex escape. The query is not checked.
fn check_relative(address: &str) -> Result<(), AddressErrorKind> {
    let (rest, fragment) = address.split_once('#').unwrap_or((address, ""));
    let path = rest.split_once('?').map_or(rest, |(path, _)| path);

    if path.split('/').next().is_some_and(|segment| segment.contains(':')) {
        return Err(AddressErrorKind::ColonInFirstSegment);
    }

    check_escapes(path)?;
    check_escapes(fragment)
}

fn check_escapes(component: &str) -> Result<(), AddressErrorKind> {
    let bytes = component.as_bytes();
    for (idx, _) in component.match_indices('%') {
        let escape = bytes.get(idx + 1..idx + 3);
        if !escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
            let end = (idx + 3).min(bytes.len());
            return Err(AddressErrorKind::InvalidEscape(
                String::from_utf8_lossy(&bytes[idx..end]).into_owned(),
            ));
        }
    }

    Ok(())
}

/// An address which could not be classified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed address {address:?}: {kind}")]
pub struct MalformedAddress {
    address: String,
    #[source]
    kind: AddressErrorKind,
}

impl MalformedAddress {
    fn new(address: &str, kind: AddressErrorKind) -> Self {
        Self {
            address: address.to_owned(),
            kind,
        }
    }

    /// The address which was rejected.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Why the address was rejected.
    pub fn kind(&self) -> &AddressErrorKind {
        &self.kind
    }
}

/// The reason an address was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum AddressErrorKind {
    /// The address was empty.
    #[error("address is empty")]
    Empty,

    /// The address started with `:`, leaving the scheme empty.
    #[error("missing protocol scheme")]
    MissingScheme,

    /// The address had a scheme, but was not a valid URL.
    #[error(transparent)]
    Url(url::ParseError),

    /// The address contained an ASCII control character.
    #[error("invalid control character in address")]
    ControlCharacter,

    /// A scheme-less address had `:` in its first path segment.
    #[error("first path segment in address cannot contain colon")]
    ColonInFirstSegment,

    /// A `%` was not followed by two hex digits.
    #[error("invalid escape {0:?}")]
    InvalidEscape(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    use static_assertions::assert_impl_all;

    assert_impl_all!(Address: Send, Sync, Clone);
    assert_impl_all!(MalformedAddress: std::error::Error, Send, Sync);

    #[test]
    fn pipe_prefix_wins_over_url_parsing() {
        let address = r"\\.\pipe\://bad";
        assert_eq!(
            Address::parse(address).unwrap(),
            Address::Pipe(address.to_owned())
        );
        assert_eq!(Address::parse(address).unwrap().kind(), TransportKind::Pipe);
    }

    #[test]
    fn tcp_address() {
        let address = Address::parse("tcp://127.0.0.1:9090").unwrap();
        assert_eq!(
            address,
            Address::Tcp {
                host: "127.0.0.1".into(),
                port: Some(9090)
            }
        );
        assert_eq!(address.to_string(), "tcp://127.0.0.1:9090");
    }

    #[test]
    fn tcp_scheme_is_case_insensitive() {
        let address = Address::parse("TCP://localhost:80").unwrap();
        assert_eq!(address.kind(), TransportKind::Tcp);
    }

    #[test]
    fn tcp_ipv6_address() {
        let address = Address::parse("tcp://[::1]:7000").unwrap();
        assert_eq!(
            address,
            Address::Tcp {
                host: "::1".into(),
                port: Some(7000)
            }
        );
        assert_eq!(address.to_string(), "tcp://[::1]:7000");
    }

    #[test]
    fn tcp_without_port_is_left_to_the_dial() {
        let address = Address::parse("tcp://localhost").unwrap();
        assert_eq!(
            address,
            Address::Tcp {
                host: "localhost".into(),
                port: None
            }
        );
        assert_eq!(address.to_string(), "tcp://localhost");
    }

    #[test]
    fn tcp_without_host_is_left_to_the_dial() {
        let address = Address::parse("tcp://:80").unwrap();
        assert_eq!(address.kind(), TransportKind::Tcp);
        assert!(matches!(address, Address::Tcp { ref host, .. } if host.is_empty()));
    }

    #[test]
    fn empty_host_with_other_scheme_is_local() {
        assert_eq!(
            Address::parse("http://").unwrap(),
            Address::Local(PathBuf::from("http://"))
        );
    }

    #[test]
    fn bare_path_is_local() {
        assert_eq!(
            Address::parse("/tmp/svc.sock").unwrap(),
            Address::Local(PathBuf::from("/tmp/svc.sock"))
        );
        assert_eq!(
            Address::parse("relative/svc.sock").unwrap(),
            Address::Local(PathBuf::from("relative/svc.sock"))
        );
    }

    #[test]
    fn other_schemes_keep_the_literal_address() {
        assert_eq!(
            Address::parse("unix:///run/svc.sock").unwrap(),
            Address::Local(PathBuf::from("unix:///run/svc.sock"))
        );
    }

    #[test]
    fn missing_scheme_is_malformed() {
        let err = Address::parse("://bad").unwrap_err();
        assert_eq!(err.kind(), &AddressErrorKind::MissingScheme);
        assert_eq!(err.address(), "://bad");
    }

    #[test]
    fn empty_is_malformed() {
        let err = Address::parse("").unwrap_err();
        assert_eq!(err.kind(), &AddressErrorKind::Empty);
    }

    #[test]
    fn invalid_url_is_malformed() {
        let err = Address::parse("tcp://host:notaport").unwrap_err();
        assert!(matches!(err.kind(), AddressErrorKind::Url(_)));
    }

    #[test]
    fn colon_in_first_segment_is_malformed() {
        for address in ["1tcp://x", "a b://c", "-x://y", "svc:sock"] {
            let err = Address::parse(address).unwrap_err();
            assert_eq!(
                err.kind(),
                &AddressErrorKind::ColonInFirstSegment,
                "{address:?}"
            );
        }

        assert_eq!(
            Address::parse("run/svc:1.sock").unwrap(),
            Address::Local(PathBuf::from("run/svc:1.sock"))
        );
    }

    #[test]
    fn invalid_escape_is_malformed() {
        let err = Address::parse("/tmp/bad%zz.sock").unwrap_err();
        assert_eq!(err.kind(), &AddressErrorKind::InvalidEscape("%zz".into()));

        let err = Address::parse("/tmp/trailing%2").unwrap_err();
        assert_eq!(err.kind(), &AddressErrorKind::InvalidEscape("%2".into()));

        let err = Address::parse("/tmp/svc.sock#frag%").unwrap_err();
        assert_eq!(err.kind(), &AddressErrorKind::InvalidEscape("%".into()));

        assert_eq!(
            Address::parse("/tmp/ok%20name.sock").unwrap(),
            Address::Local(PathBuf::from("/tmp/ok%20name.sock"))
        );
        assert_eq!(
            Address::parse("/tmp/svc.sock?q=%zz").unwrap(),
            Address::Local(PathBuf::from("/tmp/svc.sock?q=%zz"))
        );
    }

    #[test]
    fn control_characters_are_malformed() {
        for address in ["/tmp/a\u{7f}b.sock", "/tmp/a\nb.sock", "tcp://host\t:80"] {
            let err = Address::parse(address).unwrap_err();
            assert_eq!(err.kind(), &AddressErrorKind::ControlCharacter, "{address:?}");
        }
    }

    #[test]
    fn scheme_detection() {
        assert_eq!(split_scheme("tcp://x"), Ok(Some("tcp")));
        assert_eq!(split_scheme("a+b.c-d:rest"), Ok(Some("a+b.c-d")));
        assert_eq!(split_scheme("1tcp://x"), Ok(None));
        assert_eq!(split_scheme("/abs/path"), Ok(None));
        assert_eq!(split_scheme("noscheme"), Ok(None));
        assert_eq!(split_scheme(":"), Err(AddressErrorKind::MissingScheme));
    }
}
