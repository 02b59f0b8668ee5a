//! HTTP protocol version handling.
//!
//! Only HTTP/1.0 and HTTP/1.1 are representable. Conversions from
//! `http::Version` and from the minor version number reported by `httparse`
//! fail for anything else.

use std::fmt::{Display, Formatter};

use http::Version;

use crate::protocol::ProtocolError;

/// The protocol version of an exchange, fixed once the request arrives.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Protocol {
    Http10,
    Http11,
}

impl Protocol {
    /// Returns the protocol token used in the status line.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http10 => "HTTP/1.0",
            Protocol::Http11 => "HTTP/1.1",
        }
    }

    #[inline]
    pub fn is_http11(&self) -> bool {
        matches!(self, Protocol::Http11)
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<Version> for Protocol {
    type Error = ProtocolError;

    fn try_from(version: Version) -> Result<Self, Self::Error> {
        match version {
            Version::HTTP_10 => Ok(Protocol::Http10),
            Version::HTTP_11 => Ok(Protocol::Http11),
            v => Err(ProtocolError::unsupported_version(format!("{v:?}"))),
        }
    }
}

/// Converts the minor version of an `HTTP/1.x` request line.
impl TryFrom<u8> for Protocol {
    type Error = ProtocolError;

    fn try_from(minor: u8) -> Result<Self, Self::Error> {
        match minor {
            0 => Ok(Protocol::Http10),
            1 => Ok(Protocol::Http11),
            v => Err(ProtocolError::unsupported_version(format!("HTTP/1.{v}"))),
        }
    }
}

impl From<Protocol> for Version {
    fn from(protocol: Protocol) -> Self {
        match protocol {
            Protocol::Http10 => Version::HTTP_10,
            Protocol::Http11 => Version::HTTP_11,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_http_version() {
        assert_eq!(Protocol::try_from(Version::HTTP_10), Ok(Protocol::Http10));
        assert_eq!(Protocol::try_from(Version::HTTP_11), Ok(Protocol::Http11));
        assert!(matches!(Protocol::try_from(Version::HTTP_2), Err(ProtocolError::UnsupportedVersion { .. })));
        assert!(matches!(Protocol::try_from(Version::HTTP_09), Err(ProtocolError::UnsupportedVersion { .. })));
    }

    #[test]
    fn from_minor_version() {
        assert_eq!(Protocol::try_from(0u8), Ok(Protocol::Http10));
        assert_eq!(Protocol::try_from(1u8), Ok(Protocol::Http11));
        assert_eq!(
            Protocol::try_from(2u8),
            Err(ProtocolError::UnsupportedVersion { version: "HTTP/1.2".to_string() })
        );
    }

    #[test]
    fn status_line_token() {
        assert_eq!(Protocol::Http10.to_string(), "HTTP/1.0");
        assert_eq!(Protocol::Http11.as_str(), "HTTP/1.1");
        assert_eq!(Version::from(Protocol::Http11), Version::HTTP_11);
    }
}
