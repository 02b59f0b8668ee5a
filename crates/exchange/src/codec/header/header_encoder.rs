//! HTTP header encoder implementation for serializing committed response heads
//!
//! This module writes the status line and the header list of a
//! [`ResponseHead`] into raw bytes. Header names go out with the casing they
//! were first written with; values are written as stored.

use crate::protocol::{ResponseHead, TransportError};

use bytes::{BufMut, BytesMut};

use http::{HeaderName, HeaderValue};
use std::io;
use std::io::Write;
use tokio_util::codec::Encoder;
use tracing::error;

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 4 * 1024;

/// Encoder for HTTP response heads implementing the [`Encoder`] trait.
///
/// The transfer mode has already been applied to the headers by the time the
/// head is committed, so no framing header is added here.
#[derive(Debug, Default)]
pub struct HeaderEncoder;

impl Encoder<ResponseHead> for HeaderEncoder {
    type Error = TransportError;

    /// Encodes the status line and headers into the provided bytes buffer.
    ///
    /// # Errors
    ///
    /// Returns error if a header name or value is not valid on the wire or
    /// writing to the buffer fails. Nothing is written in that case.
    fn encode(&mut self, head: ResponseHead, dst: &mut BytesMut) -> Result<(), Self::Error> {
        for (name, value) in head.headers() {
            if HeaderName::from_bytes(name.as_bytes()).is_err() || HeaderValue::from_str(value).is_err() {
                error!(header_name = name, "invalid response header");
                return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("invalid response header {name}")).into());
            }
        }

        dst.reserve(INIT_HEADER_SIZE);
        write!(
            FastWrite(dst),
            "{} {} {}\r\n",
            head.protocol(),
            head.status().as_str(),
            head.status().canonical_reason().unwrap_or("")
        )?;

        for (header_name, header_value) in head.headers() {
            dst.put_slice(header_name.as_bytes());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_bytes());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// Writer over `BytesMut` for the `write!` macro.
struct FastWrite<'a>(&'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
