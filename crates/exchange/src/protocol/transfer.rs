//! Response body transfer modes and the rules binding them to the protocol.

use tracing::debug;

use crate::ensure;
use crate::protocol::{ExchangeError, HeaderCollection, Protocol, ProtocolError};

pub const TRANSFER_ENCODING: &str = "Transfer-Encoding";
pub const CONTENT_LENGTH: &str = "Content-Length";

pub(crate) const CHUNKED: &str = "chunked";

/// How the response body is framed on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TransferMode {
    /// `Transfer-Encoding: chunked`, HTTP/1.1 only
    Chunked,
    /// no transfer coding: either `Content-Length` or close-delimited
    NonChunked,
    /// discrete server-sent events; recognized but not implemented
    EventStream,
}

impl TransferMode {
    #[inline]
    pub fn is_chunked(&self) -> bool {
        matches!(self, TransferMode::Chunked)
    }
}

/// Decides and enforces the transfer mode of a response.
///
/// The response headers are the only state: the mode is read back from
/// `Transfer-Encoding` and applied by rewriting it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferPolicy;

impl TransferPolicy {
    /// The mode a fresh response starts with.
    pub fn default_mode(protocol: Protocol) -> TransferMode {
        if protocol.is_http11() { TransferMode::Chunked } else { TransferMode::NonChunked }
    }

    /// Inspects `Transfer-Encoding` and returns the mode it describes.
    pub fn current_mode(headers: &HeaderCollection, protocol: Protocol) -> Result<TransferMode, ExchangeError> {
        match headers.get(TRANSFER_ENCODING) {
            None => Ok(TransferMode::NonChunked),
            Some(value) if value.trim().eq_ignore_ascii_case(CHUNKED) => {
                ensure!(protocol.is_http11(), ProtocolError::chunked_requires_http11(protocol).into());
                Ok(TransferMode::Chunked)
            }
            Some(value) => Err(ProtocolError::indeterminate_transfer(value).into()),
        }
    }

    /// Rewrites `headers` so they describe `mode`.
    pub fn apply_mode(mode: TransferMode, headers: &mut HeaderCollection, protocol: Protocol) -> Result<(), ExchangeError> {
        match mode {
            TransferMode::EventStream => {
                return Err(ExchangeError::unsupported(format!("transfer mode {mode:?} is not supported yet")));
            }
            TransferMode::Chunked => {
                ensure!(protocol.is_http11(), ProtocolError::chunked_requires_http11(protocol).into());
                headers.set(TRANSFER_ENCODING, CHUNKED);
                // a chunked message carries no length
                headers.remove(CONTENT_LENGTH);
            }
            TransferMode::NonChunked => {
                headers.remove(TRANSFER_ENCODING);
            }
        }

        debug!(?mode, %protocol, "applied transfer mode");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunked_requires_http11() {
        let mut headers = HeaderCollection::new();
        let result = TransferPolicy::apply_mode(TransferMode::Chunked, &mut headers, Protocol::Http10);

        assert!(matches!(
            result,
            Err(ExchangeError::Protocol { source: ProtocolError::ChunkedRequiresHttp11 { protocol: Protocol::Http10, .. } })
        ));
        assert!(!headers.contains(TRANSFER_ENCODING));
    }

    #[test]
    fn chunked_sets_transfer_encoding() {
        let mut headers = HeaderCollection::new();
        TransferPolicy::apply_mode(TransferMode::Chunked, &mut headers, Protocol::Http11).unwrap();

        assert_eq!(headers.get("transfer-encoding"), Some("chunked"));
        assert_eq!(TransferPolicy::current_mode(&headers, Protocol::Http11).unwrap(), TransferMode::Chunked);
    }

    #[test]
    fn chunked_drops_content_length() {
        let mut headers = HeaderCollection::new();
        headers.set("content-length", "5");

        TransferPolicy::apply_mode(TransferMode::Chunked, &mut headers, Protocol::Http11).unwrap();

        assert!(!headers.contains(CONTENT_LENGTH));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn event_stream_is_unsupported() {
        for protocol in [Protocol::Http10, Protocol::Http11] {
            let mut headers = HeaderCollection::new();
            let result = TransferPolicy::apply_mode(TransferMode::EventStream, &mut headers, protocol);
            assert!(result.unwrap_err().is_unsupported());
            assert!(headers.is_empty());
        }
    }

    #[test]
    fn non_chunked_removes_transfer_encoding() {
        let mut headers = HeaderCollection::new();
        headers.set("transfer-encoding", "chunked");

        TransferPolicy::apply_mode(TransferMode::NonChunked, &mut headers, Protocol::Http11).unwrap();

        assert_eq!(headers.get(TRANSFER_ENCODING), None);
        assert_eq!(TransferPolicy::current_mode(&headers, Protocol::Http11).unwrap(), TransferMode::NonChunked);
    }

    #[test]
    fn chunked_header_under_http10_is_rejected() {
        let mut headers = HeaderCollection::new();
        headers.set(TRANSFER_ENCODING, "Chunked");

        let error = TransferPolicy::current_mode(&headers, Protocol::Http10).unwrap_err();
        assert!(error.is_protocol());
    }

    #[test]
    fn unknown_transfer_encoding_is_indeterminate() {
        let mut headers = HeaderCollection::new();
        headers.set(TRANSFER_ENCODING, "gzip, chunked");

        let error = TransferPolicy::current_mode(&headers, Protocol::Http11).unwrap_err();
        assert!(matches!(
            error,
            ExchangeError::Protocol { source: ProtocolError::IndeterminateTransfer { ref value } } if value == "gzip, chunked"
        ));
    }

    #[test]
    fn default_mode_follows_protocol() {
        assert_eq!(TransferPolicy::default_mode(Protocol::Http11), TransferMode::Chunked);
        assert_eq!(TransferPolicy::default_mode(Protocol::Http10), TransferMode::NonChunked);
    }
}
