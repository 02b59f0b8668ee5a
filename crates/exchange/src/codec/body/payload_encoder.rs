use crate::codec::body::chunked_encoder::ChunkedEncoder;
use crate::codec::body::length_encoder::LengthEncoder;
use crate::protocol::{PayloadItem, ResponseHead, TransferMode, TransportError};
use bytes::{Buf, BufMut, BytesMut};

use tokio_util::codec::Encoder;

/// encode payload for response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEncoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    /// content-length payload
    Length(LengthEncoder),

    /// transfer-encoding chunked payload
    Chunked(ChunkedEncoder),

    /// no framing, the body ends when the connection closes
    Identity { eof: bool },
}

impl PayloadEncoder {
    /// create a chunked `PayloadEncoder`
    pub fn chunked() -> Self {
        Self { kind: Kind::Chunked(ChunkedEncoder::new()) }
    }

    /// create a fixed length `PayloadEncoder`
    pub fn fix_length(size: u64) -> Self {
        Self { kind: Kind::Length(LengthEncoder::new(size)) }
    }

    /// create a close-delimited `PayloadEncoder`
    pub fn identity() -> Self {
        Self { kind: Kind::Identity { eof: false } }
    }

    /// Picks the framing a committed head announces.
    pub fn for_head(head: &ResponseHead) -> Self {
        match (head.transfer_mode(), head.content_length()) {
            (TransferMode::Chunked, _) => Self::chunked(),
            (_, Some(length)) => Self::fix_length(length),
            (_, None) => Self::identity(),
        }
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self.kind, Kind::Chunked(_))
    }

    pub fn is_fix_length(&self) -> bool {
        matches!(self.kind, Kind::Length(_))
    }

    pub fn is_finish(&self) -> bool {
        match &self.kind {
            Kind::Length(encoder) => encoder.is_finish(),
            Kind::Chunked(encoder) => encoder.is_finish(),
            Kind::Identity { eof } => *eof,
        }
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for PayloadEncoder {
    type Error = TransportError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match &mut self.kind {
            Kind::Length(encoder) => encoder.encode(item, dst),
            Kind::Chunked(encoder) => encoder.encode(item, dst),
            Kind::Identity { eof } => {
                match item {
                    PayloadItem::Chunk(bytes) => dst.put(bytes),
                    PayloadItem::Eof => *eof = true,
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Protocol, ResponseContext, TRANSFER_ENCODING};

    #[test]
    fn framing_follows_head() {
        let head = ResponseContext::new(Protocol::Http11).to_head().unwrap();
        assert!(PayloadEncoder::for_head(&head).is_chunked());

        let mut response = ResponseContext::new(Protocol::Http11);
        response.headers_mut().remove(TRANSFER_ENCODING);
        response.headers_mut().set("content-length", "3");
        assert!(PayloadEncoder::for_head(&response.to_head().unwrap()).is_fix_length());

        let head = ResponseContext::new(Protocol::Http10).to_head().unwrap();
        let encoder = PayloadEncoder::for_head(&head);
        assert!(!encoder.is_chunked());
        assert!(!encoder.is_fix_length());
    }

    #[test]
    fn identity_writes_through() {
        let mut encoder = PayloadEncoder::identity();
        let mut dst = BytesMut::new();

        encoder.encode(PayloadItem::Chunk(bytes::Bytes::from_static(b"raw")), &mut dst).unwrap();
        assert!(!encoder.is_finish());
        encoder.encode(PayloadItem::<bytes::Bytes>::Eof, &mut dst).unwrap();
        assert!(encoder.is_finish());
        assert_eq!(&dst[..], b"raw");
    }
}
