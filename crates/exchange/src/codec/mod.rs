//! HTTP codec module for encoding outbound response items
//!
//! The transport owns the wire; this module gives transports built on
//! `tokio_util::codec::FramedWrite` a ready encoder for the items an exchange
//! hands them.
//!
//! - [`ResponseEncoder`]: encodes `Message<ResponseHead>` items
//!   - the status line and headers via [`HeaderEncoder`]
//!   - the payload via [`PayloadEncoder`], chunked, fixed length or
//!     close-delimited
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use micro_exchange::codec::ResponseEncoder;
//! use micro_exchange::protocol::{Message, PayloadItem, Protocol, ResponseContext, ResponseHead};
//! use tokio_util::codec::Encoder;
//!
//! let head = ResponseContext::new(Protocol::Http11).to_head().unwrap();
//!
//! let mut encoder = ResponseEncoder::new();
//! let mut buffer = BytesMut::new();
//! encoder.encode(Message::<ResponseHead>::Header(head), &mut buffer).unwrap();
//! encoder.encode(Message::<ResponseHead>::Payload(PayloadItem::Eof), &mut buffer).unwrap();
//!
//! assert!(buffer.ends_with(b"0\r\n\r\n"));
//! ```

mod body;
mod header;
mod response_encoder;

pub use body::PayloadEncoder;
pub use header::HeaderEncoder;
pub use response_encoder::ResponseEncoder;
