//! Core HTTP protocol types of an exchange.
//!
//! # Architecture
//!
//! - **Versions**: [`Protocol`], HTTP/1.0 or HTTP/1.1
//! - **Headers**: [`HeaderCollection`], case-insensitive and multi-valued,
//!   keeping the casing of the first write
//! - **Transfer modes**: [`TransferMode`] and the [`TransferPolicy`] binding
//!   it to the protocol
//! - **Request side**: the immutable [`RequestContext`]
//! - **Response side**: the mutable [`ResponseContext`] and the committed
//!   [`ResponseHead`]
//! - **Messages**: [`Message`] and [`PayloadItem`], the items an outbound
//!   producer hands to the transport
//! - **Body streaming** ([`body`]): the demand-signalled inbound channel
//! - **Errors**: [`ExchangeError`] and its kinds

mod version;
pub use version::Protocol;

mod header;
pub use header::HeaderCollection;
pub use header::Iter as HeaderIter;

mod transfer;
pub use transfer::CONTENT_LENGTH;
pub use transfer::TRANSFER_ENCODING;
pub use transfer::TransferMode;
pub use transfer::TransferPolicy;

mod request;
pub use request::RequestContext;

mod response;
pub use response::ResponseContext;
pub use response::ResponseHead;

mod message;
pub use message::Message;
pub use message::PayloadItem;

mod error;
pub use error::BoxError;
pub use error::ExchangeError;
pub use error::ProtocolError;
pub use error::StateError;
pub use error::TransportError;

pub mod body;
