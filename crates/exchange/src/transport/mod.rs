//! The transport seam of an exchange.
//!
//! A [`Transport`] owns the connection: it performs the socket I/O, decides
//! when to pull the next outbound item and reports lifecycle events. The
//! exchange only talks to it through this trait, holding it by composition.
//!
//! # Components
//!
//! - [`Transport`]: the trait an exchange runs on
//! - [`TransportConfig`]: capacity and dispatch settings read by exchanges
//! - [`Lifecycle`]: close notification and callback registration
//! - [`IoTransport`]: a transport writing through a
//!   `tokio_util::codec::FramedWrite` with the [`ResponseEncoder`](crate::codec::ResponseEncoder)

mod config;
mod io_transport;
mod lifecycle;

pub use config::DEFAULT_CAPACITY;
pub use config::DEFAULT_WRITE_BUFFER_SIZE;
pub use config::Dispatch;
pub use config::TransportConfig;
pub use io_transport::IoTransport;
pub use lifecycle::Lifecycle;

use std::future::Future;
use std::net::SocketAddr;

use futures::Stream;

use crate::protocol::body::InboundBody;
use crate::protocol::{Message, ResponseHead, TransportError};

/// An item an exchange hands to its transport.
pub type OutboundItem = Message<ResponseHead>;

/// The byte-streaming connection an exchange runs on.
///
/// Outbound flow control is pull based: the transport polls the producer
/// only when it can accept another item, so a producer never runs ahead of
/// the connection.
pub trait Transport: Send + Sync + 'static {
    /// The raw channel behind the transport.
    type Channel;

    fn config(&self) -> &TransportConfig;

    /// Hands out the inbound body of the current request.
    ///
    /// A request body has a single consumer; subscribing twice fails with
    /// [`TransportError::AlreadySubscribed`].
    fn subscribe(&self) -> Result<InboundBody, TransportError>;

    /// Writes every item of `producer`, pulling the next one only after the
    /// previous one was accepted.
    ///
    /// Resolves once the producer is exhausted and written, or with the first
    /// producer or I/O error.
    fn write_subscribe<S>(&self, producer: S) -> impl Future<Output = Result<(), TransportError>> + Send
    where
        S: Stream<Item = Result<OutboundItem, TransportError>> + Send;

    fn remote_address(&self) -> Option<SocketAddr>;

    fn delegate(&self) -> &Self::Channel;

    /// Lifecycle events of the connection.
    fn on(&self) -> &Lifecycle;
}
