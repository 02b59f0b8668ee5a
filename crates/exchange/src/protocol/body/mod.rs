//! Inbound request body streaming.
//!
//! The inbound body travels from the transport to the consumer through a
//! demand-signalled channel:
//!
//! - [`InboundBody`]: the consumer side, implementing `http_body::Body`
//! - [`InboundFeed`]: the transport side, reading the raw payload stream
//!
//! Every poll of the body that finds nothing in flight sends one
//! `RequestData` signal, and the feed reads exactly one payload item per
//! signal. Both channels are bounded, so neither side buffers more than the
//! configured capacity. Dropping or cancelling the body sends `Enough` and the
//! feed stops reading.

mod body_channel;

pub use body_channel::InboundBody;
pub use body_channel::InboundFeed;
pub use body_channel::body_channel;
