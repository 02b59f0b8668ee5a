//! HTTP response head serialization
//!
//! - [`HeaderEncoder`]: writes the status line and header list of a
//!   committed [`ResponseHead`](crate::protocol::ResponseHead)

mod header_encoder;

pub use header_encoder::HeaderEncoder;
