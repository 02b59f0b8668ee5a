//! HTTP response body framing
//!
//! # Components
//!
//! - [`ChunkedEncoder`]: Implements chunked transfer encoding
//! - [`LengthEncoder`]: Handles `Content-Length` payloads
//! - [`PayloadEncoder`]: Picks one of the above, or close-delimited identity
//!   framing, from a committed response head

mod chunked_encoder;
mod length_encoder;
mod payload_encoder;

pub use chunked_encoder::ChunkedEncoder;
pub use length_encoder::LengthEncoder;
pub use payload_encoder::PayloadEncoder;
