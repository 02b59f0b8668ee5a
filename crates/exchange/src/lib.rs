//! A single HTTP request/response exchange on top of a backpressured transport
//!
//! This crate adapts one HTTP/1.x request/response pair onto a byte-streaming
//! [`transport::Transport`]. The transport owns the socket; the exchange owns
//! the HTTP semantics in between: the decoded request, the mutable response,
//! the exactly-once commit of the response head and the framing of the body.
//!
//! # Features
//!
//! - HTTP/1.0 and HTTP/1.1 request decoding from `httparse`
//! - Case-insensitive multi-valued header collections
//! - Chunked and fixed-length response framing, enforced per protocol
//! - Atomic, lock-free commit of the response head
//! - Pull-based outbound body streaming and demand-signalled inbound bodies
//! - Cancellation of the outbound producer when the transport closes
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use futures::stream;
//! use http::StatusCode;
//! use micro_exchange::exchange::HttpExchange;
//! use micro_exchange::transport::IoTransport;
//! use tokio::net::TcpListener;
//! use tracing::{error, info};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await?;
//!     let (tcp_stream, remote_addr) = listener.accept().await?;
//!     let (_reader, writer) = tcp_stream.into_split();
//!
//!     // the request head usually comes from a decoder reading `_reader`
//!     let mut headers = [httparse::EMPTY_HEADER; 16];
//!     let mut request = httparse::Request::new(&mut headers);
//!     request.parse(b"GET /hello HTTP/1.1\r\nHost: localhost\r\n\r\n")?;
//!
//!     let transport = Arc::new(IoTransport::new(writer).with_remote_address(remote_addr));
//!     let mut exchange = HttpExchange::decode(transport, request)?;
//!     exchange.set_status(StatusCode::OK)?;
//!     exchange.set_response_header("Content-Type", "text/plain")?;
//!
//!     let body = stream::iter([Ok::<_, std::io::Error>(Bytes::from_static(b"Hello World!\r\n"))]);
//!     match exchange.outbound_write(body).await {
//!         Ok(()) => info!("response sent"),
//!         Err(e) => error!(cause = %e, "failed to send response"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`protocol`]: request/response contexts, headers, transfer modes, errors
//!   and the inbound body channel
//! - [`codec`]: encoders writing committed heads and framed bodies
//! - [`transport`]: the [`Transport`](transport::Transport) seam, its
//!   configuration and lifecycle, and an `AsyncWrite` based implementation
//! - [`exchange`]: the [`HttpExchange`](exchange::HttpExchange) state machine
//!
//! # Core Components
//!
//! ## Exchange lifecycle
//!
//! An exchange is OPEN until the first outbound write commits the response
//! head, HEADERS_COMMITTED while the body streams, and CLOSED once the body
//! completes, fails, or the transport closes. Status and header mutations are
//! only accepted while OPEN.
//!
//! ## Body Streaming
//!
//! Request bodies arrive through [`protocol::body::InboundBody`], an
//! `http_body::Body` that asks the transport for one item per poll. Response
//! bodies are any `Stream` of `Bytes`, pulled by the transport only as fast
//! as the connection drains.
//!
//! ## Error Handling
//!
//! - [`protocol::ExchangeError`]: top-level error type
//! - [`protocol::ProtocolError`]: protocol rule violations
//! - [`protocol::StateError`]: operations attempted in the wrong state
//! - [`protocol::TransportError`]: connection and body streaming failures
//!
//! # Limitations
//!
//! - HTTP/1.x only
//! - Server-sent event streams are not supported yet
//! - Trailers of response bodies are not sent

pub mod codec;
pub mod exchange;
pub mod protocol;
pub mod transport;

mod utils;
pub(crate) use utils::ensure;
