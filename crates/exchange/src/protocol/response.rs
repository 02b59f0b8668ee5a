//! HTTP response state handling.
//!
//! [`ResponseContext`] is the mutable response bundle user code edits while
//! the exchange is open. Committing it produces a [`ResponseHead`], the frozen
//! status line and header list handed to the transport exactly once.

use http::StatusCode;

use crate::protocol::transfer::CHUNKED;
use crate::protocol::{CONTENT_LENGTH, ExchangeError, HeaderCollection, Protocol, TRANSFER_ENCODING, TransferMode, TransferPolicy};

/// The mutable response side of an exchange.
#[derive(Debug, Clone)]
pub struct ResponseContext {
    protocol: Protocol,
    status: StatusCode,
    headers: HeaderCollection,
}

impl ResponseContext {
    /// Creates the default response for a request of `protocol`: `200 OK`
    /// with the protocol's default transfer mode already applied.
    pub fn new(protocol: Protocol) -> Self {
        let mut headers = HeaderCollection::with_capacity(8);
        if TransferPolicy::default_mode(protocol).is_chunked() {
            headers.set(TRANSFER_ENCODING, CHUNKED);
        }

        Self { protocol, status: StatusCode::OK, headers }
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderCollection {
        &self.headers
    }

    pub(crate) fn headers_mut(&mut self) -> &mut HeaderCollection {
        &mut self.headers
    }

    pub fn transfer_mode(&self) -> Result<TransferMode, ExchangeError> {
        TransferPolicy::current_mode(&self.headers, self.protocol)
    }

    /// Freezes the current state into the head sent on the wire.
    ///
    /// A chunked head never carries `Content-Length`, even if one was set
    /// after the mode was chosen.
    pub fn to_head(&self) -> Result<ResponseHead, ExchangeError> {
        let transfer_mode = self.transfer_mode()?;
        let mut headers = self.headers.clone();
        if transfer_mode.is_chunked() {
            headers.remove(CONTENT_LENGTH);
        }
        Ok(ResponseHead { protocol: self.protocol, status: self.status, headers, transfer_mode })
    }
}

/// The committed status line and headers of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    protocol: Protocol,
    status: StatusCode,
    headers: HeaderCollection,
    transfer_mode: TransferMode,
}

impl ResponseHead {
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderCollection {
        &self.headers
    }

    pub fn transfer_mode(&self) -> TransferMode {
        self.transfer_mode
    }

    /// The `Content-Length` declared by the headers, if any parses.
    pub fn content_length(&self) -> Option<u64> {
        self.headers.get(CONTENT_LENGTH).and_then(|value| value.trim().parse().ok())
    }
}
