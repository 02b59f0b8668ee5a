use std::error::Error;
use std::io;

use thiserror::Error;

use crate::protocol::{Protocol, TransferMode};

pub type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("protocol error: {source}")]
    Protocol {
        #[from]
        source: ProtocolError,
    },

    #[error("state error: {source}")]
    State {
        #[from]
        source: StateError,
    },

    #[error("unsupported operation: {operation}")]
    Unsupported { operation: String },

    #[error("transport failure: {source}")]
    Transport {
        #[from]
        source: TransportError,
    },
}

impl ExchangeError {
    pub fn unsupported<S: ToString>(operation: S) -> Self {
        Self::Unsupported { operation: operation.to_string() }
    }

    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol { .. })
    }

    pub fn is_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("transfer mode {mode:?} requires HTTP/1.1, current protocol is {protocol}")]
    ChunkedRequiresHttp11 { mode: TransferMode, protocol: Protocol },

    #[error("unsupported http version: {version}")]
    UnsupportedVersion { version: String },

    #[error("can't determine a valid transfer mode from transfer-encoding: {value}")]
    IndeterminateTransfer { value: String },

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid http uri")]
    InvalidUri,

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("incomplete request head, missing {missing}")]
    IncompleteHead { missing: &'static str },
}

impl ProtocolError {
    pub fn chunked_requires_http11(protocol: Protocol) -> Self {
        Self::ChunkedRequiresHttp11 { mode: TransferMode::Chunked, protocol }
    }

    pub fn unsupported_version<S: ToString>(version: S) -> Self {
        Self::UnsupportedVersion { version: version.to_string() }
    }

    pub fn indeterminate_transfer<S: ToString>(value: S) -> Self {
        Self::IndeterminateTransfer { value: value.to_string() }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateError {
    #[error("response headers already committed")]
    HeadersCommitted,

    #[error("exchange already closed")]
    Closed,
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    #[error("transport closed")]
    Closed,

    #[error("inbound body already subscribed")]
    AlreadySubscribed,

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("outbound producer failed: {source}")]
    Producer { source: BoxError },
}

impl TransportError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    pub fn producer<E: Into<BoxError>>(e: E) -> Self {
        Self::Producer { source: e.into() }
    }
}
