//! The exchange state machine.
//!
//! An [`HttpExchange`] adapts one HTTP request/response pair onto a
//! [`Transport`]. It walks through three states:
//!
//! ```text
//! OPEN ──commit (exactly once)──▶ HEADERS_COMMITTED ──producer done / error──▶ CLOSED
//!   └───────────────────────────── transport closed ──────────────────────────────┘
//! ```
//!
//! While OPEN the response status and headers are mutable. The first
//! [`outbound_write`](HttpExchange::outbound_write) commits them through a
//! compare-and-set; the winner's producer carries the head, the body and the
//! final eof to the transport. Writers that lose the race wait for the head
//! to be handed over, then forward their body items behind it; the winner
//! writes the eof only after every such writer finished.
//!
//! Mutations take `&mut self`, commits take `&self`: to race commits from
//! several tasks share the exchange through an `Arc` once it is set up.

mod commit;
mod relay;

pub use commit::ExchangeState;

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use http::{HeaderName, HeaderValue, Method, StatusCode, Uri};
use http_body::Body;
use http_body_util::BodyExt;
use tracing::{debug, info, warn};

use crate::exchange::commit::CommitGuard;
use crate::exchange::relay::OutboundRelay;
use crate::protocol::body::InboundBody;
use crate::protocol::{
    BoxError, ExchangeError, HeaderCollection, Protocol, ProtocolError, RequestContext, ResponseContext, ResponseHead,
    StateError, TransferMode, TransferPolicy,
};
use crate::transport::{Lifecycle, Transport, TransportConfig};

/// One HTTP request/response pair on top of a transport.
pub struct HttpExchange<T: Transport> {
    transport: Arc<T>,
    request: RequestContext,
    response: ResponseContext,
    guard: Arc<CommitGuard>,
}

impl<T: Transport> std::fmt::Debug for HttpExchange<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpExchange")
            .field("request", &self.request)
            .field("response", &self.response)
            .field("state", &self.guard.state())
            .finish_non_exhaustive()
    }
}

impl<T: Transport> HttpExchange<T> {
    /// Creates an exchange for an already decoded request.
    ///
    /// The response starts as `200 OK` in the request's protocol with that
    /// protocol's default transfer mode.
    pub fn new(transport: Arc<T>, request: RequestContext) -> Self {
        let response = ResponseContext::new(request.protocol());

        let config = transport.config();
        debug!(
            protocol = %request.protocol(),
            method = %request.method(),
            uri = %request.uri(),
            capacity = config.capacity(),
            dispatch = %config.dispatch(),
            "exchange opened"
        );

        Self { transport, request, response, guard: Arc::new(CommitGuard::new()) }
    }

    /// Decodes the head `httparse` produced into a new exchange.
    ///
    /// The head is consumed: an exchange can only be decoded once.
    pub fn decode(transport: Arc<T>, head: httparse::Request<'_, '_>) -> Result<Self, ExchangeError> {
        let request = RequestContext::try_from(head)?;
        Ok(Self::new(transport, request))
    }

    /// Hands out the request body; a body has a single subscriber.
    pub fn inbound_subscribe(&self) -> Result<InboundBody, ExchangeError> {
        Ok(self.transport.subscribe()?)
    }

    /// Streams `producer` as the response body.
    ///
    /// The first caller commits the response head and owns the framing: the
    /// transport receives the head, then the producer's chunks, then the end
    /// of the body, after which the exchange is closed. A caller that loses
    /// the commit waits until the head is on its way, then forwards its
    /// chunks without head or end marker. The end of the body waits for
    /// those writers, and a writer arriving after the body ended fails with
    /// [`StateError::Closed`].
    ///
    /// A producer error leaves the body unterminated, so it closes the
    /// exchange and the transport's connection along with it.
    ///
    /// Resolves once the producer is written, with the producer's error if it
    /// fails, or with the transport's error if the connection breaks.
    pub async fn outbound_write<S, E>(&self, producer: S) -> Result<(), ExchangeError>
    where
        S: Stream<Item = Result<Bytes, E>> + Send,
        E: Into<BoxError>,
    {
        let token = self.transport.on().cancellation();

        let relay = match self.commit_head()? {
            Some(head) => OutboundRelay::leading(head, producer, Arc::clone(&self.guard), token),
            None => {
                self.ensure_not_closed()?;
                self.guard.head_sent().await?;
                let ticket = self.guard.enter_follower()?;
                OutboundRelay::following(producer, Arc::clone(&self.guard), ticket, token)
            }
        };

        let leading = relay.is_leading();
        let result = self.transport.write_subscribe(relay).await;

        if (leading || result.is_err()) && self.guard.close() {
            debug!(leading, failed = result.is_err(), "exchange closed after outbound write");
        }

        result.map_err(ExchangeError::from)
    }

    /// Streams the data frames of `body` as the response body.
    ///
    /// Same contract as [`outbound_write`](Self::outbound_write); trailers
    /// are not sent.
    pub async fn outbound_send<B>(&self, body: B) -> Result<(), ExchangeError>
    where
        B: Body<Data = Bytes> + Send,
        B::Error: Into<BoxError>,
    {
        self.outbound_write(body.into_data_stream()).await
    }

    /// Commits the response head if nobody did yet.
    ///
    /// Returns the frozen head for the single winner and `None` for every
    /// other caller.
    pub(crate) fn commit_head(&self) -> Result<Option<ResponseHead>, ExchangeError> {
        self.observe_transport();
        if self.guard.state() != ExchangeState::Open {
            return Ok(None);
        }

        let head = self.response.to_head()?;
        if !self.guard.try_commit() {
            return Ok(None);
        }

        info!(
            status = head.status().as_u16(),
            transfer_mode = ?head.transfer_mode(),
            headers = head.headers().len(),
            "response head committed"
        );
        Ok(Some(head))
    }

    pub fn set_status(&mut self, status: StatusCode) -> Result<(), ExchangeError> {
        self.ensure_open()?;
        self.response.set_status(status);
        Ok(())
    }

    /// Replaces every value of `name` with `value`.
    pub fn set_response_header(&mut self, name: &str, value: &str) -> Result<(), ExchangeError> {
        self.ensure_open()?;
        validate_header(name, value)?;
        self.response.headers_mut().set(name, value);
        Ok(())
    }

    /// Appends `value` to the values of `name`.
    pub fn add_response_header(&mut self, name: &str, value: &str) -> Result<(), ExchangeError> {
        self.ensure_open()?;
        validate_header(name, value)?;
        self.response.headers_mut().add(name, value);
        Ok(())
    }

    pub fn remove_response_header(&mut self, name: &str) -> Result<Option<Vec<String>>, ExchangeError> {
        self.ensure_open()?;
        Ok(self.response.headers_mut().remove(name))
    }

    pub fn set_transfer_mode(&mut self, mode: TransferMode) -> Result<(), ExchangeError> {
        self.ensure_open()?;
        let protocol = self.response.protocol();
        TransferPolicy::apply_mode(mode, self.response.headers_mut(), protocol)
    }

    pub fn protocol(&self) -> Protocol {
        self.request.protocol()
    }

    pub fn method(&self) -> &Method {
        self.request.method()
    }

    pub fn uri(&self) -> &Uri {
        self.request.uri()
    }

    pub fn request_headers(&self) -> &HeaderCollection {
        self.request.headers()
    }

    pub fn request(&self) -> &RequestContext {
        &self.request
    }

    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    /// The transfer mode the current response headers describe.
    pub fn transfer_mode(&self) -> Result<TransferMode, ExchangeError> {
        self.response.transfer_mode()
    }

    pub fn response_headers(&self) -> &HeaderCollection {
        self.response.headers()
    }

    /// The current state.
    ///
    /// Reports [`ExchangeState::Closed`] as soon as the transport is closed;
    /// the exchange itself records that on its next mutation or write.
    pub fn state(&self) -> ExchangeState {
        if self.transport.on().is_closed() {
            return ExchangeState::Closed;
        }
        self.guard.state()
    }

    pub fn is_committed(&self) -> bool {
        self.state() != ExchangeState::Open
    }

    pub fn remote_address(&self) -> Option<SocketAddr> {
        self.transport.remote_address()
    }

    pub fn delegate(&self) -> &T::Channel {
        self.transport.delegate()
    }

    pub fn on(&self) -> &Lifecycle {
        self.transport.on()
    }

    pub fn config(&self) -> &TransportConfig {
        self.transport.config()
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    fn observe_transport(&self) {
        if self.transport.on().is_closed() && self.guard.close() {
            warn!("transport closed, exchange closed");
        }
    }

    fn ensure_open(&self) -> Result<(), StateError> {
        self.observe_transport();
        match self.guard.state() {
            ExchangeState::Open => Ok(()),
            ExchangeState::HeadersCommitted => Err(StateError::HeadersCommitted),
            ExchangeState::Closed => Err(StateError::Closed),
        }
    }

    fn ensure_not_closed(&self) -> Result<(), StateError> {
        self.observe_transport();
        match self.guard.state() {
            ExchangeState::Closed => Err(StateError::Closed),
            _ => Ok(()),
        }
    }
}

fn validate_header(name: &str, value: &str) -> Result<(), ProtocolError> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| ProtocolError::invalid_header(format!("invalid header name: {name:?}")))?;
    HeaderValue::from_str(value)
        .map_err(|_| ProtocolError::invalid_header(format!("invalid value for header {name}: {value:?}")))?;
    Ok(())
}
