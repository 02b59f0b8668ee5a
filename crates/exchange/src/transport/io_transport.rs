use std::net::SocketAddr;
use std::pin::pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::{SinkExt, Stream, StreamExt};
use tokio::io::AsyncWrite;
use tokio_util::codec::FramedWrite;
use tracing::{debug, error, warn};

use crate::codec::ResponseEncoder;
use crate::protocol::TransportError;
use crate::protocol::body::InboundBody;
use crate::transport::{Lifecycle, OutboundItem, Transport, TransportConfig};

/// A transport writing responses to any `AsyncWrite`.
///
/// Outbound items go through a `FramedWrite` with a [`ResponseEncoder`];
/// the framed writer flushes on its own once its buffer passes
/// [`TransportConfig::write_buffer_size`], which is the backpressure the
/// producer sees. Concurrent writers are serialized item by item through an
/// async lock.
///
/// The inbound body, if any, is attached by whoever decodes the request; see
/// [`body_channel`](crate::protocol::body::body_channel).
pub struct IoTransport<W, C = ()> {
    config: TransportConfig,
    remote_address: Option<SocketAddr>,
    channel: C,
    lifecycle: Lifecycle,
    framed_write: tokio::sync::Mutex<FramedWrite<W, ResponseEncoder>>,
    inbound: Mutex<Option<InboundBody>>,
    subscribed: AtomicBool,
}

impl<W, C> std::fmt::Debug for IoTransport<W, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoTransport")
            .field("config", &self.config)
            .field("remote_address", &self.remote_address)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}

impl<W> IoTransport<W>
where
    W: AsyncWrite,
{
    pub fn new(writer: W) -> Self {
        Self::with_config(writer, TransportConfig::default())
    }

    pub fn with_config(writer: W, config: TransportConfig) -> Self {
        let mut framed_write = FramedWrite::new(writer, ResponseEncoder::new());
        framed_write.set_backpressure_boundary(config.write_buffer_size());

        Self {
            config,
            remote_address: None,
            channel: (),
            lifecycle: Lifecycle::new(),
            framed_write: tokio::sync::Mutex::new(framed_write),
            inbound: Mutex::new(None),
            subscribed: AtomicBool::new(false),
        }
    }
}

impl<W, C> IoTransport<W, C> {
    /// Attaches the raw channel returned by [`Transport::delegate`].
    pub fn with_channel<T>(self, channel: T) -> IoTransport<W, T> {
        IoTransport {
            config: self.config,
            remote_address: self.remote_address,
            channel,
            lifecycle: self.lifecycle,
            framed_write: self.framed_write,
            inbound: self.inbound,
            subscribed: self.subscribed,
        }
    }

    pub fn with_remote_address(mut self, remote_address: SocketAddr) -> Self {
        self.remote_address = Some(remote_address);
        self
    }

    /// Attaches the consumer end of the current request's body.
    pub fn with_inbound(mut self, body: InboundBody) -> Self {
        match self.inbound.get_mut() {
            Ok(inbound) => *inbound = Some(body),
            Err(e) => error!("inbound body slot poisoned, {}", e),
        }
        self
    }

    pub fn into_writer(self) -> W {
        self.framed_write.into_inner().into_inner()
    }
}

impl<W, C> Transport for IoTransport<W, C>
where
    W: AsyncWrite + Unpin + Send + 'static,
    C: Send + Sync + 'static,
{
    type Channel = C;

    fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn subscribe(&self) -> Result<InboundBody, TransportError> {
        if self.subscribed.swap(true, Ordering::AcqRel) {
            warn!("inbound body subscribed more than once");
            return Err(TransportError::AlreadySubscribed);
        }

        let body = match self.inbound.lock() {
            Ok(mut inbound) => inbound.take(),
            Err(e) => {
                error!("inbound body slot poisoned, {}", e);
                return Err(TransportError::Closed);
            }
        };
        Ok(body.unwrap_or_else(InboundBody::empty))
    }

    async fn write_subscribe<S>(&self, producer: S) -> Result<(), TransportError>
    where
        S: Stream<Item = Result<OutboundItem, TransportError>> + Send,
    {
        if self.lifecycle.is_closed() {
            return Err(TransportError::Closed);
        }

        let mut producer = pin!(producer);

        let mut items: usize = 0;
        while let Some(item) = producer.next().await {
            // the lock is taken per item so that concurrent writers interleave
            let mut framed_write = self.framed_write.lock().await;
            let item = match item {
                Ok(item) => item,
                Err(e) => {
                    // the message on the wire can't be completed any more, the connection goes with it
                    warn!(cause = %e, "outbound producer failed, closing transport");
                    if let Err(flush_error) = framed_write.flush().await {
                        error!(cause = %flush_error, "failed to flush after producer error");
                    }
                    self.lifecycle.close();
                    return Err(e);
                }
            };

            if let Err(e) = framed_write.feed(item).await {
                error!(cause = %e, "failed to write outbound item");
                self.lifecycle.close();
                return Err(e);
            }
            items += 1;
        }

        if let Err(e) = self.framed_write.lock().await.flush().await {
            error!(cause = %e, "failed to flush outbound items");
            self.lifecycle.close();
            return Err(e);
        }

        debug!(items, "outbound producer completed");
        Ok(())
    }

    fn remote_address(&self) -> Option<SocketAddr> {
        self.remote_address
    }

    fn delegate(&self) -> &Self::Channel {
        &self.channel
    }

    fn on(&self) -> &Lifecycle {
        &self.lifecycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::body::body_channel;
    use crate::protocol::{Message, PayloadItem, Protocol, ResponseContext};
    use bytes::Bytes;
    use futures::stream;
    use http_body_util::BodyExt;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    struct BrokenWriter;

    impl AsyncWrite for BrokenWriter {
        fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, _buf: &[u8]) -> Poll<Result<usize, io::Error>> {
            Poll::Ready(Err(io::Error::from(io::ErrorKind::ConnectionReset)))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
            Poll::Ready(Ok(()))
        }
    }

    fn response_items() -> Vec<Result<OutboundItem, TransportError>> {
        let head = ResponseContext::new(Protocol::Http11).to_head().unwrap();
        vec![
            Ok(Message::Header(head)),
            Ok(Message::from(Bytes::from_static(b"hi"))),
            Ok(Message::Payload(PayloadItem::Eof)),
        ]
    }

    #[tokio::test]
    async fn write_items_in_order() {
        let transport = IoTransport::new(Vec::<u8>::new());

        transport.write_subscribe(stream::iter(response_items())).await.unwrap();

        let written = transport.into_writer();
        assert_eq!(&written[..], b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n2\r\nhi\r\n0\r\n\r\n");
    }

    #[tokio::test]
    async fn write_error_closes_the_transport() {
        let transport = IoTransport::new(BrokenWriter);

        let result = transport.write_subscribe(stream::iter(response_items())).await;

        assert!(matches!(result, Err(TransportError::Io { .. })));
        assert!(transport.on().is_closed());
        assert!(matches!(transport.write_subscribe(stream::empty::<Result<OutboundItem, TransportError>>()).await, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn producer_error_closes_the_transport() {
        let transport = IoTransport::new(Vec::<u8>::new());
        let items = response_items().into_iter().take(2).chain([Err(TransportError::invalid_body("boom"))]);

        let result = transport.write_subscribe(stream::iter(items)).await;

        assert!(matches!(result, Err(TransportError::InvalidBody { .. })));
        assert!(transport.on().is_closed());
        assert!(matches!(
            transport.write_subscribe(stream::iter(response_items())).await,
            Err(TransportError::Closed)
        ));

        // what was handed over is flushed, but the body is never terminated
        let written = transport.into_writer();
        assert_eq!(&written[..], b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n2\r\nhi\r\n");
    }

    #[tokio::test]
    async fn single_inbound_subscription() {
        let items = vec![Ok(PayloadItem::Chunk(Bytes::from_static(b"ping"))), Ok(PayloadItem::Eof)];
        let (mut feed, body) = body_channel(stream::iter(items), 8);
        let transport = IoTransport::new(Vec::<u8>::new()).with_inbound(body);

        let body = transport.subscribe().unwrap();
        assert!(matches!(transport.subscribe(), Err(TransportError::AlreadySubscribed)));

        let (feed_result, collected) = tokio::join!(feed.start(), body.collect());
        feed_result.unwrap();
        assert_eq!(collected.unwrap().to_bytes(), Bytes::from_static(b"ping"));
    }

    #[tokio::test]
    async fn no_inbound_means_empty_body() {
        let transport = IoTransport::new(Vec::<u8>::new())
            .with_remote_address("127.0.0.1:8080".parse().unwrap())
            .with_channel("peer-7");

        assert_eq!(transport.remote_address(), Some("127.0.0.1:8080".parse().unwrap()));
        assert_eq!(*transport.delegate(), "peer-7");

        let body = transport.subscribe().unwrap();
        assert!(body.collect().await.unwrap().to_bytes().is_empty());
    }
}
