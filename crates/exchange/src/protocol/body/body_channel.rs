use crate::protocol::{PayloadItem, TransportError};
use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt, channel::mpsc};
use http_body::{Body, Frame, SizeHint};
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::{debug, error};

/// Creates the inbound body channel.
///
/// `payload_stream` yields the decoded body items of one request. The returned
/// [`InboundFeed`] is driven by the transport and reads one item from the
/// stream per demand signal; the [`InboundBody`] is handed to the consumer.
pub fn body_channel<S>(payload_stream: S, capacity: usize) -> (InboundFeed<S>, InboundBody)
where
    S: Stream<Item = Result<PayloadItem, TransportError>> + Unpin,
{
    let (signal_sender, signal_receiver) = mpsc::channel(capacity);
    let (data_sender, data_receiver) = mpsc::channel(capacity);

    (InboundFeed::new(payload_stream, signal_receiver, data_sender), InboundBody::new(signal_sender, data_receiver))
}

#[derive(Debug)]
pub(crate) enum BodyRequestSignal {
    RequestData,
    Enough,
}

/// The transport side of the inbound body channel.
#[derive(Debug)]
pub struct InboundFeed<S> {
    payload_stream: S,
    signal_receiver: mpsc::Receiver<BodyRequestSignal>,
    data_sender: mpsc::Sender<Result<PayloadItem, TransportError>>,
    eof: bool,
}

impl<S> InboundFeed<S>
where
    S: Stream<Item = Result<PayloadItem, TransportError>> + Unpin,
{
    fn new(
        payload_stream: S,
        signal_receiver: mpsc::Receiver<BodyRequestSignal>,
        data_sender: mpsc::Sender<Result<PayloadItem, TransportError>>,
    ) -> Self {
        Self { payload_stream, signal_receiver, data_sender, eof: false }
    }

    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Answers demand from the consumer until the body ends, the consumer
    /// cancels or the payload stream fails.
    ///
    /// Nothing is read from the payload stream without a pending demand.
    pub async fn start(&mut self) -> Result<(), TransportError> {
        if self.eof {
            return Ok(());
        }

        while let Some(signal) = self.signal_receiver.next().await {
            match signal {
                BodyRequestSignal::RequestData => match self.read_data().await {
                    Ok(payload_item) => {
                        self.eof = payload_item.is_eof();
                        if let Err(e) = self.data_sender.send(Ok(payload_item)).await {
                            error!("failed to send payload body through channel, {}", e);
                            return Err(TransportError::invalid_body("send body data error"));
                        }

                        if self.eof {
                            return Ok(());
                        }
                    }

                    Err(e) => {
                        error!("failed to read data from body stream, {}", e);
                        let reason = e.to_string();
                        if let Err(send_error) = self.data_sender.send(Err(e)).await {
                            error!("failed to send error through channel, {}", send_error);
                        }
                        return Err(TransportError::invalid_body(reason));
                    }
                },

                BodyRequestSignal::Enough => {
                    debug!("inbound body cancelled by consumer");
                    return Ok(());
                }
            }
        }

        debug!("inbound body consumer dropped");
        Ok(())
    }

    /// Reads and discards whatever is left of the body.
    ///
    /// Transports that keep the connection alive call this after the consumer
    /// cancelled, so the next request starts at a message boundary.
    pub async fn skip_remaining(&mut self) -> Result<usize, TransportError> {
        let mut size: usize = 0;
        while !self.eof {
            match self.read_data().await? {
                PayloadItem::Chunk(bytes) => size += bytes.len(),
                PayloadItem::Eof => self.eof = true,
            }
        }

        if size > 0 {
            debug!(size, "skip request body");
        }
        Ok(size)
    }

    async fn read_data(&mut self) -> Result<PayloadItem, TransportError> {
        match self.payload_stream.next().await {
            Some(result) => result,
            None => {
                error!("payload stream ended before eof");
                Err(TransportError::invalid_body("payload stream ended before eof"))
            }
        }
    }
}

/// The consumer side of the inbound body channel.
///
/// Each poll without an item in flight sends one demand signal; dropping the
/// body (or calling [`InboundBody::cancel`]) tells the feed to stop reading.
#[derive(Debug)]
pub struct InboundBody {
    signal_sender: mpsc::Sender<BodyRequestSignal>,
    data_receiver: mpsc::Receiver<Result<PayloadItem, TransportError>>,
    in_flight: bool,
    eof: bool,
}

impl InboundBody {
    fn new(
        signal_sender: mpsc::Sender<BodyRequestSignal>,
        data_receiver: mpsc::Receiver<Result<PayloadItem, TransportError>>,
    ) -> Self {
        Self { signal_sender, data_receiver, in_flight: false, eof: false }
    }

    /// A body that ends immediately.
    pub fn empty() -> Self {
        let (signal_sender, _) = mpsc::channel(0);
        let (_, data_receiver) = mpsc::channel(0);
        Self { signal_sender, data_receiver, in_flight: false, eof: true }
    }

    /// Stops the transport from reading further items.
    pub fn cancel(&mut self) {
        if self.eof {
            return;
        }

        self.eof = true;
        // a full channel is fine: dropping the sender closes it as well
        let _ = self.signal_sender.try_send(BodyRequestSignal::Enough);
        self.signal_sender.close_channel();
    }
}

impl Drop for InboundBody {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl Body for InboundBody {
    type Data = Bytes;
    type Error = TransportError;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        if this.eof {
            return Poll::Ready(None);
        }

        if !this.in_flight {
            match Pin::new(&mut this.signal_sender).poll_ready(cx) {
                Poll::Ready(Ok(())) => {
                    if let Err(e) = Pin::new(&mut this.signal_sender).start_send(BodyRequestSignal::RequestData) {
                        error!("failed to send request data signal through channel, {}", e);
                        return Poll::Ready(Some(Err(TransportError::Closed)));
                    }
                    this.in_flight = true;
                }
                Poll::Ready(Err(e)) => {
                    error!("failed to prepare request data signal through channel, {}", e);
                    return Poll::Ready(Some(Err(TransportError::Closed)));
                }
                Poll::Pending => return Poll::Pending,
            }
        }

        match this.data_receiver.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(PayloadItem::Chunk(bytes)))) => {
                this.in_flight = false;
                Poll::Ready(Some(Ok(Frame::data(bytes))))
            }
            Poll::Ready(Some(Ok(PayloadItem::Eof))) => {
                this.in_flight = false;
                this.eof = true;
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(e))) => {
                this.in_flight = false;
                this.eof = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.in_flight = false;
                this.eof = true;
                Poll::Ready(Some(Err(TransportError::Closed)))
            }
            Poll::Pending => Poll::Pending,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.eof
    }

    fn size_hint(&self) -> SizeHint {
        if self.eof { SizeHint::with_exact(0) } else { SizeHint::new() }
    }
}
