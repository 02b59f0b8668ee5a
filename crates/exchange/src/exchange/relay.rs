use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures::Stream;
use pin_project_lite::pin_project;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::{debug, error, warn};

use crate::exchange::commit::{CommitGuard, FollowerTicket};
use crate::protocol::{BoxError, Message, PayloadItem, ResponseHead, TransportError};
use crate::transport::OutboundItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    /// won the commit: emits the head first and the eof last
    Leading,
    /// lost the commit: forwards body items only
    Following,
}

pin_project! {
    /// Adapts a byte producer into the item stream a transport pulls from.
    ///
    /// The relay never buffers: one poll from the transport is at most one
    /// poll of the producer. It watches the connection's cancellation token
    /// on every poll, so a closed transport stops the producer at the next
    /// pull even if the producer itself would never wake again.
    ///
    /// A transport pulls the next item only after it took the previous one,
    /// so the head counts as sent on the poll after it was handed out, and
    /// a following relay's items are all taken once it ends.
    pub(crate) struct OutboundRelay<S> {
        #[pin]
        producer: S,
        #[pin]
        cancelled: WaitForCancellationFutureOwned,
        head: Option<ResponseHead>,
        head_unacked: bool,
        guard: Arc<CommitGuard>,
        ticket: Option<FollowerTicket>,
        role: Role,
        draining: bool,
        done: bool,
        chunks: usize,
    }
}

impl<S> OutboundRelay<S> {
    /// A relay for the writer that committed `head`.
    pub(crate) fn leading(head: ResponseHead, producer: S, guard: Arc<CommitGuard>, token: CancellationToken) -> Self {
        Self::new(Some(head), producer, guard, token, Role::Leading)
    }

    /// A relay for a writer admitted behind an already sent head.
    pub(crate) fn following(producer: S, guard: Arc<CommitGuard>, ticket: FollowerTicket, token: CancellationToken) -> Self {
        let mut relay = Self::new(None, producer, guard, token, Role::Following);
        relay.ticket = Some(ticket);
        relay
    }

    fn new(head: Option<ResponseHead>, producer: S, guard: Arc<CommitGuard>, token: CancellationToken, role: Role) -> Self {
        Self {
            producer,
            cancelled: token.cancelled_owned(),
            head,
            head_unacked: false,
            guard,
            ticket: None,
            role,
            draining: false,
            done: false,
            chunks: 0,
        }
    }

    pub(crate) fn is_leading(&self) -> bool {
        self.role == Role::Leading
    }
}

impl<S, E> Stream for OutboundRelay<S>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    type Item = Result<OutboundItem, TransportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if *this.done {
            return Poll::Ready(None);
        }

        if this.cancelled.as_mut().poll(cx).is_ready() {
            *this.done = true;
            this.ticket.take();
            this.guard.close();
            warn!(chunks = *this.chunks, "transport closed while the response was streaming");
            return Poll::Ready(Some(Err(TransportError::Closed)));
        }

        if let Some(head) = this.head.take() {
            *this.head_unacked = true;
            return Poll::Ready(Some(Ok(Message::Header(head))));
        }
        if std::mem::take(this.head_unacked) {
            this.guard.mark_head_sent();
        }

        if this.guard.is_closed() {
            *this.done = true;
            this.ticket.take();
            warn!(chunks = *this.chunks, "exchange closed before the producer finished");
            return Poll::Ready(Some(Err(TransportError::Closed)));
        }

        if !*this.draining {
            match ready!(this.producer.as_mut().poll_next(cx)) {
                Some(Ok(bytes)) => {
                    *this.chunks += 1;
                    return Poll::Ready(Some(Ok(Message::from(bytes))));
                }
                Some(Err(e)) => {
                    *this.done = true;
                    this.ticket.take();
                    this.guard.close();
                    let e = TransportError::producer(e);
                    error!(cause = %e, "outbound producer failed, exchange closed");
                    return Poll::Ready(Some(Err(e)));
                }
                None if *this.role == Role::Following => {
                    *this.done = true;
                    this.ticket.take();
                    return Poll::Ready(None);
                }
                None => *this.draining = true,
            }
        }

        // the eof goes out only after every follower's items were taken
        ready!(this.guard.poll_followers_drained(cx));
        *this.done = true;
        if !this.guard.close() {
            warn!(chunks = *this.chunks, "exchange closed while followers were finishing");
            return Poll::Ready(Some(Err(TransportError::Closed)));
        }
        debug!(chunks = *this.chunks, "response completed, exchange closed");
        Poll::Ready(Some(Ok(Message::Payload(PayloadItem::Eof))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::ExchangeState;
    use crate::protocol::{Protocol, ResponseContext};
    use futures::{StreamExt, stream};
    use std::io;

    fn committed_guard() -> Arc<CommitGuard> {
        let guard = Arc::new(CommitGuard::new());
        assert!(guard.try_commit());
        guard
    }

    fn head() -> ResponseHead {
        ResponseContext::new(Protocol::Http11).to_head().unwrap()
    }

    fn ok(chunk: &'static [u8]) -> Result<Bytes, io::Error> {
        Ok(Bytes::from_static(chunk))
    }

    #[tokio::test]
    async fn leading_relay_frames_the_body() {
        let guard = committed_guard();
        let producer = stream::iter(vec![ok(b"a"), ok(b"b")]);
        let relay = OutboundRelay::leading(head(), producer, Arc::clone(&guard), CancellationToken::new());
        assert!(relay.is_leading());

        let items = relay.collect::<Vec<_>>().await;

        assert_eq!(items.len(), 4);
        assert!(matches!(&items[0], Ok(Message::Header(_))));
        assert!(matches!(&items[1], Ok(Message::Payload(PayloadItem::Chunk(b))) if &b[..] == b"a"));
        assert!(matches!(&items[2], Ok(Message::Payload(PayloadItem::Chunk(b))) if &b[..] == b"b"));
        assert!(matches!(&items[3], Ok(Message::Payload(PayloadItem::Eof))));
        assert!(guard.is_head_sent());
        assert_eq!(guard.state(), ExchangeState::Closed);
    }

    #[tokio::test]
    async fn following_relay_forwards_body_only() {
        let guard = committed_guard();
        guard.mark_head_sent();
        let ticket = guard.enter_follower().unwrap();
        let producer = stream::iter(vec![ok(b"tail")]);
        let relay = OutboundRelay::following(producer, Arc::clone(&guard), ticket, CancellationToken::new());

        let items = relay.collect::<Vec<_>>().await;

        assert_eq!(items.len(), 1);
        assert!(matches!(&items[0], Ok(Message::Payload(PayloadItem::Chunk(_)))));
        assert_eq!(guard.state(), ExchangeState::HeadersCommitted);
        assert_eq!(guard.followers(), 0);
    }

    #[tokio::test]
    async fn head_counts_as_sent_once_taken() {
        let guard = committed_guard();
        let producer = stream::iter(vec![ok(b"a")]);
        let mut relay = Box::pin(OutboundRelay::leading(head(), producer, Arc::clone(&guard), CancellationToken::new()));

        assert!(matches!(relay.next().await, Some(Ok(Message::Header(_)))));
        assert!(!guard.is_head_sent());

        assert!(matches!(relay.next().await, Some(Ok(Message::Payload(PayloadItem::Chunk(_))))));
        assert!(guard.is_head_sent());
    }

    #[tokio::test]
    async fn eof_waits_for_followers() {
        let guard = committed_guard();
        let mut leader = Box::pin(OutboundRelay::leading(
            head(),
            stream::iter(vec![ok(b"a")]),
            Arc::clone(&guard),
            CancellationToken::new(),
        ));
        assert!(matches!(leader.next().await, Some(Ok(Message::Header(_)))));
        assert!(matches!(leader.next().await, Some(Ok(Message::Payload(PayloadItem::Chunk(_))))));

        let ticket = guard.enter_follower().unwrap();
        let mut follower = Box::pin(OutboundRelay::following(
            stream::iter(vec![ok(b"b")]),
            Arc::clone(&guard),
            ticket,
            CancellationToken::new(),
        ));

        // the leader ran out of body but a follower is still in flight
        assert!(futures::poll!(leader.next()).is_pending());
        assert_eq!(guard.state(), ExchangeState::HeadersCommitted);

        assert!(matches!(follower.next().await, Some(Ok(Message::Payload(PayloadItem::Chunk(_))))));
        assert!(follower.next().await.is_none());

        assert!(matches!(leader.next().await, Some(Ok(Message::Payload(PayloadItem::Eof)))));
        assert_eq!(guard.state(), ExchangeState::Closed);
    }

    #[tokio::test]
    async fn producer_error_stops_the_relay() {
        let guard = committed_guard();
        let producer = stream::iter(vec![ok(b"a"), Err(io::Error::other("boom")), ok(b"never")]);
        let relay = OutboundRelay::leading(head(), producer, Arc::clone(&guard), CancellationToken::new());

        let items = relay.collect::<Vec<_>>().await;

        assert_eq!(items.len(), 3);
        assert!(matches!(&items[2], Err(TransportError::Producer { .. })));
        assert_eq!(guard.state(), ExchangeState::Closed);
    }

    #[tokio::test]
    async fn cancellation_stops_a_pending_producer() {
        let guard = committed_guard();
        let token = CancellationToken::new();
        let producer = stream::iter(vec![ok(b"a")]).chain(stream::pending());
        let mut relay = Box::pin(OutboundRelay::leading(head(), producer, Arc::clone(&guard), token.clone()));

        assert!(matches!(relay.next().await, Some(Ok(Message::Header(_)))));
        assert!(matches!(relay.next().await, Some(Ok(Message::Payload(PayloadItem::Chunk(_))))));

        token.cancel();
        assert!(matches!(relay.next().await, Some(Err(TransportError::Closed))));
        assert!(relay.next().await.is_none());
        assert_eq!(guard.state(), ExchangeState::Closed);
    }
}
