use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::task::{Context, Poll};

use futures::task::AtomicWaker;
use tokio::sync::Notify;

use crate::protocol::StateError;

const OPEN: u8 = 0;
const HEADERS_COMMITTED: u8 = 1;
const CLOSED: u8 = 2;

/// Lifecycle state of an exchange.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExchangeState {
    /// status and headers are mutable, nothing was flushed
    Open,
    /// status and headers are frozen, body streaming is permitted
    HeadersCommitted,
    /// the exchange is finished
    Closed,
}

/// The exactly-once gate between an open response and its committed head.
///
/// The state lives in a single atomic cell; every transition is a
/// compare-and-set or a swap, so no caller ever blocks on it. Callers that
/// lose the commit race and still have body items to forward wait on
/// [`CommitGuard::head_sent`], which parks the task, not the thread.
///
/// Writers that follow the head register through
/// [`CommitGuard::enter_follower`]. Once the committing writer runs out of
/// body it stops admitting followers and waits for the admitted ones to
/// finish, so the end of the body is always the last thing written.
#[derive(Debug)]
pub(crate) struct CommitGuard {
    state: AtomicU8,
    head_sent: AtomicBool,
    notify: Notify,
    followers: AtomicUsize,
    ending: AtomicBool,
    leader: AtomicWaker,
}

impl CommitGuard {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(OPEN),
            head_sent: AtomicBool::new(false),
            notify: Notify::new(),
            followers: AtomicUsize::new(0),
            ending: AtomicBool::new(false),
            leader: AtomicWaker::new(),
        }
    }

    pub(crate) fn state(&self) -> ExchangeState {
        match self.state.load(Ordering::Acquire) {
            OPEN => ExchangeState::Open,
            HEADERS_COMMITTED => ExchangeState::HeadersCommitted,
            _ => ExchangeState::Closed,
        }
    }

    /// OPEN → HEADERS_COMMITTED. Exactly one caller ever gets `true`.
    pub(crate) fn try_commit(&self) -> bool {
        self.state.compare_exchange(OPEN, HEADERS_COMMITTED, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    /// Moves to CLOSED from any state; returns `true` for the call that did it.
    pub(crate) fn close(&self) -> bool {
        let closed = self.state.swap(CLOSED, Ordering::AcqRel) != CLOSED;
        if closed {
            self.notify.notify_waiters();
        }
        closed
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.load(Ordering::Acquire) == CLOSED
    }

    /// Records that the committed head has been handed to the transport.
    pub(crate) fn mark_head_sent(&self) {
        self.head_sent.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub(crate) fn is_head_sent(&self) -> bool {
        self.head_sent.load(Ordering::Acquire)
    }

    /// Resolves once the head is with the transport, or fails if the
    /// exchange closed before that happened.
    pub(crate) async fn head_sent(&self) -> Result<(), StateError> {
        loop {
            // registered before the checks, so a notification in between is not lost
            let notified = self.notify.notified();

            if self.is_head_sent() {
                return Ok(());
            }
            if self.is_closed() {
                return Err(StateError::Closed);
            }

            notified.await;
        }
    }

    /// Admits a writer that forwards body items behind the committed head.
    ///
    /// Fails once the body is ending or the exchange is closed; the ticket
    /// must be held until the writer's last item is with the transport.
    pub(crate) fn enter_follower(self: &Arc<Self>) -> Result<FollowerTicket, StateError> {
        self.followers.fetch_add(1, Ordering::SeqCst);
        let ticket = FollowerTicket { guard: Arc::clone(self) };

        if self.ending.load(Ordering::SeqCst) || self.is_closed() {
            return Err(StateError::Closed);
        }
        Ok(ticket)
    }

    pub(crate) fn followers(&self) -> usize {
        self.followers.load(Ordering::SeqCst)
    }

    /// Stops admitting followers and resolves once every admitted one left.
    ///
    /// Only the committing writer polls this.
    pub(crate) fn poll_followers_drained(&self, cx: &mut Context<'_>) -> Poll<()> {
        self.ending.store(true, Ordering::SeqCst);
        if self.followers() == 0 {
            return Poll::Ready(());
        }

        self.leader.register(cx.waker());
        if self.followers() == 0 { Poll::Ready(()) } else { Poll::Pending }
    }
}

/// Proof of admission as a follower, released on drop.
#[derive(Debug)]
pub(crate) struct FollowerTicket {
    guard: Arc<CommitGuard>,
}

impl Drop for FollowerTicket {
    fn drop(&mut self) {
        if self.guard.followers.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.guard.leader.wake();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[test]
    fn commit_happens_once() {
        let guard = CommitGuard::new();
        assert_eq!(guard.state(), ExchangeState::Open);

        assert!(guard.try_commit());
        assert!(!guard.try_commit());
        assert_eq!(guard.state(), ExchangeState::HeadersCommitted);

        assert!(guard.close());
        assert!(!guard.close());
        assert!(!guard.try_commit());
        assert_eq!(guard.state(), ExchangeState::Closed);
    }

    #[test]
    fn concurrent_commit_has_one_winner() {
        let guard = Arc::new(CommitGuard::new());
        let winners = Arc::new(AtomicUsize::new(0));

        let handles = (0..32)
            .map(|_| {
                let guard = Arc::clone(&guard);
                let winners = Arc::clone(&winners);
                thread::spawn(move || {
                    if guard.try_commit() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert_eq!(guard.state(), ExchangeState::HeadersCommitted);
    }

    #[tokio::test]
    async fn waiters_see_the_head() {
        let guard = Arc::new(CommitGuard::new());
        assert!(guard.try_commit());

        let waiter = {
            let guard = Arc::clone(&guard);
            tokio::spawn(async move { guard.head_sent().await })
        };

        tokio::task::yield_now().await;
        guard.mark_head_sent();

        assert_eq!(waiter.await.unwrap(), Ok(()));
    }

    #[tokio::test]
    async fn waiters_fail_on_close() {
        let guard = Arc::new(CommitGuard::new());
        assert!(guard.try_commit());

        let waiter = {
            let guard = Arc::clone(&guard);
            tokio::spawn(async move { guard.head_sent().await })
        };

        tokio::task::yield_now().await;
        guard.close();

        assert_eq!(waiter.await.unwrap(), Err(StateError::Closed));
    }

    #[tokio::test]
    async fn ending_waits_for_admitted_followers() {
        let guard = Arc::new(CommitGuard::new());
        assert!(guard.try_commit());

        let first = guard.enter_follower().unwrap();
        let second = guard.enter_follower().unwrap();
        assert_eq!(guard.followers(), 2);

        let drained = {
            let guard = Arc::clone(&guard);
            tokio::spawn(async move { std::future::poll_fn(|cx| guard.poll_followers_drained(cx)).await })
        };
        tokio::task::yield_now().await;

        // no new follower gets in once the body is ending
        assert_eq!(guard.enter_follower().unwrap_err(), StateError::Closed);
        assert_eq!(guard.followers(), 2);

        drop(first);
        tokio::task::yield_now().await;
        assert!(!drained.is_finished());

        drop(second);
        drained.await.unwrap();
        assert_eq!(guard.followers(), 0);
    }

    #[test]
    fn closed_guard_admits_no_follower() {
        let guard = Arc::new(CommitGuard::new());
        assert!(guard.try_commit());
        guard.close();

        assert_eq!(guard.enter_follower().unwrap_err(), StateError::Closed);
        assert_eq!(guard.followers(), 0);
    }
}
