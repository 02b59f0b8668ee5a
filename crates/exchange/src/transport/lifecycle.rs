use std::fmt::{Debug, Formatter};
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

type CloseCallback = Box<dyn FnOnce() + Send>;

/// Connection lifecycle events of a transport.
///
/// Closing is terminal: it cancels the token every exchange on the
/// connection watches and runs the registered callbacks once.
#[derive(Default)]
pub struct Lifecycle {
    closed: CancellationToken,
    callbacks: Mutex<Vec<CloseCallback>>,
}

impl Debug for Lifecycle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle").field("closed", &self.is_closed()).finish_non_exhaustive()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` to run when the connection closes.
    ///
    /// Runs immediately if the connection is already closed.
    pub fn on_close<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut callbacks = match self.callbacks.lock() {
                Ok(callbacks) => callbacks,
                Err(e) => {
                    error!("lifecycle callbacks poisoned, {}", e);
                    return;
                }
            };

            if !self.closed.is_cancelled() {
                callbacks.push(Box::new(callback));
                return;
            }
        }

        callback();
    }

    /// Marks the connection closed. Only the first call has an effect.
    pub fn close(&self) {
        let callbacks = match self.callbacks.lock() {
            Ok(mut callbacks) => {
                if self.closed.is_cancelled() {
                    return;
                }
                self.closed.cancel();
                std::mem::take(&mut *callbacks)
            }
            Err(e) => {
                error!("lifecycle callbacks poisoned, {}", e);
                self.closed.cancel();
                return;
            }
        };

        debug!(callbacks = callbacks.len(), "transport closed");
        for callback in callbacks {
            callback();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// A token cancelled when the connection closes.
    pub fn cancellation(&self) -> CancellationToken {
        self.closed.child_token()
    }

    /// Resolves once the connection is closed.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn callbacks_run_once() {
        let lifecycle = Lifecycle::new();
        let count = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&count);
        lifecycle.on_close(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let token = lifecycle.cancellation();
        assert!(!token.is_cancelled());

        lifecycle.close();
        lifecycle.close();

        assert!(lifecycle.is_closed());
        assert!(token.is_cancelled());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn late_registration_runs_immediately() {
        let lifecycle = Lifecycle::new();
        lifecycle.close();

        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        lifecycle.on_close(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn closed_resolves() {
        let lifecycle = Arc::new(Lifecycle::new());
        let waiter = {
            let lifecycle = Arc::clone(&lifecycle);
            tokio::spawn(async move { lifecycle.closed().await })
        };

        lifecycle.close();
        waiter.await.unwrap();
    }
}
