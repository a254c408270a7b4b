//! Run-wide cancellation signal (SIGINT, fatal error, operator abort).
//!
//! A single [`Cancellation`] is threaded through the whole Run. Anything
//! waiting on the Governor or the Process Runner selects against
//! [`Cancellation::cancelled`] so a stopping Run releases every pending
//! acquirer promptly rather than waiting for its turn.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Clone)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolves once [`Cancellation::cancel`] has been called. Resolves
    /// immediately if it already has been, so a late caller never misses
    /// the signal.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        let notified = self.notify.notified();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancelled_resolves_after_cancel() {
        let cancellation = Cancellation::new();
        let waiter = cancellation.clone();
        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancellation.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("cancellation should be observed promptly")
            .unwrap();
    }

    #[tokio::test]
    async fn cancelled_resolves_immediately_if_already_cancelled() {
        let cancellation = Cancellation::new();
        cancellation.cancel();
        tokio::time::timeout(Duration::from_millis(50), cancellation.cancelled())
            .await
            .unwrap();
    }
}
