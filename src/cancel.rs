//! Cancellation token.
//!
//! A clonable token carried into every blob copy and used as the server's
//! shutdown signal. All clones observe the same state; `cancel()` is sticky.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Clonable cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Create a token in the not-cancelled state.
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Fire the token. All clones observe the cancellation.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    /// Non-blocking check.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once the token fires. Pending forever if it never does.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Every live token holds a sender, so this is unreachable
                // while the caller exists; park rather than spin.
                std::future::pending::<()>().await;
            }
        }
    }

    /// Fire the token after `delay`. Requires a running tokio runtime.
    pub fn cancel_after(&self, delay: Duration) {
        let token = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            token.cancel();
        });
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_token_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_cancel_is_observed_by_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_cancel() {
        let token = CancelToken::new();
        let waiter = token.clone();

        let wait = tokio::spawn(async move { waiter.cancelled().await });
        token.cancel();
        tokio::time::timeout(Duration::from_secs(1), wait)
            .await
            .expect("cancelled() should resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancel_after_fires() {
        let token = CancelToken::new();
        token.cancel_after(Duration::from_millis(10));
        tokio::time::timeout(Duration::from_secs(1), token.cancelled())
            .await
            .expect("token should fire");
        assert!(token.is_cancelled());
    }
}
