//! Per-call deadline and cancellation.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

use crate::errors::{Result, VaultSyncError};

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Carried into every transport call.
#[derive(Debug, Clone)]
pub struct CallContext {
    timeout: Duration,
    cancel: watch::Receiver<bool>,
}

/// Fires the cancellation signal for every context derived from it.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl CallContext {
    /// A context with `timeout` and a handle that cancels it.
    pub fn new(timeout: Duration) -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                timeout,
                cancel: rx,
            },
            CancelHandle { tx },
        )
    }

    /// A context that can only time out.
    pub fn with_timeout(timeout: Duration) -> Self {
        // The sender is dropped; `cancelled()` then never resolves.
        Self::new(timeout).0
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Fail fast if cancellation has already been requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(VaultSyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    async fn cancelled(&self) {
        let mut rx = self.cancel.clone();
        let closed = rx.wait_for(|cancelled| *cancelled).await.is_err();
        if closed {
            std::future::pending::<()>().await;
        }
    }

    /// Drive `fut` to completion unless the deadline passes or the call is
    /// cancelled first.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(VaultSyncError::Cancelled),
            outcome = tokio::time::timeout(self.timeout, fut) => {
                outcome.map_err(|_| VaultSyncError::TimedOut(self.timeout))?
            }
        }
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }
}
