//! Per-call cancellation and deadline handling.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use super::error::AcquisitionError;

/// Cloneable cancellation handle; every clone observes the same signal.
#[derive(Debug, Clone)]
pub struct Cancellation {
    sender: Arc<watch::Sender<bool>>,
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancellation {
    /// Creates a handle in the "not cancelled" state.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Marks the handle cancelled. Returns `true` if this call flipped it.
    pub fn cancel(&self) -> bool {
        !self.sender.send_replace(true)
    }

    /// Whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once cancellation is requested.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            // The sender lives as long as `self`, so this never resolves.
            std::future::pending::<()>().await;
        }
    }
}

/// Cancellation signal and optional deadline threaded through one call.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    cancellation: Cancellation,
    deadline: Option<Instant>,
}

impl CallContext {
    /// Context that is never cancelled and has no deadline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Context bound to an existing cancellation handle.
    #[must_use]
    pub fn with_cancellation(cancellation: Cancellation) -> Self {
        Self {
            cancellation,
            deadline: None,
        }
    }

    /// Sets a deadline `timeout` from now.
    #[must_use]
    pub fn timeout(self, timeout: Duration) -> Self {
        self.deadline(Instant::now() + timeout)
    }

    /// Sets an absolute deadline.
    #[must_use]
    pub const fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// The cancellation handle for this call.
    #[must_use]
    pub const fn cancellation(&self) -> &Cancellation {
        &self.cancellation
    }

    /// Fails fast if the call was cancelled or its deadline passed.
    pub fn check(&self) -> Result<(), AcquisitionError> {
        if self.cancellation.is_cancelled() {
            return Err(AcquisitionError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(AcquisitionError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Sleeps for `delay` unless cancellation or the deadline interrupts first.
    pub async fn sleep(&self, delay: Duration) -> Result<(), AcquisitionError> {
        self.run(tokio::time::sleep(delay)).await
    }

    /// Drives `future` to completion unless cancellation or the deadline interrupts first.
    pub async fn run<F: Future>(&self, future: F) -> Result<F::Output, AcquisitionError> {
        self.check()?;
        tokio::select! {
            biased;
            () = self.cancellation.cancelled() => Err(AcquisitionError::Cancelled),
            () = wait_until(self.deadline) => Err(AcquisitionError::DeadlineExceeded),
            output = future => Ok(output),
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
