//! # Workers
//!
//! A worker is a spawned task paired with the token that stops it. Workers only
//! stop cooperatively: every loop checks its token and races it against each sleep.

use std::future::Future;
use std::time::Duration;

use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

/// A running task and its cancellation signal
#[derive(Debug)]
pub struct WorkerEntry {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl WorkerEntry {
    /// Spawn `make(token)` on the runtime with a fresh token
    pub fn spawn<F, Fut>(make: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(make(cancel.clone()));
        Self { cancel, task }
    }

    /// Raise the cancellation signal without waiting
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel and wait until the task has completed
    pub async fn stop(self) -> Result<(), JoinError> {
        self.cancel.cancel();
        self.task.await
    }
}

/// Sleep for `duration` unless cancelled first.
///
/// Returns `true` when the token was cancelled.
pub async fn pause(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}
