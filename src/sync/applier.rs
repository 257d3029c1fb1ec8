//! Contracts the queue relies on but does not implement.

use async_trait::async_trait;

use super::item::SyncQueueItem;
use crate::error::ApplyError;

/// Transport that applies one queued mutation to the remote system.
///
/// The same item may be applied more than once if an earlier success was
/// lost, so implementations must tolerate re-application. Timeouts are the
/// implementation's business; the queue waits for as long as `apply` does.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteApplier: Send + Sync {
    /// Attempt the mutation once.
    async fn apply(&self, item: &SyncQueueItem) -> Result<(), ApplyError>;
}

/// Receiver for items the queue gave up on.
pub trait DeadLetterSink: Send + Sync {
    /// Called once per item when it is dropped after its final failed attempt.
    fn record(&self, item: &SyncQueueItem, error: &ApplyError);
}
