//! Offline mutation queue.
//!
//! Local changes are queued as [`SyncQueueItem`]s and applied to the remote
//! side through an injected [`RemoteApplier`] whenever the device is online.
//!
//! Features:
//! - Priority ordering with oldest-first tie breaking
//! - Single-flight sequential draining
//! - Bounded retries with tail requeue
//! - Optional dead-letter hand-off for dropped items

pub mod applier;
pub mod item;
pub mod queue;
pub mod report;

pub use applier::{DeadLetterSink, RemoteApplier};
pub use item::{Mutation, MutationType, Resource, SyncQueueItem};
pub use queue::{QueueStats, SyncQueue, DEFAULT_MAX_ATTEMPTS};
pub use report::{AttemptOutcome, AttemptRecord, DrainReport};
