//! Pending-mutation queue.
//!
//! Items are kept sorted by priority (descending) and age (oldest first) on
//! insertion. A drain applies the head item, removes it on success, and on
//! failure either moves it to the tail or drops it once it reaches the
//! attempt cap. Only one drain runs at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::applier::{DeadLetterSink, RemoteApplier};
use super::item::{Mutation, SyncQueueItem};
use super::report::{AttemptOutcome, AttemptRecord, DrainReport};
use crate::core::Clock;
use crate::error::ApplyError;
use crate::network::NetworkMonitor;

/// Attempts an item gets before it is dropped.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Sync queue for pending mutations.
pub struct SyncQueue {
    items: Mutex<Vec<SyncQueueItem>>,
    draining: AtomicBool,
    applier: Arc<dyn RemoteApplier>,
    network: Arc<NetworkMonitor>,
    clock: Arc<dyn Clock>,
    dead_letters: Option<Arc<dyn DeadLetterSink>>,
    max_attempts: u32,
}

impl SyncQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new(
        applier: Arc<dyn RemoteApplier>,
        network: Arc<NetworkMonitor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            draining: AtomicBool::new(false),
            applier,
            network,
            clock,
            dead_letters: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Override the attempt cap (values below 1 are treated as 1).
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Hand dropped items to `sink`.
    #[must_use]
    pub fn with_dead_letters(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letters = Some(sink);
        self
    }

    /// Attempt cap in effect.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Add a mutation, then drain if online.
    ///
    /// Never fails. Returns the new item's ID together with whatever the
    /// triggered drain did.
    pub async fn enqueue(&self, mutation: Mutation) -> (String, DrainReport) {
        let item = SyncQueueItem::from_mutation(mutation, self.clock.now());
        let id = item.id.clone();
        debug!(
            id = %id,
            mutation = %item.mutation_type,
            resource = %item.resource,
            priority = item.priority,
            "enqueue"
        );
        self.insert_sorted(item);

        let report = if self.network.is_online() {
            self.process_queue().await
        } else {
            DrainReport::default()
        };
        (id, report)
    }

    /// Drain the queue until it is empty, the network drops, or another
    /// drain already owns it.
    pub async fn process_queue(&self) -> DrainReport {
        let mut report = DrainReport::default();

        while self.network.is_online() && !self.is_empty() {
            let Some(_guard) = DrainGuard::acquire(&self.draining) else {
                debug!("drain already in flight");
                break;
            };
            report.merge(self.drain_pass().await);
            // Items enqueued while the last apply was in flight saw the flag
            // set and returned; the loop condition picks them up.
        }

        if !report.is_empty() {
            info!(
                completed = report.completed,
                requeued = report.requeued,
                dropped = report.dropped,
                remaining = self.len(),
                "drain finished"
            );
        }
        report
    }

    async fn drain_pass(&self) -> DrainReport {
        let mut report = DrainReport::default();

        while self.network.is_online() {
            let Some(item) = self.head() else {
                break;
            };

            let result = self.applier.apply(&item).await;
            let outcome = match &result {
                Ok(()) => {
                    if self.remove(&item.id).is_some() {
                        debug!(id = %item.id, record = ?item.target_id(), "applied");
                        AttemptOutcome::Completed
                    } else {
                        debug!(id = %item.id, "applied after the queue was cleared");
                        AttemptOutcome::Discarded
                    }
                },
                Err(e) => self.record_failure(&item.id, e),
            };

            report.add(AttemptRecord {
                id: item.id,
                mutation_type: item.mutation_type,
                resource: item.resource,
                outcome,
                error: result.err().map(|e| e.to_string()),
            });
        }

        report
    }

    fn record_failure(&self, id: &str, error: &ApplyError) -> AttemptOutcome {
        let mut items = self.lock();
        let Some(pos) = items.iter().position(|i| i.id == id) else {
            return AttemptOutcome::Discarded;
        };

        let mut item = items.remove(pos);
        let exhausted = item.is_last_attempt(self.max_attempts);
        item.retry_count += 1;

        if exhausted {
            drop(items);
            warn!(
                id = %item.id,
                record = ?item.target_id(),
                attempts = item.retry_count,
                error = %error,
                "dropping mutation after final attempt"
            );
            if let Some(sink) = &self.dead_letters {
                sink.record(&item, error);
            }
            AttemptOutcome::Dropped
        } else {
            debug!(id = %item.id, attempts = item.retry_count, error = %error, "requeue at tail");
            items.push(item);
            AttemptOutcome::Requeued
        }
    }

    fn insert_sorted(&self, item: SyncQueueItem) {
        let mut items = self.lock();
        items.push(item);
        // Stable, so exact ties keep insertion order. Items requeued at the
        // tail by a drain are pulled back into order here.
        items.sort_by(SyncQueueItem::queue_order);
    }

    fn head(&self) -> Option<SyncQueueItem> {
        self.lock().first().cloned()
    }

    fn remove(&self, id: &str) -> Option<SyncQueueItem> {
        let mut items = self.lock();
        let pos = items.iter().position(|i| i.id == id)?;
        Some(items.remove(pos))
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SyncQueueItem>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of pending items in drain order.
    #[must_use]
    pub fn get_queue(&self) -> Vec<SyncQueueItem> {
        self.lock().clone()
    }

    /// Discard every pending item.
    pub fn clear(&self) {
        let discarded = {
            let mut items = self.lock();
            let n = items.len();
            items.clear();
            n
        };
        info!(discarded, "sync queue cleared");
    }

    /// Number of pending items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether a drain currently owns the queue.
    #[must_use]
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    /// Queue statistics.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let items = self.lock();
        QueueStats {
            pending: items.len(),
            retrying: items.iter().filter(|i| i.retry_count > 0).count(),
            oldest_pending: items.iter().map(|i| i.timestamp).min(),
            draining: self.is_draining(),
        }
    }
}

/// Queue statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Items waiting to be applied
    pub pending: usize,
    /// Pending items that have failed at least once
    pub retrying: usize,
    /// Oldest pending item timestamp
    pub oldest_pending: Option<DateTime<Utc>>,
    /// Whether a drain is in progress
    pub draining: bool,
}

/// Holds the single-flight flag for the lifetime of a drain pass, including
/// when the drain future is dropped mid-await.
struct DrainGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> DrainGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ManualClock;
    use crate::network::{NetworkStatus, NetworkUpdate};
    use crate::sync::applier::MockRemoteApplier;
    use crate::sync::item::Resource;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;

    fn offline() -> Arc<NetworkMonitor> {
        Arc::new(NetworkMonitor::new(NetworkStatus::offline()))
    }

    fn online() -> Arc<NetworkMonitor> {
        Arc::new(NetworkMonitor::default())
    }

    fn mutation(name: &str, priority: i32) -> Mutation {
        Mutation::update(Resource::Item, json!({ "name": name })).with_priority(priority)
    }

    fn names(queue: &SyncQueue) -> Vec<String> {
        queue
            .get_queue()
            .iter()
            .map(|i| i.data["name"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    /// Fails each named item a fixed number of times, then succeeds.
    /// Records the order of apply calls.
    #[derive(Default)]
    struct ScriptedApplier {
        failures: Mutex<HashMap<String, u32>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedApplier {
        fn failing(plan: &[(&str, u32)]) -> Self {
            Self {
                failures: Mutex::new(plan.iter().map(|(n, c)| ((*n).to_string(), *c)).collect()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteApplier for ScriptedApplier {
        async fn apply(&self, item: &SyncQueueItem) -> Result<(), ApplyError> {
            let name = item.data["name"].as_str().unwrap_or_default().to_string();
            self.calls.lock().unwrap().push(name.clone());
            let mut failures = self.failures.lock().unwrap();
            match failures.get_mut(&name) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    Err(ApplyError::Transport("unreachable".to_string()))
                },
                _ => Ok(()),
            }
        }
    }

    #[derive(Default)]
    struct CollectingSink {
        dropped: Mutex<Vec<(String, u32)>>,
    }

    impl DeadLetterSink for CollectingSink {
        fn record(&self, item: &SyncQueueItem, _error: &ApplyError) {
            self.dropped
                .lock()
                .unwrap()
                .push((item.id.clone(), item.retry_count));
        }
    }

    #[tokio::test]
    async fn test_enqueue_keeps_priority_order() {
        let clock = Arc::new(ManualClock::at_epoch());
        let queue = SyncQueue::new(Arc::new(ScriptedApplier::default()), offline(), clock.clone());

        queue.enqueue(mutation("A", 5)).await;
        clock.advance(Duration::from_millis(1));
        queue.enqueue(mutation("B", 1)).await;
        assert_eq!(names(&queue), vec!["A", "B"]);

        clock.advance(Duration::from_millis(1));
        queue.enqueue(mutation("C", 10)).await;
        assert_eq!(names(&queue), vec!["C", "A", "B"]);
    }

    #[tokio::test]
    async fn test_enqueue_orders_ties_by_age() {
        let clock = Arc::new(ManualClock::at_epoch());
        let queue = SyncQueue::new(Arc::new(ScriptedApplier::default()), offline(), clock.clone());

        for (i, name) in ["first", "second", "third"].iter().enumerate() {
            clock.advance(Duration::from_millis(10));
            queue.enqueue(mutation(name, 2)).await;
            if i == 1 {
                queue.enqueue(mutation("same-instant", 2)).await;
            }
        }
        queue.enqueue(mutation("urgent", 9)).await;

        assert_eq!(
            names(&queue),
            vec!["urgent", "first", "second", "same-instant", "third"]
        );
        let items = queue.get_queue();
        assert!(items
            .windows(2)
            .all(|w| w[0].queue_order(&w[1]) != std::cmp::Ordering::Greater));
    }

    #[tokio::test]
    async fn test_always_succeeding_applier_applies_once() {
        let mut applier = MockRemoteApplier::new();
        applier.expect_apply().times(1).returning(|_| Ok(()));

        let queue = SyncQueue::new(Arc::new(applier), online(), Arc::new(ManualClock::at_epoch()));
        let (_, report) = queue.enqueue(mutation("A", 0)).await;

        assert!(queue.is_empty());
        assert_eq!(report.completed, 1);
        assert_eq!(report.total(), 1);
    }

    #[tokio::test]
    async fn test_always_failing_applier_drops_after_three_attempts() {
        let mut applier = MockRemoteApplier::new();
        applier
            .expect_apply()
            .times(3)
            .returning(|_| Err(ApplyError::Timeout));

        let queue = SyncQueue::new(Arc::new(applier), online(), Arc::new(ManualClock::at_epoch()));
        let (id, report) = queue.enqueue(mutation("A", 0)).await;

        assert!(queue.is_empty());
        assert_eq!(report.requeued, 2);
        assert_eq!(report.dropped, 1);
        assert_eq!(report.dropped_ids().collect::<Vec<_>>(), vec![id.as_str()]);
    }

    #[tokio::test]
    async fn test_custom_attempt_cap() {
        let mut applier = MockRemoteApplier::new();
        applier
            .expect_apply()
            .times(5)
            .returning(|_| Err(ApplyError::Rejected("conflict".to_string())));

        let queue = SyncQueue::new(Arc::new(applier), online(), Arc::new(ManualClock::at_epoch()))
            .with_max_attempts(5);
        queue.enqueue(mutation("A", 0)).await;
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_offline_enqueue_does_not_apply() {
        let mut applier = MockRemoteApplier::new();
        applier.expect_apply().never();

        let queue = SyncQueue::new(Arc::new(applier), offline(), Arc::new(ManualClock::at_epoch()));
        let (_, report) = queue.enqueue(mutation("A", 0)).await;

        assert!(report.is_empty());
        assert_eq!(queue.len(), 1);
        assert!(queue.process_queue().await.is_empty());
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_item_moves_to_tail_without_resort() {
        let network = offline();
        let applier = Arc::new(ScriptedApplier::failing(&[("high", 1)]));
        let clock = Arc::new(ManualClock::at_epoch());
        let queue = SyncQueue::new(applier.clone(), network.clone(), clock.clone());

        queue.enqueue(mutation("high", 10)).await;
        clock.advance(Duration::from_millis(1));
        queue.enqueue(mutation("mid", 5)).await;
        clock.advance(Duration::from_millis(1));
        queue.enqueue(mutation("low", 1)).await;

        network.update(&NetworkUpdate::online(true));
        let report = queue.process_queue().await;

        assert_eq!(applier.calls(), vec!["high", "mid", "low", "high"]);
        assert_eq!(report.completed, 3);
        assert_eq!(report.requeued, 1);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_drain_stops_when_network_drops() {
        /// Fails every attempt and takes the network down with it.
        struct GoOffline(Arc<NetworkMonitor>);

        #[async_trait]
        impl RemoteApplier for GoOffline {
            async fn apply(&self, _item: &SyncQueueItem) -> Result<(), ApplyError> {
                self.0.update(&NetworkUpdate::online(false));
                Err(ApplyError::Transport("dropped".to_string()))
            }
        }

        let network = offline();
        let queue = SyncQueue::new(
            Arc::new(GoOffline(network.clone())),
            network.clone(),
            Arc::new(ManualClock::at_epoch()),
        );
        queue.enqueue(mutation("A", 0)).await;
        network.update(&NetworkUpdate::online(true));

        let report = queue.process_queue().await;

        assert_eq!(report.total(), 1);
        assert_eq!(queue.get_queue()[0].retry_count, 1);
        assert_eq!(queue.stats().retrying, 1);
        assert!(!network.is_online());
    }

    #[tokio::test]
    async fn test_enqueue_resorts_requeued_items() {
        /// Fails once and takes the network down, succeeds afterwards.
        struct FailOnceThenOffline {
            network: Arc<NetworkMonitor>,
            failed: AtomicBool,
        }

        #[async_trait]
        impl RemoteApplier for FailOnceThenOffline {
            async fn apply(&self, _item: &SyncQueueItem) -> Result<(), ApplyError> {
                if self.failed.swap(true, Ordering::SeqCst) {
                    return Ok(());
                }
                self.network.update(&NetworkUpdate::online(false));
                Err(ApplyError::Timeout)
            }
        }

        let network = offline();
        let clock = Arc::new(ManualClock::at_epoch());
        let applier = Arc::new(FailOnceThenOffline {
            network: network.clone(),
            failed: AtomicBool::new(false),
        });
        let queue = SyncQueue::new(applier, network.clone(), clock.clone());

        queue.enqueue(mutation("high", 10)).await;
        clock.advance(Duration::from_millis(1));
        queue.enqueue(mutation("low", 1)).await;

        network.update(&NetworkUpdate::online(true));
        queue.process_queue().await;
        assert_eq!(names(&queue), vec!["low", "high"]);

        clock.advance(Duration::from_millis(1));
        queue.enqueue(mutation("new", 5)).await;
        assert_eq!(names(&queue), vec!["high", "new", "low"]);
    }

    #[tokio::test]
    async fn test_dead_letter_sink_receives_dropped_items() {
        let sink = Arc::new(CollectingSink::default());
        let applier = Arc::new(ScriptedApplier::failing(&[("doomed", 10)]));
        let queue = SyncQueue::new(applier, online(), Arc::new(ManualClock::at_epoch()))
            .with_dead_letters(sink.clone());

        let (id, _) = queue.enqueue(mutation("doomed", 0)).await;
        queue.enqueue(mutation("fine", 0)).await;

        let dropped = sink.dropped.lock().unwrap().clone();
        assert_eq!(dropped, vec![(id, 3)]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_clear_discards_everything() {
        let queue = SyncQueue::new(
            Arc::new(ScriptedApplier::default()),
            offline(),
            Arc::new(ManualClock::at_epoch()),
        );
        queue.enqueue(mutation("A", 0)).await;
        queue.enqueue(mutation("B", 0)).await;

        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.stats().pending, 0);
    }

    /// Clears the queue mid-apply, then reports a fixed result.
    struct ClearDuringApply {
        queue: Mutex<Option<Arc<SyncQueue>>>,
        succeed: bool,
    }

    #[async_trait]
    impl RemoteApplier for ClearDuringApply {
        async fn apply(&self, _item: &SyncQueueItem) -> Result<(), ApplyError> {
            if let Some(queue) = self.queue.lock().unwrap().clone() {
                queue.clear();
            }
            if self.succeed {
                Ok(())
            } else {
                Err(ApplyError::Timeout)
            }
        }
    }

    #[tokio::test]
    async fn test_clear_during_apply_reports_discarded() {
        for succeed in [true, false] {
            let applier = Arc::new(ClearDuringApply {
                queue: Mutex::new(None),
                succeed,
            });
            let network = offline();
            let queue = Arc::new(SyncQueue::new(
                applier.clone(),
                network.clone(),
                Arc::new(ManualClock::at_epoch()),
            ));
            *applier.queue.lock().unwrap() = Some(queue.clone());

            queue.enqueue(mutation("A", 0)).await;
            network.update(&NetworkUpdate::online(true));
            let report = queue.process_queue().await;

            assert_eq!(report.completed, 0, "succeed = {succeed}");
            assert_eq!(report.requeued, 0, "succeed = {succeed}");
            assert_eq!(report.total(), 1, "succeed = {succeed}");
            assert_eq!(
                report.attempts[0].outcome,
                AttemptOutcome::Discarded,
                "succeed = {succeed}"
            );
            assert!(queue.is_empty());
        }
    }

    #[tokio::test]
    async fn test_get_queue_is_a_snapshot() {
        let queue = SyncQueue::new(
            Arc::new(ScriptedApplier::default()),
            offline(),
            Arc::new(ManualClock::at_epoch()),
        );
        queue.enqueue(mutation("A", 0)).await;

        let mut snapshot = queue.get_queue();
        snapshot.clear();
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_stats() {
        let clock = Arc::new(ManualClock::at_epoch());
        let queue = SyncQueue::new(Arc::new(ScriptedApplier::default()), offline(), clock.clone());
        clock.advance(Duration::from_secs(5));
        queue.enqueue(mutation("A", 0)).await;
        clock.advance(Duration::from_secs(5));
        queue.enqueue(mutation("B", 9)).await;

        let stats = queue.stats();
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.retrying, 0);
        assert_eq!(stats.oldest_pending.map(|t| t.timestamp()), Some(5));
        assert!(!stats.draining);
    }

    /// Applier that enqueues more work into the queue it is draining.
    struct Reentrant {
        queue: Mutex<Option<Arc<SyncQueue>>>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RemoteApplier for Reentrant {
        async fn apply(&self, item: &SyncQueueItem) -> Result<(), ApplyError> {
            let name = item.data["name"].as_str().unwrap_or_default().to_string();
            self.calls.lock().unwrap().push(name.clone());
            let queue = self.queue.lock().unwrap().clone();
            if let Some(queue) = queue {
                if name == "first" {
                    assert!(queue.is_draining());
                    let (_, nested) = queue.enqueue(mutation("late", 100)).await;
                    // Joined the running drain instead of starting another.
                    assert!(nested.is_empty());
                }
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_enqueue_during_drain_is_single_flight() {
        let applier = Arc::new(Reentrant {
            queue: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        });
        let network = offline();
        let queue = Arc::new(SyncQueue::new(
            applier.clone(),
            network.clone(),
            Arc::new(ManualClock::at_epoch()),
        ));
        *applier.queue.lock().unwrap() = Some(queue.clone());

        queue.enqueue(mutation("first", 5)).await;
        queue.enqueue(mutation("second", 1)).await;
        network.update(&NetworkUpdate::online(true));

        let report = queue.process_queue().await;
        assert_eq!(
            applier.calls.lock().unwrap().clone(),
            vec!["first", "late", "second"]
        );
        assert_eq!(report.completed, 3);
        assert!(queue.is_empty());
        assert!(!queue.is_draining());
    }

    #[test]
    fn test_drain_guard_is_exclusive() {
        let flag = AtomicBool::new(false);
        let guard = DrainGuard::acquire(&flag);
        assert!(guard.is_some());
        assert!(DrainGuard::acquire(&flag).is_none());
        drop(guard);
        assert!(DrainGuard::acquire(&flag).is_some());
    }
}
