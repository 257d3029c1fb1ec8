//! The offline engine.
//!
//! [`OfflineEngine`] owns one instance of every component and wires them
//! together: the queue and the network monitor share connectivity state, and
//! all components read time from the same clock. Build it with
//! [`EngineBuilder`].

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::cache::{Cache, CacheSize};
use crate::config::Config;
use crate::conflict::{ConflictResolution, ConflictResolver, ConflictStrategy};
use crate::core::{Clock, SystemClock};
use crate::error::SyncError;
use crate::network::{NetworkMonitor, NetworkStatus, NetworkUpdate};
use crate::scheduler::{BackgroundScheduler, BackgroundSyncTask};
use crate::sync::{
    DeadLetterSink, DrainReport, Mutation, QueueStats, RemoteApplier, SyncQueue, SyncQueueItem,
    DEFAULT_MAX_ATTEMPTS,
};

/// Builder for [`OfflineEngine`].
pub struct EngineBuilder {
    applier: Arc<dyn RemoteApplier>,
    clock: Arc<dyn Clock>,
    network: NetworkStatus,
    max_attempts: u32,
    default_ttl: Duration,
    default_strategy: ConflictStrategy,
    dead_letters: Option<Arc<dyn DeadLetterSink>>,
}

impl EngineBuilder {
    /// Start a builder around the transport used to apply mutations.
    #[must_use]
    pub fn new(applier: Arc<dyn RemoteApplier>) -> Self {
        Self {
            applier,
            clock: Arc::new(SystemClock),
            network: NetworkStatus::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            default_ttl: crate::cache::DEFAULT_TTL,
            default_strategy: ConflictStrategy::default(),
            dead_letters: None,
        }
    }

    /// Take queue, cache and conflict defaults from `config`.
    #[must_use]
    pub fn config(mut self, config: &Config) -> Self {
        self.max_attempts = config.queue.max_attempts;
        self.default_ttl = config.cache.default_ttl();
        self.default_strategy = config.conflict.default_strategy;
        self
    }

    /// Use `clock` instead of the system clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Connectivity the engine starts with.
    #[must_use]
    pub fn network(mut self, status: NetworkStatus) -> Self {
        self.network = status;
        self
    }

    /// Override the attempt cap.
    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Override the cache's default TTL.
    #[must_use]
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Override the strategy used when none is given.
    #[must_use]
    pub fn default_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.default_strategy = strategy;
        self
    }

    /// Hand dropped mutations to `sink`.
    #[must_use]
    pub fn dead_letters(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letters = Some(sink);
        self
    }

    /// Assemble the engine.
    #[must_use]
    pub fn build(self) -> OfflineEngine {
        let network = Arc::new(NetworkMonitor::new(self.network));

        let mut queue = SyncQueue::new(self.applier, Arc::clone(&network), Arc::clone(&self.clock))
            .with_max_attempts(self.max_attempts);
        if let Some(sink) = self.dead_letters {
            queue = queue.with_dead_letters(sink);
        }

        OfflineEngine {
            cache: Cache::new(Arc::clone(&self.clock)).with_default_ttl(self.default_ttl),
            resolver: ConflictResolver::new(Arc::clone(&self.clock)),
            scheduler: BackgroundScheduler::new(Arc::clone(&self.clock)),
            default_strategy: self.default_strategy,
            clock: self.clock,
            network,
            queue,
        }
    }
}

/// Queue, cache, resolver, network monitor and scheduler behind one handle.
pub struct OfflineEngine {
    clock: Arc<dyn Clock>,
    network: Arc<NetworkMonitor>,
    queue: SyncQueue,
    cache: Cache<Value>,
    resolver: ConflictResolver,
    scheduler: BackgroundScheduler,
    default_strategy: ConflictStrategy,
}

impl OfflineEngine {
    /// Shorthand for `EngineBuilder::new(applier)`.
    #[must_use]
    pub fn builder(applier: Arc<dyn RemoteApplier>) -> EngineBuilder {
        EngineBuilder::new(applier)
    }

    // Queue

    /// Queue a mutation and drain if online. Returns the new item's ID.
    pub async fn enqueue(&self, mutation: Mutation) -> (String, DrainReport) {
        self.queue.enqueue(mutation).await
    }

    /// Drain the queue now.
    pub async fn process_queue(&self) -> DrainReport {
        self.queue.process_queue().await
    }

    /// Snapshot of the pending mutations in drain order.
    #[must_use]
    pub fn get_queue(&self) -> Vec<SyncQueueItem> {
        self.queue.get_queue()
    }

    /// Discard every pending mutation.
    pub fn clear_queue(&self) {
        self.queue.clear();
    }

    /// Queue counters.
    #[must_use]
    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    // Cache

    /// Store `data` under `key`, using the default TTL when `ttl` is `None`.
    pub fn cache_data(&self, key: &str, data: Value, ttl: Option<Duration>) {
        match ttl {
            Some(ttl) => self.cache.cache_data_with_ttl(key, data, ttl),
            None => self.cache.cache_data(key, data),
        }
    }

    /// Read a live entry.
    #[must_use]
    pub fn get_cached_data(&self, key: &str) -> Option<Value> {
        self.cache.get_cached_data(key)
    }

    /// Remove everything (`None`) or keys matching a regex.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidPattern`] if the pattern does not compile.
    pub fn invalidate_cache(&self, pattern: Option<&str>) -> Result<usize, SyncError> {
        self.cache.invalidate_cache(pattern)
    }

    /// Remove expired entries.
    pub fn optimize_cache(&self) -> usize {
        self.cache.optimize_cache()
    }

    /// Entry count and estimated payload size.
    #[must_use]
    pub fn get_cache_size(&self) -> CacheSize {
        self.cache.get_cache_size()
    }

    /// The cache itself, for tagged writes and predicate invalidation.
    #[must_use]
    pub const fn cache(&self) -> &Cache<Value> {
        &self.cache
    }

    // Conflicts

    /// Reconcile two copies of a record, using the configured default
    /// strategy when `strategy` is `None`.
    #[must_use]
    pub fn resolve_conflict(
        &self,
        client: Value,
        server: Value,
        strategy: Option<ConflictStrategy>,
    ) -> ConflictResolution {
        self.resolver
            .resolve_conflict(client, server, strategy.unwrap_or(self.default_strategy))
    }

    // Network

    /// Current connectivity.
    #[must_use]
    pub fn get_network_status(&self) -> NetworkStatus {
        self.network.status()
    }

    /// Merge a connectivity update.
    ///
    /// An update that reports `online = true` while mutations are pending
    /// drains the queue before returning; the report is returned in that
    /// case. Updates that leave `online` unset never drain.
    pub async fn update_network_status(&self, update: NetworkUpdate) -> Option<DrainReport> {
        self.network.update(&update);

        if update.online == Some(true) && !self.queue.is_empty() {
            debug!(pending = self.queue.len(), "online update, draining");
            Some(self.queue.process_queue().await)
        } else {
            None
        }
    }

    // Background sync

    /// Register a periodic sync descriptor.
    pub fn schedule_background_sync(&self, kind: &str, interval: Duration) -> BackgroundSyncTask {
        self.scheduler.schedule_background_sync(kind, interval)
    }

    /// The scheduler, for polling due tasks and recording runs.
    #[must_use]
    pub const fn scheduler(&self) -> &BackgroundScheduler {
        &self.scheduler
    }

    /// Clock shared by every component.
    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }
}
