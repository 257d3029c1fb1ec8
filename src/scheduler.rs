//! Background sync task descriptors.
//!
//! The scheduler only records when a periodic sync should run next. Running
//! it is left to the platform's background task runner, which polls
//! [`BackgroundScheduler::due_tasks`] and reports back through
//! [`BackgroundScheduler::record_run`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::core::{saturating_add, Clock};
use crate::error::SyncError;

/// Lifecycle of a background sync task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for its next run
    Pending,
    /// Currently executing
    Running,
    /// Last run succeeded
    Completed,
    /// Last run failed
    Failed,
}

/// A registered periodic sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackgroundSyncTask {
    /// Unique ID (`bg-sync-<uuid>`)
    pub id: String,
    /// Caller-defined task kind
    #[serde(rename = "type")]
    pub kind: String,
    /// Current status
    pub status: TaskStatus,
    /// Period between runs
    #[serde(skip)]
    pub interval: Duration,
    /// When it last ran
    pub last_run: Option<DateTime<Utc>>,
    /// When it should run next
    pub next_run: DateTime<Utc>,
}

/// Registry of background sync descriptors.
pub struct BackgroundScheduler {
    tasks: Mutex<Vec<BackgroundSyncTask>>,
    clock: Arc<dyn Clock>,
}

impl BackgroundScheduler {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            clock,
        }
    }

    /// Register a periodic sync of `kind` every `interval`.
    pub fn schedule_background_sync(&self, kind: &str, interval: Duration) -> BackgroundSyncTask {
        let now = self.clock.now();
        let task = BackgroundSyncTask {
            id: format!("bg-sync-{}", uuid::Uuid::new_v4()),
            kind: kind.to_string(),
            status: TaskStatus::Pending,
            interval,
            last_run: None,
            next_run: saturating_add(now, interval),
        };
        debug!(id = %task.id, kind, next_run = %task.next_run, "background sync scheduled");
        self.lock().push(task.clone());
        task
    }

    /// Snapshot of every registered task.
    #[must_use]
    pub fn tasks(&self) -> Vec<BackgroundSyncTask> {
        self.lock().clone()
    }

    /// Tasks whose next run is at or before now, excluding running ones.
    #[must_use]
    pub fn due_tasks(&self) -> Vec<BackgroundSyncTask> {
        let now = self.clock.now();
        self.lock()
            .iter()
            .filter(|t| t.status != TaskStatus::Running && t.next_run <= now)
            .cloned()
            .collect()
    }

    /// Mark a task as running.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] for unknown IDs.
    pub fn start_run(&self, id: &str) -> Result<BackgroundSyncTask, SyncError> {
        self.with_task(id, |task, _| task.status = TaskStatus::Running)
    }

    /// Record the outcome of a run and schedule the next one.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] for unknown IDs.
    pub fn record_run(&self, id: &str, succeeded: bool) -> Result<BackgroundSyncTask, SyncError> {
        self.with_task(id, |task, now| {
            task.status = if succeeded {
                TaskStatus::Completed
            } else {
                TaskStatus::Failed
            };
            task.last_run = Some(now);
            task.next_run = saturating_add(now, task.interval);
        })
    }

    /// Remove a task.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] for unknown IDs.
    pub fn cancel(&self, id: &str) -> Result<BackgroundSyncTask, SyncError> {
        let mut tasks = self.lock();
        let pos = tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| SyncError::NotFound(format!("background task {id}")))?;
        Ok(tasks.remove(pos))
    }

    fn with_task<F>(&self, id: &str, update: F) -> Result<BackgroundSyncTask, SyncError>
    where
        F: FnOnce(&mut BackgroundSyncTask, DateTime<Utc>),
    {
        let now = self.clock.now();
        let mut tasks = self.lock();
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| SyncError::NotFound(format!("background task {id}")))?;
        update(task, now);
        Ok(task.clone())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<BackgroundSyncTask>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
