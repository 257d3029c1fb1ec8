//! Dead-letter log.
//!
//! Mutations dropped by the sync queue after their final attempt are written
//! here so the application can show "N changes failed to sync" or offer a
//! manual retry. The queue itself stays in memory; this is an audit trail.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::{debug, warn};

use super::migrations;
use crate::config::Paths;
use crate::core::Clock;
use crate::error::{ApplyError, SyncError};
use crate::sync::{DeadLetterSink, Mutation, MutationType, Resource, SyncQueueItem};

/// A mutation the queue gave up on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeadLetter {
    /// Row ID
    pub id: i64,
    /// Original queue item ID
    pub item_id: String,
    /// Change kind
    pub mutation_type: MutationType,
    /// Target record kind
    pub resource: Resource,
    /// Original payload
    pub payload: serde_json::Value,
    /// Original priority
    pub priority: i32,
    /// Attempts made before dropping
    pub attempts: u32,
    /// When the item was queued
    pub enqueued_at: DateTime<Utc>,
    /// When the item was dropped
    pub failed_at: DateTime<Utc>,
    /// Error from the final attempt
    pub last_error: String,
}

impl DeadLetter {
    /// Rebuild the mutation so it can be queued again.
    #[must_use]
    pub fn to_mutation(&self) -> Mutation {
        Mutation::new(self.mutation_type, self.resource, self.payload.clone())
            .with_priority(self.priority)
    }
}

/// `SQLite`-backed dead-letter log.
pub struct DeadLetterStore {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl DeadLetterStore {
    /// Open the log at `~/.listsync/listsync.db`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory is unknown, the file cannot be
    /// opened, or the schema cannot be brought up to date.
    pub fn open_default(clock: Arc<dyn Clock>) -> Result<Self, SyncError> {
        let paths = Paths::new()?;
        paths.ensure_dirs()?;
        Self::open_at(&paths.database, clock)
    }

    /// Open (or create) the log at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or migrated.
    pub fn open_at(path: &Path, clock: Arc<dyn Clock>) -> Result<Self, SyncError> {
        let conn = Connection::open(path).map_err(|e| {
            SyncError::Database(format!("Failed to open dead-letter log {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "dead-letter log opened");
        Self::from_connection(conn, clock)
    }

    /// A throwaway log that lives only as long as the store.
    ///
    /// # Errors
    ///
    /// Returns an error if `SQLite` cannot create the database.
    pub fn open_in_memory(clock: Arc<dyn Clock>) -> Result<Self, SyncError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SyncError::Database(format!("Failed to open in-memory log: {e}")))?;
        Self::from_connection(conn, clock)
    }

    fn from_connection(conn: Connection, clock: Arc<dyn Clock>) -> Result<Self, SyncError> {
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock,
        })
    }

    /// Schema version of the underlying file.
    ///
    /// # Errors
    ///
    /// Returns an error if the version cannot be read.
    pub fn schema_version(&self) -> Result<i32, SyncError> {
        migrations::get_version(&self.lock())
    }

    /// Append a dropped item.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be written.
    pub fn insert(&self, item: &SyncQueueItem, error: &ApplyError) -> Result<i64, SyncError> {
        let conn = self.lock();
        let payload = serde_json::to_string(&item.data)?;

        conn.execute(
            r"INSERT INTO dead_letters
              (item_id, mutation_type, resource, payload, priority, attempts, enqueued_at, failed_at, last_error)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                item.id,
                item.mutation_type.as_str(),
                item.resource.as_str(),
                payload,
                item.priority,
                item.retry_count,
                format_time(item.timestamp),
                format_time(self.clock.now()),
                error.to_string(),
            ],
        )
        .map_err(|e| SyncError::Database(format!("Failed to record dead letter: {e}")))?;

        Ok(conn.last_insert_rowid())
    }

    /// Most recent dead letters first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list(&self, limit: usize) -> Result<Vec<DeadLetter>, SyncError> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                r"SELECT id, item_id, mutation_type, resource, payload, priority, attempts,
                         enqueued_at, failed_at, last_error
                  FROM dead_letters
                  ORDER BY failed_at DESC, id DESC
                  LIMIT ?1",
            )
            .map_err(|e| SyncError::Database(format!("Failed to prepare query: {e}")))?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map([limit], row_to_dead_letter)
            .map_err(|e| SyncError::Database(format!("Failed to query dead letters: {e}")))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| SyncError::Database(e.to_string()))
    }

    /// Look up one dead letter.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get(&self, id: i64) -> Result<Option<DeadLetter>, SyncError> {
        self.lock()
            .query_row(
                r"SELECT id, item_id, mutation_type, resource, payload, priority, attempts,
                         enqueued_at, failed_at, last_error
                  FROM dead_letters WHERE id = ?1",
                [id],
                row_to_dead_letter,
            )
            .optional()
            .map_err(|e| SyncError::Database(format!("Failed to query dead letter: {e}")))
    }

    /// Number of stored dead letters.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count(&self) -> Result<usize, SyncError> {
        let count: i64 = self
            .lock()
            .query_row("SELECT COUNT(*) FROM dead_letters", [], |row| row.get(0))
            .map_err(|e| SyncError::Database(format!("Failed to count dead letters: {e}")))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Delete one dead letter, e.g. after it has been requeued.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete(&self, id: i64) -> Result<bool, SyncError> {
        let rows = self
            .lock()
            .execute("DELETE FROM dead_letters WHERE id = ?1", [id])
            .map_err(|e| SyncError::Database(format!("Failed to delete dead letter: {e}")))?;
        Ok(rows > 0)
    }

    /// Delete dead letters that failed more than `max_age_hours` ago.
    ///
    /// An age reaching past the representable range removes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn purge_older_than(&self, max_age_hours: i64) -> Result<usize, SyncError> {
        let Some(cutoff) = TimeDelta::try_hours(max_age_hours)
            .and_then(|age| self.clock.now().checked_sub_signed(age))
        else {
            debug!(max_age_hours, "purge cutoff out of range, nothing to purge");
            return Ok(0);
        };
        self.lock()
            .execute(
                "DELETE FROM dead_letters WHERE failed_at < ?1",
                [format_time(cutoff)],
            )
            .map_err(|e| SyncError::Database(format!("Failed to purge dead letters: {e}")))
    }

    /// Delete every dead letter.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn clear(&self) -> Result<usize, SyncError> {
        self.lock()
            .execute("DELETE FROM dead_letters", [])
            .map_err(|e| SyncError::Database(format!("Failed to clear dead letters: {e}")))
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DeadLetterSink for DeadLetterStore {
    fn record(&self, item: &SyncQueueItem, error: &ApplyError) {
        if let Err(e) = self.insert(item, error) {
            warn!(id = %item.id, error = %e, "could not persist dead letter");
        }
    }
}

// Fixed-width so lexical order in SQL matches time order.
fn format_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or(DateTime::UNIX_EPOCH, |t| t.with_timezone(&Utc))
}

fn row_to_dead_letter(row: &Row<'_>) -> Result<DeadLetter, rusqlite::Error> {
    let mutation_type: String = row.get(2)?;
    let resource: String = row.get(3)?;
    let payload: String = row.get(4)?;
    let enqueued_at: String = row.get(7)?;
    let failed_at: String = row.get(8)?;

    Ok(DeadLetter {
        id: row.get(0)?,
        item_id: row.get(1)?,
        mutation_type: MutationType::from_name(&mutation_type),
        resource: Resource::from_name(&resource),
        payload: serde_json::from_str(&payload).unwrap_or(serde_json::Value::Null),
        priority: row.get(5)?,
        attempts: row.get(6)?,
        enqueued_at: parse_time(&enqueued_at),
        failed_at: parse_time(&failed_at),
        last_error: row.get(9)?,
    })
}
