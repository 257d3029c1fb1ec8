//! Outcome of a drain pass.

use serde::Serialize;

use super::item::{MutationType, Resource};

/// What happened to one item during a drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Applied and removed
    Completed,
    /// Failed and moved to the tail
    Requeued,
    /// Failed for the last time and removed
    Dropped,
    /// Removed by `clear` while the attempt was in flight
    Discarded,
}

/// One apply attempt observed by a drain.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    /// Item ID
    pub id: String,
    /// Change kind
    pub mutation_type: MutationType,
    /// Target record kind
    pub resource: Resource,
    /// Result of the attempt
    pub outcome: AttemptOutcome,
    /// Failure message, if the attempt failed
    pub error: Option<String>,
}

/// Result of a drain pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DrainReport {
    /// Items applied successfully
    pub completed: usize,
    /// Failures that were requeued
    pub requeued: usize,
    /// Items dropped at the attempt cap
    pub dropped: usize,
    /// Every attempt, in order
    pub attempts: Vec<AttemptRecord>,
}

impl DrainReport {
    /// Record an attempt.
    pub fn add(&mut self, record: AttemptRecord) {
        match record.outcome {
            AttemptOutcome::Completed => self.completed += 1,
            AttemptOutcome::Requeued => self.requeued += 1,
            AttemptOutcome::Dropped => self.dropped += 1,
            AttemptOutcome::Discarded => {},
        }
        self.attempts.push(record);
    }

    /// Fold a later pass into this one.
    pub fn merge(&mut self, other: Self) {
        for record in other.attempts {
            self.add(record);
        }
    }

    /// Total apply calls made.
    #[must_use]
    pub fn total(&self) -> usize {
        self.attempts.len()
    }

    /// Whether nothing was attempted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// IDs of items dropped at the cap.
    pub fn dropped_ids(&self) -> impl Iterator<Item = &str> {
        self.attempts
            .iter()
            .filter(|a| a.outcome == AttemptOutcome::Dropped)
            .map(|a| a.id.as_str())
    }
}
