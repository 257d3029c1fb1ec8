//! Queued mutation types.
//!
//! A [`SyncQueueItem`] is one local change waiting to be applied remotely.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of change a mutation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationType {
    /// Create a new record
    Create,
    /// Update an existing record
    Update,
    /// Delete a record
    Delete,
}

impl MutationType {
    /// Stable lowercase name, as stored in the dead-letter log.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Parse the stored name, falling back to `update`.
    #[must_use]
    pub fn from_name(s: &str) -> Self {
        match s {
            "create" => Self::Create,
            "delete" => Self::Delete,
            _ => Self::Update,
        }
    }
}

impl std::fmt::Display for MutationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of record a mutation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    /// A shopping/todo list
    List,
    /// An entry within a list
    Item,
    /// The user profile
    User,
    /// Client settings
    Settings,
}

impl Resource {
    /// Stable lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Item => "item",
            Self::User => "user",
            Self::Settings => "settings",
        }
    }

    /// Parse the stored name, falling back to `item`.
    #[must_use]
    pub fn from_name(s: &str) -> Self {
        match s {
            "list" => Self::List,
            "user" => Self::User,
            "settings" => Self::Settings,
            _ => Self::Item,
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A local change as submitted by application code, before the queue stamps it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    /// Change kind
    #[serde(rename = "type")]
    pub mutation_type: MutationType,
    /// Target record kind
    pub resource: Resource,
    /// Opaque payload handed to the applier
    #[serde(default)]
    pub data: serde_json::Value,
    /// Higher drains first
    #[serde(default)]
    pub priority: i32,
}

impl Mutation {
    /// Create a mutation with priority 0.
    #[must_use]
    pub const fn new(mutation_type: MutationType, resource: Resource, data: serde_json::Value) -> Self {
        Self {
            mutation_type,
            resource,
            data,
            priority: 0,
        }
    }

    /// Set the drain priority.
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Shorthand for a `create` mutation.
    #[must_use]
    pub const fn create(resource: Resource, data: serde_json::Value) -> Self {
        Self::new(MutationType::Create, resource, data)
    }

    /// Shorthand for an `update` mutation.
    #[must_use]
    pub const fn update(resource: Resource, data: serde_json::Value) -> Self {
        Self::new(MutationType::Update, resource, data)
    }

    /// Shorthand for a `delete` mutation.
    #[must_use]
    pub const fn delete(resource: Resource, data: serde_json::Value) -> Self {
        Self::new(MutationType::Delete, resource, data)
    }
}

/// A mutation owned by the sync queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncQueueItem {
    /// Unique ID (`sync-<uuid>`)
    pub id: String,
    /// Change kind
    #[serde(rename = "type")]
    pub mutation_type: MutationType,
    /// Target record kind
    pub resource: Resource,
    /// Opaque payload
    pub data: serde_json::Value,
    /// When the mutation was queued
    pub timestamp: DateTime<Utc>,
    /// Failed apply attempts so far
    pub retry_count: u32,
    /// Higher drains first
    pub priority: i32,
}

impl SyncQueueItem {
    /// Stamp a mutation for insertion into the queue.
    #[must_use]
    pub fn from_mutation(mutation: Mutation, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: format!("sync-{}", uuid::Uuid::new_v4()),
            mutation_type: mutation.mutation_type,
            resource: mutation.resource,
            data: mutation.data,
            timestamp,
            retry_count: 0,
            priority: mutation.priority,
        }
    }

    /// Queue order: priority descending, then oldest first.
    #[must_use]
    pub fn queue_order(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| self.timestamp.cmp(&other.timestamp))
    }

    /// Whether another failure would exhaust the item at `max_attempts`.
    #[must_use]
    pub const fn is_last_attempt(&self, max_attempts: u32) -> bool {
        self.retry_count + 1 >= max_attempts
    }

    /// Record ID taken from the payload's `id` field, if any.
    #[must_use]
    pub fn target_id(&self) -> Option<&str> {
        self.data.get("id").and_then(serde_json::Value::as_str)
    }
}
