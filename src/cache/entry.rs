//! Cache entry and size types.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::is_expired;

/// Default time-to-live: one hour.
pub const DEFAULT_TTL: Duration = Duration::from_millis(3_600_000);

/// A cached value with its freshness metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheEntry<T> {
    /// Stored value
    pub data: T,
    /// When the value was written
    pub timestamp: DateTime<Utc>,
    /// How long the value stays valid
    #[serde(with = "ttl_millis")]
    pub ttl: Duration,
    /// Entry version; every write starts at 1
    pub version: u32,
    /// Invalidation tags attached at write time
    pub tags: BTreeSet<String>,
}

impl<T> CacheEntry<T> {
    /// Create a fresh entry.
    #[must_use]
    pub const fn new(data: T, timestamp: DateTime<Utc>, ttl: Duration, tags: BTreeSet<String>) -> Self {
        Self {
            data,
            timestamp,
            ttl,
            version: 1,
            tags,
        }
    }

    /// Whether the entry's age exceeds its TTL at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        is_expired(self.timestamp, self.ttl, now)
    }

    /// Whether the entry carries `tag`.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

/// Approximate cache footprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheSize {
    /// Number of stored entries, expired or not
    pub entries: usize,
    /// Sum of the JSON-serialized payload lengths
    pub estimated_bytes: usize,
}

mod ttl_millis {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(ttl: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX))
    }
}
