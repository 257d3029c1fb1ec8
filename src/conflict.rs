//! Client/server conflict reconciliation.
//!
//! Records are JSON objects. `merge` starts from the server copy and takes a
//! differing client field only when the client record's `updatedAt` is
//! strictly newer. One record-level timestamp gates every field; there is no
//! per-field provenance.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::core::Clock;
use crate::error::SyncError;

/// Field holding a record's last-modified marker.
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// How to pick between divergent copies of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// Keep the client copy
    ClientWins,
    /// Keep the server copy
    #[default]
    ServerWins,
    /// Field-level merge gated on `updatedAt`
    Merge,
}

impl ConflictStrategy {
    /// Stable snake_case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ClientWins => "client_wins",
            Self::ServerWins => "server_wins",
            Self::Merge => "merge",
        }
    }
}

impl FromStr for ConflictStrategy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client_wins" => Ok(Self::ClientWins),
            "server_wins" => Ok(Self::ServerWins),
            "merge" => Ok(Self::Merge),
            other => Err(SyncError::InvalidStrategy(other.to_string())),
        }
    }
}

impl std::fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictResolution {
    /// Strategy applied
    pub strategy: ConflictStrategy,
    /// Client copy as given
    pub client_data: Value,
    /// Server copy as given
    pub server_data: Value,
    /// Value to keep
    pub resolved_data: Value,
    /// When the resolution was computed
    pub timestamp: DateTime<Utc>,
}

/// Stateless reconciler; holds only the clock used to stamp results.
pub struct ConflictResolver {
    clock: Arc<dyn Clock>,
}

impl ConflictResolver {
    /// Create a resolver.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Reconcile `client` and `server` copies of the same record.
    #[must_use]
    pub fn resolve_conflict(
        &self,
        client: Value,
        server: Value,
        strategy: ConflictStrategy,
    ) -> ConflictResolution {
        let resolved_data = match strategy {
            ConflictStrategy::ClientWins => client.clone(),
            ConflictStrategy::ServerWins => server.clone(),
            ConflictStrategy::Merge => merge(&client, &server),
        };
        debug!(%strategy, "conflict resolved");

        ConflictResolution {
            strategy,
            client_data: client,
            server_data: server,
            resolved_data,
            timestamp: self.clock.now(),
        }
    }

    /// Like [`resolve_conflict`](Self::resolve_conflict) with the strategy given by name.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidStrategy`] for unknown names.
    pub fn resolve_named(
        &self,
        client: Value,
        server: Value,
        strategy: &str,
    ) -> Result<ConflictResolution, SyncError> {
        let strategy = strategy.parse()?;
        Ok(self.resolve_conflict(client, server, strategy))
    }
}

/// Field-level merge of two records.
///
/// Non-object inputs have no fields to merge and resolve to the server copy.
#[must_use]
pub fn merge(client: &Value, server: &Value) -> Value {
    let (Value::Object(client_fields), Value::Object(server_fields)) = (client, server) else {
        return server.clone();
    };

    let client_newer = is_newer(
        client_fields.get(UPDATED_AT_FIELD),
        server_fields.get(UPDATED_AT_FIELD),
    );
    if !client_newer {
        return server.clone();
    }

    let mut merged = server_fields.clone();
    for (key, value) in client_fields {
        if server_fields.get(key) != Some(value) {
            merged.insert(key.clone(), value.clone());
        }
    }
    Value::Object(merged)
}

/// Whether the client marker is strictly newer than the server marker.
///
/// Numbers compare numerically; strings compare as RFC 3339 instants when both
/// parse, otherwise lexically. Anything else, including a missing marker, is
/// not newer.
fn is_newer(client: Option<&Value>, server: Option<&Value>) -> bool {
    match (client, server) {
        (Some(Value::Number(c)), Some(Value::Number(s))) => match (c.as_f64(), s.as_f64()) {
            (Some(c), Some(s)) => c > s,
            _ => false,
        },
        (Some(Value::String(c)), Some(Value::String(s))) => {
            match (DateTime::parse_from_rfc3339(c), DateTime::parse_from_rfc3339(s)) {
                (Ok(c), Ok(s)) => c > s,
                _ => c > s,
            }
        },
        _ => false,
    }
}
