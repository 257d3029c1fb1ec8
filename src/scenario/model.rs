//! Scenario file definitions.
//!
//! A scenario is a YAML document describing an engine's starting state, the
//! outcomes its transport will report, and a list of steps to replay.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SyncError;
use crate::network::NetworkUpdate;
use crate::sync::Mutation;

/// A replayable scenario.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Human-readable name
    pub name: Option<String>,
    /// Start with the network offline
    pub start_offline: bool,
    /// Attempt cap override
    pub max_attempts: Option<u32>,
    /// Default cache TTL override in milliseconds
    pub default_ttl_ms: Option<u64>,
    /// Transport outcomes consumed in order; `ok` once exhausted
    pub outcomes: Vec<Outcome>,
    /// Steps to replay
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Parse a scenario from YAML.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Parse`] if the document is malformed.
    pub fn from_yaml(yaml: &str) -> Result<Self, SyncError> {
        serde_yaml::from_str(yaml).map_err(|e| SyncError::Parse(format!("Invalid scenario: {e}")))
    }

    /// Read and parse a scenario file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: &std::path::Path) -> Result<Self, SyncError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SyncError::Parse(format!("Failed to read scenario {}: {e}", path.display()))
        })?;
        Self::from_yaml(&contents)
    }
}

/// Result the scripted transport reports for one apply call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Accept the mutation
    Ok,
    /// Fail with a transport error
    Fail,
    /// Fail with a timeout
    Timeout,
}

/// One scenario step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Queue a mutation (drains if online)
    Enqueue(Mutation),
    /// Drain explicitly
    Process,
    /// Discard the queue
    ClearQueue,
    /// Merge a connectivity update
    Network(NetworkUpdate),
    /// Write a cache entry
    Cache(CacheWrite),
    /// Read a cache entry by key
    Read(String),
    /// Invalidate cache entries
    Invalidate(Invalidation),
    /// Remove expired cache entries
    Sweep,
    /// Move the clock forward
    AdvanceMs(u64),
    /// Reconcile two copies of a record
    Resolve(ResolveStep),
    /// Register a background sync
    Schedule(ScheduleStep),
}

/// Parameters of a cache write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheWrite {
    /// Entry key
    pub key: String,
    /// Payload
    pub data: Value,
    /// TTL in milliseconds; the default TTL when absent
    #[serde(default)]
    pub ttl_ms: Option<u64>,
    /// Tags for tag invalidation
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Scope of a cache invalidation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Invalidation {
    /// Every entry
    All,
    /// Keys matching a regex
    Pattern(String),
    /// Keys written with a tag
    Tag(String),
}

/// Parameters of a conflict resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveStep {
    /// Client copy
    pub client: Value,
    /// Server copy
    pub server: Value,
    /// Strategy name; the configured default when absent
    #[serde(default)]
    pub strategy: Option<String>,
}

/// Parameters of a background sync registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleStep {
    /// Task kind
    pub kind: String,
    /// Period in milliseconds
    pub interval_ms: u64,
}
