//! Error types for listsync.

use thiserror::Error;

/// Errors surfaced by the sync engine and its supporting layers.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Unknown conflict resolution strategy name.
    #[error("Invalid conflict strategy: {0}")]
    InvalidStrategy(String),

    /// Cache invalidation pattern that does not compile.
    #[error("Invalid cache pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Requested record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Dead-letter database failure.
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration could not be read, parsed or written.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed input (scenario files, payloads).
    #[error("Parse error: {0}")]
    Parse(String),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Failure reported by a [`RemoteApplier`](crate::sync::RemoteApplier).
///
/// Every variant is treated as transient by the queue: the item is retried
/// until it reaches the attempt cap.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApplyError {
    /// The transport could not reach the remote side.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The remote side refused the mutation.
    #[error("rejected by remote: {0}")]
    Rejected(String),

    /// The applier gave up waiting for an acknowledgement.
    #[error("timed out")]
    Timeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_pattern_from_regex() {
        let err = regex::Regex::new("(").unwrap_err();
        let err = SyncError::from(err);
        assert!(err.to_string().starts_with("Invalid cache pattern"));
    }

    #[test]
    fn test_apply_error_display() {
        assert_eq!(
            ApplyError::Transport("offline".to_string()).to_string(),
            "transport failure: offline"
        );
        assert_eq!(ApplyError::Timeout.to_string(), "timed out");
    }
}
