//! JSON output formatting for listsync.

use serde::Serialize;
use serde_json::json;

use crate::error::SyncError;
use crate::scenario::Transcript;
use crate::storage::DeadLetter;

/// Format a scenario transcript as JSON
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn format_transcript_json(transcript: &Transcript) -> Result<String, SyncError> {
    to_json(transcript)
}

/// Format dead letters as JSON
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn format_dead_letters_json(letters: &[DeadLetter]) -> Result<String, SyncError> {
    let output = json!({
        "count": letters.len(),
        "items": letters
    });
    to_json(&output)
}

/// Generic JSON formatter for any serializable type
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, SyncError> {
    Ok(serde_json::to_string_pretty(value)?)
}
