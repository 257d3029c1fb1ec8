//! Output formatting for listsync.
//!
//! This module provides formatters for displaying engine state in various formats.

mod json;
mod pretty;

use crate::cli::args::OutputFormat;
use crate::error::SyncError;
use crate::scenario::Transcript;
use crate::storage::DeadLetter;

pub use json::*;
pub use pretty::*;

/// Format a scenario transcript based on output format
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn format_transcript(transcript: &Transcript, format: OutputFormat) -> Result<String, SyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_transcript_pretty(transcript)),
        OutputFormat::Json => format_transcript_json(transcript),
    }
}

/// Format dead letters based on output format
///
/// # Errors
///
/// Returns `SyncError::Parse` if JSON serialization fails.
pub fn format_dead_letters(letters: &[DeadLetter], format: OutputFormat) -> Result<String, SyncError> {
    match format {
        OutputFormat::Pretty => Ok(format_dead_letters_pretty(letters)),
        OutputFormat::Json => format_dead_letters_json(letters),
    }
}
