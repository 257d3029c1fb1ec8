//! Dead-letter command implementation.
//!
//! Inspects and prunes the log of mutations the queue dropped.

use std::sync::Arc;

use colored::Colorize;

use crate::cli::args::{DeadLetterCommands, OutputFormat};
use crate::core::SystemClock;
use crate::error::SyncError;
use crate::output::{format_dead_letters, to_json};
use crate::storage::DeadLetterStore;

/// Execute dead-letter subcommands.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or queried.
pub fn dead_letters(cmd: DeadLetterCommands, format: OutputFormat) -> Result<String, SyncError> {
    let store = DeadLetterStore::open_default(Arc::new(SystemClock))?;
    run(&store, cmd, format)
}

fn run(
    store: &DeadLetterStore,
    cmd: DeadLetterCommands,
    format: OutputFormat,
) -> Result<String, SyncError> {
    match cmd {
        DeadLetterCommands::List { limit } => {
            let letters = store.list(limit)?;
            format_dead_letters(&letters, format)
        },
        DeadLetterCommands::Show { id } => {
            let letter = store
                .get(id)?
                .ok_or_else(|| SyncError::NotFound(format!("Dead letter with ID: {id}")))?;
            match format {
                OutputFormat::Json => to_json(&letter),
                OutputFormat::Pretty => {
                    let mut output = format!("Dead letter {}\n", letter.id);
                    output.push_str(&format!("  Item:      {}\n", letter.item_id));
                    output.push_str(&format!(
                        "  Mutation:  {} {}\n",
                        letter.mutation_type, letter.resource
                    ));
                    output.push_str(&format!("  Priority:  {}\n", letter.priority));
                    output.push_str(&format!("  Attempts:  {}\n", letter.attempts));
                    output.push_str(&format!("  Queued:    {}\n", letter.enqueued_at.to_rfc3339()));
                    output.push_str(&format!("  Dropped:   {}\n", letter.failed_at.to_rfc3339()));
                    output.push_str(&format!("  Error:     {}\n", letter.last_error.red()));
                    output.push_str(&format!("  Payload:   {}\n", letter.payload));
                    Ok(output)
                },
            }
        },
        DeadLetterCommands::Count => {
            let count = store.count()?;
            match format {
                OutputFormat::Json => to_json(&serde_json::json!({ "count": count })),
                OutputFormat::Pretty => Ok(count.to_string()),
            }
        },
        DeadLetterCommands::Purge { older_than } => {
            let purged = store.purge_older_than(older_than)?;
            match format {
                OutputFormat::Json => to_json(&serde_json::json!({ "purged": purged })),
                OutputFormat::Pretty => Ok(format!(
                    "Purged {purged} dead letters older than {older_than} hours"
                )),
            }
        },
        DeadLetterCommands::Clear { force } => {
            if !force {
                return Err(SyncError::Config(
                    "Use --force to clear all dead letters".to_string(),
                ));
            }
            let cleared = store.clear()?;
            match format {
                OutputFormat::Json => to_json(&serde_json::json!({ "cleared": cleared })),
                OutputFormat::Pretty => Ok(format!("Cleared {cleared} dead letters")),
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApplyError;
    use crate::sync::{DeadLetterSink, Mutation, Resource, SyncQueueItem};
    use chrono::Utc;
    use serde_json::json;

    fn store_with_one() -> DeadLetterStore {
        let store = DeadLetterStore::open_in_memory(Arc::new(SystemClock)).unwrap();
        let item = SyncQueueItem::from_mutation(
            Mutation::create(Resource::Item, json!({"name": "milk"})),
            Utc::now(),
        );
        store.record(&item, &ApplyError::Timeout);
        store
    }

    #[test]
    fn test_count_json() {
        let store = store_with_one();
        let output = run(&store, DeadLetterCommands::Count, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["count"], 1);
    }

    #[test]
    fn test_show_missing_is_not_found() {
        let store = store_with_one();
        let err = run(&store, DeadLetterCommands::Show { id: 99 }, OutputFormat::Pretty).unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[test]
    fn test_clear_requires_force() {
        let store = store_with_one();
        assert!(run(&store, DeadLetterCommands::Clear { force: false }, OutputFormat::Pretty).is_err());
        assert_eq!(store.count().unwrap(), 1);

        let output = run(&store, DeadLetterCommands::Clear { force: true }, OutputFormat::Pretty).unwrap();
        assert_eq!(output, "Cleared 1 dead letters");
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_purge_keeps_recent() {
        let store = store_with_one();
        let output = run(&store, DeadLetterCommands::Purge { older_than: 1 }, OutputFormat::Pretty).unwrap();
        assert!(output.starts_with("Purged 0"));
        assert_eq!(store.count().unwrap(), 1);
    }
}
