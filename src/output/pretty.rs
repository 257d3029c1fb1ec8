use colored::Colorize;

use crate::scenario::{StepResult, Transcript};
use crate::storage::DeadLetter;
use crate::sync::{AttemptOutcome, DrainReport, SyncQueueItem};

/// Format the outcome of a drain
pub fn format_drain_report_pretty(report: &DrainReport) -> String {
    let mut lines = Vec::new();

    lines.push(format!("Drain: {} attempts", report.total()));

    if report.completed > 0 {
        lines.push(format!(
            "  {} {}",
            "✓".green(),
            format!("{} applied", report.completed).green()
        ));
    }

    if report.requeued > 0 {
        lines.push(format!(
            "  {} {}",
            "↻".yellow(),
            format!("{} requeued", report.requeued).yellow()
        ));
    }

    if report.dropped > 0 {
        lines.push(format!(
            "  {} {}",
            "✗".red(),
            format!("{} dropped", report.dropped).red()
        ));
    }

    // Show first few errors
    let errors: Vec<_> = report
        .attempts
        .iter()
        .filter(|a| a.outcome == AttemptOutcome::Dropped)
        .take(3)
        .collect();

    for err in errors {
        lines.push(format!(
            "    - {} {} {}: {}",
            err.mutation_type,
            err.resource,
            err.id.dimmed(),
            err.error.as_deref().unwrap_or("Unknown error")
        ));
    }

    lines.join("\n")
}

/// Format pending queue items
pub fn format_queue_pretty(items: &[SyncQueueItem], title: &str) -> String {
    if items.is_empty() {
        return format!("{title} (0 items)\n  Queue is empty");
    }

    let mut output = format!("{} ({} items)\n", title, items.len());
    output.push_str(&"─".repeat(60));
    output.push('\n');

    for item in items {
        let mut line = format!(
            "{:>4}  {} {}  {}",
            item.priority,
            item.mutation_type.to_string().bold(),
            item.resource,
            item.id.dimmed()
        );
        if item.retry_count > 0 {
            line.push_str(&format!("  {}", format!("retries: {}", item.retry_count).yellow()));
        }
        output.push_str(&line);
        output.push('\n');
    }

    output
}

fn format_step_pretty(step: &StepResult) -> String {
    let icon = if step.success { "✓".green() } else { "✗".red() };
    let mut line = format!(
        "{:>3}. {} {:<12} {}",
        step.index,
        icon,
        step.action.bold(),
        step.summary
    );

    if let Some(drain) = &step.drain {
        for drain_line in format_drain_report_pretty(drain).lines() {
            line.push('\n');
            line.push_str("       ");
            line.push_str(drain_line);
        }
    }

    line
}

/// Format a scenario transcript
pub fn format_transcript_pretty(transcript: &Transcript) -> String {
    let mut lines = Vec::new();

    let title = transcript.name.as_deref().unwrap_or("Scenario");
    lines.push(format!("{} ({} steps)", title.bold(), transcript.steps.len()));
    lines.push("─".repeat(60));

    for step in &transcript.steps {
        lines.push(format_step_pretty(step));
    }

    lines.push(String::new());
    let network = if transcript.network.online {
        "online".green()
    } else {
        "offline".red()
    };
    lines.push(format!("  Network:      {network}"));
    lines.push(format!("  Apply calls:  {}", transcript.apply_calls));
    lines.push(format!(
        "  Cache:        {} entries, ~{} bytes",
        transcript.cache.entries, transcript.cache.estimated_bytes
    ));
    if !transcript.tasks.is_empty() {
        lines.push(format!("  Tasks:        {}", transcript.tasks.len()));
    }

    let failures = transcript.failures();
    if failures > 0 {
        lines.push(format!("  {}", format!("{failures} steps failed").red()));
    }

    lines.push(String::new());
    lines.push(format_queue_pretty(&transcript.pending, "Pending"));

    lines.join("\n")
}

/// Format dead letters as a pretty table
pub fn format_dead_letters_pretty(letters: &[DeadLetter]) -> String {
    if letters.is_empty() {
        return "Dead letters (0 items)\n  No dropped mutations".to_string();
    }

    let mut output = format!("Dead letters ({} items)\n", letters.len());
    output.push_str(&"─".repeat(60));
    output.push('\n');

    for letter in letters {
        output.push_str(&format!(
            "{:>4}  {} {}  {}  {}\n",
            letter.id,
            letter.mutation_type.to_string().bold(),
            letter.resource,
            letter.failed_at.format("%Y-%m-%d %H:%M").to_string().yellow(),
            letter.item_id.dimmed()
        ));
        output.push_str(&format!(
            "      {} after {} attempts\n",
            letter.last_error.red(),
            letter.attempts
        ));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{AttemptRecord, Mutation, MutationType, Resource};
    use chrono::DateTime;
    use serde_json::json;

    fn record(outcome: AttemptOutcome, error: Option<&str>) -> AttemptRecord {
        AttemptRecord {
            id: "sync-1".to_string(),
            mutation_type: MutationType::Update,
            resource: Resource::Item,
            outcome,
            error: error.map(ToString::to_string),
        }
    }

    fn make_dead_letter() -> DeadLetter {
        DeadLetter {
            id: 1,
            item_id: "sync-abc".to_string(),
            mutation_type: MutationType::Delete,
            resource: Resource::List,
            payload: json!({"id": "l1"}),
            priority: 0,
            attempts: 3,
            enqueued_at: DateTime::UNIX_EPOCH,
            failed_at: DateTime::UNIX_EPOCH,
            last_error: "timed out".to_string(),
        }
    }

    #[test]
    fn test_format_drain_report_counts() {
        let mut report = DrainReport::default();
        report.add(record(AttemptOutcome::Completed, None));
        report.add(record(AttemptOutcome::Requeued, Some("boom")));
        report.add(record(AttemptOutcome::Dropped, Some("timed out")));

        let output = format_drain_report_pretty(&report);
        assert!(output.contains("3 attempts"));
        assert!(output.contains("1 applied"));
        assert!(output.contains("1 requeued"));
        assert!(output.contains("1 dropped"));
        assert!(output.contains("timed out"));
        assert!(!output.contains("boom"));
    }

    #[test]
    fn test_format_queue_pretty_empty() {
        let output = format_queue_pretty(&[], "Pending");
        assert!(output.contains("Pending (0 items)"));
        assert!(output.contains("Queue is empty"));
    }

    #[test]
    fn test_format_queue_pretty_shows_retries() {
        let mut item = SyncQueueItem::from_mutation(
            Mutation::create(Resource::Item, json!({})).with_priority(4),
            DateTime::UNIX_EPOCH,
        );
        item.retry_count = 2;

        let output = format_queue_pretty(&[item], "Pending");
        assert!(output.contains("Pending (1 items)"));
        assert!(output.contains("create"));
        assert!(output.contains("retries: 2"));
    }

    #[test]
    fn test_format_dead_letters_pretty() {
        let output = format_dead_letters_pretty(&[make_dead_letter()]);
        assert!(output.contains("Dead letters (1 items)"));
        assert!(output.contains("delete"));
        assert!(output.contains("sync-abc"));
        assert!(output.contains("after 3 attempts"));
    }

    #[test]
    fn test_format_dead_letters_pretty_empty() {
        let output = format_dead_letters_pretty(&[]);
        assert!(output.contains("No dropped mutations"));
    }
}
