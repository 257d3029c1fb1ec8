//! Scenario command implementation.

use std::path::Path;
use std::sync::Arc;

use crate::cli::args::{OutputFormat, ScenarioCommands};
use crate::config::Config;
use crate::core::SystemClock;
use crate::error::SyncError;
use crate::output::format_transcript;
use crate::scenario::{Scenario, ScenarioRunner};
use crate::storage::DeadLetterStore;

/// Execute scenario subcommands.
///
/// # Errors
///
/// Returns an error if the scenario cannot be loaded or the dead-letter log
/// cannot be opened.
pub fn scenario(
    cmd: ScenarioCommands,
    config: &Config,
    format: OutputFormat,
) -> Result<String, SyncError> {
    match cmd {
        ScenarioCommands::Run { file, dead_letters } => {
            run_file(&file, config, dead_letters || config.queue.dead_letters, format)
        },
    }
}

fn run_file(
    file: &Path,
    config: &Config,
    record_dead_letters: bool,
    format: OutputFormat,
) -> Result<String, SyncError> {
    let scenario = Scenario::from_path(file)?;

    let mut runner = ScenarioRunner::new(config.clone());
    if record_dead_letters {
        let store = DeadLetterStore::open_default(Arc::new(SystemClock))?;
        runner = runner.with_dead_letters(Arc::new(store));
    }

    let runtime = tokio::runtime::Builder::new_current_thread().build()?;
    let transcript = runtime.block_on(runner.run(&scenario));

    format_transcript(&transcript, format)
}
