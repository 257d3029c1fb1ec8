use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "listsync")]
#[command(about = "Inspect and replay the listsync offline sync engine")]
#[command(long_about = "listsync - offline-first sync engine for list clients

Queues local mutations while offline, drains them when connectivity returns,
caches reads with per-entry TTLs and reconciles divergent records.

QUICK START:
  listsync config init                 Write a default config file
  listsync scenario run reconnect.yaml Replay a scripted scenario
  listsync dead-letters list           Show mutations that were dropped

OUTPUT FORMATS:
  --output pretty    Human-readable colored output (default)
  --output json      Machine-readable JSON for scripting

LOGGING:
  Set LISTSYNC_LOG (e.g. LISTSYNC_LOG=debug) to override logging.filter.")]
#[command(version, propagate_version = true)]
pub struct Cli {
    /// Output format for command results
    ///
    /// Use 'pretty' for human-readable colored output, or 'json' for
    /// machine-readable output suitable for scripting. Defaults to
    /// general.default_output from the config file.
    #[arg(short, long, value_enum, global = true)]
    pub output: Option<OutputFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for command results.
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable colored output.
    #[default]
    Pretty,
    /// Machine-readable JSON output.
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show or create the configuration file
    ///
    /// Configuration lives in ~/.listsync/config.yaml. Missing keys fall
    /// back to defaults.
    ///
    /// # Examples
    ///
    ///   listsync config show          Print the effective configuration
    ///   listsync config path          Print the config file location
    ///   listsync config init          Write defaults to the config file
    Config(ConfigArgs),

    /// Inspect mutations dropped after exhausting their retries
    ///
    /// Dropped mutations are recorded when queue.dead_letters is enabled
    /// or a scenario is run with --dead-letters.
    ///
    /// # Examples
    ///
    ///   listsync dead-letters list -n 5
    ///   listsync dl count
    ///   listsync dl purge --older-than 48
    #[command(alias = "dl")]
    DeadLetters(DeadLetterArgs),

    /// Replay deterministic scenarios
    ///
    /// A scenario drives a fresh engine on a manual clock with a scripted
    /// transport and prints a transcript of every step.
    ///
    /// # Example scenario
    ///
    ///   start_offline: true
    ///   outcomes: [fail, ok]
    ///   steps:
    ///     - enqueue: { type: create, resource: item, data: { name: milk } }
    ///     - network: { online: true }
    ///     - cache: { key: lists, data: [1, 2], ttl_ms: 1000 }
    ///     - advance_ms: 1500
    ///     - read: lists
    Scenario(ScenarioArgs),

    /// Generate shell completions
    ///
    /// Outputs completion script for the specified shell.
    /// Redirect to a file or source directly.
    ///
    /// Example: listsync completions bash > ~/.bash_completion.d/listsync
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell, elvish)
        shell: String,

        /// Show installation instructions
        #[arg(long, short = 'i')]
        install: bool,
    },
}

/// Arguments for config.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Print the config file path
    Path,

    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(long, short = 'f')]
        force: bool,
    },
}

/// Arguments for dead letters.
#[derive(Args)]
pub struct DeadLetterArgs {
    #[command(subcommand)]
    pub command: DeadLetterCommands,
}

/// Dead-letter subcommands.
#[derive(Subcommand)]
pub enum DeadLetterCommands {
    /// List dropped mutations, newest first
    List {
        /// Maximum entries to show
        #[arg(long, short = 'n', default_value = "20")]
        limit: usize,
    },

    /// Show one dropped mutation with its payload
    Show {
        /// Dead-letter ID
        id: i64,
    },

    /// Count dropped mutations
    Count,

    /// Delete entries older than a number of hours
    Purge {
        /// Maximum age in hours
        #[arg(long, default_value = "168", value_parser = clap::value_parser!(i64).range(0..))]
        older_than: i64,
    },

    /// Delete every entry
    Clear {
        /// Skip confirmation
        #[arg(long, short = 'f')]
        force: bool,
    },
}

/// Arguments for scenarios.
#[derive(Args)]
pub struct ScenarioArgs {
    #[command(subcommand)]
    pub command: ScenarioCommands,
}

/// Scenario subcommands.
#[derive(Subcommand)]
pub enum ScenarioCommands {
    /// Replay a scenario file
    Run {
        /// Path to the scenario YAML
        file: PathBuf,

        /// Record dropped mutations in the dead-letter log
        #[arg(long)]
        dead_letters: bool,
    },
}
