//! Config command implementation.

use crate::cli::args::{ConfigCommands, OutputFormat};
use crate::config::{Config, Paths};
use crate::error::SyncError;
use crate::output::to_json;

/// Execute config subcommands.
///
/// # Errors
///
/// Returns an error if the config file cannot be read or written.
pub fn config(cmd: ConfigCommands, format: OutputFormat) -> Result<String, SyncError> {
    let paths = Paths::new()?;

    match cmd {
        ConfigCommands::Show => {
            let config = Config::load_from_path(&paths.config_file)?;
            match format {
                OutputFormat::Json => to_json(&config),
                OutputFormat::Pretty => config.to_yaml(),
            }
        },
        ConfigCommands::Path => match format {
            OutputFormat::Json => to_json(&serde_json::json!({
                "config": paths.config_file,
                "database": paths.database,
            })),
            OutputFormat::Pretty => Ok(paths.config_file.display().to_string()),
        },
        ConfigCommands::Init { force } => init(&paths, force, format),
    }
}

fn init(paths: &Paths, force: bool, format: OutputFormat) -> Result<String, SyncError> {
    if paths.config_file.exists() && !force {
        return Err(SyncError::Config(format!(
            "{} already exists (use --force to overwrite)",
            paths.config_file.display()
        )));
    }

    paths.ensure_dirs()?;
    Config::default().save_to_path(&paths.config_file)?;

    match format {
        OutputFormat::Json => to_json(&serde_json::json!({ "written": paths.config_file })),
        OutputFormat::Pretty => Ok(format!("Wrote {}", paths.config_file.display())),
    }
}
