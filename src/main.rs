use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use listsync::cli::args::{Cli, Commands};
use listsync::cli::commands;
use listsync::config::{ColorSetting, Config};
use listsync::error::SyncError;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), SyncError> {
    let cli = Cli::parse();
    let config = Config::load()?;
    init_logging(&config);

    match config.general.color {
        ColorSetting::Always => colored::control::set_override(true),
        ColorSetting::Never => colored::control::set_override(false),
        ColorSetting::Auto => {},
    }

    let format = cli.output.unwrap_or(config.general.default_output);

    let output = match cli.command {
        Commands::Config(args) => commands::config(args.command, format)?,
        Commands::DeadLetters(args) => commands::dead_letters(args.command, format)?,
        Commands::Scenario(args) => commands::scenario(args.command, &config, format)?,
        Commands::Completions { shell, install } => commands::completions(&shell, install)?,
    };

    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_env("LISTSYNC_LOG")
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
