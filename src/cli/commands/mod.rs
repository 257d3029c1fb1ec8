//! Command implementations for listsync.
//!
//! This module contains the implementation of all CLI commands.

mod completions;
mod config;
mod dead_letters;
mod scenario;

pub use completions::{
    completion_install_instructions, completions, generate_completions, shell_from_str,
};
pub use config::config;
pub use dead_letters::dead_letters;
pub use scenario::scenario;
