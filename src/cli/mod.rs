//! Command-line interface for listsync.

pub mod args;
pub mod commands;
