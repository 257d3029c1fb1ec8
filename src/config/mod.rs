//! Configuration management for listsync.
//!
//! This module handles loading and saving configuration from `~/.listsync/`.

mod paths;
mod settings;

pub use paths::Paths;
pub use settings::{
    CacheConfig, ColorSetting, Config, ConflictConfig, GeneralConfig, LoggingConfig, QueueConfig,
};
