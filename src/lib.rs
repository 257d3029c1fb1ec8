//! listsync - offline-first sync engine for shopping and todo list clients
//!
//! This crate queues local mutations while the device is offline and applies
//! them through a pluggable transport once connectivity returns. It also
//! provides a TTL read cache, field-level conflict resolution and background
//! sync descriptors, all wired together by [`OfflineEngine`].

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod cli;
pub mod config;
pub mod conflict;
pub mod core;
pub mod engine;
pub mod error;
pub mod network;
pub mod output;
pub mod scenario;
pub mod scheduler;
pub mod storage;
pub mod sync;

pub use cli::args::{Cli, Commands, OutputFormat};
pub use engine::{EngineBuilder, OfflineEngine};
pub use error::{ApplyError, SyncError};
