//! Storage layer for listsync.
//!
//! The sync queue and cache are in-memory only. `SQLite` is used for the
//! optional dead-letter log of mutations that exhausted their retries.

mod dead_letter;
mod migrations;

pub use dead_letter::{DeadLetter, DeadLetterStore};
