//! Read cache with per-entry TTL.
//!
//! Entries can be invalidated all at once, by key pattern, by tag, or by an
//! arbitrary predicate.

mod entry;
mod store;

pub use entry::{CacheEntry, CacheSize, DEFAULT_TTL};
pub use store::Cache;
