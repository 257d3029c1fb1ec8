//! TTL read cache.
//!
//! Expired entries are removed lazily when a read finds them, or eagerly by
//! [`Cache::optimize_cache`]. Reads never return an entry past its TTL.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use super::entry::{CacheEntry, CacheSize, DEFAULT_TTL};
use crate::core::Clock;
use crate::error::SyncError;

/// In-memory key/value cache with per-entry TTL.
pub struct Cache<T> {
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
}

impl<T: Clone + Serialize> Cache<T> {
    /// Create an empty cache using the one-hour default TTL.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            default_ttl: DEFAULT_TTL,
        }
    }

    /// Override the TTL used by [`cache_data`](Self::cache_data).
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// TTL applied when none is given.
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Store `data` under `key` with the default TTL, replacing any entry.
    pub fn cache_data(&self, key: &str, data: T) {
        self.cache_data_tagged(key, data, self.default_ttl, std::iter::empty::<&str>());
    }

    /// Store `data` under `key` with an explicit TTL.
    pub fn cache_data_with_ttl(&self, key: &str, data: T, ttl: Duration) {
        self.cache_data_tagged(key, data, ttl, std::iter::empty::<&str>());
    }

    /// Store `data` under `key`, attaching invalidation tags.
    pub fn cache_data_tagged<I, S>(&self, key: &str, data: T, ttl: Duration, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: BTreeSet<String> = tags.into_iter().map(Into::into).collect();
        let entry = CacheEntry::new(data, self.clock.now(), ttl, tags);
        self.lock().insert(key.to_string(), entry);
    }

    /// Read `key`, dropping it if it has outlived its TTL.
    #[must_use]
    pub fn get_cached_data(&self, key: &str) -> Option<T> {
        self.get_entry(key).map(|entry| entry.data)
    }

    /// Read `key` with its metadata, dropping it if it has outlived its TTL.
    #[must_use]
    pub fn get_entry(&self, key: &str) -> Option<CacheEntry<T>> {
        let now = self.clock.now();
        let mut entries = self.lock();
        let expired = entries.get(key)?.is_expired_at(now);

        if expired {
            entries.remove(key);
            debug!(key, "cache entry expired on read");
            return None;
        }
        entries.get(key).cloned()
    }

    /// Invalidate by optional regex pattern; `None` clears everything.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidPattern`] if the pattern does not compile.
    /// Nothing is removed in that case.
    pub fn invalidate_cache(&self, pattern: Option<&str>) -> Result<usize, SyncError> {
        match pattern {
            None => Ok(self.invalidate_all()),
            Some(pattern) => {
                let regex = Regex::new(pattern)?;
                Ok(self.invalidate_matching(&regex))
            },
        }
    }

    /// Remove every entry.
    pub fn invalidate_all(&self) -> usize {
        let removed = {
            let mut entries = self.lock();
            let n = entries.len();
            entries.clear();
            n
        };
        info!(removed, "cache cleared");
        removed
    }

    /// Remove entries whose key the regex matches anywhere.
    pub fn invalidate_matching(&self, pattern: &Regex) -> usize {
        let removed = self.invalidate_where(|key, _| pattern.is_match(key));
        info!(pattern = pattern.as_str(), removed, "cache invalidated by pattern");
        removed
    }

    /// Remove entries written with `tag`.
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        let removed = self.invalidate_where(|_, entry| entry.has_tag(tag));
        info!(tag, removed, "cache invalidated by tag");
        removed
    }

    /// Remove entries for which `predicate` holds.
    pub fn invalidate_where<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&str, &CacheEntry<T>) -> bool,
    {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, entry| !predicate(key, entry));
        before - entries.len()
    }

    /// Eagerly remove every expired entry, read or not.
    pub fn optimize_cache(&self) -> usize {
        let now = self.clock.now();
        let removed = self.invalidate_where(|_, entry| entry.is_expired_at(now));
        if removed > 0 {
            debug!(removed, "swept expired cache entries");
        }
        removed
    }

    /// Entry count and estimated payload size.
    #[must_use]
    pub fn get_cache_size(&self) -> CacheSize {
        let entries = self.lock();
        let estimated_bytes = entries
            .values()
            .map(|entry| serde_json::to_vec(&entry.data).map_or(0, |bytes| bytes.len()))
            .sum();
        CacheSize {
            entries: entries.len(),
            estimated_bytes,
        }
    }

    /// Keys currently stored (including not-yet-swept expired ones), sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<T>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ManualClock;
    use serde_json::{json, Value};

    fn cache() -> (Arc<ManualClock>, Cache<Value>) {
        let clock = Arc::new(ManualClock::at_epoch());
        let cache = Cache::new(clock.clone() as Arc<dyn Clock>);
        (clock, cache)
    }

    #[test]
    fn test_read_within_ttl_then_expire() {
        let (clock, cache) = cache();
        cache.cache_data_with_ttl("k", json!({"v": 1}), Duration::from_millis(1000));
        assert_eq!(cache.get_cached_data("k"), Some(json!({"v": 1})));
        assert_eq!(cache.get_cache_size().entries, 1);

        clock.advance(Duration::from_millis(1001));
        assert_eq!(cache.get_cached_data("k"), None);
        assert_eq!(cache.get_cache_size().entries, 0);
    }

    #[test]
    fn test_age_equal_to_ttl_is_still_valid() {
        let (clock, cache) = cache();
        cache.cache_data_with_ttl("k", json!(1), Duration::from_millis(1000));
        clock.advance(Duration::from_millis(1000));
        assert_eq!(cache.get_cached_data("k"), Some(json!(1)));
    }

    #[test]
    fn test_missing_key() {
        let (_, cache) = cache();
        assert!(cache.get_cached_data("nope").is_none());
    }

    #[test]
    fn test_default_ttl_is_one_hour() {
        let (clock, cache) = cache();
        cache.cache_data("k", json!("v"));
        clock.advance(Duration::from_secs(3600));
        assert!(cache.get_cached_data("k").is_some());
        clock.advance(Duration::from_millis(1));
        assert!(cache.get_cached_data("k").is_none());
    }

    #[test]
    fn test_overwrite_resets_timestamp_and_version() {
        let (clock, cache) = cache();
        cache.cache_data_with_ttl("k", json!(1), Duration::from_millis(100));
        clock.advance(Duration::from_millis(90));
        cache.cache_data_with_ttl("k", json!(2), Duration::from_millis(100));
        clock.advance(Duration::from_millis(90));

        let entry = cache.get_entry("k").expect("entry should be fresh");
        assert_eq!(entry.data, json!(2));
        assert_eq!(entry.version, 1);
        assert_eq!(entry.timestamp.timestamp_millis(), 90);
    }

    #[test]
    fn test_invalidate_all() {
        let (_, cache) = cache();
        cache.cache_data("a", json!(1));
        cache.cache_data("b", json!(2));
        assert_eq!(cache.invalidate_cache(None).unwrap(), 2);
        assert_eq!(cache.get_cache_size().entries, 0);
    }

    #[test]
    fn test_invalidate_pattern_removes_only_matches() {
        let (_, cache) = cache();
        cache.cache_data("list:1", json!(1));
        cache.cache_data("list:2", json!(2));
        cache.cache_data("user:1", json!(3));
        cache.cache_data("settings", json!(4));

        assert_eq!(cache.invalidate_cache(Some("^list:")).unwrap(), 2);
        assert_eq!(cache.keys(), vec!["settings", "user:1"]);
        assert_eq!(cache.get_cached_data("user:1"), Some(json!(3)));
    }

    #[test]
    fn test_invalidate_pattern_is_unanchored() {
        let (_, cache) = cache();
        cache.cache_data("store:list:9", json!(1));
        cache.cache_data("user", json!(2));
        assert_eq!(cache.invalidate_cache(Some("list")).unwrap(), 1);
        assert_eq!(cache.keys(), vec!["user"]);
    }

    #[test]
    fn test_invalid_pattern_removes_nothing() {
        let (_, cache) = cache();
        cache.cache_data("a", json!(1));
        let err = cache.invalidate_cache(Some("(")).unwrap_err();
        assert!(matches!(err, SyncError::InvalidPattern(_)));
        assert_eq!(cache.get_cache_size().entries, 1);
    }

    #[test]
    fn test_invalidate_tag() {
        let (_, cache) = cache();
        cache.cache_data_tagged("groceries", json!([]), DEFAULT_TTL, ["lists", "home"]);
        cache.cache_data_tagged("hardware", json!([]), DEFAULT_TTL, ["lists"]);
        cache.cache_data_tagged("profile", json!({}), DEFAULT_TTL, ["user"]);

        assert_eq!(cache.invalidate_tag("lists"), 2);
        assert_eq!(cache.keys(), vec!["profile"]);
        assert_eq!(cache.invalidate_tag("lists"), 0);
    }

    #[test]
    fn test_invalidate_where() {
        let (_, cache) = cache();
        cache.cache_data("a", json!(1));
        cache.cache_data("b", json!(20));
        let removed = cache.invalidate_where(|_, e| e.data.as_i64().is_some_and(|n| n > 10));
        assert_eq!(removed, 1);
        assert_eq!(cache.keys(), vec!["a"]);
    }

    #[test]
    fn test_optimize_removes_unread_expired_entries() {
        let (clock, cache) = cache();
        cache.cache_data_with_ttl("short", json!(1), Duration::from_millis(10));
        cache.cache_data_with_ttl("long", json!(2), Duration::from_secs(60));
        clock.advance(Duration::from_millis(11));

        assert_eq!(cache.get_cache_size().entries, 2);
        assert_eq!(cache.optimize_cache(), 1);
        assert_eq!(cache.keys(), vec!["long"]);
        assert_eq!(cache.optimize_cache(), 0);
    }

    #[test]
    fn test_estimated_bytes() {
        let (_, cache) = cache();
        cache.cache_data("a", json!("abc"));
        cache.cache_data("b", json!({"x": 1}));

        let size = cache.get_cache_size();
        assert_eq!(size.entries, 2);
        // "abc" -> 5 bytes, {"x":1} -> 7 bytes
        assert_eq!(size.estimated_bytes, 12);
    }

    #[test]
    fn test_typed_cache() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::at_epoch());
        let cache: Cache<Vec<String>> = Cache::new(clock).with_default_ttl(Duration::from_secs(5));
        cache.cache_data("tags", vec!["a".to_string()]);
        assert_eq!(cache.default_ttl(), Duration::from_secs(5));
        assert_eq!(cache.get_cached_data("tags"), Some(vec!["a".to_string()]));
    }
}
