//! Wall-clock abstraction.
//!
//! TTL expiry, queue ordering and background scheduling all read time through
//! [`Clock`] so tests and scenario replays can move time deterministically.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    #[must_use]
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Create a clock frozen at the Unix epoch.
    #[must_use]
    pub const fn at_epoch() -> Self {
        Self::new(DateTime::UNIX_EPOCH)
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = saturating_add(*now, by);
    }

    /// Jump to an absolute instant (may move backwards).
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = at;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at_epoch()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Convert a std duration, saturating at the largest representable delta.
#[must_use]
pub fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

/// `at + by`, clamped to the latest representable instant.
#[must_use]
pub fn saturating_add(at: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    at.checked_add_signed(to_delta(by))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Whether something stamped at `stamped` with lifetime `ttl` is past due at `now`.
///
/// Age equal to the TTL is still valid; a stamp in the future never expires.
#[must_use]
pub fn is_expired(stamped: DateTime<Utc>, ttl: Duration, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(stamped) > to_delta(ttl)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::at_epoch();
        clock.advance(Duration::from_millis(1500));
        assert_eq!(clock.now().timestamp_millis(), 1500);
    }

    #[test]
    fn test_manual_clock_set_backwards() {
        let clock = ManualClock::at_epoch();
        clock.advance(Duration::from_secs(10));
        clock.set(DateTime::UNIX_EPOCH);
        assert_eq!(clock.now(), DateTime::UNIX_EPOCH);
    }

    #[test]
    fn test_is_expired_boundary() {
        let start = DateTime::UNIX_EPOCH;
        let ttl = Duration::from_millis(1000);
        assert!(!is_expired(start, ttl, start + TimeDelta::milliseconds(1000)));
        assert!(is_expired(start, ttl, start + TimeDelta::milliseconds(1001)));
    }

    #[test]
    fn test_is_expired_future_stamp() {
        let start = DateTime::UNIX_EPOCH + TimeDelta::seconds(60);
        assert!(!is_expired(start, Duration::ZERO, DateTime::UNIX_EPOCH));
    }

    #[test]
    fn test_to_delta_saturates() {
        assert_eq!(to_delta(Duration::MAX), TimeDelta::MAX);
    }
}
