//! Timestamps and the clock abstraction.
//!
//! Timestamps are nanoseconds since the Unix epoch, asserted by the sender of a
//! transaction. Components that need "now" take a [`Clock`] so tests can drive
//! time explicitly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Nanoseconds since the Unix epoch (UTC).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The epoch. Genesis transactions carry this timestamp.
    pub const EPOCH: Self = Self(0);

    pub fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    pub fn as_nanos(&self) -> u64 {
        self.0
    }

    pub fn saturating_add(self, d: Duration) -> Self {
        let nanos = u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(nanos))
    }

    /// Time elapsed from `self` to `now`, zero if `now` is earlier.
    pub fn elapsed_until(&self, now: Timestamp) -> Duration {
        Duration::from_nanos(now.0.saturating_sub(self.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// The operating system clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        // A clock set before 1970 reads as the epoch rather than panicking.
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
            .unwrap_or(0);
        Timestamp(nanos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturating_add_clamps() {
        let t = Timestamp::from_nanos(u64::MAX - 1);
        assert_eq!(t.saturating_add(Duration::from_secs(1)).as_nanos(), u64::MAX);
    }

    #[test]
    fn elapsed_until_never_negative() {
        let later = Timestamp::from_nanos(100);
        let earlier = Timestamp::from_nanos(40);
        assert_eq!(earlier.elapsed_until(later), Duration::from_nanos(60));
        assert_eq!(later.elapsed_until(earlier), Duration::ZERO);
    }

    #[test]
    fn system_clock_is_after_epoch() {
        assert!(SystemClock.now() > Timestamp::EPOCH);
    }
}
