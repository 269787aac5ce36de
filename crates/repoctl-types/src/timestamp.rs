use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A point in time expressed as nanoseconds since the Unix epoch.
///
/// All entity timestamps in the data model (§3) use this uniform
/// representation rather than a calendar type, so that comparisons and
/// session encoding never depend on a timezone or leap-second table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub const EPOCH: Timestamp = Timestamp(0);

    pub fn now() -> Self {
        let dur = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(dur.as_nanos() as i64)
    }

    pub fn from_nanos(nanos: i64) -> Self {
        Timestamp(nanos)
    }

    pub fn as_nanos(self) -> i64 {
        self.0
    }

    pub fn checked_add(self, delta: Duration) -> Option<Timestamp> {
        self.0.checked_add(delta.as_nanos).map(Timestamp)
    }

    pub fn checked_sub(self, delta: Duration) -> Option<Timestamp> {
        self.0.checked_sub(delta.as_nanos).map(Timestamp)
    }

    pub fn saturating_add(self, delta: Duration) -> Timestamp {
        Timestamp(self.0.saturating_add(delta.as_nanos))
    }

    pub fn saturating_sub(self, delta: Duration) -> Timestamp {
        Timestamp(self.0.saturating_sub(delta.as_nanos))
    }

    /// Whether `self` is older than `other` by at least `min_age`.
    pub fn is_older_than(self, other: Timestamp, min_age: Duration) -> bool {
        other.0.saturating_sub(self.0) >= min_age.as_nanos
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A span of time expressed in nanoseconds, independent of wall-clock.
///
/// Kept distinct from `std::time::Duration` because every expiration in
/// §5 (result/soft-rebuild/hard-rebuild/queued timeouts) is compared
/// directly against `Timestamp` deltas, and a thin newtype keeps the
/// comparisons total rather than panicking on underflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Duration {
    pub as_nanos: i64,
}

impl Duration {
    pub fn from_secs(secs: i64) -> Self {
        Duration {
            as_nanos: secs.saturating_mul(1_000_000_000),
        }
    }

    pub fn from_millis(ms: i64) -> Self {
        Duration {
            as_nanos: ms.saturating_mul(1_000_000),
        }
    }

    pub fn zero() -> Self {
        Duration { as_nanos: 0 }
    }
}

impl From<std::time::Duration> for Duration {
    fn from(d: std::time::Duration) -> Self {
        Duration {
            as_nanos: d.as_nanos().min(i64::MAX as u128) as i64,
        }
    }
}

/// A daytime window `(start, stop)` used by the `build-alt-*` options to
/// apply an alternative timeout only during a configured wall-clock
/// interval (§5, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaytimeWindow {
    /// Seconds since local midnight, inclusive.
    pub start: u32,
    /// Seconds since local midnight, exclusive.
    pub stop: u32,
}

impl DaytimeWindow {
    /// Whether `seconds_since_midnight` falls inside the window, handling
    /// windows that wrap past midnight (`start > stop`).
    pub fn contains(&self, seconds_since_midnight: u32) -> bool {
        if self.start <= self.stop {
            seconds_since_midnight >= self.start && seconds_since_midnight < self.stop
        } else {
            seconds_since_midnight >= self.start || seconds_since_midnight < self.stop
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_older_than_respects_min_age() {
        let a = Timestamp(0);
        let b = Timestamp(1_000_000_000);
        assert!(a.is_older_than(b, Duration::from_secs(1)));
        assert!(!a.is_older_than(b, Duration::from_secs(2)));
    }

    #[test]
    fn daytime_window_wraps_midnight() {
        let w = DaytimeWindow {
            start: 23 * 3600,
            stop: 1 * 3600,
        };
        assert!(w.contains(23 * 3600 + 30 * 60));
        assert!(w.contains(30 * 60));
        assert!(!w.contains(12 * 3600));
    }

    #[test]
    fn saturating_add_does_not_panic_at_bounds() {
        let t = Timestamp(i64::MAX);
        let d = Duration::from_secs(1);
        assert_eq!(t.saturating_add(d), Timestamp(i64::MAX));
    }
}
