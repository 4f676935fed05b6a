use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A point in time, in whole seconds since the Unix epoch.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const fn from_secs(secs: i64) -> Self {
        Self(secs)
    }

    pub const fn as_secs(self) -> i64 {
        self.0
    }

    /// The same instant as a `chrono` datetime, if it is representable.
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.0, 0).single()
    }
}

impl From<i64> for Timestamp {
    fn from(secs: i64) -> Self {
        Self(secs)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(datetime: DateTime<Utc>) -> Self {
        Self(datetime.timestamp())
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Source of the current time. Election logic never reads the wall clock directly.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Shared handle to a clock.
pub type SharedClock = Arc<dyn Clock>;

/// The real time, according to the system.
#[derive(Debug, Default, Copy, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now().into()
    }
}

/// A clock that only moves when told to, and never backwards.
/// Clones share the same time.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start.as_secs())),
        }
    }

    /// Move the clock to `time`. Requests to move backwards are ignored.
    /// Returns the resulting time.
    pub fn set(&self, time: Timestamp) -> Timestamp {
        let previous = self.now.fetch_max(time.as_secs(), Ordering::SeqCst);
        Timestamp(previous.max(time.as_secs()))
    }

    /// Move the clock forward by `secs` seconds, stopping at the latest
    /// representable time.
    pub fn advance(&self, secs: u32) -> Timestamp {
        let step = |now: i64| now.saturating_add(i64::from(secs));
        let previous = match self
            .now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| Some(step(now)))
        {
            Ok(previous) | Err(previous) => previous,
        };
        Timestamp(step(previous))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.now.load(Ordering::SeqCst))
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_never_goes_backwards() {
        let clock = ManualClock::new(Timestamp::from(100));
        assert_eq!(clock.set(Timestamp::from(150)), Timestamp::from(150));
        assert_eq!(clock.set(Timestamp::from(120)), Timestamp::from(150));
        assert_eq!(clock.now(), Timestamp::from(150));
        assert_eq!(clock.advance(50), Timestamp::from(200));
    }

    #[test]
    fn advance_stops_at_the_latest_time() {
        let clock = ManualClock::new(Timestamp::from(i64::MAX - 10));
        assert_eq!(clock.advance(u32::MAX), Timestamp::from(i64::MAX));
        assert_eq!(clock.advance(1), Timestamp::from(i64::MAX));
        assert_eq!(clock.now(), Timestamp::from(i64::MAX));
    }

    #[test]
    fn clones_share_time() {
        let clock = ManualClock::example();
        let shared: SharedClock = Arc::new(clock.clone());
        clock.set(Timestamp::from(42));
        assert_eq!(shared.now(), Timestamp::from(42));
    }

    #[test]
    fn datetime_conversion() {
        let datetime = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let timestamp = Timestamp::from(datetime);
        assert_eq!(timestamp.to_datetime(), Some(datetime));
    }

    #[test]
    fn system_clock_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(SystemClock.now() > Timestamp::from(1_577_836_800));
    }
}
