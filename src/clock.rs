//! Clock abstraction for testable time handling.
//!
//! Lock records and snapshots carry wall-clock timestamps with the station's
//! UTC offset, so the clock hands out `DateTime<FixedOffset>`.

use chrono::{DateTime, Duration, FixedOffset, Local};
use std::sync::{Arc, Mutex};

/// A clock that provides the current time.
pub trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Real system clock, in the station's local offset.
#[derive(Clone, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Fake clock for testing with controllable time.
#[derive(Clone, Debug)]
pub struct FakeClock {
    current: Arc<Mutex<DateTime<FixedOffset>>>,
}

impl FakeClock {
    /// Start a fake clock at the given instant.
    pub fn at(start: DateTime<FixedOffset>) -> Self {
        Self {
            current: Arc::new(Mutex::new(start)),
        }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += duration;
    }

    /// Set the clock to a specific instant.
    pub fn set(&self, instant: DateTime<FixedOffset>) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current = instant;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::at(SystemClock.now())
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances_shared_time() {
        let start = DateTime::parse_from_rfc3339("2026-03-02T08:00:00+01:00").unwrap();
        let clock = FakeClock::at(start);
        let other = clock.clone();

        other.advance(Duration::seconds(90));

        assert_eq!(clock.now(), start + Duration::seconds(90));
        assert_eq!(clock.now().offset(), start.offset());
    }
}
