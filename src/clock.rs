//! Wall-clock abstraction
//!
//! The scheduler reads "now" through the `Clock` trait so tests can pin time to a
//! known minute instead of depending on when they happen to run.

use crate::error::{QueueError, Result};
use crate::types::MinuteOfDay;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use std::sync::Mutex;

/// Source of local time for the hospital
pub trait Clock: Send + Sync {
    /// Current local time in the hospital's timezone
    fn now(&self) -> DateTime<FixedOffset>;

    /// Current local minute of day
    fn minute_of_day(&self) -> MinuteOfDay {
        MinuteOfDay::of(&self.now())
    }

    /// Current local calendar date
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Clock backed by the system time, shifted to a fixed UTC offset
#[derive(Debug, Clone)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    /// Create a system clock for the given offset from UTC, in minutes
    pub fn new(utc_offset_minutes: i32) -> Result<Self> {
        let offset = FixedOffset::east_opt(utc_offset_minutes * 60).ok_or_else(|| {
            QueueError::Configuration {
                message: format!("UTC offset {} minutes is out of range", utc_offset_minutes),
            }
        })?;
        Ok(Self { offset })
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }
}

/// Manually driven clock for tests and simulations
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    /// Start at a fixed instant
    pub fn new(start: DateTime<FixedOffset>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Start on 2024-01-15 at the given local time, UTC offset zero
    pub fn at(hour: u32, minute: u32) -> Self {
        let start = FixedOffset::east_opt(0)
            .and_then(|tz| tz.with_ymd_and_hms(2024, 1, 15, hour, minute, 0).single())
            .expect("valid manual clock start");
        Self::new(start)
    }

    /// Move to another time on the current date
    pub fn set_time(&self, hour: u32, minute: u32) {
        if let Ok(mut current) = self.current.lock() {
            let date = current.date_naive();
            if let Some(moved) = date
                .and_hms_opt(hour, minute, 0)
                .and_then(|naive| current.timezone().from_local_datetime(&naive).single())
            {
                *current = moved;
            }
        }
    }

    /// Move forward by a number of minutes
    pub fn advance_minutes(&self, minutes: i64) {
        if let Ok(mut current) = self.current.lock() {
            *current += Duration::minutes(minutes);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        // A poisoned lock still holds the last time that was set
        match self.current.lock() {
            Ok(current) => *current,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_moves() {
        let clock = ManualClock::at(9, 30);
        assert_eq!(clock.minute_of_day(), MinuteOfDay::from_hm(9, 30));

        clock.advance_minutes(45);
        assert_eq!(clock.minute_of_day(), MinuteOfDay::from_hm(10, 15));

        clock.set_time(16, 0);
        assert_eq!(clock.minute_of_day(), MinuteOfDay::from_hm(16, 0));
    }

    #[test]
    fn test_manual_clock_crosses_midnight() {
        let clock = ManualClock::at(23, 50);
        let yesterday = clock.today();

        clock.advance_minutes(20);
        assert_eq!(clock.minute_of_day(), MinuteOfDay::from_hm(0, 10));
        assert!(clock.today() > yesterday);
    }

    #[test]
    fn test_system_clock_offset() {
        let clock = SystemClock::new(330).unwrap();
        assert_eq!(clock.offset().local_minus_utc(), 330 * 60);
        assert!(SystemClock::new(100_000).is_err());
    }
}
