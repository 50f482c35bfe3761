//! Wall-clock access for the dispatch workflow.
//!
//! Operational shifts are keyed by the operator's local calendar date, so
//! the clock hands out offset-aware timestamps and the date is taken from
//! the local side, never from UTC.

use chrono::{DateTime, FixedOffset, Local, NaiveDate};

/// Source of the current local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// The machine's clock and time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// A clock stopped at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}

/// Calendar date of `now` in its own offset.
#[must_use]
pub fn local_date(now: &DateTime<FixedOffset>) -> NaiveDate {
    now.date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn late_evening_keeps_local_date() {
        let now = DateTime::parse_from_rfc3339("2025-01-01T23:30:00-05:00").unwrap();
        assert_eq!(local_date(&now).to_string(), "2025-01-01");
        // Already the next day in UTC.
        assert_eq!(now.naive_utc().date().to_string(), "2025-01-02");
    }

    #[test]
    fn fixed_clock_does_not_move() {
        let now = DateTime::parse_from_rfc3339("2025-03-10T08:00:00-05:00").unwrap();
        let clock = FixedClock(now);
        assert_eq!(clock.now(), now);
        assert_eq!(clock.now(), now);
    }
}
