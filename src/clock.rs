use chrono::{DateTime, Local, NaiveDate, Utc};
#[cfg(test)]
use std::cell::Cell;

/// Source of the current instant and the current calendar day.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    /// Local calendar day. Day rollover is detected by comparing these values.
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// A clock that only moves when told to. The day is derived from the UTC
/// instant so tests stay independent of the host time zone.
#[cfg(test)]
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualClock {
            now: Cell::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.now.set(at);
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.now.set(self.now.get() + by);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }

    fn today(&self) -> NaiveDate {
        self.now.get().date_naive()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }

    fn today(&self) -> NaiveDate {
        (**self).today()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn manual_clock_crosses_midnight() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 0).unwrap());
        let before = clock.today();
        clock.advance(Duration::minutes(2));
        assert_eq!(before.succ_opt(), Some(clock.today()));
    }
}
