use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, Utc};

/// Wall-clock time source.
///
/// `today` is the origin-local calendar date used for day-bucket keys;
/// `sleep` is the pacing primitive the delivery queue uses between sends.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
    fn today(&self) -> NaiveDate;
    fn sleep(&self, duration: Duration);
}

/// Real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
