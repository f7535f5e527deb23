use chrono::{DateTime, Local, NaiveDate, NaiveTime, Utc};
use parking_lot::Mutex;

/// Calendar and wall-clock source injected into the session core.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replays.
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn at_date(date: NaiveDate) -> Self {
        let noon = NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default();
        let midday = date.and_time(noon).and_utc();
        Self::new(midday)
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.now.lock();
        *guard += by;
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.now.lock().date_naive()
    }

    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
