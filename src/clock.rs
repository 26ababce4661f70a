//! Wall clock access
//!
//! Every moment is server-local time without timezone: reminders are evaluated against it and
//! all stored timestamps use it

use chrono::Local;
use chrono::NaiveDateTime;

/// Source of the current time
pub trait Clock: Send + Sync {
    /// The current server-local time
    fn now(&self) -> NaiveDateTime;
}

/// The real clock of the system
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// The current server-local time
pub fn now() -> NaiveDateTime {
    SystemClock.now()
}

/// A clock that is stuck at a single moment
#[cfg(test)]
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub NaiveDateTime);

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}
