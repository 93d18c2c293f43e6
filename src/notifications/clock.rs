//! Time sources for the notification center.

use std::sync::Mutex;

use chrono::{DateTime, Local, NaiveTime, Utc};

pub trait Clock: Send + Sync {
    /// Current instant, for timestamps and expiry.
    fn now(&self) -> DateTime<Utc>;

    /// Local wall-clock time of day, for quiet hours.
    fn local_time(&self) -> NaiveTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn local_time(&self) -> NaiveTime {
        Local::now().time()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    local: Mutex<NaiveTime>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>, local: NaiveTime) -> Self {
        Self {
            now: Mutex::new(now),
            local: Mutex::new(local),
        }
    }

    /// Fixed at `local` time of day, with the real current date.
    pub fn at_local(local: NaiveTime) -> Self {
        Self::new(Utc::now(), local)
    }

    pub fn set_now(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn set_local_time(&self, local: NaiveTime) {
        if let Ok(mut guard) = self.local.lock() {
            *guard = local;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map(|g| *g).unwrap_or_else(|p| *p.into_inner())
    }

    fn local_time(&self) -> NaiveTime {
        self.local.lock().map(|g| *g).unwrap_or_else(|p| *p.into_inner())
    }
}
