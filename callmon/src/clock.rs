use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Milliseconds since the unix epoch.
pub type EpochMillis = i64;

pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> EpochMillis;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> EpochMillis {
        Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
///
/// Used when replaying recorded call events, where every event carries its own
/// timestamp, and in tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: EpochMillis) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn set(&self, now: EpochMillis) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> EpochMillis {
        self.now.load(Ordering::SeqCst)
    }
}
