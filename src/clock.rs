use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of wall-clock time, in epoch milliseconds.
///
/// The aggregator takes its window boundaries from one of these, so tests
/// can drive windowing deterministically with a [`Mock`].
pub trait ClockSource {
    fn now_millis(&self) -> u64;
}

/// The system wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// A manually advanced clock.
#[derive(Clone, Debug, Default)]
pub struct Mock {
    offset: Arc<AtomicU64>,
}

impl Mock {
    pub fn new(offset: u64) -> Mock {
        Mock {
            offset: Arc::new(AtomicU64::new(offset)),
        }
    }

    pub fn increment(&self, amount: u64) {
        self.offset.fetch_add(amount, Ordering::Release);
    }
}

impl ClockSource for Mock {
    fn now_millis(&self) -> u64 { self.offset.load(Ordering::Acquire) }
}
