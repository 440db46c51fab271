//! Clock sources for wall-clock time.
//!
//! Every timing decision in the toolkit (liveness windows, gate timeouts,
//! backoff elapsed time, job occurrences) reads the current instant through
//! [`Clock`], so tests can drive time explicitly with [`ManualClock`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, TimeDelta};
use parking_lot::Mutex;

/// Source of the current local date-time.
pub trait Clock: Send + Sync {
    /// Current instant in the local time zone.
    fn now(&self) -> DateTime<Local>;
}

/// Shared, dynamically dispatched clock handle.
pub type SharedClock = Arc<dyn Clock>;

/// Clock backed by the operating system's wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Shared system clock.
    #[must_use]
    pub fn shared() -> SharedClock {
        Arc::new(Self)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now = plus(*now, by);
    }

    /// Jump to an absolute instant (may move backwards).
    pub fn set(&self, to: DateTime<Local>) {
        *self.now.lock() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Local::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock()
    }
}

/// Add a std duration to an instant. Durations outside chrono's range leave
/// the instant unchanged instead of panicking.
#[must_use]
pub fn plus(instant: DateTime<Local>, by: Duration) -> DateTime<Local> {
    TimeDelta::from_std(by)
        .ok()
        .and_then(|delta| instant.checked_add_signed(delta))
        .unwrap_or(instant)
}

/// Wall-clock distance from `earlier` to `later`; zero if `later` is not after `earlier`.
#[must_use]
pub fn elapsed_between(earlier: DateTime<Local>, later: DateTime<Local>) -> Duration {
    (later - earlier).to_std().unwrap_or(Duration::ZERO)
}
