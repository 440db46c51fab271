//! Threshold gates for suppressing bursts of repeated events.
//!
//! A [`ThresholdGate`] swallows the first `threshold` occurrences after a
//! reset and forwards the next one, exactly once, to its delegate. Typical use
//! is alert code that should stay quiet through a handful of transient errors
//! and speak up only when the failure persists.
//!
//! [`ThresholdWindowedGate`] adds decay: once a quiet window passes without a
//! call, the next call starts counting from zero again.
//!
//! Neither gate is synchronized. Callers that share one across threads wrap
//! it in a lock or drive it from a single executor.

use std::marker::PhantomData;
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::util::clock::{plus, SharedClock};

/// One-shot pass-through after `threshold` suppressed occurrences.
pub struct ThresholdGate<T, D> {
    threshold: u32,
    count: u64,
    delegate: D,
    _value: PhantomData<fn(T)>,
}

impl<T, D> ThresholdGate<T, D>
where
    D: FnMut(T),
{
    /// Create a gate that forwards the `threshold + 1`-th value after each reset.
    pub fn new(threshold: u32, delegate: D) -> Self {
        Self {
            threshold,
            count: 0,
            delegate,
            _value: PhantomData,
        }
    }

    /// Count an occurrence, forwarding `value` if this one crosses the threshold.
    ///
    /// Returns whether the value was forwarded.
    pub fn accept(&mut self, value: T) -> bool {
        let pass = self.count == u64::from(self.threshold);
        self.count = self.count.saturating_add(1);
        if pass {
            (self.delegate)(value);
        }
        pass
    }

    /// Zero the counter, re-arming the gate.
    pub fn reset(&mut self) {
        self.count = 0;
    }

    /// Occurrences seen since the last reset.
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Number of occurrences suppressed before the pass-through.
    pub const fn threshold(&self) -> u32 {
        self.threshold
    }
}

/// [`ThresholdGate`] whose counter also resets after a quiet `window`.
pub struct ThresholdWindowedGate<T, D> {
    gate: ThresholdGate<T, D>,
    window: Duration,
    clock: SharedClock,
    next_timeout: Option<DateTime<Local>>,
}

impl<T, D> ThresholdWindowedGate<T, D>
where
    D: FnMut(T),
{
    /// Create a windowed gate reading time from `clock`.
    pub fn new(threshold: u32, window: Duration, clock: SharedClock, delegate: D) -> Self {
        Self {
            gate: ThresholdGate::new(threshold, delegate),
            window,
            clock,
            next_timeout: None,
        }
    }

    /// Count an occurrence; resets first if the previous window has elapsed.
    ///
    /// Every call pushes the timeout to `now + window`.
    pub fn accept(&mut self, value: T) -> bool {
        let now = self.clock.now();
        if let Some(timeout) = self.next_timeout {
            if timeout < now {
                tracing::trace!(count = self.gate.count(), "gate window elapsed, resetting");
                self.gate.reset();
            }
        }
        self.next_timeout = Some(plus(now, self.window));
        self.gate.accept(value)
    }

    /// Zero the counter and forget the pending timeout.
    pub fn reset(&mut self) {
        self.gate.reset();
        self.next_timeout = None;
    }

    /// Occurrences seen since the last reset.
    pub const fn count(&self) -> u64 {
        self.gate.count()
    }
}
