//! Exponential backoff with jitter and an elapsed-time budget.
//!
//! [`ExponentialBackOff`] hands out retry intervals that start at
//! `initial_interval_ms`, grow by `multiplier` after each call, and are capped
//! at `max_interval_ms`. Each returned value is jittered symmetrically by
//! `randomization_factor`, so with a factor of `0.5` and a base of 100ms the
//! result lies in `[50ms, 150ms]`.
//!
//! Once more than `max_elapsed_time_ms` has passed since construction or the
//! last [`reset`](BackOff::reset), every call returns `None` until reset.
//! Callers must treat `None` as "stop retrying".
//!
//! # Example
//! ```rust
//! use hearthkit::config::BackoffConfig;
//! use hearthkit::policy::{BackOff, ExponentialBackOff};
//!
//! let mut backoff = ExponentialBackOff::new(BackoffConfig {
//!     initial_interval_ms: 100,
//!     multiplier: 2.0,
//!     randomization_factor: 0.0,
//!     max_interval_ms: 1_000,
//!     max_elapsed_time_ms: 60_000,
//! })
//! .unwrap();
//!
//! assert_eq!(backoff.next_back_off().unwrap().as_millis(), 100);
//! assert_eq!(backoff.next_back_off().unwrap().as_millis(), 200);
//! ```

use std::thread;
use std::time::Duration;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use rand::Rng;

use crate::config::BackoffConfig;
use crate::core::ToolkitError;
use crate::util::clock::{elapsed_between, SharedClock, SystemClock};

/// A retry interval policy.
pub trait BackOff {
    /// Next interval to wait, or `None` when retrying should stop.
    fn next_back_off(&mut self) -> Option<Duration>;

    /// Start over from the initial interval with a fresh elapsed-time budget.
    fn reset(&mut self);
}

/// Jittered exponential backoff bounded by a total elapsed time.
pub struct ExponentialBackOff {
    config: BackoffConfig,
    current_interval_ms: f64,
    started_at: DateTime<Local>,
    clock: SharedClock,
}

impl ExponentialBackOff {
    /// Create a backoff measuring elapsed time with the system clock.
    ///
    /// # Errors
    ///
    /// Returns `ToolkitError::InvalidArgument` if the configuration is invalid.
    pub fn new(config: BackoffConfig) -> Result<Self, ToolkitError> {
        Self::with_clock(config, SystemClock::shared())
    }

    /// Create a backoff measuring elapsed time with `clock`.
    ///
    /// # Errors
    ///
    /// Returns `ToolkitError::InvalidArgument` if the configuration is invalid.
    pub fn with_clock(config: BackoffConfig, clock: SharedClock) -> Result<Self, ToolkitError> {
        config.validate().map_err(ToolkitError::InvalidArgument)?;
        let started_at = clock.now();
        Ok(Self {
            config,
            current_interval_ms: initial_ms(&config),
            started_at,
            clock,
        })
    }

    /// Time since construction or the last reset.
    pub fn elapsed(&self) -> Duration {
        elapsed_between(self.started_at, self.clock.now())
    }

    /// Un-jittered interval the next call will be based on.
    pub fn current_interval(&self) -> Duration {
        from_millis_f64(self.current_interval_ms.min(max_ms(&self.config)))
    }

    /// Configuration this backoff was built from.
    pub const fn config(&self) -> &BackoffConfig {
        &self.config
    }

    fn grow(&mut self) {
        let max = max_ms(&self.config);
        if self.current_interval_ms >= max / self.config.multiplier {
            self.current_interval_ms = max;
        } else {
            self.current_interval_ms *= self.config.multiplier;
        }
    }
}

impl BackOff for ExponentialBackOff {
    fn next_back_off(&mut self) -> Option<Duration> {
        let elapsed = self.elapsed();
        if elapsed > Duration::from_millis(self.config.max_elapsed_time_ms) {
            tracing::debug!(
                elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "backoff budget exhausted"
            );
            return None;
        }

        let interval = self.current_interval_ms.min(max_ms(&self.config));
        let jittered = randomize(interval, self.config.randomization_factor);
        self.grow();
        Some(from_millis_f64(jittered))
    }

    fn reset(&mut self) {
        self.current_interval_ms = initial_ms(&self.config);
        self.started_at = self.clock.now();
    }
}

/// Backoff shared by several retry loops, serialized behind one lock.
pub struct SynchronizedBackOff<B> {
    inner: Mutex<B>,
}

impl<B: BackOff> SynchronizedBackOff<B> {
    /// Wrap `inner` for shared use.
    pub fn new(inner: B) -> Self {
        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Next interval, or `None` when retrying should stop.
    pub fn next_back_off(&self) -> Option<Duration> {
        self.inner.lock().next_back_off()
    }

    /// Start over from the initial interval.
    pub fn reset(&self) {
        self.inner.lock().reset();
    }

    /// Unwrap the inner backoff.
    pub fn into_inner(self) -> B {
        self.inner.into_inner()
    }
}

impl<B: BackOff> BackOff for SynchronizedBackOff<B> {
    fn next_back_off(&mut self) -> Option<Duration> {
        self.inner.get_mut().next_back_off()
    }

    fn reset(&mut self) {
        self.inner.get_mut().reset();
    }
}

/// Run `op` until it succeeds or `backoff` says to stop, sleeping the
/// current thread between attempts. Returns the last error on exhaustion.
///
/// # Errors
///
/// Returns the error from the final attempt once the backoff is exhausted.
pub fn retry<T, E, B, F>(backoff: &mut B, mut op: F) -> Result<T, E>
where
    B: BackOff,
    F: FnMut() -> Result<T, E>,
    E: std::fmt::Display,
{
    backoff.reset();
    let mut attempt: u32 = 0;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt = attempt.saturating_add(1);
                let Some(delay) = backoff.next_back_off() else {
                    tracing::warn!(attempt = attempt, error = %e, "giving up after backoff exhausted");
                    return Err(e);
                };
                tracing::debug!(
                    attempt = attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "retrying after backoff"
                );
                thread::sleep(delay);
            }
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn initial_ms(config: &BackoffConfig) -> f64 {
    config.initial_interval_ms as f64
}

#[allow(clippy::cast_precision_loss)]
fn max_ms(config: &BackoffConfig) -> f64 {
    config.max_interval_ms as f64
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn from_millis_f64(ms: f64) -> Duration {
    Duration::from_nanos((ms.max(0.0) * 1_000_000.0).round() as u64)
}

/// Random value in `[interval - factor * interval, interval + factor * interval]`.
fn randomize(interval_ms: f64, factor: f64) -> f64 {
    if factor <= 0.0 {
        return interval_ms;
    }
    let delta = factor * interval_ms;
    rand::rng().random_range((interval_ms - delta)..=(interval_ms + delta))
}
