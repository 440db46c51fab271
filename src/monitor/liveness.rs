//! Heartbeat silence detection.
//!
//! A [`LivenessChecker`] records every arrival from a data source. A periodic
//! check, running every `threshold` on the supplied executor, declares the
//! source missing once no arrival has been seen for longer than `threshold`.
//! The next arrival after that is reported as a recovery.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::LivenessConfig;
use crate::core::guard::run_guarded;
use crate::core::{
    AppResult, Cancellable, Lifecycle, ScheduleHandle, SchedulingExecutor, Service, ToolkitError,
};
use crate::util::clock::{plus, SharedClock};

/// Number of arrivals kept for the missing-data report.
pub const HISTORY_CAPACITY: usize = 20;

/// A payload and the instant it arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampedRecord<T> {
    /// Arrival instant.
    pub timestamp: DateTime<Local>,
    /// Payload as received.
    pub payload: T,
}

type MissingHandler<T> = Box<dyn Fn(Vec<TimestampedRecord<T>>) + Send + Sync>;
type RecoveryHandler<T> =
    Box<dyn Fn(Option<TimestampedRecord<T>>, TimestampedRecord<T>) + Send + Sync>;

/// State change awaiting its handler.
enum Transition<T> {
    Missing(Vec<TimestampedRecord<T>>),
    Recovered(Option<TimestampedRecord<T>>, TimestampedRecord<T>),
}

struct LivenessState<T> {
    last_arrival: Option<DateTime<Local>>,
    history: VecDeque<TimestampedRecord<T>>,
    // Queued in the order the transitions happened; one thread drains at a time.
    transitions: VecDeque<Transition<T>>,
    dispatching: bool,
}

struct Shared<T> {
    name: String,
    threshold: Duration,
    clock: SharedClock,
    executor: SchedulingExecutor,
    on_missing: MissingHandler<T>,
    on_recovered: RecoveryHandler<T>,
    state: Mutex<LivenessState<T>>,
}

/// Detects when a data source stops reporting.
///
/// Handlers are invoked outside the internal lock, one at a time and in the
/// order the transitions happened. A transition raised while another thread
/// is running a handler is handed to that thread, so the caller may return
/// before its handler has run. Handlers are guarded: a panicking handler is
/// reported to the executor's sink.
pub struct LivenessChecker<T> {
    shared: Arc<Shared<T>>,
    lifecycle: Lifecycle,
    check: Mutex<Option<ScheduleHandle>>,
}

impl<T> LivenessChecker<T>
where
    T: Clone + Send + 'static,
{
    /// Checker for the source called `name`.
    ///
    /// `on_missing` receives a snapshot of the recent history when the
    /// source goes silent. `on_recovered` receives the most recent record
    /// before the silence (if any) and the record that ended it.
    ///
    /// # Errors
    ///
    /// Returns `ToolkitError::InvalidArgument` for a zero threshold.
    pub fn new<M, R>(
        name: impl Into<String>,
        executor: SchedulingExecutor,
        clock: SharedClock,
        threshold: Duration,
        on_missing: M,
        on_recovered: R,
    ) -> Result<Self, ToolkitError>
    where
        M: Fn(Vec<TimestampedRecord<T>>) + Send + Sync + 'static,
        R: Fn(Option<TimestampedRecord<T>>, TimestampedRecord<T>) + Send + Sync + 'static,
    {
        if threshold.is_zero() {
            return Err(ToolkitError::InvalidArgument(
                "liveness threshold must be greater than zero".into(),
            ));
        }
        let name = name.into();
        let created_at = clock.now();
        Ok(Self {
            lifecycle: Lifecycle::new(format!("liveness `{name}`")),
            shared: Arc::new(Shared {
                name,
                threshold,
                clock,
                executor,
                on_missing: Box::new(on_missing),
                on_recovered: Box::new(on_recovered),
                state: Mutex::new(LivenessState {
                    last_arrival: Some(created_at),
                    history: VecDeque::with_capacity(HISTORY_CAPACITY),
                    transitions: VecDeque::new(),
                    dispatching: false,
                }),
            }),
            check: Mutex::new(None),
        })
    }

    /// Build from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ToolkitError::InvalidArgument` if the configuration is invalid.
    pub fn from_config<M, R>(
        name: impl Into<String>,
        executor: SchedulingExecutor,
        clock: SharedClock,
        config: &LivenessConfig,
        on_missing: M,
        on_recovered: R,
    ) -> Result<Self, ToolkitError>
    where
        M: Fn(Vec<TimestampedRecord<T>>) + Send + Sync + 'static,
        R: Fn(Option<TimestampedRecord<T>>, TimestampedRecord<T>) + Send + Sync + 'static,
    {
        config.validate().map_err(ToolkitError::InvalidArgument)?;
        Self::new(
            name,
            executor,
            clock,
            config.threshold(),
            on_missing,
            on_recovered,
        )
    }

    /// Record an arrival.
    pub fn accept(&self, payload: T) {
        self.shared.accept(payload);
    }

    /// Run one silence check now. Returns `true` if this call declared the
    /// source missing.
    pub fn check_now(&self) -> bool {
        self.shared.check()
    }

    /// Recent arrivals, oldest first.
    pub fn history(&self) -> Vec<TimestampedRecord<T>> {
        self.shared.state.lock().history.iter().cloned().collect()
    }

    /// Whether the source is currently considered missing.
    pub fn is_missing(&self) -> bool {
        self.shared.state.lock().last_arrival.is_none()
    }

    /// Silence threshold.
    pub fn threshold(&self) -> Duration {
        self.shared.threshold
    }
}

impl<T> Shared<T>
where
    T: Clone + Send + 'static,
{
    fn accept(&self, payload: T) {
        {
            let mut state = self.state.lock();
            let record = TimestampedRecord {
                timestamp: self.clock.now(),
                payload,
            };
            let prior = state.history.back().cloned();
            let was_missing = state.last_arrival.is_none();
            state.last_arrival = Some(record.timestamp);
            if state.history.len() == HISTORY_CAPACITY {
                state.history.pop_front();
            }
            state.history.push_back(record.clone());
            if !was_missing {
                return;
            }
            info!(source = %self.name, at = %record.timestamp, "data source recovered");
            state
                .transitions
                .push_back(Transition::Recovered(prior, record));
        }
        self.dispatch();
    }

    fn check(&self) -> bool {
        {
            let mut state = self.state.lock();
            let Some(last) = state.last_arrival else {
                return false;
            };
            if plus(last, self.threshold) >= self.clock.now() {
                return false;
            }
            state.last_arrival = None;
            let snapshot: Vec<_> = state.history.iter().cloned().collect();
            warn!(
                source = %self.name,
                threshold_ms = self.threshold.as_millis(),
                records = snapshot.len(),
                "data source went silent"
            );
            state.transitions.push_back(Transition::Missing(snapshot));
        }
        self.dispatch();
        true
    }

    /// Run queued handlers unless another thread is already doing so.
    fn dispatch(&self) {
        {
            let mut state = self.state.lock();
            if state.dispatching {
                return;
            }
            state.dispatching = true;
        }
        loop {
            let next = {
                let mut state = self.state.lock();
                let next = state.transitions.pop_front();
                if next.is_none() {
                    state.dispatching = false;
                }
                next
            };
            let sink = self.executor.report_sink().as_ref();
            match next {
                None => return,
                Some(Transition::Missing(snapshot)) => {
                    run_guarded(sink, "liveness missing-data handler", || {
                        (self.on_missing)(snapshot);
                    });
                }
                Some(Transition::Recovered(prior, record)) => {
                    run_guarded(sink, "liveness recovery handler", || {
                        (self.on_recovered)(prior, record);
                    });
                }
            }
        }
    }
}

impl<T> Service for LivenessChecker<T>
where
    T: Clone + Send + 'static,
{
    fn name(&self) -> &str {
        self.lifecycle.name()
    }

    fn start(&self) -> AppResult<()> {
        self.lifecycle.start(|| {
            let weak: Weak<Shared<T>> = Arc::downgrade(&self.shared);
            let threshold = self.shared.threshold;
            let handle = self
                .shared
                .executor
                .schedule_at_fixed_rate(threshold, threshold, move || {
                    if let Some(shared) = weak.upgrade() {
                        shared.check();
                    }
                })?;
            *self.check.lock() = Some(handle);
            Ok(())
        })
    }

    fn stop(&self) -> AppResult<()> {
        self.lifecycle.stop(|| {
            if let Some(handle) = self.check.lock().take() {
                handle.close();
            }
            Ok(())
        })
    }
}
