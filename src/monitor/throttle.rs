//! Leading-edge plus trailing-edge throttling of value streams.
//!
//! The first value of a burst is delivered at once and opens a window. Values
//! arriving inside the window only replace the pending value; when the window
//! closes, the latest pending value (if any) is delivered and a new window
//! opens. A quiet window ends throttling.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::config::ThrottleConfig;
use crate::core::guard::run_guarded;
use crate::core::{Cancellable, ScheduleHandle, SchedulingExecutor, ToolkitError};

struct ThrottleState<T> {
    throttling: bool,
    pending: Option<T>,
    timer: Option<ScheduleHandle>,
    closed: bool,
}

struct Shared<T> {
    executor: SchedulingExecutor,
    window: Duration,
    delegate: Box<dyn Fn(T) + Send + Sync>,
    state: Mutex<ThrottleState<T>>,
}

/// Coalesces a value stream into at most one delivery per window edge.
///
/// The delegate runs while the consumer's lock is held and must not call
/// back into the same consumer.
pub struct ThrottlingConsumer<T> {
    shared: Arc<Shared<T>>,
}

impl<T> ThrottlingConsumer<T>
where
    T: Send + 'static,
{
    /// Throttle deliveries to `delegate`, timing windows on `executor`.
    ///
    /// # Errors
    ///
    /// Returns `ToolkitError::InvalidArgument` for a zero window.
    pub fn new<D>(
        executor: SchedulingExecutor,
        window: Duration,
        delegate: D,
    ) -> Result<Self, ToolkitError>
    where
        D: Fn(T) + Send + Sync + 'static,
    {
        if window.is_zero() {
            return Err(ToolkitError::InvalidArgument(
                "throttle window must be greater than zero".into(),
            ));
        }
        Ok(Self {
            shared: Arc::new(Shared {
                executor,
                window,
                delegate: Box::new(delegate),
                state: Mutex::new(ThrottleState {
                    throttling: false,
                    pending: None,
                    timer: None,
                    closed: false,
                }),
            }),
        })
    }

    /// Build from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ToolkitError::InvalidArgument` if the configuration is invalid.
    pub fn from_config<D>(
        executor: SchedulingExecutor,
        config: &ThrottleConfig,
        delegate: D,
    ) -> Result<Self, ToolkitError>
    where
        D: Fn(T) + Send + Sync + 'static,
    {
        config.validate().map_err(ToolkitError::InvalidArgument)?;
        Self::new(executor, config.window(), delegate)
    }

    /// Offer a value: delivered now if no window is open, otherwise kept as
    /// the pending value for the end of the window.
    pub fn accept(&self, value: T) {
        let mut state = self.shared.state.lock();
        if state.closed {
            trace!("throttle closed, ignoring value");
            return;
        }
        if state.throttling {
            state.pending = Some(value);
            return;
        }
        self.shared.deliver(value);
        state.throttling = true;
        Shared::arm(&self.shared, &mut state);
    }

    /// Whether a window is currently open.
    pub fn is_throttling(&self) -> bool {
        self.shared.state.lock().throttling
    }

    /// Stop accepting values and cancel the live window timer.
    pub fn close(&self) {
        let timer = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.throttling = false;
            state.pending = None;
            state.timer.take()
        };
        if let Some(timer) = timer {
            timer.close();
        }
    }
}

impl<T> Shared<T>
where
    T: Send + 'static,
{
    fn deliver(&self, value: T) {
        run_guarded(
            self.executor.report_sink().as_ref(),
            "throttled delivery",
            || (self.delegate)(value),
        );
    }

    fn arm(this: &Arc<Self>, state: &mut ThrottleState<T>) {
        let weak: Weak<Self> = Arc::downgrade(this);
        match this.executor.schedule(this.window, move || {
            if let Some(shared) = weak.upgrade() {
                Self::on_window_elapsed(&shared);
            }
        }) {
            Ok(timer) => state.timer = Some(timer),
            Err(e) => {
                warn!(error = %e, "cannot arm throttle window, delivering unthrottled");
                state.throttling = false;
                state.timer = None;
            }
        }
    }

    fn on_window_elapsed(this: &Arc<Self>) {
        let mut state = this.state.lock();
        if state.closed {
            return;
        }
        state.timer = None;
        if let Some(value) = state.pending.take() {
            this.deliver(value);
            Self::arm(this, &mut state);
        } else {
            state.throttling = false;
        }
    }
}
