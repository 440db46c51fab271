//! Single-worker scheduling executor.
//!
//! A [`SchedulingExecutor`] owns one dedicated OS thread (see
//! [`WorkerThread`]) and runs everything submitted to it on that thread,
//! strictly one task at a time:
//!
//! - [`execute`](SchedulingExecutor::execute) queues a task behind earlier submissions;
//! - [`schedule`](SchedulingExecutor::schedule) runs a task once after a delay;
//! - [`schedule_at_fixed_rate`](SchedulingExecutor::schedule_at_fixed_rate) runs a
//!   task periodically, rate-based rather than delay-based.
//!
//! Every task is guarded: a panic is reported through the executor's
//! [`ReportSink`](crate::core::ReportSink) and the worker moves on. Distinct
//! executors run independently of each other.
//!
//! # Example
//!
//! ```rust,ignore
//! use hearthkit::config::ExecutorConfig;
//! use hearthkit::core::{Cancellable, SchedulingExecutor, TracingReportSink};
//! use std::time::Duration;
//!
//! let executor = SchedulingExecutor::new(ExecutorConfig::new("plug-poller"), TracingReportSink::shared())?;
//! executor.start()?;
//!
//! let poll = executor.schedule_at_fixed_rate(Duration::ZERO, Duration::from_secs(30), || {
//!     // poll the device
//! })?;
//!
//! poll.close();
//! executor.close();
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::config::ExecutorConfig;
use crate::core::guard::run_guarded;
use crate::core::handle::HandleRegistry;
use crate::core::{
    AppResult, Lifecycle, ScheduleHandle, Service, SharedReportSink, ToolkitError,
};
use crate::runtime::{DrainOutcome, Job, WorkerThread};

/// Stand-in deadline for delays that overflow `Instant`, roughly 30 years.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Worker-side resources that exist only while the executor is started.
struct Running {
    jobs: UnboundedSender<Job>,
    runtime: Handle,
    worker: WorkerThread,
}

struct Inner {
    config: ExecutorConfig,
    lifecycle: Lifecycle,
    sink: SharedReportSink,
    running: Mutex<Option<Running>>,
    handles: Arc<HandleRegistry>,
}

/// Lifecycle-managed single logical worker for immediate, delayed and
/// periodic tasks. Cloning yields another handle to the same worker.
#[derive(Clone)]
pub struct SchedulingExecutor {
    inner: Arc<Inner>,
}

impl SchedulingExecutor {
    /// Create an executor; call [`start`](Self::start) before submitting work.
    ///
    /// # Errors
    ///
    /// Returns `ToolkitError::InvalidArgument` if the configuration is invalid.
    pub fn new(config: ExecutorConfig, sink: SharedReportSink) -> Result<Self, ToolkitError> {
        config.validate().map_err(ToolkitError::InvalidArgument)?;
        let lifecycle = Lifecycle::new(config.thread_name.clone());
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                lifecycle,
                sink,
                running: Mutex::new(None),
                handles: Arc::new(HandleRegistry::default()),
            }),
        })
    }

    /// Create and start an executor in one step.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the worker cannot
    /// be spawned.
    pub fn started(config: ExecutorConfig, sink: SharedReportSink) -> AppResult<Self> {
        let executor = Self::new(config, sink)?;
        executor.start()?;
        Ok(executor)
    }

    /// Worker thread name.
    pub fn name(&self) -> &str {
        &self.inner.config.thread_name
    }

    /// Whether the executor is started and not yet closed.
    pub fn is_running(&self) -> bool {
        self.inner.lifecycle.is_started()
    }

    /// Sink receiving failures of guarded tasks.
    pub fn report_sink(&self) -> &SharedReportSink {
        &self.inner.sink
    }

    /// Number of handles the executor still tracks for bulk cancellation.
    pub fn pending_handles(&self) -> usize {
        self.inner.handles.len()
    }

    /// Spawn the worker thread.
    ///
    /// # Errors
    ///
    /// Fails with `ToolkitError::IllegalState` if already started, or if the
    /// worker thread cannot be created.
    pub fn start(&self) -> AppResult<()> {
        self.inner.lifecycle.start(|| {
            let (jobs, receiver) = unbounded_channel();
            let worker = WorkerThread::spawn(&self.inner.config.thread_name, receiver)?;
            let runtime = worker.handle();
            *self.inner.running.lock() = Some(Running {
                jobs,
                runtime,
                worker,
            });
            Ok(())
        })
    }

    /// Queue `task` behind everything already submitted; returns immediately.
    ///
    /// # Errors
    ///
    /// Returns `ToolkitError::ExecutorNotRunning` if the executor is not started.
    pub fn execute<F>(&self, task: F) -> Result<(), ToolkitError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sink = Arc::clone(&self.inner.sink);
        let description = self.task_description();
        let job: Job = Box::new(move || {
            run_guarded(sink.as_ref(), &description, task);
        });

        let running = self.inner.running.lock();
        let Some(running) = running.as_ref() else {
            return Err(self.not_running());
        };
        running.jobs.send(job).map_err(|_| self.not_running())
    }

    /// Run `task` once after `delay`.
    ///
    /// Closing the returned handle before the delay elapses prevents the run.
    ///
    /// # Errors
    ///
    /// Returns `ToolkitError::ExecutorNotRunning` if the executor is not started.
    pub fn schedule<F>(&self, delay: Duration, task: F) -> Result<ScheduleHandle, ToolkitError>
    where
        F: FnOnce() + Send + 'static,
    {
        let runtime = self.runtime()?;
        let state = self.inner.handles.register();
        let timer_state = Arc::clone(&state);
        let registry = Arc::clone(&self.inner.handles);
        let sink = Arc::clone(&self.inner.sink);
        let description = self.task_description();

        let timer = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if timer_state.is_closed() {
                return;
            }
            registry.remove(timer_state.id());
            run_guarded(sink.as_ref(), &description, task);
        });
        state.set_abort(timer.abort_handle());

        debug!(
            executor = %self.name(),
            handle = state.id(),
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "scheduled one-shot task"
        );
        Ok(ScheduleHandle::new(state, &self.inner.handles))
    }

    /// Run `task` after `initial_delay`, then every `period`, regardless of
    /// how long each run takes. Runs that fall behind are caught up back to
    /// back.
    ///
    /// Closing the returned handle stops future runs; a run in progress
    /// completes.
    ///
    /// # Errors
    ///
    /// Returns `ToolkitError::InvalidArgument` for a zero `period`, or
    /// `ToolkitError::ExecutorNotRunning` if the executor is not started.
    pub fn schedule_at_fixed_rate<F>(
        &self,
        initial_delay: Duration,
        period: Duration,
        task: F,
    ) -> Result<ScheduleHandle, ToolkitError>
    where
        F: Fn() + Send + 'static,
    {
        if period.is_zero() {
            return Err(ToolkitError::InvalidArgument(
                "fixed-rate period must be greater than zero".into(),
            ));
        }
        let runtime = self.runtime()?;
        let state = self.inner.handles.register();
        let timer_state = Arc::clone(&state);
        let sink = Arc::clone(&self.inner.sink);
        let description = self.task_description();

        let timer = runtime.spawn(async move {
            let mut ticker = interval_at(first_tick(initial_delay), period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
            loop {
                ticker.tick().await;
                if timer_state.is_closed() {
                    break;
                }
                run_guarded(sink.as_ref(), &description, &task);
            }
        });
        state.set_abort(timer.abort_handle());

        debug!(
            executor = %self.name(),
            handle = state.id(),
            period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
            "scheduled fixed-rate task"
        );
        Ok(ScheduleHandle::new(state, &self.inner.handles))
    }

    /// Cancel every outstanding handle, then wait up to the grace period for
    /// queued work to drain. A worker that does not drain in time is
    /// detached with a warning. Safe to call repeatedly and before `start`.
    pub fn close(&self) {
        if let Err(e) = self.inner.lifecycle.stop(|| {
            self.shut_down();
            Ok(())
        }) {
            error!(executor = %self.name(), error = %e, "executor close failed");
        }
    }

    fn shut_down(&self) {
        let cancelled = self.inner.handles.cancel_all();
        let Some(running) = self.inner.running.lock().take() else {
            return;
        };
        let Running {
            jobs,
            runtime,
            worker,
        } = running;
        drop(jobs);
        drop(runtime);

        let grace = self.inner.config.shutdown_grace();
        let outcome = worker.join_within(grace);
        info!(
            executor = %self.name(),
            cancelled_handles = cancelled,
            drained = outcome == DrainOutcome::Drained,
            "executor shut down"
        );
    }

    fn runtime(&self) -> Result<Handle, ToolkitError> {
        self.inner
            .running
            .lock()
            .as_ref()
            .map(|running| running.runtime.clone())
            .ok_or_else(|| self.not_running())
    }

    fn not_running(&self) -> ToolkitError {
        ToolkitError::ExecutorNotRunning(self.name().to_string())
    }

    fn task_description(&self) -> String {
        format!("task on `{}`", self.name())
    }
}

/// First tick of a fixed-rate task, saturating instead of overflowing.
fn first_tick(initial_delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(initial_delay).unwrap_or_else(|| now + FAR_FUTURE)
}

impl Service for SchedulingExecutor {
    fn name(&self) -> &str {
        Self::name(self)
    }

    fn start(&self) -> AppResult<()> {
        Self::start(self)
    }

    fn stop(&self) -> AppResult<()> {
        self.close();
        Ok(())
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        // Signal shutdown but don't join: the last handle may be dropped on
        // the worker thread itself.
        if self.running.get_mut().take().is_some() {
            self.handles.cancel_all();
            debug!(
                executor = %self.config.thread_name,
                "executor dropped without close - worker detached"
            );
        }
    }
}
