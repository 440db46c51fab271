//! Start/stop state machine shared by every long-lived component.
//!
//! A component moves `NotStarted → Started → Stopped`, each step at most once.
//! [`Lifecycle`] owns that state and runs the component's setup and teardown
//! hooks around the transitions; [`LifecycleGroup`] starts a set of
//! components in order and stops them in reverse, isolating failures.

use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::core::guard::run_guarded_fallible;
use crate::core::{AppResult, SharedReportSink, ToolkitError};

/// Lifecycle position of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed, `start` not yet called.
    NotStarted,
    /// `start` has been called (whether or not setup succeeded).
    Started,
    /// `stop` has run.
    Stopped,
}

impl LifecycleState {
    /// Transition for `start`: only legal from `NotStarted`.
    ///
    /// # Errors
    ///
    /// Returns `ToolkitError::IllegalState` from any other state.
    pub fn on_start(self) -> Result<Self, ToolkitError> {
        match self {
            Self::NotStarted => Ok(Self::Started),
            other => Err(ToolkitError::IllegalState(format!(
                "start called while {other}"
            ))),
        }
    }

    /// Transition for `stop`; the flag says whether teardown must run.
    #[must_use]
    pub const fn on_stop(self) -> (Self, bool) {
        match self {
            Self::Started => (Self::Stopped, true),
            Self::NotStarted => (Self::NotStarted, false),
            Self::Stopped => (Self::Stopped, false),
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::Started => write!(f, "started"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Lifecycle state of one named component.
#[derive(Debug)]
pub struct Lifecycle {
    name: String,
    state: Mutex<LifecycleState>,
}

impl Lifecycle {
    /// New lifecycle in `NotStarted`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(LifecycleState::NotStarted),
        }
    }

    /// Component name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state.
    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Whether the component is started and not yet stopped.
    pub fn is_started(&self) -> bool {
        self.state() == LifecycleState::Started
    }

    /// Move to `Started`, then run `setup`.
    ///
    /// The transition happens before `setup`, so a failed setup still counts
    /// as the one permitted start.
    ///
    /// # Errors
    ///
    /// Returns `ToolkitError::IllegalState` on a second call, or whatever
    /// `setup` returns.
    pub fn start<F>(&self, setup: F) -> AppResult<()>
    where
        F: FnOnce() -> AppResult<()>,
    {
        {
            let mut state = self.state.lock();
            *state = state.on_start()?;
        }
        debug!(component = %self.name, "starting");
        setup().with_context(|| format!("failed to start `{}`", self.name))?;
        info!(component = %self.name, "started");
        Ok(())
    }

    /// Move to `Stopped` and run `teardown`, only if currently started.
    ///
    /// # Errors
    ///
    /// Returns whatever `teardown` returns.
    pub fn stop<F>(&self, teardown: F) -> AppResult<()>
    where
        F: FnOnce() -> AppResult<()>,
    {
        let run_teardown = {
            let mut state = self.state.lock();
            let (next, run) = state.on_stop();
            *state = next;
            run
        };
        if !run_teardown {
            return Ok(());
        }
        teardown().with_context(|| format!("failed to stop `{}`", self.name))?;
        info!(component = %self.name, "stopped");
        Ok(())
    }
}

/// A component with a managed lifecycle.
pub trait Service: Send + Sync {
    /// Name used in logs and failure reports.
    fn name(&self) -> &str;

    /// Start the component; fails if already started.
    ///
    /// # Errors
    ///
    /// Returns an error when started twice or when setup fails.
    fn start(&self) -> AppResult<()>;

    /// Stop the component; a no-op unless started.
    ///
    /// # Errors
    ///
    /// Returns an error when teardown fails.
    fn stop(&self) -> AppResult<()>;
}

/// Ordered set of services started together and stopped in reverse.
pub struct LifecycleGroup {
    services: Vec<Arc<dyn Service>>,
    sink: SharedReportSink,
}

impl LifecycleGroup {
    /// Empty group reporting teardown failures to `sink`.
    pub fn new(sink: SharedReportSink) -> Self {
        Self {
            services: Vec::new(),
            sink,
        }
    }

    /// Append a service; it starts after every service already present.
    pub fn push(&mut self, service: Arc<dyn Service>) {
        self.services.push(service);
    }

    /// Number of services in the group.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Whether the group is empty.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Start every service in insertion order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns the first start failure. Services started before it stay
    /// started; call [`stop_all`](Self::stop_all) to unwind.
    pub fn start_all(&self) -> AppResult<()> {
        for service in &self.services {
            service
                .start()
                .with_context(|| format!("service `{}` failed to start", service.name()))?;
        }
        Ok(())
    }

    /// Stop every service in reverse order.
    ///
    /// A failing (or panicking) teardown is reported and does not prevent
    /// the remaining services from stopping. Returns the names of the
    /// services whose teardown failed.
    pub fn stop_all(&self) -> Vec<String> {
        let mut failed = Vec::new();
        for service in self.services.iter().rev() {
            let description = format!("stop `{}`", service.name());
            if !run_guarded_fallible(self.sink.as_ref(), &description, || service.stop()) {
                warn!(service = service.name(), "service failed to stop cleanly");
                failed.push(service.name().to_string());
            }
        }
        failed
    }
}
