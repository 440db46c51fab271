//! Factory for named, started executors.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::Context;
use parking_lot::Mutex;
use tracing::debug;

use crate::config::{ExecutorConfig, DEFAULT_SHUTDOWN_GRACE_MS};
use crate::core::{AppResult, SchedulingExecutor, SharedReportSink};

/// Creates started executors whose worker threads are named `<label>-<n>`.
///
/// Counters are per label and per factory; two factories may hand out the
/// same thread name.
pub struct ExecutorFactory {
    sink: SharedReportSink,
    shutdown_grace: Duration,
    counters: Mutex<HashMap<String, u64>>,
}

impl ExecutorFactory {
    /// Factory whose executors report to `sink` and use the default grace.
    pub fn new(sink: SharedReportSink) -> Self {
        Self {
            sink,
            shutdown_grace: Duration::from_millis(DEFAULT_SHUTDOWN_GRACE_MS),
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Take the shutdown grace from an executor configuration. The
    /// configured thread name is ignored; labels come from [`create`](Self::create).
    ///
    /// # Errors
    ///
    /// Returns the validation message if `config` is invalid.
    pub fn from_config(config: &ExecutorConfig, sink: SharedReportSink) -> Result<Self, String> {
        config.validate()?;
        Ok(Self::new(sink).with_shutdown_grace(config.shutdown_grace()))
    }

    /// Override the shutdown grace of executors created afterwards.
    #[must_use]
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Create and start an executor for `label`.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned.
    pub fn create(&self, label: &str) -> AppResult<SchedulingExecutor> {
        let thread_name = {
            let mut counters = self.counters.lock();
            let counter = counters.entry(label.to_string()).or_insert(0);
            *counter += 1;
            format!("{label}-{counter}")
        };
        debug!(thread = %thread_name, "creating executor");
        let config = ExecutorConfig::new(thread_name.clone()).with_shutdown_grace(self.shutdown_grace);
        SchedulingExecutor::started(config, self.sink.clone())
            .with_context(|| format!("failed to create executor `{thread_name}`"))
    }

    /// Number of executors created so far for `label`.
    pub fn created(&self, label: &str) -> u64 {
        self.counters.lock().get(label).copied().unwrap_or(0)
    }
}
