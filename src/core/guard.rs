//! Task guards: wrappers that never let a failure escape.
//!
//! Every unit of work the executor runs goes through [`run_guarded`] or
//! [`run_guarded_fallible`]. A panic, or an `Err` from a fallible task, is
//! rendered and handed to the [`ReportSink`]; the caller sees only whether the
//! task succeeded. One misbehaving connector callback therefore cannot take
//! down the worker it shares with others.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use parking_lot::Mutex;

use crate::core::{ReportSink, SharedReportSink};
use crate::policy::ThresholdGate;

/// Wrap `task` so that a panic is reported to `sink` instead of unwinding.
pub fn guard<F>(
    sink: SharedReportSink,
    description: impl Into<String>,
    task: F,
) -> impl FnOnce() + Send + 'static
where
    F: FnOnce() + Send + 'static,
{
    let description = description.into();
    move || {
        run_guarded(sink.as_ref(), &description, task);
    }
}

/// Wrap a fallible `task` so that an `Err` or a panic is reported to `sink`.
pub fn guard_fallible<F>(
    sink: SharedReportSink,
    description: impl Into<String>,
    task: F,
) -> impl FnOnce() + Send + 'static
where
    F: FnOnce() -> anyhow::Result<()> + Send + 'static,
{
    let description = description.into();
    move || {
        run_guarded_fallible(sink.as_ref(), &description, task);
    }
}

/// Run `task` now, reporting a panic. Returns whether it completed.
pub fn run_guarded<F>(sink: &dyn ReportSink, description: &str, task: F) -> bool
where
    F: FnOnce(),
{
    match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(()) => true,
        Err(payload) => {
            sink.report(description, &panic_message(payload.as_ref()));
            false
        }
    }
}

/// Run a fallible `task` now, reporting an `Err` or a panic. Returns whether
/// it succeeded.
pub fn run_guarded_fallible<F>(sink: &dyn ReportSink, description: &str, task: F) -> bool
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match outcome_of(task) {
        Ok(()) => true,
        Err(message) => {
            sink.report(description, &message);
            false
        }
    }
}

/// Run a fallible task, folding panics and errors into one rendered message.
fn outcome_of<F>(task: F) -> Result<(), String>
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(format!("{e:#}")),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

/// Render a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked with a non-string payload".to_string()
    }
}

type ReportGate = ThresholdGate<String, Box<dyn FnMut(String) + Send>>;

/// Repeating fallible task that reports only persistent failures.
///
/// Consecutive failures feed a [`ThresholdGate`]; the failure that crosses
/// the threshold is reported once. Any success resets the count. With a
/// threshold of 2, three failures in a row report once, while
/// fail, fail, succeed, fail reports nothing.
pub struct ThresholdErrorReporter<F> {
    description: String,
    task: F,
    gate: Mutex<ReportGate>,
}

impl<F> ThresholdErrorReporter<F>
where
    F: Fn() -> anyhow::Result<()> + Send + Sync,
{
    /// Wrap `task`, reporting to `sink` after `threshold` quiet failures.
    pub fn new(
        sink: SharedReportSink,
        description: impl Into<String>,
        threshold: u32,
        task: F,
    ) -> Self {
        let description = description.into();
        let context = description.clone();
        let delegate: Box<dyn FnMut(String) + Send> =
            Box::new(move |message: String| sink.report(&context, &message));
        Self {
            description,
            task,
            gate: Mutex::new(ThresholdGate::new(threshold, delegate)),
        }
    }

    /// Run the task once. Returns whether it succeeded.
    pub fn run(&self) -> bool {
        match outcome_of(&self.task) {
            Ok(()) => {
                self.gate.lock().reset();
                true
            }
            Err(message) => {
                let mut gate = self.gate.lock();
                if !gate.accept(message) {
                    tracing::debug!(
                        task = %self.description,
                        consecutive_failures = gate.count(),
                        "suppressed task failure"
                    );
                }
                false
            }
        }
    }

    /// Consecutive failures since the last success.
    pub fn consecutive_failures(&self) -> u64 {
        self.gate.lock().count()
    }
}

impl<F> ThresholdErrorReporter<F>
where
    F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
{
    /// Turn the reporter into a repeatable task for the executor.
    pub fn into_task(self) -> impl Fn() + Send + Sync + 'static {
        move || {
            self.run();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::InMemoryReportSink;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_run_guarded_reports_panic() {
        let sink = InMemoryReportSink::new(8);
        let ok = run_guarded(&sink, "explode", || panic!("boom"));
        assert!(!ok);
        let reports = sink.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].context, "explode");
        assert!(reports[0].message.contains("boom"));
    }

    #[test]
    fn test_run_guarded_fallible_reports_error_chain() {
        let sink = InMemoryReportSink::new(8);
        let ok = run_guarded_fallible(&sink, "refresh", || {
            Err(anyhow::anyhow!("socket closed").context("refresh token"))
        });
        assert!(!ok);
        assert_eq!(sink.reports()[0].message, "refresh token: socket closed");
    }

    #[test]
    fn test_guard_swallows_panic() {
        let sink = Arc::new(InMemoryReportSink::new(8));
        let task = guard(sink.clone(), "wrapped", || panic!("nope"));
        task();
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_threshold_reporter_reports_third_consecutive_failure() {
        let sink = Arc::new(InMemoryReportSink::new(8));
        let reporter =
            ThresholdErrorReporter::new(sink.clone(), "poll", 2, || anyhow::bail!("offline"));

        reporter.run();
        reporter.run();
        assert!(sink.is_empty());
        reporter.run();
        assert_eq!(sink.len(), 1);
        reporter.run();
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_threshold_reporter_success_resets_count() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let sink = Arc::new(InMemoryReportSink::new(8));
        let reporter = ThresholdErrorReporter::new(sink.clone(), "poll", 2, move || {
            let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if call == 3 {
                Ok(())
            } else {
                anyhow::bail!("offline")
            }
        });

        for _ in 0..4 {
            reporter.run();
        }
        assert!(sink.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(reporter.consecutive_failures(), 1);
    }
}
