//! Report sinks for errors swallowed by task guards.
//!
//! A failing task never propagates past the executor; instead the failure is
//! handed to a [`ReportSink`]. Production code logs through `tracing`, tests
//! capture reports in memory.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Local};
use parking_lot::Mutex;

/// A single reported failure.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    /// What was running when the failure happened.
    pub context: String,
    /// Rendered error or panic message.
    pub message: String,
    /// When the failure was reported.
    pub reported_at: DateTime<Local>,
}

/// Side channel receiving failures from guarded work.
pub trait ReportSink: Send + Sync {
    /// Record a failure of `context` with the rendered `message`.
    fn report(&self, context: &str, message: &str);
}

/// Shared, dynamically dispatched report sink.
pub type SharedReportSink = Arc<dyn ReportSink>;

/// Sink that logs every report at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReportSink;

impl TracingReportSink {
    /// Shared tracing sink.
    #[must_use]
    pub fn shared() -> SharedReportSink {
        Arc::new(Self)
    }
}

impl ReportSink for TracingReportSink {
    fn report(&self, context: &str, message: &str) {
        tracing::error!(context = context, error = message, "task failed");
    }
}

/// In-memory sink with a bounded buffer, for tests and diagnostics.
pub struct InMemoryReportSink {
    reports: Mutex<VecDeque<ErrorReport>>,
    max_reports: usize,
}

impl InMemoryReportSink {
    /// Create a new in-memory sink keeping at most `max_reports` entries.
    #[must_use]
    pub fn new(max_reports: usize) -> Self {
        Self {
            reports: Mutex::new(VecDeque::with_capacity(max_reports)),
            max_reports,
        }
    }

    /// Snapshot of stored reports, oldest first.
    pub fn reports(&self) -> Vec<ErrorReport> {
        self.reports.lock().iter().cloned().collect()
    }

    /// Number of stored reports.
    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    /// Whether nothing has been reported.
    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }
}

impl ReportSink for InMemoryReportSink {
    fn report(&self, context: &str, message: &str) {
        let mut reports = self.reports.lock();
        if self.max_reports == 0 {
            return;
        }
        if reports.len() >= self.max_reports {
            reports.pop_front();
        }
        reports.push_back(build_report(context, message));
    }
}

/// Helper to build a report stamped with the current time.
pub fn build_report(context: impl Into<String>, message: impl Into<String>) -> ErrorReport {
    ErrorReport {
        context: context.into(),
        message: message.into(),
        reported_at: Local::now(),
    }
}
