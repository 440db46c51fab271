//! Error types for toolkit operations.

use thiserror::Error;

/// Usage errors reported synchronously to the caller.
///
/// Failures inside submitted work never surface here; they are reported
/// through a [`ReportSink`](crate::core::ReportSink) and discarded.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolkitError {
    /// Operation not permitted in the component's current lifecycle state.
    #[error("illegal state: {0}")]
    IllegalState(String),
    /// The same callback instance was registered twice.
    #[error("listener already registered")]
    DuplicateListener,
    /// An argument failed validation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Work was submitted to an executor that is not running.
    #[error("executor `{0}` is not running")]
    ExecutorNotRunning(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
