//! Core scheduling abstractions: lifecycle, guarded execution, handles.

pub mod error;
pub mod executor;
pub mod guard;
pub mod handle;
pub mod job_scheduler;
pub mod lifecycle;
pub mod report;

pub use error::{AppResult, ToolkitError};
pub use executor::SchedulingExecutor;
pub use guard::{
    guard, guard_fallible, run_guarded, run_guarded_fallible, ThresholdErrorReporter,
};
pub use handle::{Cancellable, ScheduleHandle};
pub use job_scheduler::{next_monthly_occurrence, JobHandle, JobScheduler, JOB_TIME_OF_DAY_HOUR};
pub use lifecycle::{Lifecycle, LifecycleGroup, LifecycleState, Service};
pub use report::{
    build_report, ErrorReport, InMemoryReportSink, ReportSink, SharedReportSink,
    TracingReportSink,
};
