//! Calendar-anchored recurring jobs.
//!
//! [`JobScheduler::monthly`] runs a task at 03:00 local time on a fixed day of
//! every month. Each run first arms the next occurrence, then executes the
//! guarded task, so a failing job still fires next month. Days past the end
//! of a short month (31 in April, 30 in February) run on that month's last
//! day.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, TimeDelta, TimeZone};
use parking_lot::Mutex;
use tracing::{error, info};

use crate::core::guard::run_guarded_fallible;
use crate::core::{AppResult, Cancellable, ScheduleHandle, SchedulingExecutor, ToolkitError};
use crate::util::clock::{elapsed_between, SharedClock};

/// Hour of day (local time) at which monthly jobs run.
pub const JOB_TIME_OF_DAY_HOUR: u32 = 3;

type JobTask = Arc<dyn Fn() -> AppResult<()> + Send + Sync>;

/// Schedules recurring jobs on a [`SchedulingExecutor`].
#[derive(Clone)]
pub struct JobScheduler {
    executor: SchedulingExecutor,
    clock: SharedClock,
}

struct JobSlot {
    pending: Option<ScheduleHandle>,
    next_run: Option<DateTime<Local>>,
    closed: bool,
}

struct MonthlyJob {
    name: String,
    day_of_month: u32,
    task: JobTask,
    executor: SchedulingExecutor,
    clock: SharedClock,
    slot: Mutex<JobSlot>,
}

/// Handle to a recurring job. Closing cancels the pending occurrence but
/// not a run already in progress.
#[derive(Clone)]
pub struct JobHandle {
    job: Arc<MonthlyJob>,
}

impl JobScheduler {
    /// Scheduler running jobs on `executor`, reading wall time from `clock`.
    pub fn new(executor: SchedulingExecutor, clock: SharedClock) -> Self {
        Self { executor, clock }
    }

    /// Run `task` at 03:00 local time on `day_of_month` every month.
    ///
    /// # Errors
    ///
    /// Returns `ToolkitError::InvalidArgument` for a day outside `1..=31`,
    /// or `ToolkitError::ExecutorNotRunning` if the executor is not started.
    pub fn monthly<F>(
        &self,
        job_name: impl Into<String>,
        day_of_month: u32,
        task: F,
    ) -> Result<JobHandle, ToolkitError>
    where
        F: Fn() -> AppResult<()> + Send + Sync + 'static,
    {
        if !(1..=31).contains(&day_of_month) {
            return Err(ToolkitError::InvalidArgument(format!(
                "day_of_month must be in 1..=31, got {day_of_month}"
            )));
        }
        let job = Arc::new(MonthlyJob {
            name: job_name.into(),
            day_of_month,
            task: Arc::new(task),
            executor: self.executor.clone(),
            clock: Arc::clone(&self.clock),
            slot: Mutex::new(JobSlot {
                pending: None,
                next_run: None,
                closed: false,
            }),
        });
        arm(&job, self.clock.now())?;
        Ok(JobHandle { job })
    }
}

impl JobHandle {
    /// Job name.
    pub fn name(&self) -> &str {
        &self.job.name
    }

    /// Instant of the pending occurrence, if any.
    pub fn next_run(&self) -> Option<DateTime<Local>> {
        self.job.slot.lock().next_run
    }
}

impl Cancellable for JobHandle {
    fn close(&self) {
        let pending = {
            let mut slot = self.job.slot.lock();
            if slot.closed {
                return;
            }
            slot.closed = true;
            slot.next_run = None;
            slot.pending.take()
        };
        if let Some(handle) = pending {
            handle.close();
        }
        info!(job = %self.job.name, "monthly job cancelled");
    }

    fn is_closed(&self) -> bool {
        self.job.slot.lock().closed
    }
}

/// Schedule the first occurrence strictly after `after`.
fn arm(job: &Arc<MonthlyJob>, after: DateTime<Local>) -> Result<(), ToolkitError> {
    let mut slot = job.slot.lock();
    if slot.closed {
        return Ok(());
    }
    let next = next_local_occurrence(after, job.day_of_month)?;
    let delay = elapsed_between(job.clock.now(), next);
    let firing = Arc::clone(job);
    let handle = job
        .executor
        .schedule(delay, move || fire(&firing, next))?;
    slot.pending = Some(handle);
    slot.next_run = Some(next);
    info!(job = %job.name, next_run = %next, "scheduled monthly job");
    Ok(())
}

fn fire(job: &Arc<MonthlyJob>, scheduled_for: DateTime<Local>) {
    // Wall time may lag the timer slightly; never re-arm the same occurrence.
    let after = job.clock.now().max(scheduled_for);
    if let Err(e) = arm(job, after) {
        error!(job = %job.name, error = %e, "failed to reschedule monthly job");
    }
    let description = format!("job `{}`", job.name);
    let task = Arc::clone(&job.task);
    run_guarded_fallible(job.executor.report_sink().as_ref(), &description, move || {
        task()
    });
}

fn next_local_occurrence(
    after: DateTime<Local>,
    day_of_month: u32,
) -> Result<DateTime<Local>, ToolkitError> {
    let mut cursor = after.naive_local();
    // A DST gap can swallow 03:00; look at the following month then.
    for _ in 0..3 {
        let naive = next_monthly_occurrence(cursor, day_of_month).ok_or_else(|| {
            ToolkitError::InvalidArgument(format!("no occurrence of day {day_of_month}"))
        })?;
        if let Some(local) = to_local(naive) {
            if local > after {
                return Ok(local);
            }
        }
        cursor = naive;
    }
    Err(ToolkitError::InvalidArgument(format!(
        "no representable local occurrence of day {day_of_month}"
    )))
}

fn to_local(naive: NaiveDateTime) -> Option<DateTime<Local>> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            Local
                .from_local_datetime(&(naive + TimeDelta::hours(1)))
                .earliest()
        })
}

/// First 03:00 on `day_of_month` strictly after `after`, in naive local time.
///
/// Days beyond the end of a month are clamped to its last day.
pub fn next_monthly_occurrence(after: NaiveDateTime, day_of_month: u32) -> Option<NaiveDateTime> {
    let this_month = occurrence_in(after.year(), after.month(), day_of_month)?;
    if this_month > after {
        return Some(this_month);
    }
    let (year, month) = if after.month() == 12 {
        (after.year() + 1, 1)
    } else {
        (after.year(), after.month() + 1)
    };
    occurrence_in(year, month, day_of_month)
}

fn occurrence_in(year: i32, month: u32, day_of_month: u32) -> Option<NaiveDateTime> {
    let day = day_of_month.min(last_day_of_month(year, month)?);
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(JOB_TIME_OF_DAY_HOUR, 0, 0)
}

fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?
        .pred_opt()
        .map(|d| d.day())
}
