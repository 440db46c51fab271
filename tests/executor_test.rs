//! Integration tests for the scheduling executor
//!
//! These tests run real worker threads and validate:
//! - Periodic tasks surviving failing tasks on the same executor
//! - Handle cancellation and bookkeeping
//! - Idempotent shutdown

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hearthkit::config::ExecutorConfig;
use hearthkit::core::{Cancellable, InMemoryReportSink, SchedulingExecutor, ToolkitError};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn started(name: &str) -> (SchedulingExecutor, Arc<InMemoryReportSink>) {
    let sink = Arc::new(InMemoryReportSink::new(16));
    let executor = SchedulingExecutor::started(
        ExecutorConfig::new(name).with_shutdown_grace(Duration::from_secs(2)),
        sink.clone(),
    )
    .unwrap();
    (executor, sink)
}

// ============================================================================
// FAILURE ISOLATION
// ============================================================================

#[test]
fn test_periodic_task_survives_panicking_task() {
    let (executor, sink) = started("survivor");
    let ticks = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&ticks);
    let periodic = executor
        .schedule_at_fixed_rate(Duration::ZERO, Duration::from_millis(20), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    assert!(wait_until(Duration::from_secs(2), || ticks.load(Ordering::SeqCst) >= 2));
    executor.execute(|| panic!("device exploded")).unwrap();
    assert!(wait_until(Duration::from_secs(2), || !sink.is_empty()));

    let after_panic = ticks.load(Ordering::SeqCst);
    assert!(wait_until(Duration::from_secs(2), || {
        ticks.load(Ordering::SeqCst) >= after_panic + 3
    }));

    let reports = sink.reports();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].message.contains("device exploded"));

    periodic.close();
    executor.close();
}

#[test]
fn test_panicking_one_shot_does_not_block_queue() {
    let (executor, sink) = started("one-shot-panic");
    let ran = Arc::new(AtomicU32::new(0));

    executor
        .schedule(Duration::from_millis(10), || panic!("timer failed"))
        .unwrap();
    let counter = Arc::clone(&ran);
    executor
        .schedule(Duration::from_millis(30), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    assert!(wait_until(Duration::from_secs(2), || ran.load(Ordering::SeqCst) == 1));
    assert_eq!(sink.len(), 1);
    executor.close();
}

// ============================================================================
// HANDLES AND BOOKKEEPING
// ============================================================================

#[test]
fn test_closed_handle_prevents_run() {
    let (executor, _sink) = started("cancel-one-shot");
    let ran = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&ran);
    let handle = executor
        .schedule(Duration::from_millis(50), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    handle.close();

    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert!(handle.is_closed());
    executor.close();
}

#[test]
fn test_one_shot_bookkeeping_removed_after_run() {
    let (executor, _sink) = started("bookkeeping");
    executor.schedule(Duration::from_millis(10), || {}).unwrap();
    assert!(wait_until(Duration::from_secs(2), || executor.pending_handles() == 0));
    executor.close();
}

#[test]
fn test_handle_close_is_idempotent() {
    let (executor, _sink) = started("idempotent-handles");
    let first = executor.schedule(Duration::from_secs(60), || {}).unwrap();
    let second = executor
        .schedule_at_fixed_rate(Duration::from_secs(60), Duration::from_secs(60), || {})
        .unwrap();
    assert_eq!(executor.pending_handles(), 2);

    first.close();
    first.close();
    assert_eq!(executor.pending_handles(), 1);

    second.close();
    second.close();
    assert_eq!(executor.pending_handles(), 0);
    executor.close();
}

// ============================================================================
// SHUTDOWN
// ============================================================================

#[test]
fn test_close_cancels_outstanding_handles() {
    let (executor, _sink) = started("close-cancels");
    let handle = executor.schedule(Duration::from_secs(60), || {}).unwrap();

    executor.close();
    executor.close();

    assert!(handle.is_closed());
    assert!(!executor.is_running());
    assert_eq!(executor.pending_handles(), 0);
    handle.close();
}

#[test]
fn test_close_drains_queued_work() {
    let (executor, _sink) = started("drain");
    let done = Arc::new(AtomicU32::new(0));
    for _ in 0..10 {
        let counter = Arc::clone(&done);
        executor
            .execute(move || {
                std::thread::sleep(Duration::from_millis(5));
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }

    executor.close();
    assert_eq!(done.load(Ordering::SeqCst), 10);
}

#[test]
fn test_submit_after_close_fails() {
    let (executor, _sink) = started("after-close");
    executor.close();

    let result = executor.execute(|| {});
    assert_eq!(
        result,
        Err(ToolkitError::ExecutorNotRunning("after-close".to_string()))
    );
    assert!(executor.schedule(Duration::ZERO, || {}).is_err());
}

#[test]
fn test_second_start_fails() {
    let (executor, _sink) = started("double-start");
    assert!(executor.start().is_err());
    executor.close();
}
