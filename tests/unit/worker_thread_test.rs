//! Tests for the worker thread runtime

use std::sync::mpsc;
use std::time::Duration;

use hearthkit::runtime::{DrainOutcome, Job, WorkerThread};
use tokio::sync::mpsc::unbounded_channel;

#[test]
fn test_worker_runs_jobs_in_order() {
    let (jobs, rx) = unbounded_channel::<Job>();
    let worker = WorkerThread::spawn("order-worker", rx).unwrap();
    let (tx, results) = mpsc::channel();

    for i in 0..5 {
        let tx = tx.clone();
        jobs.send(Box::new(move || tx.send(i).unwrap())).unwrap();
    }
    drop(jobs);

    assert_eq!(worker.join_within(Duration::from_secs(5)), DrainOutcome::Drained);
    let seen: Vec<i32> = results.try_iter().collect();
    assert_eq!(seen, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_worker_thread_is_named() {
    let (jobs, rx) = unbounded_channel::<Job>();
    let worker = WorkerThread::spawn("named-worker", rx).unwrap();
    let (tx, name) = mpsc::channel();

    jobs.send(Box::new(move || {
        tx.send(std::thread::current().name().map(str::to_string))
            .unwrap();
    }))
    .unwrap();
    drop(jobs);

    assert_eq!(
        name.recv_timeout(Duration::from_secs(5)).unwrap().as_deref(),
        Some("named-worker")
    );
    assert_eq!(worker.join_within(Duration::from_secs(5)), DrainOutcome::Drained);
}

#[test]
fn test_join_times_out_on_blocked_worker() {
    let (jobs, rx) = unbounded_channel::<Job>();
    let worker = WorkerThread::spawn("slow-worker", rx).unwrap();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    jobs.send(Box::new(move || {
        let _ = release_rx.recv_timeout(Duration::from_secs(5));
    }))
    .unwrap();
    drop(jobs);

    assert_eq!(
        worker.join_within(Duration::from_millis(50)),
        DrainOutcome::TimedOut
    );
    release_tx.send(()).unwrap();
}
