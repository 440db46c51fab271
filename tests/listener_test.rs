//! Integration tests for listener fan-out

use std::sync::Arc;
use std::time::{Duration, Instant};

use hearthkit::config::ExecutorConfig;
use hearthkit::core::{Cancellable, InMemoryReportSink, SchedulingExecutor};
use hearthkit::monitor::{Listener, ListenerRegistry};
use parking_lot::Mutex;

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

fn executor(name: &str) -> SchedulingExecutor {
    SchedulingExecutor::started(ExecutorConfig::new(name), Arc::new(InMemoryReportSink::new(4)))
        .unwrap()
}

fn recorder() -> (Listener<u32>, Arc<Mutex<Vec<u32>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (Arc::new(move |v: u32| sink.lock().push(v)), seen)
}

#[test]
fn test_each_listener_sees_notification_order() {
    let first_executor = executor("listener-a");
    let second_executor = executor("listener-b");
    let registry = ListenerRegistry::new();
    let (first, first_seen) = recorder();
    let (second, second_seen) = recorder();

    registry.add_listener(&first_executor, || None, first).unwrap();
    registry.add_listener(&second_executor, || None, second).unwrap();

    for i in 0..50 {
        registry.notify(i);
    }

    let expected: Vec<u32> = (0..50).collect();
    assert!(wait_until(Duration::from_secs(2), || first_seen.lock().len() == 50));
    assert!(wait_until(Duration::from_secs(2), || second_seen.lock().len() == 50));
    assert_eq!(*first_seen.lock(), expected);
    assert_eq!(*second_seen.lock(), expected);

    first_executor.close();
    second_executor.close();
}

#[test]
fn test_late_listener_receives_last_value_first() {
    let executor = executor("listener-late");
    let registry = ListenerRegistry::new();
    registry.notify(1);
    registry.notify(2);

    let (late, seen) = recorder();
    registry.add_listener_with_last(&executor, late).unwrap();
    registry.notify(3);

    assert!(wait_until(Duration::from_secs(2), || seen.lock().len() == 2));
    assert_eq!(*seen.lock(), vec![2, 3]);
    assert_eq!(registry.last_value(), Some(3));
    executor.close();
}

#[test]
fn test_closed_listener_stops_receiving() {
    let executor = executor("listener-closed");
    let registry = ListenerRegistry::new();
    let (callback, seen) = recorder();

    let handle = registry.add_listener(&executor, || None, callback).unwrap();
    registry.notify(1);
    assert!(wait_until(Duration::from_secs(2), || seen.lock().len() == 1));

    handle.close();
    handle.close();
    assert!(registry.is_empty());

    registry.notify(2);
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(*seen.lock(), vec![1]);
    executor.close();
}

#[test]
fn test_replay_fails_on_stopped_executor() {
    let executor = executor("listener-stopped");
    executor.close();
    let registry = ListenerRegistry::new();
    let (callback, _seen) = recorder();

    assert!(registry.add_listener(&executor, || Some(5), callback).is_err());
    assert!(registry.is_empty());
}

#[test]
fn test_supplier_may_read_registry() {
    let executor = executor("listener-supplier");
    let registry = ListenerRegistry::new();
    registry.notify(7);
    let (callback, seen) = recorder();

    let (done_tx, done_rx) = std::sync::mpsc::channel();
    let worker_registry = registry.clone();
    let worker_executor = executor.clone();
    std::thread::spawn(move || {
        let reader = worker_registry.clone();
        let result = worker_registry.add_listener(
            &worker_executor,
            move || reader.last_value(),
            callback,
        );
        done_tx.send(result.is_ok()).unwrap();
    });

    assert_eq!(done_rx.recv_timeout(Duration::from_secs(3)), Ok(true));
    assert!(wait_until(Duration::from_secs(2), || seen.lock().len() == 1));
    assert_eq!(*seen.lock(), vec![7]);
    assert_eq!(registry.len(), 1);
    executor.close();
}
