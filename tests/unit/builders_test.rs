//! Tests for builder modules

use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

use hearthkit::builders::ExecutorFactory;
use hearthkit::config::ExecutorConfig;
use hearthkit::core::InMemoryReportSink;

#[test]
fn test_factory_numbers_threads_per_label() {
    let factory = ExecutorFactory::new(Arc::new(InMemoryReportSink::new(4)));

    let first = factory.create("plug").unwrap();
    let second = factory.create("plug").unwrap();
    let other = factory.create("gateway").unwrap();

    assert_eq!(first.name(), "plug-1");
    assert_eq!(second.name(), "plug-2");
    assert_eq!(other.name(), "gateway-1");
    assert_eq!(factory.created("plug"), 2);
    assert_eq!(factory.created("unknown"), 0);

    for executor in [first, second, other] {
        executor.close();
    }
}

#[test]
fn test_factory_executors_are_started() {
    let factory = ExecutorFactory::new(Arc::new(InMemoryReportSink::new(4)));
    let executor = factory.create("sensor").unwrap();
    assert!(executor.is_running());

    let (tx, rx) = mpsc::channel();
    executor
        .execute(move || {
            tx.send(std::thread::current().name().map(str::to_string))
                .unwrap();
        })
        .unwrap();
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(5)).unwrap().as_deref(),
        Some("sensor-1")
    );
    executor.close();
}

#[test]
fn test_factory_from_invalid_config() {
    let config = ExecutorConfig::new("x").with_shutdown_grace(Duration::ZERO);
    assert!(ExecutorFactory::from_config(&config, Arc::new(InMemoryReportSink::new(1))).is_err());
}
