//! Tests for report sinks

use hearthkit::core::{build_report, InMemoryReportSink, ReportSink};

#[test]
fn test_in_memory_report_sink() {
    let sink = InMemoryReportSink::new(10);

    sink.report("poll plug", "connection refused");
    assert_eq!(sink.len(), 1);

    let reports = sink.reports();
    assert_eq!(reports[0].context, "poll plug");
    assert_eq!(reports[0].message, "connection refused");
}

#[test]
fn test_report_sink_overflow() {
    let sink = InMemoryReportSink::new(2);

    sink.report("task1", "boom");
    sink.report("task2", "boom");
    sink.report("task3", "boom");

    let reports = sink.reports();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].context, "task2"); // First one popped
    assert_eq!(reports[1].context, "task3");
}

#[test]
fn test_zero_capacity_sink_drops_everything() {
    let sink = InMemoryReportSink::new(0);
    sink.report("task", "boom");
    assert!(sink.is_empty());
}

#[test]
fn test_build_report() {
    let report = build_report("gateway refresh", "timeout");

    assert_eq!(report.context, "gateway refresh");
    assert_eq!(report.message, "timeout");
    assert!(report.reported_at.timestamp() > 0);
}
