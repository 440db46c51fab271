//! Tests for clock utilities

use std::time::Duration;

use chrono::{Local, TimeZone};
use hearthkit::util::{elapsed_between, plus, Clock, ManualClock};

#[test]
fn test_manual_clock_advances() {
    let start = Local.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let clock = ManualClock::new(start);
    assert_eq!(clock.now(), start);

    clock.advance(Duration::from_secs(90));
    assert_eq!(elapsed_between(start, clock.now()), Duration::from_secs(90));
}

#[test]
fn test_manual_clock_set_backwards() {
    let start = Local.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let clock = ManualClock::new(start);
    clock.advance(Duration::from_secs(60));
    clock.set(start);
    assert_eq!(clock.now(), start);
}

#[test]
fn test_elapsed_between_saturates() {
    let start = Local.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let later = plus(start, Duration::from_millis(250));
    assert_eq!(elapsed_between(start, later), Duration::from_millis(250));
    assert_eq!(elapsed_between(later, start), Duration::ZERO);
}

#[test]
fn test_init_tracing_is_repeatable() {
    hearthkit::util::init_tracing();
    hearthkit::util::init_tracing();
}
