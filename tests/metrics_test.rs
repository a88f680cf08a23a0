//! Metric instrument tests.
//!
//! Tests:
//! - Counters are created lazily and accumulate deltas
//! - An overflowing increment is refused, not wrapped
//! - Duration histograms take one sample per call, in order

mod common;

use appsight::Attributes;
use common::TestTelemetry;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_counter_accumulates() {
    let t = TestTelemetry::new();
    assert_eq!(t.telemetry.counter_value("requests"), None);

    for _ in 0..25 {
        t.telemetry.increment("requests", Attributes::new());
    }

    assert_eq!(t.telemetry.counter_value("requests"), Some(25));
    assert_eq!(t.exporter.counter_total("requests"), 25);
    assert_eq!(t.exporter.counter_reports("requests").len(), 25);
}

#[test]
fn test_counter_amounts_are_deltas() {
    let t = TestTelemetry::new();

    t.telemetry.increment_counter("bytes", 100, Attributes::new());
    t.telemetry.increment_counter("bytes", 28, Attributes::new());

    assert_eq!(t.telemetry.counter_value("bytes"), Some(128));
    let deltas: Vec<_> = t
        .exporter
        .counter_reports("bytes")
        .iter()
        .map(|r| r.delta)
        .collect();
    assert_eq!(deltas, vec![100, 28]);
}

#[test]
fn test_counter_overflow_keeps_value_and_warns() {
    let t = TestTelemetry::new();

    t.telemetry.increment_counter("bytes", u64::MAX, Attributes::new());
    t.telemetry.increment_counter("bytes", 1, Attributes::new());

    assert_eq!(t.telemetry.counter_value("bytes"), Some(u64::MAX));
    assert_eq!(t.exporter.counter_reports("bytes").len(), 1);
    assert_eq!(t.telemetry.warning_count(), 1);

    // later increments still work on other counters
    t.telemetry.increment("requests", Attributes::new());
    assert_eq!(t.telemetry.counter_value("requests"), Some(1));
}

#[test]
fn test_counter_attributes_forwarded() {
    let t = TestTelemetry::new();
    let labels = Attributes::new().with("operation", "authentication");

    t.telemetry.increment("custom_requests_total", labels.clone());

    assert_eq!(
        t.exporter.counter_reports("custom_requests_total")[0].attributes,
        labels
    );
}

#[test]
fn test_counters_are_independent() {
    let t = TestTelemetry::new();

    t.telemetry.increment("a", Attributes::new());
    t.telemetry.increment("b", Attributes::new());
    t.telemetry.increment("b", Attributes::new());

    assert_eq!(t.telemetry.counter_value("a"), Some(1));
    assert_eq!(t.telemetry.counter_value("b"), Some(2));
}

#[test]
fn test_durations_keep_order() {
    let t = TestTelemetry::new();
    let samples = [12.5, 3.0, 250.0, 0.0, 7.25];

    for value in samples {
        t.telemetry
            .record_duration("processing_time", value, Attributes::new());
    }

    assert_eq!(t.telemetry.histogram_count("processing_time"), Some(5));
    assert_eq!(t.exporter.histogram_samples("processing_time"), samples);
}

#[test]
fn test_record_elapsed_converts_to_millis() {
    let t = TestTelemetry::new();

    t.telemetry.record_elapsed(
        "processing_time",
        Duration::from_millis(250),
        Attributes::new(),
    );

    assert_eq!(t.exporter.histogram_samples("processing_time"), vec![250.0]);
}

#[test]
fn test_concurrent_increments_share_one_counter() {
    let t = Arc::new(TestTelemetry::new());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let t = Arc::clone(&t);
            thread::spawn(move || {
                for _ in 0..50 {
                    t.telemetry.increment("requests", Attributes::new());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(t.telemetry.counter_value("requests"), Some(200));
    assert_eq!(t.exporter.counter_total("requests"), 200);
}
