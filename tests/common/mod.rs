//! Test utilities shared by the integration tests.
//!
//! Provides:
//! - A facade wired to an in-memory exporter
//! - Quiet tracing setup

#![allow(dead_code)]

use appsight::exporter::MemoryExporter;
use appsight::observability::tracing::init_test_tracing;
use appsight::{Severity, Telemetry, TelemetrySettings};

/// A facade plus a handle on everything its exporter received.
pub struct TestTelemetry {
    pub telemetry: Telemetry<MemoryExporter>,
    pub exporter: MemoryExporter,
}

impl TestTelemetry {
    /// Facade with the default INFO floor.
    pub fn new() -> Self {
        Self::with_floor(Severity::Info)
    }

    /// Facade with a custom severity floor.
    pub fn with_floor(min_severity: Severity) -> Self {
        init_test_tracing();
        let exporter = MemoryExporter::new();
        let settings = TelemetrySettings {
            min_severity,
            console: false,
        };
        Self {
            telemetry: Telemetry::new(exporter.clone(), settings),
            exporter,
        }
    }
}

impl Default for TestTelemetry {
    fn default() -> Self {
        Self::new()
    }
}
