//! Demonstration workflow.
//!
//! Exercises every part of the facade the way an application would:
//! - One log per severity (DEBUG is dropped by the default floor)
//! - A startup record with custom attributes
//! - A simulated authentication inside a span, with a counter and a duration
//! - Nested data processing spans
//! - A division by zero, caught and logged at ERROR inside a failed span

use std::time::{Duration, Instant};
use thiserror::Error;

use crate::exporter::Exporter;
use crate::facade::Telemetry;
use crate::model::{Attributes, Severity};
use crate::now_millis;

/// Counter incremented once per simulated request.
pub const REQUESTS_COUNTER: &str = "custom_requests_total";

/// Histogram receiving simulated processing times.
pub const PROCESSING_HISTOGRAM: &str = "processing_time";

/// Descriptions for the demo's instruments, by instrument name.
pub const INSTRUMENT_DESCRIPTIONS: [(&str, &str); 2] = [
    (REQUESTS_COUNTER, "Total number of custom requests"),
    (PROCESSING_HISTOGRAM, "Time spent processing requests"),
];

/// Errors raised by the simulated domain logic.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("division by zero: {numerator} / 0")]
    DivisionByZero { numerator: i64 },

    #[error("overflow: {numerator} / {denominator}")]
    Overflow { numerator: i64, denominator: i64 },
}

/// Divide two integers, failing on a zero divisor.
pub fn divide(numerator: i64, denominator: i64) -> Result<i64, DomainError> {
    if denominator == 0 {
        return Err(DomainError::DivisionByZero { numerator });
    }
    numerator
        .checked_div(denominator)
        .ok_or(DomainError::Overflow {
            numerator,
            denominator,
        })
}

/// Pauses inserted between demo steps.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    /// Pause after the startup record.
    pub startup_pause: Duration,
    /// Simulated work inside the authentication span.
    pub work: Duration,
}

impl Pacing {
    /// No pauses at all.
    pub const fn none() -> Self {
        Self {
            startup_pause: Duration::ZERO,
            work: Duration::ZERO,
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            startup_pause: Duration::from_secs(2),
            work: Duration::from_millis(100),
        }
    }
}

/// What the demo did.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoSummary {
    pub operations: u32,
    pub succeeded: u32,
}

impl DemoSummary {
    /// Share of successful operations, as a percentage string like `66.7%`.
    pub fn success_rate(&self) -> String {
        if self.operations == 0 {
            return "0.0%".into();
        }
        format!(
            "{:.1}%",
            f64::from(self.succeeded) * 100.0 / f64::from(self.operations)
        )
    }
}

/// Run the full demonstration against a configured facade.
pub async fn run_demo<E: Exporter>(telemetry: &Telemetry<E>, pacing: Pacing) -> DemoSummary {
    log_every_severity(telemetry);

    telemetry.info(
        "Application started successfully",
        Attributes::new()
            .with("version", env!("CARGO_PKG_VERSION"))
            .with("environment", "production")
            .with("startup_time_ms", now_millis()),
    );
    tokio::time::sleep(pacing.startup_pause).await;
    tracing::info!("Startup log sent, continuing");

    let mut summary = DemoSummary {
        operations: 0,
        succeeded: 0,
    };

    summary.operations += 1;
    authenticate_user(telemetry, "user123", pacing.work).await;
    summary.succeeded += 1;

    summary.operations += 1;
    process_batch(telemetry, "batch_001", 500);
    summary.succeeded += 1;

    summary.operations += 1;
    if calculate(telemetry, 10, 0).is_ok() {
        summary.succeeded += 1;
    }

    telemetry.info(
        "Application workflow completed",
        Attributes::new()
            .with("total_operations", summary.operations)
            .with("success_rate", summary.success_rate()),
    );

    summary
}

fn log_every_severity<E: Exporter>(telemetry: &Telemetry<E>) {
    for severity in Severity::ALL {
        let kind = match severity {
            Severity::Debug => "a debug",
            Severity::Info => "an info",
            Severity::Warning => "a warning",
            Severity::Error => "an error",
            Severity::Critical => "a critical",
        };
        telemetry.log(
            severity,
            format!("{severity}: This is {kind} message"),
            Attributes::new(),
        );
    }
}

async fn authenticate_user<E: Exporter>(telemetry: &Telemetry<E>, user_id: &str, work: Duration) {
    let span = telemetry.span(
        "user_authentication",
        Attributes::new()
            .with("user.id", user_id)
            .with("auth.method", "oauth2"),
    );

    telemetry.info(
        "User authentication process started",
        Attributes::new()
            .with("user_id", user_id)
            .with("auth_method", "oauth2"),
    );

    let started = Instant::now();
    tokio::time::sleep(work).await;
    let elapsed = started.elapsed();

    let labels = Attributes::new().with("operation", "authentication");
    telemetry.increment(REQUESTS_COUNTER, labels.clone());
    telemetry.record_elapsed(PROCESSING_HISTOGRAM, elapsed, labels);

    span.set_attribute("processing.duration_ms", elapsed.as_secs_f64() * 1000.0);
    telemetry.info("User authentication completed", Attributes::new());
}

fn process_batch<E: Exporter>(telemetry: &Telemetry<E>, batch_id: &str, records: i64) {
    let parent = telemetry.span(
        "data_processing",
        Attributes::new()
            .with("batch.id", batch_id)
            .with("records.count", records),
    );

    {
        let _validation = parent.child(
            "data_validation",
            Attributes::new().with("validation.rules", "required_fields"),
        );
        telemetry.info(
            "Data validation started",
            Attributes::new()
                .with("batch_id", batch_id)
                .with("validation_type", "required_fields"),
        );
    }

    {
        let _transformation = parent.child(
            "data_transformation",
            Attributes::new().with("transformation.type", "normalize"),
        );
        telemetry.warning(
            "Data transformation encountered minor issues",
            Attributes::new()
                .with("batch_id", batch_id)
                .with("issues_count", 5),
        );
    }
}

fn calculate<E: Exporter>(
    telemetry: &Telemetry<E>,
    numerator: i64,
    denominator: i64,
) -> Result<i64, DomainError> {
    let result = telemetry.in_span(
        "calculation",
        Attributes::new()
            .with("numerator", numerator)
            .with("denominator", denominator),
        |_| divide(numerator, denominator),
    );

    if let Err(e) = &result {
        let error_type = match e {
            DomainError::DivisionByZero { .. } => "DivisionByZero",
            DomainError::Overflow { .. } => "Overflow",
        };
        telemetry.error(
            format!("Division error occurred: {e}"),
            Attributes::new()
                .with("error_type", error_type)
                .with("function", "calculate")
                .with("operation", "calculation"),
        );
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divide() {
        assert_eq!(divide(10, 2), Ok(5));
        assert_eq!(
            divide(10, 0),
            Err(DomainError::DivisionByZero { numerator: 10 })
        );
        assert_eq!(
            divide(i64::MIN, -1),
            Err(DomainError::Overflow {
                numerator: i64::MIN,
                denominator: -1
            })
        );
    }

    #[test]
    fn test_success_rate() {
        let summary = DemoSummary {
            operations: 3,
            succeeded: 2,
        };
        assert_eq!(summary.success_rate(), "66.7%");

        let empty = DemoSummary {
            operations: 0,
            succeeded: 0,
        };
        assert_eq!(empty.success_rate(), "0.0%");
    }
}
