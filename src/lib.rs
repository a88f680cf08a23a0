//! Appsight: a structured telemetry facade over OpenTelemetry.
//!
//! Log records, trace spans and metric instruments go through one
//! in-process interface, [`Telemetry`], which applies a severity floor,
//! keeps attribute maps well-formed and forwards everything to a pluggable
//! [`Exporter`].
//!
//! # Architecture
//!
//! - **Best-effort**: emission failures become warnings, never errors
//! - **Explicit handle**: no global singleton, the facade is passed by reference
//! - **Scoped spans**: guards close spans on every exit path
//! - **Pluggable**: OTLP, stdout and in-memory exporters
//!
//! # Modules
//!
//! - [`config`]: CLI and environment configuration
//! - [`connection`]: Connection string parsing
//! - [`demo`]: Demonstration workflow
//! - [`error`]: Configuration, export and emission error types
//! - [`exporter`]: Exporter trait and implementations
//! - [`facade`]: The telemetry facade, span guards and instrument registry
//! - [`model`]: Severities, attributes and records
//! - [`observability`]: Local console logging setup

// Lint configuration
#![warn(clippy::all)]
#![allow(
    clippy::module_name_repetitions, // exporter::otlp::OtlpExporter is fine
    clippy::must_use_candidate,      // Not all functions need #[must_use]
    clippy::missing_errors_doc,      // Error docs can be verbose
    clippy::missing_panics_doc       // Panic docs can be verbose
)]

pub mod config;
pub mod connection;
pub mod demo;
pub mod error;
pub mod exporter;
pub mod facade;
pub mod model;
pub mod observability;

pub use connection::ConnectionString;
pub use error::{ConfigurationError, EmissionWarning, ExportError};
pub use exporter::Exporter;
pub use facade::{configure, ActiveSpan, SpanHandle, Telemetry, TelemetrySettings};
pub use model::{AttributeValue, Attributes, LogRecord, Severity, SpanRecord, SpanStatus};

use std::time::{SystemTime, UNIX_EPOCH};

/// Convert a timestamp to Unix milliseconds.
///
/// Times before the epoch clamp to 0.
#[must_use]
pub fn unix_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Get the current Unix timestamp in milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    unix_millis(SystemTime::now())
}
