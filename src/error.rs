//! Error types.
//!
//! - [`ConfigurationError`]: fatal, raised while configuring the facade
//! - [`ExportError`]: returned by exporters
//! - [`EmissionWarning`]: anything that went wrong while emitting; logged, never propagated

use std::fmt;
use thiserror::Error;

use crate::model::SpanId;

/// Errors that prevent the facade from being configured.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// No connection string was provided at all.
    #[error("Connection String Not Found")]
    NotFound,

    /// The connection string is empty or whitespace.
    #[error("connection string is empty")]
    Empty,

    /// The connection string could not be parsed.
    #[error("malformed connection string: {0}")]
    Malformed(String),

    /// The ingestion endpoint is not a usable http(s) URL.
    #[error("invalid ingestion endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// The batch exporters need a multi-threaded Tokio runtime to run on.
    #[error("no usable Tokio runtime: {0}")]
    Runtime(String),

    /// The exporter pipeline could not be built.
    #[error("failed to build {signal} exporter: {reason}")]
    Exporter { signal: Signal, reason: String },
}

/// Errors reported by an exporter.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Writing to a local sink failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The telemetry backend or SDK rejected the operation.
    #[error("backend error: {0}")]
    Backend(String),

    /// The exporter does not know the span it was handed.
    #[error("unknown span")]
    UnknownSpan,
}

/// The kind of telemetry an operation concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Logs,
    Traces,
    Metrics,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Logs => write!(f, "logs"),
            Self::Traces => write!(f, "traces"),
            Self::Metrics => write!(f, "metrics"),
        }
    }
}

/// A non-fatal problem encountered while emitting telemetry.
#[derive(Debug, Error)]
pub enum EmissionWarning {
    /// The exporter failed to accept a record.
    #[error("failed to export {signal}: {source}")]
    Export {
        signal: Signal,
        #[source]
        source: ExportError,
    },

    /// A span operation targeted a span that is not open.
    #[error("cannot {operation} span {span}: span is not open")]
    SpanClosed {
        span: SpanId,
        operation: &'static str,
    },

    /// A span named a parent that is not open; it was started as a root span.
    #[error("parent span {parent} is not open, starting '{name}' as a root span")]
    UnknownParent { parent: SpanId, name: String },

    /// A metric instrument name was rejected.
    #[error("invalid instrument name '{name}'")]
    InvalidInstrument { name: String },

    /// A counter increment would overflow; the counter keeps its value.
    #[error("counter '{name}' would overflow adding {delta}")]
    CounterOverflow { name: String, delta: u64 },

    /// A duration sample was negative or not finite.
    #[error("invalid sample {value} for histogram '{name}'")]
    InvalidSample { name: String, value: f64 },

    /// Flushing or shutting down the exporter failed.
    #[error("exporter {operation} failed: {source}")]
    Lifecycle {
        operation: &'static str,
        #[source]
        source: ExportError,
    },
}
