//! Exporters deliver telemetry to a backend.
//!
//! Provides:
//! - The [`Exporter`] trait the facade forwards every call to
//! - [`OtlpExporter`]: OpenTelemetry SDK pipelines over OTLP/gRPC
//! - [`StdoutExporter`]: one JSON line per record
//! - [`MemoryExporter`]: records every call, for tests

pub mod memory;
pub mod otlp;
pub mod stdout;

pub use memory::MemoryExporter;
pub use otlp::OtlpExporter;
pub use stdout::StdoutExporter;

use std::time::SystemTime;

use crate::error::ExportError;
use crate::model::{AttributeValue, Attributes, LogRecord, SpanId, SpanStatus};

/// Parameters for starting a span on an exporter.
#[derive(Debug, Clone, Copy)]
pub struct SpanStart<'a> {
    pub id: SpanId,
    pub name: &'a str,
    pub start: SystemTime,
    pub attributes: &'a Attributes,
}

/// A backend client the facade forwards telemetry to.
///
/// Implementations own transport, batching and retries. They must not
/// panic on delivery failures; return an [`ExportError`] instead.
pub trait Exporter: Send + Sync {
    /// The exporter's native handle for an open span.
    type Span: Send;

    /// Export one log record.
    fn export_log(&self, record: &LogRecord) -> Result<(), ExportError>;

    /// Start a span, nested under `parent` when given.
    fn start_span(
        &self,
        span: SpanStart<'_>,
        parent: Option<&Self::Span>,
    ) -> Result<Self::Span, ExportError>;

    /// Set (or overwrite) an attribute on an open span.
    fn set_attribute(
        &self,
        span: &mut Self::Span,
        key: &str,
        value: &AttributeValue,
    ) -> Result<(), ExportError>;

    /// End a span. The native handle is consumed.
    fn end_span(
        &self,
        span: Self::Span,
        status: SpanStatus,
        end: SystemTime,
    ) -> Result<(), ExportError>;

    /// Add `delta` to the named counter.
    fn report_counter(&self, name: &str, delta: u64, attributes: &Attributes)
        -> Result<(), ExportError>;

    /// Record one sample on the named histogram.
    fn report_histogram_sample(
        &self,
        name: &str,
        value: f64,
        attributes: &Attributes,
    ) -> Result<(), ExportError>;

    /// Push buffered telemetry to the backend.
    fn flush(&self) -> Result<(), ExportError> {
        Ok(())
    }

    /// Flush and release backend resources.
    fn shutdown(&self) -> Result<(), ExportError> {
        self.flush()
    }
}
