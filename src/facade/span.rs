//! Span handles and scope guards.

use std::fmt;
use std::thread;

use super::Telemetry;
use crate::exporter::Exporter;
use crate::model::{AttributeValue, Attributes, SpanId, SpanStatus};

/// Handle to a span opened through [`Telemetry::start_span`].
///
/// Handles are plain identifiers; using one after its span closed is
/// reported as an emission warning and otherwise ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpanHandle(pub(crate) SpanId);

impl SpanHandle {
    pub fn id(&self) -> SpanId {
        self.0
    }
}

/// An open span tracked by the facade.
pub(crate) struct OpenSpan<S> {
    pub(crate) name: String,
    /// `None` if the exporter failed to start the span.
    pub(crate) native: Option<S>,
}

/// Scope guard for a span.
///
/// The span closes when the guard is dropped: with the recorded status
/// (ok unless [`ActiveSpan::fail`] was called), or with error status when
/// dropped during a panic.
///
/// ```
/// use appsight::exporter::MemoryExporter;
/// use appsight::{Attributes, SpanStatus, Telemetry, TelemetrySettings};
///
/// let exporter = MemoryExporter::new();
/// let telemetry = Telemetry::new(exporter.clone(), TelemetrySettings::default());
///
/// {
///     let span = telemetry.span("user_authentication", Attributes::new());
///     span.set_attribute("auth.method", "oauth2");
/// }
///
/// let record = exporter.span_named("user_authentication").unwrap();
/// assert_eq!(record.status, Some(SpanStatus::Ok));
/// ```
pub struct ActiveSpan<'t, E: Exporter> {
    telemetry: &'t Telemetry<E>,
    handle: SpanHandle,
    status: SpanStatus,
}

impl<'t, E: Exporter> ActiveSpan<'t, E> {
    pub(crate) fn new(telemetry: &'t Telemetry<E>, handle: SpanHandle) -> Self {
        Self {
            telemetry,
            handle,
            status: SpanStatus::Ok,
        }
    }

    pub fn handle(&self) -> SpanHandle {
        self.handle
    }

    pub fn status(&self) -> SpanStatus {
        self.status
    }

    pub fn set_attribute(&self, key: &str, value: impl Into<AttributeValue>) {
        self.telemetry.set_span_attribute(self.handle, key, value);
    }

    /// Mark the span as failed; it closes with error status.
    pub fn fail(&mut self) {
        self.status = SpanStatus::Error;
    }

    /// Open a child span nested under this one.
    pub fn child(&self, name: &str, attributes: Attributes) -> ActiveSpan<'t, E> {
        let handle = self
            .telemetry
            .start_span(name, attributes, Some(self.handle));
        ActiveSpan::new(self.telemetry, handle)
    }

    /// Run `f` inside a child span; see [`Telemetry::in_span`].
    pub fn in_child<T, Err, F>(&self, name: &str, attributes: Attributes, f: F) -> Result<T, Err>
    where
        Err: fmt::Display,
        F: FnOnce(&mut ActiveSpan<'t, E>) -> Result<T, Err>,
    {
        run_scoped(self.child(name, attributes), f)
    }

    /// Close now with the recorded status.
    pub fn end(self) {}

    /// Close now with an explicit status.
    pub fn end_with(mut self, status: SpanStatus) {
        self.status = status;
    }
}

impl<E: Exporter> Drop for ActiveSpan<'_, E> {
    fn drop(&mut self) {
        let status = if thread::panicking() {
            SpanStatus::Error
        } else {
            self.status
        };
        self.telemetry.close_span(self.handle, status);
    }
}

/// Run `f` with a span guard; an `Err` result marks the span failed and
/// records the error text as `error.message`.
pub(crate) fn run_scoped<'t, E, T, Err, F>(mut span: ActiveSpan<'t, E>, f: F) -> Result<T, Err>
where
    E: Exporter,
    Err: fmt::Display,
    F: FnOnce(&mut ActiveSpan<'t, E>) -> Result<T, Err>,
{
    let result = f(&mut span);
    if let Err(e) = &result {
        span.set_attribute("error.message", e.to_string());
        span.fail();
    }
    result
}
