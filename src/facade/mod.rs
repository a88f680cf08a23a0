//! The telemetry facade.
//!
//! [`Telemetry`] is the single access point for emitting logs, spans and
//! metrics. It owns the severity floor, the instrument registry and the
//! table of open spans, and forwards every call to its [`Exporter`].
//!
//! Emission is best-effort: exporter failures and misuse (such as touching
//! a closed span) are logged locally as [`EmissionWarning`]s and never
//! returned to the caller. Only configuration can fail.

pub mod registry;
pub mod span;

pub use registry::InstrumentRegistry;
pub use span::{ActiveSpan, SpanHandle};

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use crate::connection::ConnectionString;
use crate::error::{ConfigurationError, EmissionWarning, Signal};
use crate::exporter::otlp::{OtlpExporter, OtlpOptions};
use crate::exporter::{Exporter, SpanStart};
use crate::model::{AttributeValue, Attributes, LogRecord, Severity, SpanId, SpanStatus};
use span::OpenSpan;

/// Behaviour of the facade itself, independent of the exporter.
#[derive(Debug, Clone)]
pub struct TelemetrySettings {
    /// Records below this severity are dropped before the exporter.
    pub min_severity: Severity,
    /// Mirror accepted log records to the local `tracing` subscriber.
    pub console: bool,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            min_severity: Severity::Info,
            console: true,
        }
    }
}

/// Configure a facade exporting over OTLP with default settings.
///
/// Fails if `connection` is empty or malformed, or if there is no
/// multi-threaded Tokio runtime to run the exporter on.
pub fn configure(connection: &str) -> Result<Telemetry<OtlpExporter>, ConfigurationError> {
    Telemetry::configure(
        connection,
        TelemetrySettings::default(),
        &OtlpOptions::default(),
    )
}

/// Telemetry facade over an exporter.
pub struct Telemetry<E: Exporter> {
    exporter: E,
    settings: TelemetrySettings,
    instruments: InstrumentRegistry,
    open_spans: Mutex<HashMap<SpanId, OpenSpan<E::Span>>>,
    next_span_id: AtomicU64,
    warnings: AtomicU64,
}

impl Telemetry<OtlpExporter> {
    /// Validate the connection string and build the OTLP exporter.
    pub fn configure(
        connection: &str,
        settings: TelemetrySettings,
        options: &OtlpOptions,
    ) -> Result<Self, ConfigurationError> {
        let connection = ConnectionString::parse(connection)?;
        let exporter = OtlpExporter::new(&connection, options)?;
        Ok(Self::new(exporter, settings))
    }
}

impl<E: Exporter> Telemetry<E> {
    /// Create a facade over an already constructed exporter.
    pub fn new(exporter: E, settings: TelemetrySettings) -> Self {
        tracing::debug!(
            min_severity = %settings.min_severity,
            console = settings.console,
            "Telemetry facade ready"
        );
        Self {
            exporter,
            settings,
            instruments: InstrumentRegistry::new(),
            open_spans: Mutex::new(HashMap::new()),
            next_span_id: AtomicU64::new(1),
            warnings: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &TelemetrySettings {
        &self.settings
    }

    pub fn exporter(&self) -> &E {
        &self.exporter
    }

    // ---- Logs ----

    /// Emit a log record.
    ///
    /// Records below the severity floor are dropped.
    pub fn log(&self, severity: Severity, message: impl Into<String>, attributes: Attributes) {
        if !severity.passes(self.settings.min_severity) {
            return;
        }

        let record = LogRecord::new(severity, message, attributes);
        if self.settings.console {
            mirror_to_console(&record);
        }
        if let Err(source) = self.exporter.export_log(&record) {
            self.warn(EmissionWarning::Export {
                signal: Signal::Logs,
                source,
            });
        }
    }

    pub fn debug(&self, message: impl Into<String>, attributes: Attributes) {
        self.log(Severity::Debug, message, attributes);
    }

    pub fn info(&self, message: impl Into<String>, attributes: Attributes) {
        self.log(Severity::Info, message, attributes);
    }

    pub fn warning(&self, message: impl Into<String>, attributes: Attributes) {
        self.log(Severity::Warning, message, attributes);
    }

    pub fn error(&self, message: impl Into<String>, attributes: Attributes) {
        self.log(Severity::Error, message, attributes);
    }

    pub fn critical(&self, message: impl Into<String>, attributes: Attributes) {
        self.log(Severity::Critical, message, attributes);
    }

    // ---- Spans ----

    /// Open a span, nested under `parent` if it is still open.
    ///
    /// The caller must eventually pass the handle to [`Telemetry::close_span`].
    /// Prefer [`Telemetry::span`] or [`Telemetry::in_span`], which close on
    /// every exit path.
    pub fn start_span(
        &self,
        name: &str,
        attributes: Attributes,
        parent: Option<SpanHandle>,
    ) -> SpanHandle {
        let id = SpanId(self.next_span_id.fetch_add(1, Ordering::SeqCst));
        let start = SystemTime::now();
        let mut spans = self.spans();

        let parent_native = match parent {
            Some(parent) => match spans.get(&parent.id()) {
                Some(open) => open.native.as_ref(),
                None => {
                    self.warn(EmissionWarning::UnknownParent {
                        parent: parent.id(),
                        name: name.to_string(),
                    });
                    None
                }
            },
            None => None,
        };

        let started = self.exporter.start_span(
            SpanStart {
                id,
                name,
                start,
                attributes: &attributes,
            },
            parent_native,
        );
        let native = match started {
            Ok(native) => Some(native),
            Err(source) => {
                self.warn(EmissionWarning::Export {
                    signal: Signal::Traces,
                    source,
                });
                None
            }
        };

        spans.insert(
            id,
            OpenSpan {
                name: name.to_string(),
                native,
            },
        );
        SpanHandle(id)
    }

    /// Set an attribute on an open span. No effect once the span is closed.
    pub fn set_span_attribute(
        &self,
        span: SpanHandle,
        key: &str,
        value: impl Into<AttributeValue>,
    ) {
        let mut spans = self.spans();
        let Some(open) = spans.get_mut(&span.id()) else {
            self.warn(EmissionWarning::SpanClosed {
                span: span.id(),
                operation: "set attribute on",
            });
            return;
        };

        if let Some(native) = open.native.as_mut() {
            if let Err(source) = self.exporter.set_attribute(native, key, &value.into()) {
                self.warn(EmissionWarning::Export {
                    signal: Signal::Traces,
                    source,
                });
            }
        }
    }

    /// Close an open span.
    ///
    /// Closing a span twice is a caller error; the second call only warns.
    pub fn close_span(&self, span: SpanHandle, status: SpanStatus) {
        let removed = self.spans().remove(&span.id());
        let Some(open) = removed else {
            self.warn(EmissionWarning::SpanClosed {
                span: span.id(),
                operation: "close",
            });
            return;
        };

        if let Some(native) = open.native {
            if let Err(source) = self.exporter.end_span(native, status, SystemTime::now()) {
                self.warn(EmissionWarning::Export {
                    signal: Signal::Traces,
                    source,
                });
            }
        }
    }

    /// Open a root span guarded by an [`ActiveSpan`].
    pub fn span(&self, name: &str, attributes: Attributes) -> ActiveSpan<'_, E> {
        ActiveSpan::new(self, self.start_span(name, attributes, None))
    }

    /// Run `f` inside a root span.
    ///
    /// The span closes when `f` returns or panics. If `f` returns `Err`, the
    /// span closes with error status and an `error.message` attribute.
    pub fn in_span<'t, T, Err, F>(&'t self, name: &str, attributes: Attributes, f: F) -> Result<T, Err>
    where
        Err: fmt::Display,
        F: FnOnce(&mut ActiveSpan<'t, E>) -> Result<T, Err>,
    {
        span::run_scoped(self.span(name, attributes), f)
    }

    /// Number of spans opened but not yet closed.
    pub fn open_span_count(&self) -> usize {
        self.spans().len()
    }

    // ---- Metrics ----

    /// Add `amount` to the named counter, creating it on first use.
    pub fn increment_counter(&self, name: &str, amount: u64, attributes: Attributes) {
        let Some(counter) = self.instruments.counter(name) else {
            self.warn(EmissionWarning::InvalidInstrument {
                name: name.to_string(),
            });
            return;
        };

        if counter.add(amount).is_none() {
            self.warn(EmissionWarning::CounterOverflow {
                name: name.to_string(),
                delta: amount,
            });
            return;
        }
        if let Err(source) = self.exporter.report_counter(name, amount, &attributes) {
            self.warn(EmissionWarning::Export {
                signal: Signal::Metrics,
                source,
            });
        }
    }

    /// Add one to the named counter.
    pub fn increment(&self, name: &str, attributes: Attributes) {
        self.increment_counter(name, 1, attributes);
    }

    /// Record a duration sample in milliseconds, creating the histogram on first use.
    pub fn record_duration(&self, name: &str, milliseconds: f64, attributes: Attributes) {
        if !milliseconds.is_finite() || milliseconds < 0.0 {
            self.warn(EmissionWarning::InvalidSample {
                name: name.to_string(),
                value: milliseconds,
            });
            return;
        }
        let Some(histogram) = self.instruments.histogram(name) else {
            self.warn(EmissionWarning::InvalidInstrument {
                name: name.to_string(),
            });
            return;
        };

        histogram.record();
        if let Err(source) = self
            .exporter
            .report_histogram_sample(name, milliseconds, &attributes)
        {
            self.warn(EmissionWarning::Export {
                signal: Signal::Metrics,
                source,
            });
        }
    }

    /// Record an elapsed [`Duration`] in milliseconds.
    pub fn record_elapsed(&self, name: &str, elapsed: Duration, attributes: Attributes) {
        self.record_duration(name, elapsed.as_secs_f64() * 1000.0, attributes);
    }

    /// Cumulative value of a counter, `None` if it was never incremented.
    pub fn counter_value(&self, name: &str) -> Option<u64> {
        self.instruments.existing_counter(name).map(|c| c.value())
    }

    /// Number of samples recorded on a histogram, `None` if it was never used.
    pub fn histogram_count(&self, name: &str) -> Option<u64> {
        self.instruments.existing_histogram(name).map(|h| h.count())
    }

    // ---- Lifecycle ----

    /// Push buffered telemetry to the backend.
    pub fn flush(&self) {
        if let Err(source) = self.exporter.flush() {
            self.warn(EmissionWarning::Lifecycle {
                operation: "flush",
                source,
            });
        }
    }

    /// Close any spans still open (with error status), then shut the exporter down.
    pub fn shutdown(&self) {
        let leftover: Vec<(SpanId, String)> = self
            .spans()
            .iter()
            .map(|(id, open)| (*id, open.name.clone()))
            .collect();
        for (id, name) in leftover {
            tracing::warn!(span = %id, name = %name, "Closing span left open at shutdown");
            self.close_span(SpanHandle(id), SpanStatus::Error);
        }

        if let Err(source) = self.exporter.shutdown() {
            self.warn(EmissionWarning::Lifecycle {
                operation: "shutdown",
                source,
            });
        }
    }

    /// Number of emission warnings raised so far.
    pub fn warning_count(&self) -> u64 {
        self.warnings.load(Ordering::SeqCst)
    }

    fn warn(&self, warning: EmissionWarning) {
        self.warnings.fetch_add(1, Ordering::SeqCst);
        tracing::warn!(warning = %warning, "Telemetry emission problem");
    }

    fn spans(&self) -> MutexGuard<'_, HashMap<SpanId, OpenSpan<E::Span>>> {
        self.open_spans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Write an accepted record to the local subscriber at the matching level.
fn mirror_to_console(record: &LogRecord) {
    const TARGET: &str = "appsight::record";
    let attributes = &record.attributes;
    let message = record.message.as_str();
    match record.severity {
        Severity::Debug => tracing::debug!(target: TARGET, %attributes, "{message}"),
        Severity::Info => tracing::info!(target: TARGET, %attributes, "{message}"),
        Severity::Warning => tracing::warn!(target: TARGET, %attributes, "{message}"),
        Severity::Error => tracing::error!(target: TARGET, %attributes, "{message}"),
        Severity::Critical => {
            tracing::error!(target: TARGET, critical = true, %attributes, "{message}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exporter::MemoryExporter;

    fn facade() -> (Telemetry<MemoryExporter>, MemoryExporter) {
        let exporter = MemoryExporter::new();
        let settings = TelemetrySettings {
            console: false,
            ..TelemetrySettings::default()
        };
        (Telemetry::new(exporter.clone(), settings), exporter)
    }

    #[test]
    fn test_configure_rejects_empty() {
        assert!(matches!(configure(""), Err(ConfigurationError::Empty)));
        assert!(matches!(
            configure("InstrumentationKey="),
            Err(ConfigurationError::Malformed(_))
        ));
    }

    #[test]
    fn test_configure_outside_runtime_fails() {
        assert!(matches!(
            configure("http://127.0.0.1:4317"),
            Err(ConfigurationError::Runtime(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_configure_valid_endpoint_is_usable() {
        let telemetry = configure("http://127.0.0.1:4317").unwrap();

        telemetry.info("Application started successfully", Attributes::new());
        telemetry.increment("custom_requests_total", Attributes::new());
        telemetry.record_duration("processing_time", 12.5, Attributes::new());
        {
            let span = telemetry.span("user_authentication", Attributes::new());
            span.set_attribute("auth.method", "oauth2");
        }

        assert_eq!(telemetry.counter_value("custom_requests_total"), Some(1));
        assert_eq!(telemetry.histogram_count("processing_time"), Some(1));
        assert_eq!(telemetry.open_span_count(), 0);
        assert_eq!(telemetry.warning_count(), 0);
    }

    #[test]
    fn test_span_ids_are_unique() {
        let (telemetry, _) = facade();
        let a = telemetry.start_span("a", Attributes::new(), None);
        let b = telemetry.start_span("b", Attributes::new(), None);
        assert_ne!(a, b);
        assert_eq!(telemetry.open_span_count(), 2);
    }

    #[test]
    fn test_unknown_parent_starts_root() {
        let (telemetry, exporter) = facade();
        let parent = telemetry.start_span("parent", Attributes::new(), None);
        telemetry.close_span(parent, SpanStatus::Ok);

        let child = telemetry.start_span("child", Attributes::new(), Some(parent));
        telemetry.close_span(child, SpanStatus::Ok);

        assert_eq!(exporter.span_named("child").unwrap().parent, None);
        assert_eq!(telemetry.warning_count(), 1);
    }

    #[test]
    fn test_exporter_failure_is_swallowed() {
        let (telemetry, exporter) = facade();
        exporter.set_failing(true);

        telemetry.info("lost", Attributes::new());
        telemetry.increment("requests", Attributes::new());
        let span = telemetry.start_span("work", Attributes::new(), None);
        telemetry.set_span_attribute(span, "k", 1);
        telemetry.close_span(span, SpanStatus::Ok);
        telemetry.flush();

        // start_span failed, so the attribute and close calls have nothing to forward
        assert_eq!(telemetry.warning_count(), 4);
        assert_eq!(telemetry.open_span_count(), 0);
        // the facade's own accounting is unaffected by delivery failures
        assert_eq!(telemetry.counter_value("requests"), Some(1));
    }

    #[test]
    fn test_invalid_metric_inputs_warn() {
        let (telemetry, exporter) = facade();

        telemetry.increment("", Attributes::new());
        telemetry.record_duration("processing_time", -1.0, Attributes::new());
        telemetry.record_duration("processing_time", f64::NAN, Attributes::new());

        assert_eq!(telemetry.warning_count(), 3);
        assert_eq!(telemetry.histogram_count("processing_time"), None);
        assert!(exporter.histogram_samples("processing_time").is_empty());
    }

    #[test]
    fn test_shutdown_closes_leftover_spans() {
        let (telemetry, exporter) = facade();
        let _forgotten = telemetry.start_span("forgotten", Attributes::new(), None);

        telemetry.shutdown();

        let record = exporter.span_named("forgotten").unwrap();
        assert_eq!(record.status, Some(SpanStatus::Error));
        assert_eq!(telemetry.open_span_count(), 0);
        assert_eq!(exporter.flush_count(), 1);
    }
}
