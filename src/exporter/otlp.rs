//! OpenTelemetry exporter over OTLP/gRPC.
//!
//! Builds the three SDK pipelines against one lazily connected tonic
//! channel:
//! - Logs: batch log processor
//! - Traces: batch span processor
//! - Metrics: periodic reader
//!
//! Nothing connects until the first batch is exported, so construction
//! succeeds without a reachable collector. `https` endpoints use TLS with
//! the platform's native roots. Construction needs a multi-threaded Tokio
//! runtime: the batch processors run on it, and flush/shutdown block the
//! calling thread until they answer.

use opentelemetry::logs::{AnyValue, LogRecord as _, Logger as _, LoggerProvider as _};
use opentelemetry::metrics::{Counter, Histogram, Meter, MeterProvider as _};
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer as _, TracerProvider as _};
use opentelemetry::{Context, Key, KeyValue, Value};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::logs::{Logger, LoggerProvider};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::{Config as TraceConfig, Tracer, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime};
use tokio::runtime::{Handle, RuntimeFlavor};
use tonic::transport::{Channel, ClientTlsConfig};

use super::{Exporter, SpanStart};
use crate::connection::ConnectionString;
use crate::error::{ConfigurationError, ExportError, Signal};
use crate::model::{AttributeValue, Attributes, LogRecord, Severity, SpanStatus};

/// Instrumentation scope name used for the logger, tracer and meter.
const SCOPE: &str = "appsight";

/// Settings for the OTLP pipelines.
#[derive(Debug, Clone)]
pub struct OtlpOptions {
    /// Reported as the `service.name` resource attribute.
    pub service_name: String,
    /// How often the periodic reader exports metrics.
    pub metrics_interval: Duration,
    /// Timeout for each export request.
    pub export_timeout: Duration,
    /// Descriptions attached to instruments when they are first created.
    pub descriptions: BTreeMap<String, String>,
}

impl OtlpOptions {
    /// Describe the instrument called `name`.
    pub fn with_description(mut self, name: &str, description: &str) -> Self {
        self.descriptions
            .insert(name.to_string(), description.to_string());
        self
    }
}

impl Default for OtlpOptions {
    fn default() -> Self {
        Self {
            service_name: "appsight".into(),
            metrics_interval: Duration::from_secs(10),
            export_timeout: Duration::from_secs(10),
            descriptions: BTreeMap::new(),
        }
    }
}

/// Exporter backed by the OpenTelemetry SDK.
pub struct OtlpExporter {
    logger_provider: LoggerProvider,
    logger: Logger,
    tracer_provider: TracerProvider,
    tracer: Tracer,
    meter_provider: SdkMeterProvider,
    meter: Meter,
    descriptions: BTreeMap<String, String>,
    counters: Mutex<HashMap<String, Counter<u64>>>,
    histograms: Mutex<HashMap<String, Histogram<f64>>>,
}

impl OtlpExporter {
    /// Build the log, trace and metric pipelines for a connection.
    pub fn new(
        connection: &ConnectionString,
        options: &OtlpOptions,
    ) -> Result<Self, ConfigurationError> {
        check_runtime()?;

        let endpoint = connection.endpoint().to_string();
        let mut builder = Channel::from_shared(endpoint.clone())
            .map_err(|e| ConfigurationError::InvalidEndpoint {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?
            .timeout(options.export_timeout);
        if endpoint.starts_with("https://") {
            builder = builder
                .tls_config(ClientTlsConfig::new().with_native_roots())
                .map_err(|e| ConfigurationError::InvalidEndpoint {
                    endpoint: endpoint.clone(),
                    reason: e.to_string(),
                })?;
        }
        let channel = builder.connect_lazy();

        let resource = build_resource(connection, &options.service_name);

        let logger_provider = opentelemetry_otlp::new_pipeline()
            .logging()
            .with_resource(resource.clone())
            .with_exporter(
                opentelemetry_otlp::new_exporter()
                    .tonic()
                    .with_channel(channel.clone())
                    .with_timeout(options.export_timeout),
            )
            .install_batch(runtime::Tokio)
            .map_err(|e| ConfigurationError::Exporter {
                signal: Signal::Logs,
                reason: e.to_string(),
            })?;

        let tracer_provider = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_trace_config(TraceConfig::default().with_resource(resource.clone()))
            .with_exporter(
                opentelemetry_otlp::new_exporter()
                    .tonic()
                    .with_channel(channel.clone())
                    .with_timeout(options.export_timeout),
            )
            .install_batch(runtime::Tokio)
            .map_err(|e| ConfigurationError::Exporter {
                signal: Signal::Traces,
                reason: e.to_string(),
            })?;

        let meter_provider = opentelemetry_otlp::new_pipeline()
            .metrics(runtime::Tokio)
            .with_resource(resource)
            .with_exporter(
                opentelemetry_otlp::new_exporter()
                    .tonic()
                    .with_channel(channel)
                    .with_timeout(options.export_timeout),
            )
            .with_period(options.metrics_interval)
            .build()
            .map_err(|e| ConfigurationError::Exporter {
                signal: Signal::Metrics,
                reason: e.to_string(),
            })?;

        tracing::info!(
            endpoint = %endpoint,
            service = %options.service_name,
            "OTLP exporter configured"
        );

        Ok(Self {
            logger: logger_provider.logger(SCOPE),
            logger_provider,
            tracer: tracer_provider.tracer(SCOPE),
            tracer_provider,
            meter: meter_provider.meter(SCOPE),
            meter_provider,
            descriptions: options.descriptions.clone(),
            counters: Mutex::new(HashMap::new()),
            histograms: Mutex::new(HashMap::new()),
        })
    }

    fn counter(&self, name: &str) -> Counter<u64> {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        counters
            .entry(name.to_string())
            .or_insert_with(|| {
                let builder = self.meter.u64_counter(name.to_string());
                let builder = match self.descriptions.get(name) {
                    Some(description) => builder.with_description(description.clone()),
                    None => builder,
                };
                builder.init()
            })
            .clone()
    }

    fn flush_logs_and_traces(&self) -> Vec<String> {
        let mut failures = Vec::new();
        for result in self.logger_provider.force_flush() {
            if let Err(e) = result {
                failures.push(format!("logs: {e}"));
            }
        }
        for result in self.tracer_provider.force_flush() {
            if let Err(e) = result {
                failures.push(format!("traces: {e}"));
            }
        }
        failures
    }

    fn histogram(&self, name: &str) -> Histogram<f64> {
        let mut histograms = self
            .histograms
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        histograms
            .entry(name.to_string())
            .or_insert_with(|| {
                let builder = self.meter.f64_histogram(name.to_string()).with_unit("ms");
                let builder = match self.descriptions.get(name) {
                    Some(description) => builder.with_description(description.clone()),
                    None => builder,
                };
                builder.init()
            })
            .clone()
    }
}

impl Exporter for OtlpExporter {
    /// The SDK span, held as the active span of its own context so children
    /// nest under it as local (not remote) children.
    type Span = Context;

    fn export_log(&self, record: &LogRecord) -> Result<(), ExportError> {
        let mut log = self.logger.create_log_record();
        log.set_timestamp(record.timestamp);
        log.set_observed_timestamp(SystemTime::now());
        log.set_severity_number(otel_severity(record.severity));
        log.set_severity_text(record.severity.as_str());
        log.set_body(AnyValue::from(record.message.clone()));
        for (key, value) in record.attributes.iter() {
            log.add_attribute(Key::new(key.to_string()), any_value(value));
        }
        self.logger.emit(log);
        Ok(())
    }

    fn start_span(
        &self,
        span: SpanStart<'_>,
        parent: Option<&Self::Span>,
    ) -> Result<Self::Span, ExportError> {
        let root = Context::new();
        let parent_cx = parent.unwrap_or(&root);

        let native = self
            .tracer
            .span_builder(span.name.to_string())
            .with_kind(SpanKind::Internal)
            .with_start_time(span.start)
            .with_attributes(key_values(span.attributes))
            .start_with_context(&self.tracer, parent_cx);
        Ok(Context::new().with_span(native))
    }

    fn set_attribute(
        &self,
        span: &mut Self::Span,
        key: &str,
        value: &AttributeValue,
    ) -> Result<(), ExportError> {
        span.span()
            .set_attribute(KeyValue::new(key.to_string(), otel_value(value)));
        Ok(())
    }

    fn end_span(
        &self,
        span: Self::Span,
        status: SpanStatus,
        end: SystemTime,
    ) -> Result<(), ExportError> {
        let native = span.span();
        native.set_status(match status {
            SpanStatus::Ok => Status::Ok,
            SpanStatus::Error => Status::error(""),
        });
        native.end_with_timestamp(end);
        Ok(())
    }

    fn report_counter(
        &self,
        name: &str,
        delta: u64,
        attributes: &Attributes,
    ) -> Result<(), ExportError> {
        self.counter(name).add(delta, &key_values(attributes));
        Ok(())
    }

    fn report_histogram_sample(
        &self,
        name: &str,
        value: f64,
        attributes: &Attributes,
    ) -> Result<(), ExportError> {
        self.histogram(name).record(value, &key_values(attributes));
        Ok(())
    }

    fn flush(&self) -> Result<(), ExportError> {
        let mut failures = self.flush_logs_and_traces();
        if let Err(e) = self.meter_provider.force_flush() {
            failures.push(format!("metrics: {e}"));
        }
        into_result(failures)
    }

    /// Drain logs and traces, then stop the metric reader.
    ///
    /// The log and trace batch processors stop when their providers drop;
    /// stopping them here as well makes the drop report a closed channel.
    fn shutdown(&self) -> Result<(), ExportError> {
        let mut failures = self.flush_logs_and_traces();
        if let Err(e) = self.meter_provider.shutdown() {
            failures.push(format!("metrics: {e}"));
        }
        into_result(failures)
    }
}

/// The batch processors are spawned on the current runtime and answer
/// flush/shutdown over channels the caller blocks on, which a
/// current-thread runtime could never service.
fn check_runtime() -> Result<(), ConfigurationError> {
    let handle = Handle::try_current().map_err(|e| ConfigurationError::Runtime(e.to_string()))?;
    match handle.runtime_flavor() {
        RuntimeFlavor::CurrentThread => Err(ConfigurationError::Runtime(
            "the current-thread runtime cannot drive the batch exporters".into(),
        )),
        _ => Ok(()),
    }
}

fn into_result(failures: Vec<String>) -> Result<(), ExportError> {
    if failures.is_empty() {
        Ok(())
    } else {
        Err(ExportError::Backend(failures.join("; ")))
    }
}

fn build_resource(connection: &ConnectionString, service_name: &str) -> Resource {
    let mut attributes = vec![KeyValue::new("service.name", service_name.to_string())];
    if let Some(key) = connection.instrumentation_key() {
        attributes.push(KeyValue::new("ai.instrumentation_key", key.to_string()));
    }
    Resource::new(attributes)
}

fn otel_severity(severity: Severity) -> opentelemetry::logs::Severity {
    use opentelemetry::logs::Severity as Otel;
    match severity {
        Severity::Debug => Otel::Debug,
        Severity::Info => Otel::Info,
        Severity::Warning => Otel::Warn,
        Severity::Error => Otel::Error,
        Severity::Critical => Otel::Fatal,
    }
}

fn otel_value(value: &AttributeValue) -> Value {
    match value {
        AttributeValue::Bool(v) => Value::Bool(*v),
        AttributeValue::Int(v) => Value::I64(*v),
        AttributeValue::Float(v) => Value::F64(*v),
        AttributeValue::String(v) => Value::String(v.clone().into()),
    }
}

fn any_value(value: &AttributeValue) -> AnyValue {
    match value {
        AttributeValue::Bool(v) => AnyValue::Boolean(*v),
        AttributeValue::Int(v) => AnyValue::Int(*v),
        AttributeValue::Float(v) => AnyValue::Double(*v),
        AttributeValue::String(v) => AnyValue::String(v.clone().into()),
    }
}

fn key_values(attributes: &Attributes) -> Vec<KeyValue> {
    attributes
        .iter()
        .map(|(key, value)| KeyValue::new(key.to_string(), otel_value(value)))
        .collect()
}
