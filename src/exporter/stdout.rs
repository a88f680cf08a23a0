//! Stdout exporter.
//!
//! Writes each log record, closed span and metric sample as one JSON line.
//! Useful for local runs without a collector.

use serde_json::{json, Value};
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use super::{Exporter, SpanStart};
use crate::error::ExportError;
use crate::model::{AttributeValue, Attributes, LogRecord, SpanId, SpanStatus};
use crate::unix_millis;

/// Exporter writing JSON lines to a sink (stdout by default).
pub struct StdoutExporter {
    writer: Mutex<Box<dyn Write + Send>>,
}

/// An open span; emitted as a single line when it ends.
#[derive(Debug)]
pub struct StdoutSpan {
    id: SpanId,
    parent: Option<SpanId>,
    name: String,
    start: SystemTime,
    attributes: Attributes,
}

impl StdoutExporter {
    pub fn new() -> Self {
        Self::with_writer(Box::new(io::stdout()))
    }

    /// Write to an arbitrary sink instead of stdout.
    pub fn with_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    fn write_line(&self, value: &Value) -> Result<(), ExportError> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        serde_json::to_writer(&mut *writer, value).map_err(io::Error::from)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

impl Default for StdoutExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Exporter for StdoutExporter {
    type Span = StdoutSpan;

    fn export_log(&self, record: &LogRecord) -> Result<(), ExportError> {
        self.write_line(&json!({
            "type": "log",
            "timestamp_ms": unix_millis(record.timestamp),
            "severity": record.severity,
            "message": record.message,
            "attributes": record.attributes,
        }))
    }

    fn start_span(
        &self,
        span: SpanStart<'_>,
        parent: Option<&Self::Span>,
    ) -> Result<Self::Span, ExportError> {
        Ok(StdoutSpan {
            id: span.id,
            parent: parent.map(|p| p.id),
            name: span.name.to_string(),
            start: span.start,
            attributes: span.attributes.clone(),
        })
    }

    fn set_attribute(
        &self,
        span: &mut Self::Span,
        key: &str,
        value: &AttributeValue,
    ) -> Result<(), ExportError> {
        span.attributes.insert(key, value.clone());
        Ok(())
    }

    fn end_span(
        &self,
        span: Self::Span,
        status: SpanStatus,
        end: SystemTime,
    ) -> Result<(), ExportError> {
        let duration_ms = end
            .duration_since(span.start)
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or(0.0);

        self.write_line(&json!({
            "type": "span",
            "span_id": span.id.to_string(),
            "parent_id": span.parent.map(|p| p.to_string()),
            "name": span.name,
            "start_ms": unix_millis(span.start),
            "end_ms": unix_millis(end),
            "duration_ms": duration_ms,
            "status": status,
            "attributes": span.attributes,
        }))
    }

    fn report_counter(
        &self,
        name: &str,
        delta: u64,
        attributes: &Attributes,
    ) -> Result<(), ExportError> {
        self.write_line(&json!({
            "type": "counter",
            "name": name,
            "delta": delta,
            "attributes": attributes,
        }))
    }

    fn report_histogram_sample(
        &self,
        name: &str,
        value: f64,
        attributes: &Attributes,
    ) -> Result<(), ExportError> {
        self.write_line(&json!({
            "type": "histogram",
            "name": name,
            "value": value,
            "attributes": attributes,
        }))
    }

    fn flush(&self) -> Result<(), ExportError> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Severity;
    use std::sync::Arc;

    /// Write sink tests can read back.
    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn lines(&self) -> Vec<Value> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        }
    }

    #[test]
    fn test_log_line() {
        let buffer = SharedBuffer::default();
        let exporter = StdoutExporter::with_writer(Box::new(buffer.clone()));

        let record = LogRecord::new(
            Severity::Warning,
            "Data transformation encountered minor issues",
            Attributes::new().with("issues_count", 5),
        );
        exporter.export_log(&record).unwrap();

        let lines = buffer.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["type"], "log");
        assert_eq!(lines[0]["severity"], "WARNING");
        assert_eq!(lines[0]["attributes"]["issues_count"], 5);
    }

    #[test]
    fn test_span_written_on_end_only() {
        let buffer = SharedBuffer::default();
        let exporter = StdoutExporter::with_writer(Box::new(buffer.clone()));
        let attrs = Attributes::new().with("batch.id", "batch_001");

        let parent = exporter
            .start_span(
                SpanStart {
                    id: SpanId(1),
                    name: "data_processing",
                    start: SystemTime::now(),
                    attributes: &attrs,
                },
                None,
            )
            .unwrap();
        let mut child = exporter
            .start_span(
                SpanStart {
                    id: SpanId(2),
                    name: "data_validation",
                    start: SystemTime::now(),
                    attributes: &Attributes::new(),
                },
                Some(&parent),
            )
            .unwrap();
        exporter
            .set_attribute(&mut child, "validation.rules", &"required_fields".into())
            .unwrap();
        assert!(buffer.lines().is_empty());

        exporter
            .end_span(child, SpanStatus::Error, SystemTime::now())
            .unwrap();

        let lines = buffer.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["name"], "data_validation");
        assert_eq!(lines[0]["parent_id"], SpanId(1).to_string());
        assert_eq!(lines[0]["status"], "error");
        assert_eq!(lines[0]["attributes"]["validation.rules"], "required_fields");
    }

    #[test]
    fn test_metric_lines() {
        let buffer = SharedBuffer::default();
        let exporter = StdoutExporter::with_writer(Box::new(buffer.clone()));
        let attrs = Attributes::new().with("operation", "authentication");

        exporter.report_counter("custom_requests_total", 1, &attrs).unwrap();
        exporter.report_histogram_sample("processing_time", 12.5, &attrs).unwrap();

        let lines = buffer.lines();
        assert_eq!(lines[0]["type"], "counter");
        assert_eq!(lines[0]["delta"], 1);
        assert_eq!(lines[1]["type"], "histogram");
        assert_eq!(lines[1]["value"], 12.5);
    }
}
