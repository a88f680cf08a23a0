//! In-memory exporter.
//!
//! Records every call so tests can count exports and inspect what the
//! facade produced. Clones share the same recording.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use super::{Exporter, SpanStart};
use crate::error::ExportError;
use crate::model::{AttributeValue, Attributes, LogRecord, SpanRecord, SpanStatus};

/// One counter delta as reported to the exporter.
#[derive(Debug, Clone, PartialEq)]
pub struct CounterReport {
    pub name: String,
    pub delta: u64,
    pub attributes: Attributes,
}

/// One histogram sample as reported to the exporter.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSample {
    pub name: String,
    pub value: f64,
    pub attributes: Attributes,
}

#[derive(Debug, Default)]
struct Recording {
    logs: Vec<LogRecord>,
    spans: Vec<SpanRecord>,
    counters: Vec<CounterReport>,
    histograms: Vec<HistogramSample>,
    attribute_calls: usize,
    flushes: usize,
    failing: bool,
}

/// Exporter that keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryExporter {
    inner: Arc<Mutex<Recording>>,
}

/// Native span handle: index into the recorded spans.
#[derive(Debug)]
pub struct MemorySpan(usize);

impl MemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a backend error.
    pub fn set_failing(&self, failing: bool) {
        self.lock().failing = failing;
    }

    pub fn logs(&self) -> Vec<LogRecord> {
        self.lock().logs.clone()
    }

    /// All spans in start order, open or closed.
    pub fn spans(&self) -> Vec<SpanRecord> {
        self.lock().spans.clone()
    }

    /// The first span with the given name.
    pub fn span_named(&self, name: &str) -> Option<SpanRecord> {
        self.lock().spans.iter().find(|s| s.name == name).cloned()
    }

    pub fn counter_reports(&self, name: &str) -> Vec<CounterReport> {
        self.lock()
            .counters
            .iter()
            .filter(|c| c.name == name)
            .cloned()
            .collect()
    }

    /// Sum of all deltas reported for a counter.
    pub fn counter_total(&self, name: &str) -> u64 {
        self.counter_reports(name).iter().map(|c| c.delta).sum()
    }

    /// Samples recorded on a histogram, in call order.
    pub fn histogram_samples(&self, name: &str) -> Vec<f64> {
        self.lock()
            .histograms
            .iter()
            .filter(|h| h.name == name)
            .map(|h| h.value)
            .collect()
    }

    /// Number of `set_attribute` calls that reached the exporter.
    pub fn attribute_calls(&self) -> usize {
        self.lock().attribute_calls
    }

    pub fn flush_count(&self) -> usize {
        self.lock().flushes
    }

    fn lock(&self) -> MutexGuard<'_, Recording> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_healthy(&self) -> Result<MutexGuard<'_, Recording>, ExportError> {
        let guard = self.lock();
        if guard.failing {
            return Err(ExportError::Backend("memory exporter set to fail".into()));
        }
        Ok(guard)
    }
}

impl Exporter for MemoryExporter {
    type Span = MemorySpan;

    fn export_log(&self, record: &LogRecord) -> Result<(), ExportError> {
        self.lock_healthy()?.logs.push(record.clone());
        Ok(())
    }

    fn start_span(
        &self,
        span: SpanStart<'_>,
        parent: Option<&Self::Span>,
    ) -> Result<Self::Span, ExportError> {
        let mut rec = self.lock_healthy()?;
        let parent = match parent {
            Some(MemorySpan(index)) => Some(rec.spans.get(*index).ok_or(ExportError::UnknownSpan)?.id),
            None => None,
        };
        rec.spans.push(SpanRecord {
            id: span.id,
            name: span.name.to_string(),
            parent,
            start: span.start,
            end: None,
            attributes: span.attributes.clone(),
            status: None,
        });
        Ok(MemorySpan(rec.spans.len() - 1))
    }

    fn set_attribute(
        &self,
        span: &mut Self::Span,
        key: &str,
        value: &AttributeValue,
    ) -> Result<(), ExportError> {
        let mut rec = self.lock_healthy()?;
        rec.attribute_calls += 1;
        let record = rec.spans.get_mut(span.0).ok_or(ExportError::UnknownSpan)?;
        if record.is_closed() {
            return Err(ExportError::UnknownSpan);
        }
        record.attributes.insert(key, value.clone());
        Ok(())
    }

    fn end_span(
        &self,
        span: Self::Span,
        status: SpanStatus,
        end: SystemTime,
    ) -> Result<(), ExportError> {
        let mut rec = self.lock_healthy()?;
        let record = rec.spans.get_mut(span.0).ok_or(ExportError::UnknownSpan)?;
        record.end = Some(end);
        record.status = Some(status);
        Ok(())
    }

    fn report_counter(
        &self,
        name: &str,
        delta: u64,
        attributes: &Attributes,
    ) -> Result<(), ExportError> {
        self.lock_healthy()?.counters.push(CounterReport {
            name: name.to_string(),
            delta,
            attributes: attributes.clone(),
        });
        Ok(())
    }

    fn report_histogram_sample(
        &self,
        name: &str,
        value: f64,
        attributes: &Attributes,
    ) -> Result<(), ExportError> {
        self.lock_healthy()?.histograms.push(HistogramSample {
            name: name.to_string(),
            value,
            attributes: attributes.clone(),
        });
        Ok(())
    }

    fn flush(&self) -> Result<(), ExportError> {
        self.lock_healthy()?.flushes += 1;
        Ok(())
    }
}
