//! Instrument registry for named counters and histograms.
//!
//! Instruments are created lazily on first use and live as long as the
//! registry. Concurrent first use of one name yields a single instrument.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Maximum instrument name length accepted by OpenTelemetry.
const MAX_NAME_LEN: usize = 255;

/// A monotonically increasing counter.
#[derive(Debug)]
pub struct CounterInstrument {
    name: String,
    value: AtomicU64,
}

impl CounterInstrument {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a delta, returning the new cumulative value.
    ///
    /// Returns `None` and leaves the value unchanged if the sum would overflow.
    pub fn add(&self, delta: u64) -> Option<u64> {
        self.value
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                current.checked_add(delta)
            })
            .ok()
            .map(|previous| previous + delta)
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::SeqCst)
    }
}

/// A duration histogram. Samples go to the exporter; only the count is kept here.
#[derive(Debug)]
pub struct HistogramInstrument {
    name: String,
    count: AtomicU64,
}

impl HistogramInstrument {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            count: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Count one sample, returning the new sample count.
    pub fn record(&self) -> u64 {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}

/// Registry of named instruments.
#[derive(Debug, Default)]
pub struct InstrumentRegistry {
    counters: Mutex<HashMap<String, Arc<CounterInstrument>>>,
    histograms: Mutex<HashMap<String, Arc<HistogramInstrument>>>,
}

impl InstrumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the named counter.
    ///
    /// Returns `None` if the name is not a valid instrument name.
    pub fn counter(&self, name: &str) -> Option<Arc<CounterInstrument>> {
        if !is_valid_name(name) {
            return None;
        }
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        let counter = counters.entry(name.to_string()).or_insert_with(|| {
            tracing::debug!(instrument = name, "Creating counter");
            Arc::new(CounterInstrument::new(name))
        });
        Some(Arc::clone(counter))
    }

    /// Get or create the named histogram.
    ///
    /// Returns `None` if the name is not a valid instrument name.
    pub fn histogram(&self, name: &str) -> Option<Arc<HistogramInstrument>> {
        if !is_valid_name(name) {
            return None;
        }
        let mut histograms = self
            .histograms
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let histogram = histograms.entry(name.to_string()).or_insert_with(|| {
            tracing::debug!(instrument = name, "Creating histogram");
            Arc::new(HistogramInstrument::new(name))
        });
        Some(Arc::clone(histogram))
    }

    /// Look up a counter without creating it.
    pub fn existing_counter(&self, name: &str) -> Option<Arc<CounterInstrument>> {
        self.counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Look up a histogram without creating it.
    pub fn existing_histogram(&self, name: &str) -> Option<Arc<HistogramInstrument>> {
        self.histograms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn counter_count(&self) -> usize {
        self.counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// OpenTelemetry instrument name rules: an ASCII letter followed by
/// letters, digits, `_`, `.`, `-` or `/`, at most 255 characters.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    name.len() <= MAX_NAME_LEN
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '/'))
}
