//! Log and span records.

use serde::Serialize;
use std::fmt;
use std::time::SystemTime;

use super::{Attributes, Severity};

/// A single log event.
///
/// Created by the facade once a message passes the severity floor and
/// handed to the exporter exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub timestamp: SystemTime,
    pub severity: Severity,
    pub message: String,
    pub attributes: Attributes,
}

impl LogRecord {
    /// Create a record stamped with the current time.
    pub fn new(severity: Severity, message: impl Into<String>, attributes: Attributes) -> Self {
        Self {
            timestamp: SystemTime::now(),
            severity,
            message: message.into(),
            attributes,
        }
    }
}

/// Identifier of a span within one facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SpanId(pub u64);

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Completion status of a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    /// The unit of work completed.
    #[default]
    Ok,
    /// The unit of work failed.
    Error,
}

impl fmt::Display for SpanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A timed record of one unit of work.
///
/// `end` and `status` stay `None` while the span is open.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanRecord {
    pub id: SpanId,
    pub name: String,
    pub parent: Option<SpanId>,
    pub start: SystemTime,
    pub end: Option<SystemTime>,
    pub attributes: Attributes,
    pub status: Option<SpanStatus>,
}

impl SpanRecord {
    pub fn is_closed(&self) -> bool {
        self.end.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_id_display_is_hex() {
        assert_eq!(SpanId(255).to_string(), "00000000000000ff");
    }

    #[test]
    fn test_new_log_record() {
        let record = LogRecord::new(Severity::Warning, "disk almost full", Attributes::new());
        assert_eq!(record.severity, Severity::Warning);
        assert_eq!(record.message, "disk almost full");
        assert!(record.attributes.is_empty());
    }
}
