//! Telemetry data model.
//!
//! Provides:
//! - Severity levels with a total order by rank
//! - Ordered attribute maps over a closed set of scalar kinds
//! - Log and span records as handed to exporters

pub mod attributes;
pub mod record;
pub mod severity;

pub use attributes::{AttributeValue, Attributes};
pub use record::{LogRecord, SpanId, SpanRecord, SpanStatus};
pub use severity::Severity;
