//! Local observability for the process itself.
//!
//! Provides:
//! - Console logging through `tracing-subscriber`, filtered by `RUST_LOG`
//!
//! Telemetry destined for the backend goes through [`crate::facade`] instead.

pub mod tracing;
