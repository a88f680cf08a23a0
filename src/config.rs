//! Configuration parsing for the appsight demo.
//!
//! Supports:
//! - CLI arguments via clap
//! - Environment variable overrides
//! - Sensible defaults for quick start

use clap::Parser;
use std::str::FromStr;
use std::time::Duration;

use crate::demo::INSTRUMENT_DESCRIPTIONS;
use crate::exporter::otlp::OtlpOptions;
use crate::facade::TelemetrySettings;
use crate::model::Severity;
use crate::observability::tracing::LogFormat;

/// Which exporter the demo sends telemetry to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExporterKind {
    /// OTLP/gRPC to the endpoint in the connection string.
    #[default]
    Otlp,
    /// JSON lines on stdout; no connection string needed.
    Stdout,
}

impl FromStr for ExporterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "otlp" => Ok(Self::Otlp),
            "stdout" => Ok(Self::Stdout),
            _ => Err(format!("unknown exporter: {s}")),
        }
    }
}

/// Appsight: structured logs, traces and metrics through one telemetry facade.
#[derive(Parser, Debug, Clone)]
#[command(name = "appsight")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Backend connection string (a collector URL or InstrumentationKey=...;IngestionEndpoint=...)
    #[arg(long, env = "APPLICATION_INSIGHTS_CONNECTION_STRING", hide_env_values = true)]
    pub connection_string: Option<String>,

    /// Exporter to use (otlp, stdout)
    #[arg(long, env = "APPSIGHT_EXPORTER", default_value = "otlp")]
    pub exporter: ExporterKind,

    /// Service name reported with all telemetry
    #[arg(long, env = "OTEL_SERVICE_NAME", default_value = "appsight-demo")]
    pub service_name: String,

    /// Minimum severity forwarded to the exporter (debug, info, warning, error, critical)
    #[arg(long, env = "APPSIGHT_MIN_SEVERITY", default_value = "info")]
    pub min_severity: Severity,

    /// Console log filter (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Console log format (text, json)
    #[arg(long, env = "APPSIGHT_LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,

    /// Interval between metric exports, in seconds
    #[arg(long, env = "APPSIGHT_METRICS_INTERVAL_SECS", default_value_t = 10)]
    pub metrics_interval_secs: u64,

    /// Timeout for each export request, in seconds
    #[arg(long, env = "APPSIGHT_EXPORT_TIMEOUT_SECS", default_value_t = 10)]
    pub export_timeout_secs: u64,

    /// Pause after the startup log, in milliseconds
    #[arg(long, env = "APPSIGHT_STARTUP_PAUSE_MS", default_value_t = 2000)]
    pub startup_pause_ms: u64,

    /// Simulated work per demo step, in milliseconds
    #[arg(long, env = "APPSIGHT_WORK_MS", default_value_t = 100)]
    pub work_ms: u64,
}

impl Config {
    /// Parse configuration from CLI arguments and environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Facade settings derived from this configuration.
    pub fn telemetry_settings(&self) -> TelemetrySettings {
        TelemetrySettings {
            min_severity: self.min_severity,
            console: true,
        }
    }

    /// OTLP pipeline options derived from this configuration, with the
    /// demo instruments described.
    pub fn otlp_options(&self) -> OtlpOptions {
        let options = OtlpOptions {
            service_name: self.service_name.clone(),
            metrics_interval: Duration::from_secs(self.metrics_interval_secs),
            export_timeout: Duration::from_secs(self.export_timeout_secs),
            ..OtlpOptions::default()
        };
        INSTRUMENT_DESCRIPTIONS
            .iter()
            .fold(options, |options, (name, description)| {
                options.with_description(name, description)
            })
    }

    /// Create a configuration for testing: stdout exporter, no pauses.
    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            connection_string: None,
            exporter: ExporterKind::Stdout,
            service_name: "appsight-test".into(),
            min_severity: Severity::Info,
            log_level: "debug".into(),
            log_format: LogFormat::Text,
            metrics_interval_secs: 1,
            export_timeout_secs: 1,
            startup_pause_ms: 0,
            work_ms: 0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connection_string: None,
            exporter: ExporterKind::Otlp,
            service_name: "appsight-demo".into(),
            min_severity: Severity::Info,
            log_level: "info".into(),
            log_format: LogFormat::Text,
            metrics_interval_secs: 10,
            export_timeout_secs: 10,
            startup_pause_ms: 2000,
            work_ms: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.exporter, ExporterKind::Otlp);
        assert_eq!(config.min_severity, Severity::Info);
        assert_eq!(config.otlp_options().metrics_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_otlp_options_describe_demo_instruments() {
        let options = Config::default().otlp_options();
        assert_eq!(
            options.descriptions.get("processing_time").map(String::as_str),
            Some("Time spent processing requests")
        );
        assert_eq!(options.descriptions.len(), 2);
    }

    #[test]
    fn test_parse_from_args() {
        let config = Config::try_parse_from([
            "appsight",
            "--connection-string",
            "http://localhost:4317",
            "--exporter",
            "stdout",
            "--min-severity",
            "warning",
        ])
        .unwrap();

        assert_eq!(config.connection_string.as_deref(), Some("http://localhost:4317"));
        assert_eq!(config.exporter, ExporterKind::Stdout);
        assert_eq!(config.telemetry_settings().min_severity, Severity::Warning);
    }

    #[test]
    fn test_rejects_unknown_exporter() {
        assert!(Config::try_parse_from(["appsight", "--exporter", "carrier-pigeon"]).is_err());
    }

    #[test]
    fn test_test_config_has_no_pauses() {
        let config = Config::test_config();
        assert_eq!(config.startup_pause_ms, 0);
        assert_eq!(config.work_ms, 0);
    }
}
