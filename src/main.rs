//! Appsight demo: logs, traces and metrics through one telemetry facade.
//!
//! # Usage
//!
//! ```bash
//! appsight --connection-string "InstrumentationKey=...;IngestionEndpoint=http://localhost:4317"
//! ```
//!
//! Environment variables can also be used:
//! - `APPLICATION_INSIGHTS_CONNECTION_STRING`: Backend connection string
//! - `APPSIGHT_EXPORTER`: `otlp` (default) or `stdout`
//! - `APPSIGHT_MIN_SEVERITY`: Severity floor for exported records
//! - `RUST_LOG`: Console log level (trace, debug, info, warn, error)

use anyhow::{Context, Result};
use appsight::config::{Config, ExporterKind};
use appsight::demo::{run_demo, Pacing};
use appsight::exporter::{Exporter, StdoutExporter};
use appsight::observability::tracing::init_tracing;
use appsight::{ConfigurationError, Telemetry};
use std::time::Duration;

/// Print startup banner with version and configuration.
fn print_banner(config: &Config) {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        r#"
  Appsight v{} - Telemetry Facade Demo

  Configuration:
    Exporter:      {:?}
    Service:       {}
    Min Severity:  {}
    Log Level:     {}
"#,
        version, config.exporter, config.service_name, config.min_severity, config.log_level
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse configuration from CLI arguments and environment
    let config = Config::parse_args();

    // Initialize console logging
    init_tracing(&config.log_level, config.log_format);

    print_banner(&config);

    let pacing = Pacing {
        startup_pause: Duration::from_millis(config.startup_pause_ms),
        work: Duration::from_millis(config.work_ms),
    };

    match config.exporter {
        ExporterKind::Otlp => {
            let connection = config
                .connection_string
                .as_deref()
                .ok_or(ConfigurationError::NotFound)?;
            let telemetry = Telemetry::configure(
                connection,
                config.telemetry_settings(),
                &config.otlp_options(),
            )
            .context("failed to configure telemetry")?;
            if run(&telemetry, pacing).await {
                tracing::info!("Logs, traces and metrics sent to the OTLP endpoint");
            } else {
                tracing::warn!("Shutdown reported problems; some telemetry may not have reached the OTLP endpoint");
            }
        }
        ExporterKind::Stdout => {
            let telemetry = Telemetry::new(StdoutExporter::new(), config.telemetry_settings());
            run(&telemetry, pacing).await;
        }
    }

    Ok(())
}

/// Run the demo and shut down, returning whether shutdown finished cleanly.
async fn run<E: Exporter>(telemetry: &Telemetry<E>, pacing: Pacing) -> bool {
    let summary = run_demo(telemetry, pacing).await;
    tracing::info!(
        operations = summary.operations,
        succeeded = summary.succeeded,
        "Demo finished, flushing telemetry"
    );
    let warnings = telemetry.warning_count();
    telemetry.shutdown();
    telemetry.warning_count() == warnings
}
