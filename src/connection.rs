//! Connection string parsing.
//!
//! Supports:
//! - A bare collector URL (`http://localhost:4317`)
//! - `Key=Value;Key=Value` strings as issued by Application Insights
//!   (`InstrumentationKey=...;IngestionEndpoint=https://...`)

use std::str::FromStr;
use url::Url;

use crate::error::ConfigurationError;

/// Endpoint used when a key/value connection string has no `IngestionEndpoint`.
pub const DEFAULT_INGESTION_ENDPOINT: &str = "https://dc.services.visualstudio.com";

/// A validated connection to a telemetry backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    endpoint: Url,
    instrumentation_key: Option<String>,
}

impl ConnectionString {
    /// Parse and validate a connection string.
    ///
    /// ```
    /// use appsight::ConnectionString;
    ///
    /// let conn = ConnectionString::parse(
    ///     "InstrumentationKey=00000000-0000-0000-0000-000000000000;IngestionEndpoint=https://westeurope-5.in.applicationinsights.azure.com/",
    /// )
    /// .unwrap();
    /// assert_eq!(conn.endpoint(), "https://westeurope-5.in.applicationinsights.azure.com/");
    /// ```
    pub fn parse(raw: &str) -> Result<Self, ConfigurationError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ConfigurationError::Empty);
        }

        let looks_like_url = raw.starts_with("http://") || raw.starts_with("https://");
        if raw.contains('=') && !looks_like_url {
            Self::parse_key_values(raw)
        } else {
            Ok(Self {
                endpoint: parse_endpoint(raw)?,
                instrumentation_key: None,
            })
        }
    }

    fn parse_key_values(raw: &str) -> Result<Self, ConfigurationError> {
        let mut endpoint = None;
        let mut instrumentation_key = None;

        for segment in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = segment.split_once('=').ok_or_else(|| {
                ConfigurationError::Malformed(format!("segment '{segment}' is not key=value"))
            })?;
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() {
                return Err(ConfigurationError::Malformed(format!(
                    "segment '{segment}' has an empty key"
                )));
            }

            // Keys are case-insensitive; unknown keys (LiveEndpoint, ApplicationId, ...) are ignored
            match key.to_ascii_lowercase().as_str() {
                "ingestionendpoint" | "endpoint" => endpoint = Some(parse_endpoint(value)?),
                "instrumentationkey" => {
                    if value.is_empty() {
                        return Err(ConfigurationError::Malformed(
                            "InstrumentationKey is empty".into(),
                        ));
                    }
                    instrumentation_key = Some(value.to_string());
                }
                _ => {}
            }
        }

        if endpoint.is_none() && instrumentation_key.is_none() {
            return Err(ConfigurationError::Malformed(
                "expected IngestionEndpoint or InstrumentationKey".into(),
            ));
        }

        let endpoint = match endpoint {
            Some(endpoint) => endpoint,
            None => parse_endpoint(DEFAULT_INGESTION_ENDPOINT)?,
        };

        Ok(Self {
            endpoint,
            instrumentation_key,
        })
    }

    /// The ingestion endpoint URL.
    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    pub fn instrumentation_key(&self) -> Option<&str> {
        self.instrumentation_key.as_deref()
    }
}

impl FromStr for ConnectionString {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn parse_endpoint(raw: &str) -> Result<Url, ConfigurationError> {
    let invalid = |reason: String| ConfigurationError::InvalidEndpoint {
        endpoint: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme '{other}'"))),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".into()));
    }
    Ok(url)
}
