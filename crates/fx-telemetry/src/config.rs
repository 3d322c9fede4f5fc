//! Telemetry configuration from environment variables.

use serde::{Deserialize, Serialize};
use std::env;

/// Configuration for log output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Service name attached to the startup log line
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error), or a full
    /// `EnvFilter` directive
    pub log_level: String,

    /// Emit JSON lines instead of human-readable output
    pub json_logs: bool,

    /// Include file and line of the call site
    pub with_location: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "frame-exchange".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            with_location: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `FX_SERVICE_NAME`: Service name (default: frame-exchange)
    /// - `FX_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `FX_JSON_LOGS`: Enable JSON logs (default: false)
    /// - `FX_LOG_LOCATION`: Include file/line (default: false)
    pub fn from_env() -> Self {
        Self {
            service_name: env::var("FX_SERVICE_NAME")
                .unwrap_or_else(|_| "frame-exchange".to_string()),

            log_level: env::var("FX_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("FX_JSON_LOGS")
                .map(|v| is_truthy(&v))
                .unwrap_or(false),

            with_location: env::var("FX_LOG_LOCATION")
                .map(|v| is_truthy(&v))
                .unwrap_or(false),
        }
    }

    /// Configuration for a named tool, everything else from the environment
    pub fn for_service(service_name: &str) -> Self {
        let mut config = Self::from_env();
        config.service_name = service_name.to_string();
        config
    }

    /// Override the level filter
    pub fn with_log_level(mut self, log_level: impl Into<String>) -> Self {
        self.log_level = log_level.into();
        self
    }
}

fn is_truthy(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}
