//! # FX Telemetry
//!
//! Structured logging for the frame-exchange workspace.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fx_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_telemetry(TelemetryConfig::from_env())?;
//!     // Application code
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RUST_LOG` | unset | Full `EnvFilter` directive, takes precedence |
//! | `FX_LOG_LEVEL` | `info` | Log level filter |
//! | `FX_JSON_LOGS` | `false` | JSON lines instead of pretty output |
//! | `FX_LOG_LOCATION` | `false` | Include file and line numbers |
//! | `FX_SERVICE_NAME` | `frame-exchange` | Service name in the startup line |

#![allow(missing_docs)]

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::build_filter;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("Failed to install tracing subscriber: {0}")]
    SubscriberInit(String),
}

/// Install the global tracing subscriber.
///
/// Returns a guard to hold for the lifetime of the application. A second
/// call in the same process fails with `TelemetryError::SubscriberInit`.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    logging::init_logging(&config)?;

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Telemetry initialized"
    );

    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}

/// Guard that keeps telemetry active
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}
