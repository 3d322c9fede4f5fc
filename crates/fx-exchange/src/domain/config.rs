//! Exchange configuration with validation.

use crate::domain::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Per-connection settings for the exchange layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Budget for a frame to be confirmed written (default: 1000ms)
    pub send_timeout_ms: u64,
    /// Budget for a response after the write is confirmed (default: 1000ms)
    pub response_timeout_ms: u64,
    /// Transmit queue bound; `None` = unbounded
    pub queue_capacity: Option<usize>,
    /// Pause after each written frame (default: 0 = no pacing)
    pub frame_gap_ms: u64,
    /// Registry janitor interval (default: 30s, 0 disables)
    pub purge_interval_ms: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: 1_000,
            response_timeout_ms: 1_000,
            queue_capacity: None,
            frame_gap_ms: 0,
            purge_interval_ms: 30_000,
        }
    }
}

impl ExchangeConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.send_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout(
                "send_timeout_ms cannot be 0".into(),
            ));
        }

        if self.response_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout(
                "response_timeout_ms cannot be 0".into(),
            ));
        }

        if self.queue_capacity == Some(0) {
            return Err(ConfigError::InvalidCapacity(
                "queue_capacity cannot be 0 (use None for unbounded)".into(),
            ));
        }

        Ok(())
    }

    /// Defaults overlaid with environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `FX_SEND_TIMEOUT_MS`
    /// - `FX_RESPONSE_TIMEOUT_MS`
    /// - `FX_QUEUE_CAPACITY` (empty or `unbounded` = no bound)
    /// - `FX_FRAME_GAP_MS`
    /// - `FX_PURGE_INTERVAL_MS`
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = read_u64("FX_SEND_TIMEOUT_MS")? {
            config.send_timeout_ms = v;
        }
        if let Some(v) = read_u64("FX_RESPONSE_TIMEOUT_MS")? {
            config.response_timeout_ms = v;
        }
        if let Ok(raw) = env::var("FX_QUEUE_CAPACITY") {
            config.queue_capacity = parse_capacity(&raw)?;
        }
        if let Some(v) = read_u64("FX_FRAME_GAP_MS")? {
            config.frame_gap_ms = v;
        }
        if let Some(v) = read_u64("FX_PURGE_INTERVAL_MS")? {
            config.purge_interval_ms = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn frame_gap(&self) -> Duration {
        Duration::from_millis(self.frame_gap_ms)
    }

    /// `None` when the janitor is disabled
    pub fn purge_interval(&self) -> Option<Duration> {
        (self.purge_interval_ms > 0).then(|| Duration::from_millis(self.purge_interval_ms))
    }
}

fn read_u64(name: &'static str) -> Result<Option<u64>, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { name, value: raw }),
        Err(_) => Ok(None),
    }
}

fn parse_capacity(raw: &str) -> Result<Option<usize>, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("unbounded") {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidValue {
            name: "FX_QUEUE_CAPACITY",
            value: raw.to_owned(),
        })
}
