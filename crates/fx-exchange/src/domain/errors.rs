//! Error types for the exchange layer.
//!
//! Every `ExchangeError` is local to one `exchange` call. None of them stop
//! the Dispatcher or affect unrelated callers.

use crate::domain::correlation::CorrelationKey;
use std::time::Duration;
use thiserror::Error;

/// Result alias for exchange operations
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// Failure of a single `exchange` call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("frame for key {key} not written within {timeout:?}")]
    SendTimeout { key: CorrelationKey, timeout: Duration },

    #[error("no response for key {key} within {timeout:?}")]
    ResponseTimeout { key: CorrelationKey, timeout: Duration },

    #[error("request for key {key} superseded by a newer request")]
    Superseded { key: CorrelationKey },

    #[error("transport failure: {0}")]
    TransportFailure(#[from] TransportError),

    #[error("transmit queue closed")]
    QueueClosed,
}

impl ExchangeError {
    /// True for either timeout stage
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ExchangeError::SendTimeout { .. } | ExchangeError::ResponseTimeout { .. }
        )
    }
}

/// Errors reported by the transport collaborator.
///
/// Carried inside slot state, so it must be `Clone`; I/O errors are kept as
/// their rendered message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("transport disconnected")]
    Disconnected,
}

impl TransportError {
    /// Map an I/O error raised while writing a frame.
    pub fn from_write_io(err: std::io::Error) -> Self {
        if is_disconnect(&err) {
            TransportError::Disconnected
        } else {
            TransportError::WriteFailed(err.to_string())
        }
    }

    /// Map an I/O error raised while reading inbound frames.
    pub fn from_read_io(err: std::io::Error) -> Self {
        if is_disconnect(&err) {
            TransportError::Disconnected
        } else {
            TransportError::ReadFailed(err.to_string())
        }
    }
}

fn is_disconnect(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::UnexpectedEof
    )
}

/// Configuration errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("invalid queue capacity: {0}")]
    InvalidCapacity(String),

    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}
