//! Inbound Ports (Driving Ports)
//!
//! The API callers and the inbound transport use to drive the exchange layer.

use crate::domain::correlation::CorrelationKey;
use crate::domain::errors::ExchangeResult;
use crate::domain::types::{Frame, Payload};
use crate::registry::Delivery;
use async_trait::async_trait;
use std::time::Duration;

/// Request/response entry point for callers
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Send `frame` and wait for the response correlated by `key`.
    ///
    /// # Errors
    /// * `SendTimeout` - frame not confirmed written within `send_timeout`
    /// * `ResponseTimeout` - no response within `response_timeout` after the write
    /// * `Superseded` - a newer request for `key` replaced this one
    /// * `TransportFailure` - the write itself failed
    /// * `QueueClosed` - the Dispatcher is gone
    async fn exchange(
        &self,
        frame: Frame,
        key: CorrelationKey,
        send_timeout: Duration,
        response_timeout: Duration,
    ) -> ExchangeResult<Payload>;
}

/// Receiver of classified inbound payloads
pub trait ResponseSink: Send + Sync {
    /// Hand `payload` to whoever waits on `key`. Unmatched payloads are dropped.
    fn deliver(&self, key: &CorrelationKey, payload: Payload) -> Delivery;
}
