//! Outbound Ports (Driven Ports)
//!
//! What the exchange layer needs from the transport collaborator. Byte
//! pushing and protocol parsing live behind these traits.

use crate::domain::correlation::CorrelationKey;
use crate::domain::errors::TransportError;
use crate::domain::types::{Frame, Payload};
use async_trait::async_trait;
use bytes::Bytes;

/// Physical write side of the shared channel.
///
/// Owned by the Dispatcher, which is the only caller, so `&mut self` is fine.
#[async_trait]
pub trait FrameWriter: Send {
    /// Write one frame. Returns once the transport has accepted it.
    async fn write_frame(&mut self, frame: &Frame) -> Result<(), TransportError>;
}

/// Inbound side of the shared channel
#[async_trait]
pub trait InboundSource: Send {
    /// Next raw inbound frame; `Ok(None)` at end of stream
    async fn next_frame(&mut self) -> Result<Option<Bytes>, TransportError>;
}

/// Splits an inbound frame into the key it answers and its payload.
///
/// Returns `None` for frames that cannot be classified; those are dropped.
pub trait FrameClassifier: Send + Sync {
    fn classify(&self, raw: &[u8]) -> Option<(CorrelationKey, Payload)>;
}

impl<F> FrameClassifier for F
where
    F: Fn(&[u8]) -> Option<(CorrelationKey, Payload)> + Send + Sync,
{
    fn classify(&self, raw: &[u8]) -> Option<(CorrelationKey, Payload)> {
        self(raw)
    }
}
