//! In-memory transport adapters backed by tokio mpsc channels.
//!
//! No physical transport lives in this crate. These adapters let a
//! simulated device (tests, the stress tool) sit on the other end of the
//! shared channel.

use crate::domain::correlation::CorrelationKey;
use crate::domain::errors::TransportError;
use crate::domain::types::{Frame, Payload};
use crate::ports::outbound::{FrameClassifier, FrameWriter, InboundSource};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

/// `FrameWriter` that forwards every frame into an unbounded channel
pub struct ChannelWriter {
    tx: mpsc::UnboundedSender<Frame>,
}

/// Writer plus the receiving end the simulated device reads from
pub fn channel_writer() -> (ChannelWriter, mpsc::UnboundedReceiver<Frame>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelWriter { tx }, rx)
}

#[async_trait]
impl FrameWriter for ChannelWriter {
    async fn write_frame(&mut self, frame: &Frame) -> Result<(), TransportError> {
        self.tx
            .send(frame.clone())
            .map_err(|_| TransportError::Disconnected)
    }
}

/// `InboundSource` reading raw frames from a channel
pub struct ChannelSource {
    rx: mpsc::UnboundedReceiver<Bytes>,
}

/// Sender the simulated device answers on, plus the source to listen with
pub fn channel_source() -> (mpsc::UnboundedSender<Bytes>, ChannelSource) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, ChannelSource { rx })
}

#[async_trait]
impl InboundSource for ChannelSource {
    async fn next_frame(&mut self) -> Result<Option<Bytes>, TransportError> {
        Ok(self.rx.recv().await)
    }
}

/// Classifies `<key><delimiter><payload>` frames.
///
/// The key must be valid UTF-8. Frames without the delimiter are rejected.
#[derive(Debug, Clone, Copy)]
pub struct KeyPrefixClassifier {
    delimiter: u8,
}

impl KeyPrefixClassifier {
    pub fn new(delimiter: u8) -> Self {
        Self { delimiter }
    }

    /// Build a frame this classifier accepts
    pub fn encode(&self, key: &CorrelationKey, payload: &[u8]) -> Bytes {
        let mut raw = Vec::with_capacity(key.as_str().len() + 1 + payload.len());
        raw.extend_from_slice(key.as_str().as_bytes());
        raw.push(self.delimiter);
        raw.extend_from_slice(payload);
        Bytes::from(raw)
    }
}

impl Default for KeyPrefixClassifier {
    fn default() -> Self {
        Self::new(b'|')
    }
}

impl FrameClassifier for KeyPrefixClassifier {
    fn classify(&self, raw: &[u8]) -> Option<(CorrelationKey, Payload)> {
        let split = raw.iter().position(|b| *b == self.delimiter)?;
        let key = std::str::from_utf8(&raw[..split]).ok()?;
        if key.is_empty() {
            return None;
        }
        Some((
            CorrelationKey::from(key),
            Bytes::copy_from_slice(&raw[split + 1..]),
        ))
    }
}
