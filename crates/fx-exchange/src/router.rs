//! Response Router - inbound side of the shared channel.
//!
//! Classifies inbound frames into `(key, payload)` and hands them to the
//! Pending Registry. Late and unsolicited responses are expected: they are
//! counted and dropped, never reported as errors.

use crate::domain::correlation::CorrelationKey;
use crate::domain::errors::TransportError;
use crate::domain::types::Payload;
use crate::ports::inbound::ResponseSink;
use crate::ports::outbound::{FrameClassifier, InboundSource};
use crate::registry::{Delivery, PendingRegistry};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub struct ResponseRouter {
    registry: Arc<PendingRegistry>,
}

impl ResponseRouter {
    pub fn new(registry: Arc<PendingRegistry>) -> Self {
        Self { registry }
    }

    /// Fulfil the slot waiting on `key`, if any
    pub fn deliver(&self, key: &CorrelationKey, payload: Payload) -> Delivery {
        self.registry.resolve(key, payload)
    }

    /// Listener loop.
    ///
    /// Ends on shutdown, end of stream, or `TransportError::Disconnected`.
    /// Other read errors are logged and the loop keeps reading.
    pub async fn run<S, C>(&self, mut source: S, classifier: C, mut shutdown: watch::Receiver<bool>)
    where
        S: InboundSource,
        C: FrameClassifier,
    {
        info!("Response router started");

        loop {
            let next = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Response router received shutdown signal");
                        break;
                    }
                    continue;
                }
                next = source.next_frame() => next,
            };

            match next {
                Ok(Some(raw)) => self.handle_frame(&raw, &classifier),
                Ok(None) => {
                    info!("Inbound stream ended, stopping response router");
                    break;
                }
                Err(TransportError::Disconnected) => {
                    warn!("Inbound transport disconnected, stopping response router");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "Error reading inbound frame");
                }
            }
        }
    }

    fn handle_frame<C: FrameClassifier>(&self, raw: &[u8], classifier: &C) {
        match classifier.classify(raw) {
            Some((key, payload)) => {
                self.deliver(&key, payload);
            }
            None => {
                debug!(len = raw.len(), "Dropped unclassifiable inbound frame");
            }
        }
    }
}

impl ResponseSink for ResponseRouter {
    fn deliver(&self, key: &CorrelationKey, payload: Payload) -> Delivery {
        ResponseRouter::deliver(self, key, payload)
    }
}
