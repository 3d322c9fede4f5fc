//! Ports (hexagonal boundaries) of the exchange layer.

pub mod inbound;
pub mod outbound;

pub use inbound::{ExchangeApi, ResponseSink};
pub use outbound::{FrameClassifier, FrameWriter, InboundSource};
