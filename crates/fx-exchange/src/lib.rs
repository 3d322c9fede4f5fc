#![allow(missing_docs)]

//! FX Exchange - request/response correlation over one shared frame channel.
//!
//! Many concurrent callers share a single ordered, full-duplex channel to a
//! device. Each caller submits a request frame tagged with a correlation key
//! and waits for the response carrying the same key.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                        EXCHANGE SERVICE                              │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │   caller   caller   caller                                           │
//! │     │        │        │   exchange(frame, key, send_to, resp_to)     │
//! │  ┌──┴────────┴────────┴──┐          ┌───────────────────────────┐    │
//! │  │  Exchange Coordinator │─register→│     Pending Registry      │    │
//! │  └──────────┬────────────┘          │ key → WeakSlot (1 per key)│    │
//! │             │ submit                └─────────────▲─────────────┘    │
//! │  ┌──────────┴────────────┐                        │ resolve          │
//! │  │    Transmit Queue     │          ┌─────────────┴─────────────┐    │
//! │  │        (FIFO)         │          │      Response Router      │    │
//! │  └──────────┬────────────┘          └─────────────▲─────────────┘    │
//! │  ┌──────────┴────────────┐                        │ classify         │
//! │  │ Dispatcher (1 writer) │                        │                  │
//! │  └──────────┬────────────┘                        │                  │
//! └─────────────┼─────────────────────────────────────┼──────────────────┘
//!               ▼ FrameWriter                         │ InboundSource
//!                        shared device channel
//! ```
//!
//! # Guarantees
//!
//! - Frames hit the wire in submission order, written by exactly one task.
//! - Every `exchange` call ends in exactly one outcome: payload, send
//!   timeout, response timeout, superseded, or transport failure.
//! - At most one pending exchange per key. A newer request on the same key
//!   supersedes the older one.
//! - The registry never outlives a finished call: entries are removed on
//!   every exit path, including cancellation.
//!
//! # Usage
//!
//! ```ignore
//! use fx_exchange::{channel_writer, ExchangeConfig, ExchangeService};
//!
//! let (writer, device_rx) = channel_writer();
//! let mut service = ExchangeService::start(ExchangeConfig::default(), writer)?;
//! service.spawn_listener(source, classifier);
//!
//! let payload = service.coordinator().exchange_default(frame, "A".into()).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod coordinator;
pub mod dispatcher;
pub mod domain;
pub mod metrics;
pub mod ports;
pub mod queue;
pub mod registry;
pub mod router;
pub mod service;

pub use adapters::{channel_source, channel_writer, ChannelSource, ChannelWriter, KeyPrefixClassifier};
pub use coordinator::ExchangeCoordinator;
pub use dispatcher::Dispatcher;
pub use domain::{
    ConfigError, CorrelationKey, ExchangeConfig, ExchangeError, ExchangeId, ExchangeResult, Frame,
    Payload, ResponseSlot, SendSlot, Slot, SlotState, TransportError, WeakSlot,
};
pub use metrics::{ExchangeMetrics, MetricsSnapshot};
pub use ports::{ExchangeApi, FrameClassifier, FrameWriter, InboundSource, ResponseSink};
pub use queue::{transmit_queue, Submission, TransmitQueue, TransmitReceiver};
pub use registry::{purge_task, Delivery, PendingRegistry};
pub use router::ResponseRouter;
pub use service::ExchangeService;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
