//! Domain types for the exchange layer.
//!
//! Plain data and the completion cell; no tasks, no transport.

pub mod config;
pub mod correlation;
pub mod errors;
pub mod slot;
pub mod types;

// Re-exports for convenience
pub use config::ExchangeConfig;
pub use correlation::{CorrelationKey, ExchangeId};
pub use errors::{ConfigError, ExchangeError, ExchangeResult, TransportError};
pub use slot::{ResponseSlot, SendSlot, Slot, SlotState, WeakSlot};
pub use types::{Frame, Payload};
