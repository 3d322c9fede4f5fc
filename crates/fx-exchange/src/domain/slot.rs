//! Single-assignment completion cells.
//!
//! A `Slot` starts `Pending` and moves to exactly one terminal state. The
//! first resolution wins; every later attempt is a no-op that returns
//! `false`. Resolution never panics, whatever state the slot is in.
//!
//! ```text
//!              ┌──→ Fulfilled(T)
//!              ├──→ Failed(TransportError)   (send slots only)
//!   Pending ───┼──→ TimedOut
//!              ├──→ Superseded               (response slots only)
//!              └──→ Abandoned                (caller went away)
//! ```
//!
//! The state lives in a `tokio::sync::watch` channel so any number of
//! waiters can observe the terminal state, including waiters that arrive
//! after resolution.

use crate::domain::correlation::ExchangeId;
use crate::domain::errors::TransportError;
use crate::domain::types::Payload;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Slot signalled by the Dispatcher once a frame is physically written
pub type SendSlot = Slot<()>;

/// Slot resolved by the Response Router, a timeout, or supersession
pub type ResponseSlot = Slot<Payload>;

/// Lifecycle of a slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState<T> {
    Pending,
    Fulfilled(T),
    Failed(TransportError),
    TimedOut,
    Superseded,
    Abandoned,
}

impl<T> SlotState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, SlotState::Pending)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }

    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            SlotState::Pending => "pending",
            SlotState::Fulfilled(_) => "fulfilled",
            SlotState::Failed(_) => "failed",
            SlotState::TimedOut => "timed_out",
            SlotState::Superseded => "superseded",
            SlotState::Abandoned => "abandoned",
        }
    }
}

struct SlotShared<T> {
    id: ExchangeId,
    created_at: Instant,
    state: watch::Sender<SlotState<T>>,
}

/// Owning handle to a completion cell. Clones share the same cell.
pub struct Slot<T> {
    shared: Arc<SlotShared<T>>,
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone> Slot<T> {
    /// Create a pending slot owned by the exchange `id`
    pub fn new(id: ExchangeId) -> Self {
        let (state, _) = watch::channel(SlotState::Pending);
        Self {
            shared: Arc::new(SlotShared {
                id,
                created_at: Instant::now(),
                state,
            }),
        }
    }

    pub fn id(&self) -> ExchangeId {
        self.shared.id
    }

    /// Time since the slot was created
    pub fn elapsed(&self) -> Duration {
        self.shared.created_at.elapsed()
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SlotState<T> {
        self.shared.state.borrow().clone()
    }

    pub fn is_pending(&self) -> bool {
        self.shared.state.borrow().is_pending()
    }

    pub fn fulfill(&self, value: T) -> bool {
        self.resolve(SlotState::Fulfilled(value))
    }

    pub fn fail(&self, error: TransportError) -> bool {
        self.resolve(SlotState::Failed(error))
    }

    pub fn time_out(&self) -> bool {
        self.resolve(SlotState::TimedOut)
    }

    pub fn supersede(&self) -> bool {
        self.resolve(SlotState::Superseded)
    }

    pub fn abandon(&self) -> bool {
        self.resolve(SlotState::Abandoned)
    }

    /// Wait until the slot reaches a terminal state.
    ///
    /// Returns immediately if it already has.
    pub async fn wait(&self) -> SlotState<T> {
        let mut rx = self.shared.state.subscribe();
        // Bound to a local so the `Ref` guard is released before `rx` drops
        let state = match rx.wait_for(SlotState::is_terminal).await {
            Ok(state) => (*state).clone(),
            // The sender lives in `self.shared`, so it outlives this call.
            Err(_) => SlotState::Abandoned,
        };
        state
    }

    /// Non-owning handle for lookup tables
    pub fn downgrade(&self) -> WeakSlot<T> {
        WeakSlot {
            id: self.shared.id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    fn resolve(&self, next: SlotState<T>) -> bool {
        self.shared.state.send_if_modified(|state| {
            if state.is_pending() {
                *state = next;
                true
            } else {
                false
            }
        })
    }
}

impl<T> std::fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot").field("id", &self.shared.id).finish()
    }
}

/// Non-owning slot handle. Its identity is readable without upgrading.
pub struct WeakSlot<T> {
    id: ExchangeId,
    shared: Weak<SlotShared<T>>,
}

impl<T> Clone for WeakSlot<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            shared: Weak::clone(&self.shared),
        }
    }
}

impl<T> WeakSlot<T> {
    pub fn id(&self) -> ExchangeId {
        self.id
    }

    /// Recover the owning handle while some caller still holds the slot
    pub fn upgrade(&self) -> Option<Slot<T>> {
        self.shared.upgrade().map(|shared| Slot { shared })
    }

    /// True if the owner is gone or the slot already resolved
    pub fn is_stale(&self) -> bool {
        match self.shared.upgrade() {
            Some(shared) => shared.state.borrow().is_terminal(),
            None => true,
        }
    }
}

impl<T> std::fmt::Debug for WeakSlot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakSlot").field("id", &self.id).finish()
    }
}
