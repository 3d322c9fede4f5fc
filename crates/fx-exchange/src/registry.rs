//! Pending Registry - maps a correlation key to the one response slot
//! currently waiting on it.
//!
//! Flow:
//! 1. Coordinator creates a `ResponseSlot` and calls `register()`; any live
//!    slot already held for the key is superseded in the same critical section
//! 2. Response Router calls `resolve()` when an inbound frame is classified
//! 3. Coordinator calls `remove_if_current()` when its call ends
//!
//! The registry holds `WeakSlot`s only. A slot lives as long as the
//! `exchange` call that created it, never longer.

use crate::domain::correlation::{CorrelationKey, ExchangeId};
use crate::domain::slot::{ResponseSlot, WeakSlot};
use crate::domain::types::Payload;
use crate::metrics::ExchangeMetrics;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Outcome of handing an inbound payload to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A pending slot took the payload
    Delivered(ExchangeId),
    /// No live slot for the key; the payload was dropped
    Unmatched,
}

impl Delivery {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Delivery::Delivered(_))
    }
}

/// Key → current response slot.
///
/// Invariant: at most one entry per key; an entry is only ever replaced or
/// removed under the key's shard lock.
pub struct PendingRegistry {
    entries: DashMap<CorrelationKey, WeakSlot<Payload>>,
    metrics: Arc<ExchangeMetrics>,
}

impl PendingRegistry {
    pub fn new(metrics: Arc<ExchangeMetrics>) -> Self {
        Self {
            entries: DashMap::new(),
            metrics,
        }
    }

    /// Make `slot` the current slot for `key`.
    ///
    /// A pending predecessor is moved to `Superseded` before the shard lock
    /// is released, so no response can reach it afterwards. Returns the id
    /// of the superseded exchange, if there was one.
    pub fn register(&self, key: CorrelationKey, slot: &ResponseSlot) -> Option<ExchangeId> {
        let weak = slot.downgrade();
        let superseded = match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let previous = occupied.insert(weak);
                previous
                    .upgrade()
                    .filter(|prev| prev.supersede())
                    .map(|prev| prev.id())
            }
            Entry::Vacant(vacant) => {
                vacant.insert(weak);
                None
            }
        };

        match superseded {
            Some(previous) => debug!(
                key = %key,
                exchange_id = %slot.id(),
                superseded = %previous,
                "Registered response slot, superseding older request"
            ),
            None => debug!(
                key = %key,
                exchange_id = %slot.id(),
                "Registered response slot"
            ),
        }

        superseded
    }

    /// Fulfil the current slot for `key` with `payload`.
    ///
    /// Lookup and fulfilment happen under the key's read lock, so they cannot
    /// interleave with a `register()` for the same key. The entry itself is
    /// left for the waiting coordinator to remove.
    pub fn resolve(&self, key: &CorrelationKey, payload: Payload) -> Delivery {
        let delivered = self.entries.get(key).and_then(|entry| {
            let slot = entry.value().upgrade()?;
            slot.fulfill(payload).then(|| slot.id())
        });

        match delivered {
            Some(id) => {
                ExchangeMetrics::incr(&self.metrics.responses_delivered);
                debug!(key = %key, exchange_id = %id, "Delivered response");
                Delivery::Delivered(id)
            }
            None => {
                ExchangeMetrics::incr(&self.metrics.responses_unmatched);
                debug!(key = %key, "Dropped response with no waiting request");
                Delivery::Unmatched
            }
        }
    }

    /// Remove the entry for `key` only if it still belongs to exchange `id`.
    pub fn remove_if_current(&self, key: &CorrelationKey, id: ExchangeId) -> bool {
        let removed = self
            .entries
            .remove_if(key, |_, current| current.id() == id)
            .is_some();
        if removed {
            debug!(key = %key, exchange_id = %id, "Removed response slot");
        }
        removed
    }

    /// Drop entries whose slot was released or already resolved.
    ///
    /// Returns the number of entries removed.
    pub fn purge_stale(&self) -> usize {
        let mut removed = 0;
        self.entries.retain(|key, slot| {
            if slot.is_stale() {
                debug!(key = %key, exchange_id = %slot.id(), "Purging stale response slot");
                removed += 1;
                false
            } else {
                true
            }
        });
        ExchangeMetrics::add(&self.metrics.entries_purged, removed as u64);
        removed
    }

    /// Id of the exchange currently registered for `key`
    pub fn current(&self, key: &CorrelationKey) -> Option<ExchangeId> {
        self.entries.get(key).map(|entry| entry.value().id())
    }

    pub fn contains(&self, key: &CorrelationKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn metrics(&self) -> &Arc<ExchangeMetrics> {
        &self.metrics
    }
}

/// Background task that periodically purges stale entries.
///
/// Stops when `shutdown` flips to `true` or its sender is dropped.
pub async fn purge_task(
    registry: Arc<PendingRegistry>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut purge_interval = tokio::time::interval(interval);
    purge_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = purge_interval.tick() => {
                let removed = registry.purge_stale();
                if removed > 0 {
                    debug!(removed = removed, "Purged stale response slots");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Registry janitor stopped");
                    break;
                }
            }
        }
    }
}
