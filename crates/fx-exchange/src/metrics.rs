//! Counters for exchange, dispatch and routing outcomes.
//!
//! One `ExchangeMetrics` instance is shared (via `Arc`) by the coordinator,
//! the Dispatcher, the router and the registry janitor of a connection.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe outcome counters
#[derive(Debug, Default)]
pub struct ExchangeMetrics {
    /// `exchange` calls entered
    pub exchanges_started: AtomicU64,
    /// Calls that returned a payload
    pub exchanges_completed: AtomicU64,
    /// Calls that failed with `SendTimeout`
    pub send_timeouts: AtomicU64,
    /// Calls that failed with `ResponseTimeout`
    pub response_timeouts: AtomicU64,
    /// Calls that failed with `Superseded`
    pub superseded: AtomicU64,
    /// Calls that failed with `TransportFailure`
    pub transport_failures: AtomicU64,
    /// Calls dropped by their caller before finishing
    pub abandoned: AtomicU64,
    /// Frames the Dispatcher wrote successfully
    pub frames_written: AtomicU64,
    /// Frames whose write returned an error
    pub write_failures: AtomicU64,
    /// Inbound payloads matched to a waiting slot
    pub responses_delivered: AtomicU64,
    /// Inbound payloads with no live slot (late or unsolicited)
    pub responses_unmatched: AtomicU64,
    /// Registry entries removed by the janitor
    pub entries_purged: AtomicU64,
}

impl ExchangeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            exchanges_started: self.exchanges_started.load(Ordering::Relaxed),
            exchanges_completed: self.exchanges_completed.load(Ordering::Relaxed),
            send_timeouts: self.send_timeouts.load(Ordering::Relaxed),
            response_timeouts: self.response_timeouts.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            transport_failures: self.transport_failures.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            frames_written: self.frames_written.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            responses_delivered: self.responses_delivered.load(Ordering::Relaxed),
            responses_unmatched: self.responses_unmatched.load(Ordering::Relaxed),
            entries_purged: self.entries_purged.load(Ordering::Relaxed),
        }
    }
}

/// Serializable copy of `ExchangeMetrics`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub exchanges_started: u64,
    pub exchanges_completed: u64,
    pub send_timeouts: u64,
    pub response_timeouts: u64,
    pub superseded: u64,
    pub transport_failures: u64,
    pub abandoned: u64,
    pub frames_written: u64,
    pub write_failures: u64,
    pub responses_delivered: u64,
    pub responses_unmatched: u64,
    pub entries_purged: u64,
}

impl MetricsSnapshot {
    /// Calls that reached any terminal outcome
    pub fn exchanges_finished(&self) -> u64 {
        self.exchanges_completed
            + self.send_timeouts
            + self.response_timeouts
            + self.superseded
            + self.transport_failures
            + self.abandoned
    }
}
