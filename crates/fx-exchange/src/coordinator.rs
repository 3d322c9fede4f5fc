//! Exchange Coordinator - the public request/response entry point.
//!
//! ```text
//! exchange(frame, key)
//!   1. register ResponseSlot under key   (supersedes any older slot)
//!   2. submit (frame, SendSlot)          → Transmit Queue → Dispatcher
//!   3. wait SendSlot       ≤ send_timeout      (from submission)
//!   4. wait ResponseSlot   ≤ response_timeout  (from send confirmation)
//!   5. remove registry entry iff it still holds this exchange's id
//! ```
//!
//! Step 5 runs from a drop guard, so it also happens when the caller drops
//! the `exchange` future mid-flight.

use crate::domain::config::ExchangeConfig;
use crate::domain::correlation::{CorrelationKey, ExchangeId};
use crate::domain::errors::{ExchangeError, ExchangeResult};
use crate::domain::slot::{ResponseSlot, SendSlot, SlotState};
use crate::domain::types::{Frame, Payload};
use crate::metrics::ExchangeMetrics;
use crate::ports::inbound::ExchangeApi;
use crate::queue::{Submission, TransmitQueue};
use crate::registry::PendingRegistry;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

pub struct ExchangeCoordinator {
    registry: Arc<PendingRegistry>,
    queue: TransmitQueue,
    config: ExchangeConfig,
    metrics: Arc<ExchangeMetrics>,
}

impl ExchangeCoordinator {
    pub fn new(
        registry: Arc<PendingRegistry>,
        queue: TransmitQueue,
        config: ExchangeConfig,
        metrics: Arc<ExchangeMetrics>,
    ) -> Self {
        Self {
            registry,
            queue,
            config,
            metrics,
        }
    }

    /// `exchange` with the configured timeouts
    pub async fn exchange_default(
        &self,
        frame: Frame,
        key: CorrelationKey,
    ) -> ExchangeResult<Payload> {
        self.exchange(
            frame,
            key,
            self.config.send_timeout(),
            self.config.response_timeout(),
        )
        .await
    }

    /// Send `frame` and wait for the response correlated by `key`.
    pub async fn exchange(
        &self,
        frame: Frame,
        key: CorrelationKey,
        send_timeout: Duration,
        response_timeout: Duration,
    ) -> ExchangeResult<Payload> {
        let exchange_id = ExchangeId::new();
        let submitted_at = Instant::now();
        ExchangeMetrics::incr(&self.metrics.exchanges_started);

        let response_slot = ResponseSlot::new(exchange_id);
        let mut registration = Registration::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.metrics),
            key.clone(),
            response_slot.clone(),
        );

        let send_slot = SendSlot::new(exchange_id);
        let submission = Submission {
            exchange_id,
            key: key.clone(),
            frame,
            send_slot: send_slot.clone(),
        };

        let sent = self
            .await_send(
                submission,
                &send_slot,
                deadline_after(submitted_at, send_timeout),
                send_timeout,
            )
            .await;
        let result = match sent {
            Ok(()) => {
                let deadline = deadline_after(Instant::now(), response_timeout);
                self.await_response(&key, &response_slot, deadline, response_timeout)
                    .await
            }
            Err(e) => {
                // Nothing will wait on the response slot; make it terminal now
                if e.is_timeout() {
                    response_slot.time_out();
                } else {
                    response_slot.abandon();
                }
                Err(e)
            }
        };
        registration.finish();

        self.record(&key, exchange_id, &result);
        result
    }

    /// Enqueue and wait for the Dispatcher's write confirmation.
    ///
    /// The deadline covers enqueueing too, which matters for bounded queues.
    async fn await_send(
        &self,
        submission: Submission,
        send_slot: &SendSlot,
        deadline: Instant,
        send_timeout: Duration,
    ) -> ExchangeResult<()> {
        let key = submission.key.clone();
        let waited = timeout_at(deadline, async {
            self.queue.submit(submission).await?;
            Ok::<_, ExchangeError>(send_slot.wait().await)
        })
        .await;

        let state = match waited {
            Ok(Ok(state)) => state,
            Ok(Err(e)) => return Err(e),
            Err(_) if send_slot.time_out() => SlotState::TimedOut,
            // The Dispatcher resolved the slot while the deadline fired
            Err(_) => send_slot.state(),
        };

        match state {
            SlotState::Fulfilled(()) => Ok(()),
            SlotState::Failed(e) => Err(ExchangeError::TransportFailure(e)),
            SlotState::TimedOut | SlotState::Pending => Err(ExchangeError::SendTimeout {
                key,
                timeout: send_timeout,
            }),
            SlotState::Superseded | SlotState::Abandoned => Err(ExchangeError::QueueClosed),
        }
    }

    /// Wait for the Response Router, a newer request, or the deadline.
    async fn await_response(
        &self,
        key: &CorrelationKey,
        response_slot: &ResponseSlot,
        deadline: Instant,
        response_timeout: Duration,
    ) -> ExchangeResult<Payload> {
        let state = match timeout_at(deadline, response_slot.wait()).await {
            Ok(state) => state,
            Err(_) if response_slot.time_out() => SlotState::TimedOut,
            // A response or supersession won the race against the deadline
            Err(_) => response_slot.state(),
        };

        match state {
            SlotState::Fulfilled(payload) => Ok(payload),
            SlotState::Superseded => Err(ExchangeError::Superseded { key: key.clone() }),
            SlotState::Failed(e) => Err(ExchangeError::TransportFailure(e)),
            SlotState::TimedOut | SlotState::Pending | SlotState::Abandoned => {
                Err(ExchangeError::ResponseTimeout {
                    key: key.clone(),
                    timeout: response_timeout,
                })
            }
        }
    }

    fn record(&self, key: &CorrelationKey, id: ExchangeId, result: &ExchangeResult<Payload>) {
        let counter = match result {
            Ok(payload) => {
                debug!(key = %key, exchange_id = %id, len = payload.len(), "Exchange completed");
                &self.metrics.exchanges_completed
            }
            Err(e) => {
                debug!(key = %key, exchange_id = %id, error = %e, "Exchange failed");
                match e {
                    ExchangeError::SendTimeout { .. } => &self.metrics.send_timeouts,
                    ExchangeError::ResponseTimeout { .. } => &self.metrics.response_timeouts,
                    ExchangeError::Superseded { .. } => &self.metrics.superseded,
                    ExchangeError::TransportFailure(_) | ExchangeError::QueueClosed => {
                        &self.metrics.transport_failures
                    }
                }
            }
        };
        ExchangeMetrics::incr(counter);
    }

    pub fn registry(&self) -> &Arc<PendingRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }
}

#[async_trait]
impl ExchangeApi for ExchangeCoordinator {
    async fn exchange(
        &self,
        frame: Frame,
        key: CorrelationKey,
        send_timeout: Duration,
        response_timeout: Duration,
    ) -> ExchangeResult<Payload> {
        ExchangeCoordinator::exchange(self, frame, key, send_timeout, response_timeout).await
    }
}

/// Roughly 30 years; stands in for "no bound" when a deadline overflows.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `start + timeout`, saturating to a far-future instant on overflow.
fn deadline_after(start: Instant, timeout: Duration) -> Instant {
    start
        .checked_add(timeout)
        .unwrap_or_else(|| start + FAR_FUTURE)
}

/// Owns one key's registry entry for the duration of an `exchange` call.
///
/// Dropping it without `finish()` means the caller abandoned the call.
struct Registration {
    registry: Arc<PendingRegistry>,
    metrics: Arc<ExchangeMetrics>,
    key: CorrelationKey,
    slot: ResponseSlot,
    finished: bool,
}

impl Registration {
    fn new(
        registry: Arc<PendingRegistry>,
        metrics: Arc<ExchangeMetrics>,
        key: CorrelationKey,
        slot: ResponseSlot,
    ) -> Self {
        registry.register(key.clone(), &slot);
        Self {
            registry,
            metrics,
            key,
            slot,
            finished: false,
        }
    }

    fn finish(&mut self) {
        self.finished = true;
        self.release();
    }

    fn release(&self) {
        self.registry.remove_if_current(&self.key, self.slot.id());
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // Counted even if the slot already resolved: the caller never saw it
        ExchangeMetrics::incr(&self.metrics.abandoned);
        if self.slot.abandon() {
            warn!(
                key = %self.key,
                exchange_id = %self.slot.id(),
                elapsed_ms = self.slot.elapsed().as_millis() as u64,
                "Exchange abandoned by caller"
            );
        } else {
            debug!(
                key = %self.key,
                exchange_id = %self.slot.id(),
                state = self.slot.state().label(),
                "Exchange dropped after its slot resolved"
            );
        }
        self.release();
    }
}
