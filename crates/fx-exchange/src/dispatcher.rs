//! Dispatcher - the single writer of the shared channel.
//!
//! Drains the Transmit Queue in FIFO order, writes each frame, then signals
//! the frame's `SendSlot`. A write error fails that one slot; the loop keeps
//! going. Signalling a slot the caller already gave up on is a no-op.

use crate::metrics::ExchangeMetrics;
use crate::ports::outbound::FrameWriter;
use crate::queue::{Submission, TransmitReceiver};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub struct Dispatcher<W> {
    receiver: TransmitReceiver,
    writer: W,
    frame_gap: Duration,
    metrics: Arc<ExchangeMetrics>,
}

impl<W: FrameWriter> Dispatcher<W> {
    pub fn new(receiver: TransmitReceiver, writer: W, metrics: Arc<ExchangeMetrics>) -> Self {
        Self {
            receiver,
            writer,
            frame_gap: Duration::ZERO,
            metrics,
        }
    }

    /// Pause after every written frame
    pub fn with_frame_gap(mut self, frame_gap: Duration) -> Self {
        self.frame_gap = frame_gap;
        self
    }

    /// Run until shutdown or until every queue producer is gone.
    ///
    /// Submissions still queued at that point are dropped unresolved; their
    /// callers run into their send timeout. Returns the writer to whoever
    /// drives the Dispatcher; `ExchangeService` drops it, closing the
    /// transport.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> W {
        info!(frame_gap_ms = self.frame_gap.as_millis() as u64, "Dispatcher started");

        loop {
            let submission = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Dispatcher received shutdown signal");
                        break;
                    }
                    continue;
                }
                next = self.receiver.recv() => match next {
                    Some(submission) => submission,
                    None => {
                        info!("Transmit queue closed, stopping dispatcher");
                        break;
                    }
                },
            };

            self.dispatch(submission).await;

            if !self.frame_gap.is_zero() {
                tokio::time::sleep(self.frame_gap).await;
            }
        }

        self.receiver.close();
        self.writer
    }

    async fn dispatch(&mut self, submission: Submission) {
        let Submission {
            exchange_id,
            key,
            frame,
            send_slot,
        } = submission;

        match self.writer.write_frame(&frame).await {
            Ok(()) => {
                ExchangeMetrics::incr(&self.metrics.frames_written);
                if send_slot.fulfill(()) {
                    debug!(
                        key = %key,
                        exchange_id = %exchange_id,
                        len = frame.len(),
                        "Frame written"
                    );
                } else {
                    debug!(
                        key = %key,
                        exchange_id = %exchange_id,
                        state = send_slot.state().label(),
                        "Frame written after caller stopped waiting"
                    );
                }
            }
            Err(e) => {
                ExchangeMetrics::incr(&self.metrics.write_failures);
                warn!(
                    key = %key,
                    exchange_id = %exchange_id,
                    error = %e,
                    "Frame write failed"
                );
                send_slot.fail(e);
            }
        }
    }
}
