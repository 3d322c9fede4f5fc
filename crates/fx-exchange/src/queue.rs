//! Transmit Queue - FIFO of frames waiting for the Dispatcher.
//!
//! Any number of `TransmitQueue` handles may submit; exactly one
//! `TransmitReceiver` drains. Frames leave in submission order.

use crate::domain::correlation::{CorrelationKey, ExchangeId};
use crate::domain::errors::{ExchangeError, ExchangeResult};
use crate::domain::slot::SendSlot;
use crate::domain::types::Frame;
use tokio::sync::mpsc;

/// One frame plus the slot to signal once it is written
#[derive(Debug)]
pub struct Submission {
    pub exchange_id: ExchangeId,
    pub key: CorrelationKey,
    pub frame: Frame,
    pub send_slot: SendSlot,
}

#[derive(Clone)]
enum QueueSender {
    Bounded(mpsc::Sender<Submission>),
    Unbounded(mpsc::UnboundedSender<Submission>),
}

enum QueueReceiver {
    Bounded(mpsc::Receiver<Submission>),
    Unbounded(mpsc::UnboundedReceiver<Submission>),
}

/// Producer handle. Cheap to clone.
#[derive(Clone)]
pub struct TransmitQueue {
    sender: QueueSender,
}

/// Consumer handle, owned by the Dispatcher
pub struct TransmitReceiver {
    receiver: QueueReceiver,
}

/// Create a queue. `None` is unbounded; `Some(n)` applies backpressure at `n`.
pub fn transmit_queue(capacity: Option<usize>) -> (TransmitQueue, TransmitReceiver) {
    match capacity {
        Some(capacity) => {
            let (tx, rx) = mpsc::channel(capacity.max(1));
            (
                TransmitQueue {
                    sender: QueueSender::Bounded(tx),
                },
                TransmitReceiver {
                    receiver: QueueReceiver::Bounded(rx),
                },
            )
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                TransmitQueue {
                    sender: QueueSender::Unbounded(tx),
                },
                TransmitReceiver {
                    receiver: QueueReceiver::Unbounded(rx),
                },
            )
        }
    }
}

impl TransmitQueue {
    /// Append to the tail. Waits for room on a bounded queue.
    pub async fn submit(&self, submission: Submission) -> ExchangeResult<()> {
        match &self.sender {
            QueueSender::Bounded(tx) => tx
                .send(submission)
                .await
                .map_err(|_| ExchangeError::QueueClosed),
            QueueSender::Unbounded(tx) => tx
                .send(submission)
                .map_err(|_| ExchangeError::QueueClosed),
        }
    }

    /// True once the receiver has been closed or dropped
    pub fn is_closed(&self) -> bool {
        match &self.sender {
            QueueSender::Bounded(tx) => tx.is_closed(),
            QueueSender::Unbounded(tx) => tx.is_closed(),
        }
    }
}

impl TransmitReceiver {
    /// Pop the head. `None` once every producer is gone.
    pub async fn recv(&mut self) -> Option<Submission> {
        match &mut self.receiver {
            QueueReceiver::Bounded(rx) => rx.recv().await,
            QueueReceiver::Unbounded(rx) => rx.recv().await,
        }
    }

    /// Refuse further submissions. Already queued items can still be drained.
    pub fn close(&mut self) {
        match &mut self.receiver {
            QueueReceiver::Bounded(rx) => rx.close(),
            QueueReceiver::Unbounded(rx) => rx.close(),
        }
    }
}
