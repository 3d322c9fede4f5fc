//! FX-Stress: concurrent stress harness for the exchange layer.
//!
//! Many senders share a handful of correlation keys. For every sender a
//! simulated device answer is scheduled after a staggered delay, racing the
//! sender's own timeouts and the supersession caused by later senders on the
//! same key. Every sender must end in exactly one outcome, and the Pending
//! Registry must be empty once all of them have returned.

use bytes::Bytes;
use fx_exchange::{
    channel_writer, CorrelationKey, ExchangeConfig, ExchangeError, ExchangeService, Frame,
    MetricsSnapshot,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Shape of one stress run
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Concurrent `exchange` callers
    pub senders: usize,
    /// Distinct correlation keys, shared round-robin
    pub keys: usize,
    /// Simulated answer for sender `i` arrives after
    /// `min_delay + (i % delay_buckets) * delay_step`
    pub min_delay: Duration,
    pub delay_step: Duration,
    pub delay_buckets: usize,
    /// Extra random delay added to each answer, up to this bound
    pub jitter: Duration,
    /// Used for both the send and the response stage
    pub timeout: Duration,
    /// Dispatcher pause after every written frame
    pub frame_gap: Duration,
    /// Fixed RNG seed for reproducible jitter
    pub seed: Option<u64>,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            senders: 40,
            keys: 3,
            min_delay: Duration::ZERO,
            delay_step: Duration::from_millis(10),
            delay_buckets: 5,
            jitter: Duration::ZERO,
            timeout: Duration::from_millis(50),
            frame_gap: Duration::from_millis(10),
            seed: None,
        }
    }
}

/// Final state of one sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    SendTimeout,
    ResponseTimeout,
    Superseded,
    TransportFailure,
}

impl From<&Result<Bytes, ExchangeError>> for Outcome {
    fn from(result: &Result<Bytes, ExchangeError>) -> Self {
        match result {
            Ok(_) => Outcome::Completed,
            Err(ExchangeError::SendTimeout { .. }) => Outcome::SendTimeout,
            Err(ExchangeError::ResponseTimeout { .. }) => Outcome::ResponseTimeout,
            Err(ExchangeError::Superseded { .. }) => Outcome::Superseded,
            Err(ExchangeError::TransportFailure(_)) | Err(ExchangeError::QueueClosed) => {
                Outcome::TransportFailure
            }
        }
    }
}

/// Summary of a stress run
#[derive(Debug, Clone, Default, Serialize)]
pub struct StressReport {
    pub senders: usize,
    pub completed: usize,
    pub send_timeouts: usize,
    pub response_timeouts: usize,
    pub superseded: usize,
    pub transport_failures: usize,
    /// Senders whose task panicked or was cancelled
    pub lost: usize,
    /// Registry entries left after every sender returned
    pub residual_entries: usize,
    pub elapsed_ms: u64,
    pub metrics: MetricsSnapshot,
}

impl StressReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Completed => self.completed += 1,
            Outcome::SendTimeout => self.send_timeouts += 1,
            Outcome::ResponseTimeout => self.response_timeouts += 1,
            Outcome::Superseded => self.superseded += 1,
            Outcome::TransportFailure => self.transport_failures += 1,
        }
    }

    /// Senders that reported an outcome
    pub fn accounted(&self) -> usize {
        self.completed
            + self.send_timeouts
            + self.response_timeouts
            + self.superseded
            + self.transport_failures
    }

    /// Every sender accounted for and nothing left in the registry
    pub fn is_clean(&self) -> bool {
        self.lost == 0 && self.accounted() == self.senders && self.residual_entries == 0
    }
}

/// Run one stress round against a fresh service over in-memory channels.
pub async fn run_stress(config: &StressConfig) -> anyhow::Result<StressReport> {
    let exchange_config = ExchangeConfig {
        frame_gap_ms: config.frame_gap.as_millis() as u64,
        ..ExchangeConfig::default()
    };

    let (writer, mut device_rx) = channel_writer();
    let service = ExchangeService::start(exchange_config, writer)?;

    // The device consumes frames; answers are scheduled per sender below
    let device = tokio::spawn(async move {
        let mut frames = 0usize;
        while device_rx.recv().await.is_some() {
            frames += 1;
        }
        frames
    });

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let jitter_ms = config.jitter.as_millis() as u64;
    let buckets = config.delay_buckets.max(1) as u32;
    let keys = config.keys.max(1);

    info!(
        senders = config.senders,
        keys = keys,
        timeout_ms = config.timeout.as_millis() as u64,
        "Starting stress run"
    );

    let started = tokio::time::Instant::now();
    let mut senders = JoinSet::new();

    for i in 0..config.senders {
        let key = CorrelationKey::new(format!("sh{}", i % keys));
        let jitter = if jitter_ms > 0 {
            Duration::from_millis(rng.gen_range(0..=jitter_ms))
        } else {
            Duration::ZERO
        };
        let delay = config.min_delay + config.delay_step * (i as u32 % buckets) + jitter;

        let router = service.router();
        let answer_key = key.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let delivery = router.deliver(&answer_key, Bytes::from_static(b"OK"));
            debug!(key = %answer_key, delivered = delivery.is_delivered(), "Simulated answer");
        });

        let coordinator = service.coordinator();
        let timeout = config.timeout;
        senders.spawn(async move {
            let result = coordinator
                .exchange(Frame::from(&b"frame"[..]), key.clone(), timeout, timeout)
                .await;
            match &result {
                Ok(payload) => debug!(sender = i, key = %key, len = payload.len(), "Sender got response"),
                Err(e) => debug!(sender = i, key = %key, error = %e, "Sender failed"),
            }
            Outcome::from(&result)
        });
    }

    let mut report = StressReport {
        senders: config.senders,
        ..StressReport::default()
    };
    while let Some(joined) = senders.join_next().await {
        match joined {
            Ok(outcome) => report.record(outcome),
            Err(_) => report.lost += 1,
        }
    }

    report.elapsed_ms = started.elapsed().as_millis() as u64;
    report.residual_entries = service.registry().len();
    report.metrics = service.metrics();

    service.shutdown().await;
    let frames = device.await?;

    info!(
        completed = report.completed,
        send_timeouts = report.send_timeouts,
        response_timeouts = report.response_timeouts,
        superseded = report.superseded,
        frames = frames,
        residual = report.residual_entries,
        "Stress run finished"
    );

    Ok(report)
}
