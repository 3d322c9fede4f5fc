//! Exchange Service - wires one connection's components together.
//!
//! ```text
//!   callers ──exchange()──→ ExchangeCoordinator ──→ TransmitQueue ──→ Dispatcher ──→ FrameWriter
//!                                 │                                                   (transport)
//!                                 ▼                                                       │
//!                          PendingRegistry ◄── ResponseRouter ◄── FrameClassifier ◄── InboundSource
//! ```
//!
//! Everything hangs off one `watch` shutdown channel, so the lifecycle of
//! the registry and tasks matches the lifecycle of the connection.

use crate::coordinator::ExchangeCoordinator;
use crate::dispatcher::Dispatcher;
use crate::domain::config::ExchangeConfig;
use crate::domain::errors::ConfigError;
use crate::metrics::{ExchangeMetrics, MetricsSnapshot};
use crate::ports::outbound::{FrameClassifier, FrameWriter, InboundSource};
use crate::queue::transmit_queue;
use crate::registry::{purge_task, PendingRegistry};
use crate::router::ResponseRouter;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

pub struct ExchangeService {
    coordinator: Arc<ExchangeCoordinator>,
    router: Arc<ResponseRouter>,
    registry: Arc<PendingRegistry>,
    metrics: Arc<ExchangeMetrics>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl ExchangeService {
    /// Validate `config` and spawn the Dispatcher (and janitor) for `writer`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<W>(config: ExchangeConfig, writer: W) -> Result<Self, ConfigError>
    where
        W: FrameWriter + 'static,
    {
        config.validate()?;

        let metrics = Arc::new(ExchangeMetrics::new());
        let registry = Arc::new(PendingRegistry::new(Arc::clone(&metrics)));
        let (queue, receiver) = transmit_queue(config.queue_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut tasks = Vec::new();

        let dispatcher = Dispatcher::new(receiver, writer, Arc::clone(&metrics))
            .with_frame_gap(config.frame_gap());
        let dispatcher_shutdown = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            // Dropping the returned writer closes the transport
            let writer = dispatcher.run(dispatcher_shutdown).await;
            drop(writer);
            debug!("Transport writer released");
        }));

        if let Some(interval) = config.purge_interval() {
            tasks.push(tokio::spawn(purge_task(
                Arc::clone(&registry),
                interval,
                shutdown_rx,
            )));
        }

        info!(
            send_timeout_ms = config.send_timeout_ms,
            response_timeout_ms = config.response_timeout_ms,
            queue_capacity = ?config.queue_capacity,
            "Exchange service started"
        );

        let coordinator = Arc::new(ExchangeCoordinator::new(
            Arc::clone(&registry),
            queue,
            config,
            Arc::clone(&metrics),
        ));
        let router = Arc::new(ResponseRouter::new(Arc::clone(&registry)));

        Ok(Self {
            coordinator,
            router,
            registry,
            metrics,
            shutdown_tx,
            tasks,
        })
    }

    /// Spawn the inbound listener for this connection
    pub fn spawn_listener<S, C>(&mut self, source: S, classifier: C)
    where
        S: InboundSource + 'static,
        C: FrameClassifier + 'static,
    {
        let router = Arc::clone(&self.router);
        let shutdown = self.shutdown_tx.subscribe();
        self.tasks.push(tokio::spawn(async move {
            router.run(source, classifier, shutdown).await;
        }));
    }

    pub fn coordinator(&self) -> Arc<ExchangeCoordinator> {
        Arc::clone(&self.coordinator)
    }

    pub fn router(&self) -> Arc<ResponseRouter> {
        Arc::clone(&self.router)
    }

    pub fn registry(&self) -> Arc<PendingRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Signal every task and wait for them to stop.
    ///
    /// The writer is dropped once the Dispatcher exits, so the transport is
    /// closed by the time this returns.
    pub async fn shutdown(mut self) {
        self.shutdown_tx.send_replace(true);
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                error!(error = %e, "Exchange task ended abnormally");
            }
        }
        info!("Exchange service stopped");
    }
}

impl Drop for ExchangeService {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}
