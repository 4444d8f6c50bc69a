//! Readiness gate.
//!
//! Resolves once the document is fully loaded and, when the renderer owns
//! the DOM, the renderer has published `hydrated`. Computed once by a
//! background task; every waiter observes the same monotonic flag.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::document::Document;
use crate::signal::{Signal, SignalBus};

pub struct ReadinessGate {
    ready_rx: watch::Receiver<bool>,
    task: JoinHandle<()>,
}

impl ReadinessGate {
    /// Start watching the document. Must be called inside a tokio runtime.
    pub fn spawn(
        document: Arc<dyn Document>,
        bus: SignalBus,
        renderer_managed: bool,
        poll_interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        let (ready_tx, ready_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::debug!("Readiness gate stopped before document was ready");
                }
                _ = wait_until_ready(document, bus, renderer_managed, poll_interval) => {
                    tracing::debug!(renderer_managed, "Document ready");
                    ready_tx.send_replace(true);
                }
            }
        });

        Self { ready_rx, task }
    }

    pub fn is_ready(&self) -> bool {
        *self.ready_rx.borrow()
    }

    /// Wait for readiness. Never fails.
    pub async fn when_ready(&self) {
        let mut rx = self.ready_rx.clone();
        if rx.wait_for(|ready| *ready).await.is_err() {
            // Gate task stopped without becoming ready; readiness can no longer arrive.
            std::future::pending::<()>().await;
        }
    }
}

impl Drop for ReadinessGate {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn wait_until_ready(
    document: Arc<dyn Document>,
    bus: SignalBus,
    renderer_managed: bool,
    poll_interval: Duration,
) {
    while !document.ready_state().is_complete() {
        tokio::time::sleep(poll_interval).await;
    }

    if !renderer_managed {
        return;
    }

    // Subscribe before consulting the bus memory so no hydration slips between.
    let mut signals = bus.subscribe();
    if bus.has_hydrated() {
        return;
    }

    tracing::debug!("Waiting for renderer hydration");
    loop {
        match signals.recv().await {
            Ok(Signal::Hydrated) => return,
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Readiness gate lagged behind signal bus");
                if bus.has_hydrated() {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Closed) => {
                std::future::pending::<()>().await;
            }
        }
    }
}
