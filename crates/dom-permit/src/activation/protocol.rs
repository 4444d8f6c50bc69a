//! The request → confirm handshake for a single key.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use super::{Activation, ActivationError, ActivationState};
use crate::document::{Document, Element, Selector};
use crate::signal::{Key, Signal, SignalBus};

/// Everything a handshake needs from the coordinator.
#[derive(Clone)]
pub(crate) struct HandshakeContext {
    pub bus: SignalBus,
    pub document: Arc<dyn Document>,
    pub timeout: Duration,
    pub shutdown: CancellationToken,
}

/// Start a handshake for `key` and return its shared handle.
///
/// The expected placeholder count is snapshotted and the bus subscription
/// taken before the request is published, so no confirmation can be missed.
/// Must be called inside a tokio runtime.
pub(crate) fn start_handshake(key: Key, ctx: &HandshakeContext) -> Activation {
    let expected = ctx.document.query_all(&Selector::placeholders(&key)).len();
    let signals = ctx.bus.subscribe();
    let (state_tx, state_rx) = watch::channel(ActivationState::Pending);

    tracing::debug!(%key, expected, "Requesting decoy activation");
    ctx.bus.publish(Signal::DecoyRequested {
        key: key.clone(),
        active: true,
    });

    let handshake = Handshake {
        key: key.clone(),
        expected,
        claimed: Vec::new(),
        document: Arc::clone(&ctx.document),
        state_tx,
    };
    tokio::spawn(handshake.run(
        signals,
        ctx.bus.clone(),
        ctx.timeout,
        ctx.shutdown.clone(),
    ));

    Activation::new(key, state_rx)
}

enum Outcome {
    Fulfilled,
    TimedOut,
    BusClosed,
    Shutdown,
}

struct Handshake {
    key: Key,
    expected: usize,
    claimed: Vec<Element>,
    document: Arc<dyn Document>,
    state_tx: watch::Sender<ActivationState>,
}

impl Handshake {
    async fn run(
        mut self,
        mut signals: broadcast::Receiver<Signal>,
        bus: SignalBus,
        timeout: Duration,
        shutdown: CancellationToken,
    ) {
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let outcome = loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break Outcome::Shutdown,

                signal = signals.recv() => match signal {
                    Ok(signal) if signal.confirms(&self.key) => {
                        tracing::trace!(key = %self.key, "Decoy confirmation received");
                        if self.claim_pass() {
                            break Outcome::Fulfilled;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // A confirmation may have been among the skipped signals.
                        tracing::warn!(key = %self.key, skipped, "Handshake lagged behind signal bus");
                        if self.claim_pass() {
                            break Outcome::Fulfilled;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break Outcome::BusClosed,
                },

                _ = &mut deadline => break Outcome::TimedOut,
            }
        };

        // Stop listening before anything is announced.
        drop(signals);

        match outcome {
            Outcome::Fulfilled => {
                tracing::debug!(key = %self.key, claimed = self.claimed.len(), "Decoy activation fulfilled");
                let elements = std::mem::take(&mut self.claimed);
                self.settle(ActivationState::Fulfilled(elements));
            }
            Outcome::TimedOut => {
                tracing::warn!(
                    key = %self.key,
                    expected = self.expected,
                    claimed = self.claimed.len(),
                    ?timeout,
                    "Decoy activation timed out"
                );
                self.abandon(&bus);
                self.settle(ActivationState::Failed(ActivationError::Timeout {
                    key: self.key.clone(),
                    timeout,
                }));
            }
            Outcome::BusClosed => {
                tracing::warn!(key = %self.key, "Signal bus closed during decoy activation");
                self.settle(ActivationState::Failed(ActivationError::BusClosed(
                    self.key.clone(),
                )));
            }
            Outcome::Shutdown => {
                tracing::debug!(key = %self.key, "Decoy activation interrupted by shutdown");
                self.abandon(&bus);
                self.settle(ActivationState::Failed(ActivationError::Shutdown(
                    self.key.clone(),
                )));
            }
        }
    }

    /// Claim every unclaimed clone for this key. Returns true once enough are held.
    ///
    /// Scans the whole document each time: the renderer may confirm several
    /// batches with one signal, or one batch with several.
    fn claim_pass(&mut self) -> bool {
        if self.expected == 0 {
            return false;
        }

        for element in self.document.query_all(&Selector::claimable(&self.key)) {
            if element.try_claim() {
                tracing::trace!(key = %self.key, element = %element.id(), "Claimed decoy clone");
                self.claimed.push(element);
            }
        }

        self.claimed.len() >= self.expected
    }

    /// Tell the renderer this request is abandoned.
    fn abandon(&self, bus: &SignalBus) {
        bus.publish(Signal::DecoyRequested {
            key: self.key.clone(),
            active: false,
        });
    }

    fn settle(&self, state: ActivationState) {
        let settled = self.state_tx.send_if_modified(|current| {
            if current.is_pending() {
                *current = state;
                true
            } else {
                false
            }
        });
        if !settled {
            tracing::error!(key = %self.key, "Decoy activation settled twice");
        }
    }
}
