//! Routes `decoy-revoked` signals into the ledger.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::PermitLedger;
use crate::signal::SignalBus;

/// Subscribe now and revoke permits until `shutdown` fires or the bus closes.
///
/// The subscription is taken before spawning, so revocations published
/// right after this returns are not missed. It reads the bus's unbounded
/// revocation path, so bursts of other signals cannot push revocations out.
pub(crate) fn spawn_revocation_listener(
    bus: &SignalBus,
    ledger: Arc<PermitLedger>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let mut revocations = bus.subscribe_revocations();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                revocation = revocations.recv() => match revocation {
                    Some(Some(key)) => {
                        ledger.revoke(&key);
                    }
                    Some(None) => {
                        tracing::trace!("Ignoring revocation without key");
                    }
                    None => break,
                },
            }
        }
        tracing::debug!("Revocation listener exiting");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permit::RevokeHandler;
    use crate::signal::{Key, Signal};
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn revocation_signal_fires_handler() {
        let bus = SignalBus::new(8);
        let ledger = Arc::new(PermitLedger::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        ledger.grant(
            Key::new("article"),
            Some(RevokeHandler::new(move || {
                let _ = tx.send("article");
            })),
        );
        ledger.grant(Key::new("page"), None);

        let _listener = spawn_revocation_listener(&bus, Arc::clone(&ledger), CancellationToken::new());
        bus.publish(Signal::revoked("article"));

        let fired = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert_eq!(fired, Some("article"));
        assert_eq!(ledger.count(&Key::new("article")), 0);
        assert_eq!(ledger.count(&Key::new("page")), 1);
    }

    #[tokio::test]
    async fn malformed_revocation_is_ignored() {
        let bus = SignalBus::new(8);
        let ledger = Arc::new(PermitLedger::new());
        ledger.grant(Key::new("article"), None);

        let listener = spawn_revocation_listener(&bus, Arc::clone(&ledger), CancellationToken::new());
        bus.publish(Signal::DecoyRevoked { key: None });
        bus.publish(Signal::revoked("page"));
        drop(bus);

        // Bus closes once every sender is gone; the listener drains and exits.
        listener.await.unwrap();
        assert_eq!(ledger.count(&Key::new("article")), 1);
    }

    #[tokio::test]
    async fn burst_of_signals_does_not_lose_revocations() {
        let bus = SignalBus::new(1);
        let ledger = Arc::new(PermitLedger::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        for key in ["article", "body", "page"] {
            let tx = tx.clone();
            ledger.grant(
                Key::new(key),
                Some(RevokeHandler::new(move || {
                    let _ = tx.send(key);
                })),
            );
        }
        drop(tx);

        let listener = spawn_revocation_listener(&bus, Arc::clone(&ledger), CancellationToken::new());
        // Current-thread runtime: nothing is received until the test yields.
        for key in ["article", "body", "page"] {
            bus.publish(Signal::revoked(key));
            bus.publish(Signal::confirmed(key));
        }
        drop(bus);
        listener.await.unwrap();

        let mut fired = Vec::new();
        while let Some(key) = rx.recv().await {
            fired.push(key);
        }
        assert_eq!(fired, vec!["article", "body", "page"]);
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn shutdown_stops_listener() {
        let bus = SignalBus::new(8);
        let ledger = Arc::new(PermitLedger::new());
        let shutdown = CancellationToken::new();

        let listener = spawn_revocation_listener(&bus, Arc::clone(&ledger), shutdown.clone());
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(1), listener)
            .await
            .unwrap()
            .unwrap();
    }
}
