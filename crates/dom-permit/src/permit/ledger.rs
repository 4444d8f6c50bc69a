//! Ledger of granted permits.

use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::signal::Key;

/// Callback run when a permit is revoked. Runs at most once, with no arguments.
pub struct RevokeHandler(Box<dyn FnOnce() + Send + 'static>);

impl RevokeHandler {
    pub fn new<F>(handler: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self(Box::new(handler))
    }

    pub fn invoke(self) {
        (self.0)()
    }
}

impl std::fmt::Debug for RevokeHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RevokeHandler")
    }
}

struct Permit {
    key: Key,
    granted_at: DateTime<Utc>,
    on_revoke: Option<RevokeHandler>,
}

/// Snapshot of a granted permit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermitInfo {
    pub key: Key,
    pub granted_at: DateTime<Utc>,
    pub revocable: bool,
}

/// Currently granted permits, in grant order.
///
/// Several permits may exist for one key.
#[derive(Default)]
pub struct PermitLedger {
    permits: Mutex<Vec<Permit>>,
}

impl PermitLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn permits(&self) -> MutexGuard<'_, Vec<Permit>> {
        self.permits.lock().unwrap_or_else(|poisoned| {
            tracing::error!("Permit ledger lock poisoned - recovering");
            poisoned.into_inner()
        })
    }

    pub fn grant(&self, key: Key, on_revoke: Option<RevokeHandler>) {
        tracing::info!(%key, revocable = on_revoke.is_some(), "Permit granted");
        self.permits().push(Permit {
            key,
            granted_at: Utc::now(),
            on_revoke,
        });
    }

    /// Remove every permit for `key` and run their handlers in grant order.
    ///
    /// Each handler runs exactly once, but only after its permit has left
    /// the ledger: filtering happens in one step under the lock and the
    /// handlers run once it is released. A handler may therefore grant or
    /// revoke permits itself, and observes the ledger without the revoked
    /// entries.
    pub fn revoke(&self, key: &Key) -> usize {
        let revoked: Vec<Permit> = {
            let mut permits = self.permits();
            let (revoked, kept) = std::mem::take(&mut *permits)
                .into_iter()
                .partition(|permit| &permit.key == key);
            *permits = kept;
            revoked
        };

        let count = revoked.len();
        for permit in revoked {
            if let Some(handler) = permit.on_revoke {
                handler.invoke();
            }
        }

        if count > 0 {
            tracing::info!(%key, count, "Permits revoked");
        } else {
            tracing::debug!(%key, "Revocation matched no permits");
        }
        count
    }

    pub fn count(&self, key: &Key) -> usize {
        self.permits().iter().filter(|p| &p.key == key).count()
    }

    pub fn len(&self) -> usize {
        self.permits().len()
    }

    pub fn is_empty(&self) -> bool {
        self.permits().is_empty()
    }

    pub fn snapshot(&self) -> Vec<PermitInfo> {
        self.permits()
            .iter()
            .map(|p| PermitInfo {
                key: p.key.clone(),
                granted_at: p.granted_at,
                revocable: p.on_revoke.is_some(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn recording(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> RevokeHandler {
        let log = Arc::clone(log);
        RevokeHandler::new(move || log.lock().unwrap().push(name))
    }

    #[test]
    fn revoke_removes_all_permits_for_key_in_order() {
        let ledger = PermitLedger::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        ledger.grant(Key::new("article"), Some(recording(&log, "a1")));
        ledger.grant(Key::new("page"), Some(recording(&log, "p1")));
        ledger.grant(Key::new("article"), None);
        ledger.grant(Key::new("article"), Some(recording(&log, "a2")));

        assert_eq!(ledger.revoke(&Key::new("article")), 3);

        assert_eq!(*log.lock().unwrap(), vec!["a1", "a2"]);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.count(&Key::new("page")), 1);
    }

    #[test]
    fn handlers_run_once() {
        let ledger = PermitLedger::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        ledger.grant(Key::new("body"), Some(recording(&log, "b")));

        assert_eq!(ledger.revoke(&Key::new("body")), 1);
        assert_eq!(ledger.revoke(&Key::new("body")), 0);
        assert_eq!(*log.lock().unwrap(), vec!["b"]);
        assert!(ledger.is_empty());
    }

    #[test]
    fn handler_may_grant_during_revocation() {
        let ledger = Arc::new(PermitLedger::new());
        let inner = Arc::clone(&ledger);

        ledger.grant(
            Key::new("article"),
            Some(RevokeHandler::new(move || inner.grant(Key::new("article"), None))),
        );

        assert_eq!(ledger.revoke(&Key::new("article")), 1);
        assert_eq!(ledger.count(&Key::new("article")), 1);
    }

    #[test]
    fn handlers_see_ledger_without_revoked_permits() {
        let ledger = Arc::new(PermitLedger::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..2 {
            let inner = Arc::clone(&ledger);
            let seen = Arc::clone(&seen);
            ledger.grant(
                Key::new("article"),
                Some(RevokeHandler::new(move || {
                    seen.lock().unwrap().push((inner.count(&Key::new("article")), inner.len()));
                })),
            );
        }
        ledger.grant(Key::new("page"), None);

        assert_eq!(ledger.revoke(&Key::new("article")), 2);
        assert_eq!(*seen.lock().unwrap(), vec![(0, 1), (0, 1)]);
    }

    #[test]
    fn snapshot_reports_revocability() {
        let ledger = PermitLedger::new();
        ledger.grant(Key::new("article"), None);
        ledger.grant(Key::new("page"), Some(RevokeHandler::new(|| {})));

        let snapshot = ledger.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].key, Key::new("article"));
        assert!(!snapshot[0].revocable);
        assert!(snapshot[1].revocable);
        assert!(snapshot[0].granted_at <= snapshot[1].granted_at);
    }
}
