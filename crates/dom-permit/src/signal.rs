//! In-process signal bus shared by the library and the renderer.
//!
//! One channel carries every signal for every key:
//! - `hydrated`: renderer → gate, renderer DOM is ready for handshakes
//! - `decoy-requested`: library → renderer, request/abandon activation for a key
//! - `decoy-confirmed`: renderer → library, claimable placeholders exist for a key
//! - `decoy-revoked`: renderer → library, withdraw granted permits for a key
//!
//! Handlers filter by payload key, never by channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

use crate::config::MAX_SIGNAL_CAPACITY;

/// Caller-chosen name for a contended document location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(String);

impl Key {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for Key {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Locations the Presentation Layer renderer knows how to decoy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoyKey {
    Article,
    Body,
    Page,
}

impl DecoyKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Body => "body",
            Self::Page => "page",
        }
    }
}

impl From<DecoyKey> for Key {
    fn from(key: DecoyKey) -> Self {
        Key::new(key.as_str())
    }
}

/// A signal on the bus.
///
/// Renderer-originated payloads carry an optional key: a signal without one
/// is delivered but matches no handshake and revokes nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Signal {
    Hydrated,

    DecoyRequested {
        key: Key,
        active: bool,
    },

    DecoyConfirmed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<Key>,
    },

    DecoyRevoked {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<Key>,
    },
}

impl Signal {
    pub fn confirmed(key: impl Into<Key>) -> Self {
        Self::DecoyConfirmed {
            key: Some(key.into()),
        }
    }

    pub fn revoked(key: impl Into<Key>) -> Self {
        Self::DecoyRevoked {
            key: Some(key.into()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Hydrated => "hydrated",
            Self::DecoyRequested { .. } => "decoy-requested",
            Self::DecoyConfirmed { .. } => "decoy-confirmed",
            Self::DecoyRevoked { .. } => "decoy-revoked",
        }
    }

    /// Whether this is a confirmation addressed to `key`.
    pub fn confirms(&self, key: &Key) -> bool {
        matches!(self, Self::DecoyConfirmed { key: Some(k) } if k == key)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("malformed signal: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Broadcast bus for [`Signal`]s.
///
/// Cloning yields another handle to the same bus. Subscribers only see
/// signals published after they subscribed, except that the bus remembers
/// whether `hydrated` was ever published.
///
/// Broadcast subscribers that fall more than `capacity` signals behind
/// lose the oldest ones. Revocations are additionally copied to every
/// [`subscribe_revocations`](Self::subscribe_revocations) receiver,
/// which is unbounded.
#[derive(Clone)]
pub struct SignalBus {
    tx: broadcast::Sender<Signal>,
    hydrated: Arc<AtomicBool>,
    revocations: Arc<Mutex<Vec<mpsc::UnboundedSender<Option<Key>>>>>,
}

impl SignalBus {
    /// Capacity is clamped to `1..=MAX_SIGNAL_CAPACITY`.
    pub fn new(capacity: usize) -> Self {
        let clamped = capacity.clamp(1, MAX_SIGNAL_CAPACITY);
        if clamped != capacity {
            tracing::warn!(requested = capacity, capacity = clamped, "Signal bus capacity clamped");
        }
        let (tx, _) = broadcast::channel(clamped);
        Self {
            tx,
            hydrated: Arc::new(AtomicBool::new(false)),
            revocations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.tx.subscribe()
    }

    /// Receive the key of every `decoy-revoked` published from now on.
    ///
    /// Unlike [`subscribe`](Self::subscribe) this never lags. The receiver
    /// yields `None` once every handle to the bus is dropped.
    pub fn subscribe_revocations(&self) -> mpsc::UnboundedReceiver<Option<Key>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.revocation_taps().push(tx);
        rx
    }

    fn revocation_taps(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<Option<Key>>>> {
        self.revocations.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Publish a signal. Returns how many subscribers it reached.
    pub fn publish(&self, signal: Signal) -> usize {
        if signal == Signal::Hydrated {
            self.hydrated.store(true, Ordering::Release);
        }
        if let Signal::DecoyRevoked { key } = &signal {
            self.revocation_taps().retain(|tap| tap.send(key.clone()).is_ok());
        }

        tracing::trace!(signal = signal.name(), ?signal, "Publishing signal");
        self.tx.send(signal).unwrap_or(0)
    }

    /// Decode and publish a JSON-encoded signal from an external renderer.
    pub fn publish_json(&self, raw: &str) -> Result<usize, SignalError> {
        let signal: Signal = serde_json::from_str(raw).inspect_err(|e| {
            tracing::warn!(error = %e, "Dropping malformed signal");
        })?;
        Ok(self.publish(signal))
    }

    /// Whether `hydrated` has been published on this bus.
    pub fn has_hydrated(&self) -> bool {
        self.hydrated.load(Ordering::Acquire)
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SIGNAL_CAPACITY)
    }
}
