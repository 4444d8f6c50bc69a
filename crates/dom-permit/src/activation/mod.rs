//! Decoy activation: per-key handshakes with the renderer.
//!
//! A handshake moves through an explicit state machine:
//! - `Pending` → `Fulfilled(elements)` when enough clones have been claimed
//! - `Pending` → `Failed(error)` on timeout, bus closure or shutdown
//!
//! Settled states never change. The registry never evicts, so each key
//! settles at most once per coordinator.

mod protocol;
mod registry;

use std::time::Duration;

use tokio::sync::watch;

use crate::document::Element;
use crate::signal::Key;

pub(crate) use protocol::{HandshakeContext, start_handshake};
pub use registry::ActivationRegistry;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActivationError {
    #[error("decoy activation for '{key}' timed out after {timeout:?}")]
    Timeout { key: Key, timeout: Duration },
    #[error("signal bus closed before decoy activation for '{0}' settled")]
    BusClosed(Key),
    #[error("coordinator shut down before decoy activation for '{0}' settled")]
    Shutdown(Key),
}

impl ActivationError {
    pub fn key(&self) -> &Key {
        match self {
            Self::Timeout { key, .. } => key,
            Self::BusClosed(key) | Self::Shutdown(key) => key,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Settlement state of a handshake.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivationState {
    Pending,
    Fulfilled(Vec<Element>),
    Failed(ActivationError),
}

impl ActivationState {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_settled(&self) -> bool {
        !self.is_pending()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fulfilled(_) => "fulfilled",
            Self::Failed(_) => "failed",
        }
    }
}

/// Shared handle to one key's handshake. Clones observe the same settlement.
#[derive(Debug, Clone)]
pub struct Activation {
    key: Key,
    state: watch::Receiver<ActivationState>,
}

impl Activation {
    pub(crate) fn new(key: Key, state: watch::Receiver<ActivationState>) -> Self {
        Self { key, state }
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn state(&self) -> ActivationState {
        self.state.borrow().clone()
    }

    /// Wait for settlement and return the claimed elements.
    pub async fn settled(&self) -> Result<Vec<Element>, ActivationError> {
        let mut rx = self.state.clone();
        let result = match rx.wait_for(ActivationState::is_settled).await.as_deref() {
            Ok(ActivationState::Fulfilled(elements)) => Ok(elements.clone()),
            Ok(ActivationState::Failed(error)) => Err(error.clone()),
            // Handshake task vanished without settling (runtime shutting down).
            Ok(ActivationState::Pending) | Err(_) => {
                Err(ActivationError::Shutdown(self.key.clone()))
            }
        };
        result
    }
}
