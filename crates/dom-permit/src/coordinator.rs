//! PermitCoordinator: the public entry point.
//!
//! Owns every piece of process-wide state:
//! - Readiness gate (shared by all requests)
//! - Activation registry (one handshake per key)
//! - Permit ledger plus its revocation listener, bound at construction
//!
//! Flow of a request:
//! 1. Wait for readiness
//! 2. Outside a renderer-managed page: grant immediately, nothing recorded
//! 3. Otherwise join or start the key's handshake
//! 4. On fulfillment record the permit and hand back the claimed elements

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::activation::{
    ActivationError, ActivationRegistry, ActivationState, HandshakeContext, start_handshake,
};
use crate::config::CoordinatorConfig;
use crate::document::{Document, Element};
use crate::environment::HostEnvironment;
use crate::gate::ReadinessGate;
use crate::permit::{PermitLedger, RevokeHandler, spawn_revocation_listener};
use crate::signal::{Key, SignalBus};

/// Outcome of a successful permit request.
#[derive(Debug, Clone, PartialEq)]
pub enum Grant {
    /// The page is not renderer-managed; mutate freely.
    Unmanaged,
    /// Renderer clones claimed for this permit, in discovery order.
    Claimed(Vec<Element>),
}

impl Grant {
    pub fn is_unmanaged(&self) -> bool {
        matches!(self, Self::Unmanaged)
    }

    pub fn elements(&self) -> &[Element] {
        match self {
            Self::Unmanaged => &[],
            Self::Claimed(elements) => elements,
        }
    }

    pub fn into_elements(self) -> Vec<Element> {
        match self {
            Self::Unmanaged => Vec::new(),
            Self::Claimed(elements) => elements,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PermitError {
    #[error(transparent)]
    Activation(#[from] ActivationError),
}

impl PermitError {
    pub fn key(&self) -> &Key {
        match self {
            Self::Activation(e) => e.key(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Activation(e) => e.is_timeout(),
        }
    }
}

/// Coordinates revocable DOM permits with the renderer.
///
/// Construct one per document inside a tokio runtime. Dropping it stops
/// its background tasks; pending and later requests fail with `Shutdown`,
/// including those still waiting for readiness.
pub struct PermitCoordinator {
    config: CoordinatorConfig,
    environment: HostEnvironment,
    bus: SignalBus,
    document: Arc<dyn Document>,
    gate: ReadinessGate,
    registry: ActivationRegistry,
    ledger: Arc<PermitLedger>,
    revocation_listener: Option<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl PermitCoordinator {
    /// Detect the host environment and create a fresh signal bus.
    pub fn new(document: Arc<dyn Document>, config: CoordinatorConfig) -> Self {
        let environment = HostEnvironment::detect(document.as_ref());
        let bus = SignalBus::new(config.signal_capacity);
        Self::with_parts(document, bus, environment, config)
    }

    /// Use an existing bus and a known environment.
    pub fn with_parts(
        document: Arc<dyn Document>,
        bus: SignalBus,
        environment: HostEnvironment,
        config: CoordinatorConfig,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let renderer_managed = environment.is_renderer_managed();

        let gate = ReadinessGate::spawn(
            Arc::clone(&document),
            bus.clone(),
            renderer_managed,
            config.ready_poll_interval,
            shutdown.child_token(),
        );

        let ledger = Arc::new(PermitLedger::new());
        let revocation_listener = renderer_managed.then(|| {
            spawn_revocation_listener(&bus, Arc::clone(&ledger), shutdown.child_token())
        });

        tracing::debug!(
            renderer_managed,
            activation_timeout = ?config.activation_timeout,
            "Permit coordinator started"
        );

        Self {
            config,
            environment,
            bus,
            document,
            gate,
            registry: ActivationRegistry::new(),
            ledger,
            revocation_listener,
            shutdown,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn environment(&self) -> &HostEnvironment {
        &self.environment
    }

    pub fn bus(&self) -> &SignalBus {
        &self.bus
    }

    pub fn ledger(&self) -> &PermitLedger {
        &self.ledger
    }

    /// Wait until the document is loaded and, if managed, hydrated.
    pub async fn when_ready(&self) {
        self.gate.when_ready().await
    }

    pub fn is_ready(&self) -> bool {
        self.gate.is_ready()
    }

    /// Settlement state of `key`'s handshake, if one was ever started.
    pub fn activation_state(&self, key: &Key) -> Option<ActivationState> {
        self.registry.state(key)
    }

    /// Request permission to mutate the document region named by `key`.
    ///
    /// `on_revoke` runs at most once, when the renderer revokes `key` after
    /// this permit was granted. A failed request records nothing and never
    /// runs `on_revoke`.
    pub async fn request_permit(
        &self,
        key: impl Into<Key>,
        on_revoke: Option<RevokeHandler>,
    ) -> Result<Grant, PermitError> {
        let key = key.into();

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => {
                tracing::debug!(%key, "Shutdown while waiting for readiness");
                return Err(ActivationError::Shutdown(key).into());
            }
            _ = self.gate.when_ready() => {}
        }

        if !self.environment.is_renderer_managed() {
            tracing::trace!(%key, "Unmanaged page - permit granted without handshake");
            return Ok(Grant::Unmanaged);
        }

        let activation = self.registry.get_or_start(&key, || {
            start_handshake(key.clone(), &self.handshake_context())
        });
        let elements = activation.settled().await?;

        self.ledger.grant(key, on_revoke);
        Ok(Grant::Claimed(elements))
    }

    fn handshake_context(&self) -> HandshakeContext {
        HandshakeContext {
            bus: self.bus.clone(),
            document: Arc::clone(&self.document),
            timeout: self.config.activation_timeout,
            shutdown: self.shutdown.child_token(),
        }
    }

    /// Stop background tasks. Pending handshakes settle as `Shutdown` and
    /// requests blocked on the readiness gate are released with the same
    /// error.
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            tracing::debug!("Permit coordinator shutting down");
            self.shutdown.cancel();
        }
    }
}

impl Drop for PermitCoordinator {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(listener) = self.revocation_listener.take() {
            listener.abort();
        }
    }
}
