//! dom-permit: revocable DOM permits negotiated with an independently
//! hydrated renderer.

pub mod activation;
pub mod config;
pub mod coordinator;
pub mod document;
pub mod environment;
mod gate;
pub mod logging;
pub mod permit;
pub mod preference;
pub mod signal;

pub use activation::{Activation, ActivationError, ActivationRegistry, ActivationState};
pub use config::CoordinatorConfig;
pub use coordinator::{Grant, PermitCoordinator, PermitError};
pub use document::{Document, Element, ElementId, MemoryDocument, ReadyState, Selector};
pub use environment::{Application, Generation, HostEnvironment, Tier};
pub use gate::ReadinessGate;
pub use permit::{PermitInfo, PermitLedger, RevokeHandler};
pub use preference::{ColorScheme, Observable, PrefersColorScheme, PrefersReducedMotion, Subscription};
pub use signal::{DecoyKey, Key, Signal, SignalBus, SignalError};
