//! Granted permits and their revocation.
//!
//! A permit exists only after its key's activation fulfilled. It holds no
//! reference back to the activation; revoking removes it from the ledger
//! and runs its handler exactly once.

mod ledger;
mod listener;

pub use ledger::{PermitInfo, PermitLedger, RevokeHandler};
pub(crate) use listener::spawn_revocation_listener;
