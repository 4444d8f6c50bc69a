//! Per-key deduplication of handshakes.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{Activation, ActivationState};
use crate::signal::Key;

/// At most one handshake per key, ever.
///
/// Entries are inserted under the shard lock before the creating caller
/// returns, so concurrent callers for one key share one handshake. Settled
/// entries are kept: a key that failed stays failed.
#[derive(Default)]
pub struct ActivationRegistry {
    entries: DashMap<Key, Activation>,
}

impl ActivationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The activation for `key`, calling `start` only if none exists yet.
    pub fn get_or_start<F>(&self, key: &Key, start: F) -> Activation
    where
        F: FnOnce() -> Activation,
    {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(entry) => {
                tracing::trace!(%key, state = entry.get().state().as_str(), "Joining existing decoy activation");
                entry.get().clone()
            }
            Entry::Vacant(entry) => entry.insert(start()).clone(),
        }
    }

    pub fn get(&self, key: &Key) -> Option<Activation> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    pub fn state(&self, key: &Key) -> Option<ActivationState> {
        self.entries.get(key).map(|entry| entry.state())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
