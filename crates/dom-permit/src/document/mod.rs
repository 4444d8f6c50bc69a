//! Document query contract.
//!
//! The document is an external collaborator. Placeholders for a key carry
//! `data-key=<key>`; renderer clones that may be claimed also carry
//! `data-clone=true`, and `data-claimed=true` once a handshake claims them.

mod element;
mod memory;
mod selector;

use serde::{Deserialize, Serialize};

pub use element::{Element, ElementId};
pub use memory::MemoryDocument;
pub use selector::Selector;

/// Loading state of the host document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadyState {
    #[default]
    Loading,
    Interactive,
    Complete,
}

impl ReadyState {
    /// Fully loaded (`interactive` still counts as loading).
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }
}

/// The host document.
pub trait Document: Send + Sync {
    fn ready_state(&self) -> ReadyState;

    fn hostname(&self) -> String;

    /// All matching elements, in document order.
    fn query_all(&self, selector: &Selector) -> Vec<Element>;

    fn query(&self, selector: &Selector) -> Option<Element> {
        self.query_all(selector).into_iter().next()
    }

    fn is_selectable(&self, selector: &Selector) -> bool {
        self.query(selector).is_some()
    }
}
