//! In-process document.

use std::sync::{Mutex, MutexGuard};

use super::{Document, Element, ElementId, ReadyState, Selector};

struct MemoryState {
    ready_state: ReadyState,
    elements: Vec<Element>,
}

/// A [`Document`] backed by an ordered element list.
pub struct MemoryDocument {
    hostname: String,
    state: Mutex<MemoryState>,
}

impl MemoryDocument {
    /// A fully loaded, empty document served from `hostname`.
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            state: Mutex::new(MemoryState {
                ready_state: ReadyState::Complete,
                elements: Vec::new(),
            }),
        }
    }

    pub fn with_ready_state(self, ready_state: ReadyState) -> Self {
        self.set_ready_state(ready_state);
        self
    }

    pub fn with_element(self, element: Element) -> Self {
        self.append(element);
        self
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Document lock poisoned - recovering");
            poisoned.into_inner()
        })
    }

    pub fn set_ready_state(&self, ready_state: ReadyState) {
        self.state().ready_state = ready_state;
    }

    /// Append an element in document order. Returns the handle for chaining.
    pub fn append(&self, element: Element) -> Element {
        self.state().elements.push(element.clone());
        element
    }

    pub fn remove(&self, id: ElementId) -> Option<Element> {
        let mut state = self.state();
        let index = state.elements.iter().position(|e| e.id() == id)?;
        Some(state.elements.remove(index))
    }

    pub fn clear(&self) {
        self.state().elements.clear();
    }

    pub fn len(&self) -> usize {
        self.state().elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().elements.is_empty()
    }
}

impl Document for MemoryDocument {
    fn ready_state(&self) -> ReadyState {
        self.state().ready_state
    }

    fn hostname(&self) -> String {
        self.hostname.clone()
    }

    fn query_all(&self, selector: &Selector) -> Vec<Element> {
        self.state()
            .elements
            .iter()
            .filter(|e| selector.matches(e))
            .cloned()
            .collect()
    }
}
