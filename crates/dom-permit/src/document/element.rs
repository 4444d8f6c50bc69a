//! Shared element handles.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

pub(crate) const DATA_KEY: &str = "data-key";
pub(crate) const DATA_CLONE: &str = "data-clone";
pub(crate) const DATA_CLAIMED: &str = "data-claimed";

/// Identity of an element.
///
/// UUID v4 so that two structurally identical elements never compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(uuid::Uuid);

impl ElementId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct ElementInner {
    id: ElementId,
    tag: String,
    attributes: Mutex<BTreeMap<String, String>>,
}

/// Handle to a document element.
///
/// Clones share the same element: attribute writes through one handle are
/// visible through all of them. Equality is identity.
#[derive(Clone)]
pub struct Element(Arc<ElementInner>);

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(Arc::new(ElementInner {
            id: ElementId::new(),
            tag: tag.into().to_ascii_lowercase(),
            attributes: Mutex::new(BTreeMap::new()),
        }))
    }

    /// A `div` tagged as a placeholder for `key`.
    pub fn placeholder(key: &str) -> Self {
        Self::new("div").with_attribute(DATA_KEY, key)
    }

    /// A `div` tagged as a claimable renderer clone for `key`.
    pub fn decoy_clone(key: &str) -> Self {
        Self::placeholder(key).with_attribute(DATA_CLONE, "true")
    }

    pub fn with_attribute(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_class(self, class: &str) -> Self {
        self.add_class(class);
        self
    }

    pub fn id(&self) -> ElementId {
        self.0.id
    }

    pub fn tag(&self) -> &str {
        &self.0.tag
    }

    fn attributes(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.0.attributes.lock().unwrap_or_else(|poisoned| {
            tracing::warn!(element = %self.0.id, "Element attribute lock poisoned - recovering");
            poisoned.into_inner()
        })
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.attributes().get(name).cloned()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes().contains_key(name)
    }

    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes().insert(name.into(), value.into());
    }

    pub fn remove_attribute(&self, name: &str) -> Option<String> {
        self.attributes().remove(name)
    }

    pub fn classes(&self) -> Vec<String> {
        self.attribute("class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attributes()
            .get("class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }

    pub fn add_class(&self, class: &str) {
        let mut attributes = self.attributes();
        let entry = attributes.entry("class".to_string()).or_default();
        if !entry.split_whitespace().any(|c| c == class) {
            if !entry.is_empty() {
                entry.push(' ');
            }
            entry.push_str(class);
        }
    }

    pub fn remove_class(&self, class: &str) {
        let mut attributes = self.attributes();
        if let Some(entry) = attributes.get_mut("class") {
            *entry = entry
                .split_whitespace()
                .filter(|c| *c != class)
                .collect::<Vec<_>>()
                .join(" ");
        }
    }

    /// Mark this element claimed. Returns true only for the call that claimed it.
    pub fn try_claim(&self) -> bool {
        let mut attributes = self.attributes();
        if attributes.contains_key(DATA_CLAIMED) {
            return false;
        }
        attributes.insert(DATA_CLAIMED.to_string(), "true".to_string());
        true
    }

    pub fn is_claimed(&self) -> bool {
        self.has_attribute(DATA_CLAIMED)
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Element {}

impl std::hash::Hash for Element {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl std::fmt::Debug for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Element")
            .field("id", &self.0.id)
            .field("tag", &self.0.tag)
            .field("attributes", &*self.attributes())
            .finish()
    }
}
