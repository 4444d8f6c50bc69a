//! Minimal element selectors.
//!
//! Covers the compound selectors the library needs: a tag, attribute
//! equality/presence/absence, and required/excluded classes. No combinators.

use super::element::{DATA_CLAIMED, DATA_CLONE, DATA_KEY, Element};
use crate::signal::Key;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    tag: Option<String>,
    equals: Vec<(String, String)>,
    present: Vec<String>,
    absent: Vec<String>,
    classes: Vec<String>,
    excluded_classes: Vec<String>,
}

impl Selector {
    /// Matches every element.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn tag(tag: &str) -> Self {
        Self {
            tag: Some(tag.to_ascii_lowercase()),
            ..Self::default()
        }
    }

    /// `[name="value"]`
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.equals.push((name.to_string(), value.to_string()));
        self
    }

    /// `[name]`
    pub fn has_attr(mut self, name: &str) -> Self {
        self.present.push(name.to_string());
        self
    }

    /// `:not([name])`
    pub fn lacks_attr(mut self, name: &str) -> Self {
        self.absent.push(name.to_string());
        self
    }

    /// `.class`
    pub fn class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }

    /// `:not(.class)`
    pub fn not_class(mut self, class: &str) -> Self {
        self.excluded_classes.push(class.to_string());
        self
    }

    /// Every placeholder tagged for `key`.
    pub fn placeholders(key: &Key) -> Self {
        Self::any().attr(DATA_KEY, key.as_str())
    }

    /// Renderer clones for `key` that no handshake has claimed yet.
    pub fn claimable(key: &Key) -> Self {
        Self::placeholders(key)
            .attr(DATA_CLONE, "true")
            .lacks_attr(DATA_CLAIMED)
    }

    pub fn matches(&self, element: &Element) -> bool {
        if let Some(ref tag) = self.tag
            && tag != element.tag()
        {
            return false;
        }

        self.equals
            .iter()
            .all(|(name, value)| element.attribute(name).as_deref() == Some(value.as_str()))
            && self.present.iter().all(|name| element.has_attribute(name))
            && !self.absent.iter().any(|name| element.has_attribute(name))
            && self.classes.iter().all(|c| element.has_class(c))
            && !self.excluded_classes.iter().any(|c| element.has_class(c))
    }
}
