//! User preference observers.
//!
//! Each preference is an independent [`Observable`] fed by explicit change
//! notifications from the host (media query changes, body class mutations).

mod observable;

use serde::{Deserialize, Serialize};

use crate::document::{Document, Element, Selector};

pub use observable::{Observable, Subscription};

const REDUCED_MOTION_CLASS: &str = "is-reduced-motion";
const HIGH_MOTION_CLASS: &str = "is-high-motion";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    /// Browser default.
    #[default]
    Light,
    Dark,
}

impl ColorScheme {
    pub fn from_prefers_dark(prefers_dark: bool) -> Self {
        if prefers_dark { Self::Dark } else { Self::Light }
    }
}

/// `prefers-color-scheme`.
#[derive(Clone)]
pub struct PrefersColorScheme {
    cell: Observable<ColorScheme>,
}

impl PrefersColorScheme {
    /// `prefers_dark` is the current `(prefers-color-scheme: dark)` match.
    pub fn new(prefers_dark: bool) -> Self {
        Self {
            cell: Observable::new(ColorScheme::from_prefers_dark(prefers_dark)),
        }
    }

    pub fn value(&self) -> ColorScheme {
        self.cell.get()
    }

    pub fn subscribe<F>(&self, subscriber: F) -> Subscription<ColorScheme>
    where
        F: Fn(&ColorScheme) + Send + Sync + 'static,
    {
        self.cell.subscribe(subscriber)
    }

    pub fn on_media_change(&self, prefers_dark: bool) {
        self.cell.set(ColorScheme::from_prefers_dark(prefers_dark));
    }
}

impl Default for PrefersColorScheme {
    fn default() -> Self {
        Self::new(false)
    }
}

/// `prefers-reduced-motion`, overridable in page through body classes.
///
/// An in-page choice (`is-reduced-motion` / `is-high-motion` on `<body>`)
/// beats the media query.
#[derive(Clone)]
pub struct PrefersReducedMotion {
    cell: Observable<bool>,
    body: Option<Element>,
}

impl PrefersReducedMotion {
    /// `media_matches` is the current `(prefers-reduced-motion: reduce)` match.
    pub fn new(body: Option<Element>, media_matches: bool) -> Self {
        let initial = body
            .as_ref()
            .and_then(in_page_preference)
            .unwrap_or(media_matches);

        Self {
            cell: Observable::new(initial),
            body,
        }
    }

    pub fn detect(document: &dyn Document, media_matches: bool) -> Self {
        Self::new(document.query(&Selector::tag("body")), media_matches)
    }

    pub fn value(&self) -> bool {
        self.cell.get()
    }

    pub fn subscribe<F>(&self, subscriber: F) -> Subscription<bool>
    where
        F: Fn(&bool) + Send + Sync + 'static,
    {
        self.cell.subscribe(subscriber)
    }

    /// The body's class attribute changed.
    pub fn on_body_class_change(&self) {
        if let Some(ref body) = self.body {
            self.cell.set(body.has_class(REDUCED_MOTION_CLASS));
        }
    }

    /// The media query match changed. Ignored while an in-page choice exists.
    pub fn on_media_change(&self, media_matches: bool) {
        if self.body.as_ref().and_then(in_page_preference).is_none() {
            self.cell.set(media_matches);
        }
    }
}

fn in_page_preference(body: &Element) -> Option<bool> {
    if body.has_class(REDUCED_MOTION_CLASS) {
        Some(true)
    } else if body.has_class(HIGH_MOTION_CLASS) {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryDocument;
    use std::sync::{Arc, Mutex};

    #[test]
    fn color_scheme_defaults_to_light() {
        assert_eq!(PrefersColorScheme::default().value(), ColorScheme::Light);
        assert_eq!(PrefersColorScheme::new(true).value(), ColorScheme::Dark);
    }

    #[test]
    fn color_scheme_follows_media_changes() {
        let pref = PrefersColorScheme::new(false);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = pref.subscribe(move |v| sink.lock().unwrap().push(*v));

        pref.on_media_change(true);

        assert_eq!(pref.value(), ColorScheme::Dark);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![ColorScheme::Light, ColorScheme::Dark]
        );
    }

    #[test]
    fn reduced_motion_falls_back_to_media_query() {
        assert!(!PrefersReducedMotion::new(None, false).value());
        assert!(PrefersReducedMotion::new(None, true).value());
    }

    #[test]
    fn in_page_choice_beats_media_query() {
        let doc = MemoryDocument::new("localhost");
        let body = doc.append(Element::new("body").with_class(HIGH_MOTION_CLASS));

        let pref = PrefersReducedMotion::detect(&doc, true);
        assert!(!pref.value());

        pref.on_media_change(true);
        assert!(!pref.value());

        body.remove_class(HIGH_MOTION_CLASS);
        body.add_class(REDUCED_MOTION_CLASS);
        pref.on_body_class_change();
        assert!(pref.value());
    }

    #[test]
    fn media_changes_apply_without_in_page_choice() {
        let body = Element::new("body");
        let pref = PrefersReducedMotion::new(Some(body.clone()), false);

        pref.on_media_change(true);
        assert!(pref.value());

        body.add_class(HIGH_MOTION_CLASS);
        pref.on_body_class_change();
        assert!(!pref.value());

        pref.on_media_change(true);
        assert!(!pref.value());
    }
}
