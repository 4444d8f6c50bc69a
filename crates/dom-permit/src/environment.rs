//! Host environment detection.
//!
//! Every application has uniquely selectable elements; every generation
//! covers one or more applications; tiers are told apart by hostname.
//! Detection is a pure snapshot of the document, taken once per coordinator.

use serde::{Deserialize, Serialize};

use crate::document::{Document, Selector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Application {
    #[serde(rename = "p1m")]
    Phase1Mobile,
    #[serde(rename = "p1s")]
    Phase1Standard,
    #[serde(rename = "p2")]
    Phase2,
    #[serde(rename = "nw")]
    NewsWeb,
    #[serde(rename = "nwc")]
    NewsWebApp,
}

impl Application {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Phase1Mobile => "p1m",
            Self::Phase1Standard => "p1s",
            Self::Phase2 => "p2",
            Self::NewsWeb => "nw",
            Self::NewsWebApp => "nwc",
        }
    }

    pub fn generation(&self) -> Generation {
        match self {
            Self::Phase1Mobile | Self::Phase1Standard => Generation::Phase1,
            Self::Phase2 => Generation::Phase2,
            Self::NewsWeb | Self::NewsWebApp => Generation::PresentationLayer,
        }
    }

    /// Detection order: the first selectable application wins.
    const DETECTION_ORDER: [Application; 5] = [
        Self::NewsWeb,
        Self::NewsWebApp,
        Self::Phase2,
        Self::Phase1Mobile,
        Self::Phase1Standard,
    ];

    fn selector(&self) -> Selector {
        match self {
            Self::Phase1Mobile => Selector::tag("body")
                .class("platform-mobile")
                .not_class("platform-standard"),
            Self::Phase1Standard => Selector::tag("body")
                .class("platform-standard")
                .not_class("platform-mobile"),
            Self::Phase2 => Selector::tag("meta").attr("content", "WCMS FTL"),
            Self::NewsWeb => Selector::tag("link").attr("data-chunk", "page.ArticleDetail"),
            Self::NewsWebApp => Selector::tag("link").attr("data-chunk", "page.AppArticleDetail"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Generation {
    #[serde(rename = "p1")]
    Phase1,
    #[serde(rename = "p2")]
    Phase2,
    #[serde(rename = "pl")]
    PresentationLayer,
}

impl Generation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Phase1 => "p1",
            Self::Phase2 => "p2",
            Self::PresentationLayer => "pl",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Live,
    Preview,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Preview => "preview",
        }
    }
}

const LIVE_HOSTNAME_PARTIALS: [&str; 4] = ["www.abc", "mobile.abc", "bigted.abc", "newsapp.abc"];
const PL_PREVIEW_HOSTNAME_PARTIAL: &str = "preview.presentation-layer";
const LEGACY_PREVIEW_HOSTNAME_PARTIAL: &str = "nucwed.aus.aunty";

/// Detected application, generation and tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostEnvironment {
    pub application: Option<Application>,
    pub generation: Option<Generation>,
    pub tier: Option<Tier>,
}

impl HostEnvironment {
    pub fn detect(document: &dyn Document) -> Self {
        let application = Application::DETECTION_ORDER
            .into_iter()
            .find(|app| document.is_selectable(&app.selector()));
        let generation = application.map(|app| app.generation());

        let hostname = document.hostname();
        let preview_partial = if generation == Some(Generation::PresentationLayer) {
            PL_PREVIEW_HOSTNAME_PARTIAL
        } else {
            LEGACY_PREVIEW_HOSTNAME_PARTIAL
        };
        let tier = if hostname.contains(preview_partial) {
            Some(Tier::Preview)
        } else if LIVE_HOSTNAME_PARTIALS.iter().any(|p| hostname.contains(p)) {
            Some(Tier::Live)
        } else {
            None
        };

        let env = Self {
            application,
            generation,
            tier,
        };
        tracing::debug!(
            application = env.application.map(|a| a.as_str()),
            generation = env.generation.map(|g| g.as_str()),
            tier = env.tier.map(|t| t.as_str()),
            %hostname,
            "Detected host environment"
        );
        env
    }

    /// An environment whose DOM is owned by the Presentation Layer renderer.
    pub fn presentation_layer() -> Self {
        Self {
            application: Some(Application::NewsWeb),
            generation: Some(Generation::PresentationLayer),
            tier: None,
        }
    }

    /// Whether permits must be negotiated with the renderer.
    pub fn is_renderer_managed(&self) -> bool {
        self.generation == Some(Generation::PresentationLayer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Element, MemoryDocument};

    fn detect(hostname: &str, elements: Vec<Element>) -> HostEnvironment {
        let doc = MemoryDocument::new(hostname);
        for el in elements {
            doc.append(el);
        }
        HostEnvironment::detect(&doc)
    }

    #[test]
    fn live_domains() {
        for host in ["www.abc.net.au", "mobile.abc.net.au", "newsapp.abc.net.au"] {
            assert_eq!(detect(host, vec![]).tier, Some(Tier::Live), "{host}");
        }
    }

    #[test]
    fn preview_domain_depends_on_generation() {
        let pl_link = || Element::new("link").with_attribute("data-chunk", "page.ArticleDetail");

        let env = detect("nucwed.aus.aunty.abc.net.au", vec![]);
        assert_eq!(env.tier, Some(Tier::Preview));

        let env = detect("preview.presentation-layer.abc-prod.net.au", vec![pl_link()]);
        assert_eq!(env.tier, Some(Tier::Preview));

        let env = detect("nucwed.aus.aunty.abc.net.au", vec![pl_link()]);
        assert_eq!(env.tier, None);
    }

    #[test]
    fn phase_1_mobile() {
        let env = detect(
            "localhost",
            vec![Element::new("body").with_class("platform-mobile")],
        );
        assert_eq!(env.application, Some(Application::Phase1Mobile));
        assert_eq!(env.generation, Some(Generation::Phase1));
        assert!(!env.is_renderer_managed());
    }

    #[test]
    fn phase_1_ambiguous_body_is_undetected() {
        let env = detect(
            "localhost",
            vec![
                Element::new("body")
                    .with_class("platform-mobile")
                    .with_class("platform-standard"),
            ],
        );
        assert_eq!(env, HostEnvironment::default());
    }

    #[test]
    fn phase_2() {
        let env = detect(
            "localhost",
            vec![Element::new("meta").with_attribute("content", "WCMS FTL")],
        );
        assert_eq!(env.application, Some(Application::Phase2));
        assert_eq!(env.generation, Some(Generation::Phase2));
    }

    #[test]
    fn presentation_layer_wins_over_older_markers() {
        let env = detect(
            "localhost",
            vec![
                Element::new("body").with_class("platform-standard"),
                Element::new("link").with_attribute("data-chunk", "page.AppArticleDetail"),
            ],
        );
        assert_eq!(env.application, Some(Application::NewsWebApp));
        assert_eq!(env.generation, Some(Generation::PresentationLayer));
        assert!(env.is_renderer_managed());
    }

    #[test]
    fn environment_serializes_short_codes() {
        insta::assert_json_snapshot!(HostEnvironment::presentation_layer(), @r#"
        {
          "application": "nw",
          "generation": "pl",
          "tier": null
        }
        "#);
    }
}
