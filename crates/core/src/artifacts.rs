//! Artifact listings the runtime resolves widgets, controls and themes from.
//!
//! A bundle mirrors what an application build would produce: alias tables that
//! map reference names to list indices, and the listings themselves. Widget
//! entries carry the module implementing the controller, so bundles are not
//! serializable and live on one thread.

use crate::descriptor::WidgetDescriptor;
use crate::module::WidgetModule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Name of the theme used when nothing else is configured.
pub const DEFAULT_THEME: &str = "default.theme";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Asset {
    pub fn content(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), url: None }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self { content: None, url: Some(url.into()) }
    }
}

/// Assets of a widget: plain ones and per-theme ones.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WidgetAssets {
    pub plain: BTreeMap<String, Asset>,
    pub themes: BTreeMap<String, BTreeMap<String, Asset>>,
}

impl WidgetAssets {
    pub fn with_asset(mut self, name: impl Into<String>, asset: Asset) -> Self {
        self.plain.insert(name.into(), asset);
        self
    }

    pub fn with_themed_asset(
        mut self,
        theme: impl Into<String>,
        name: impl Into<String>,
        asset: Asset,
    ) -> Self {
        self.themes.entry(theme.into()).or_default().insert(name.into(), asset);
        self
    }

    pub fn plain(&self, name: &str) -> Option<&Asset> {
        self.plain.get(name)
    }

    /// Looks up a themed asset, falling back to the default theme.
    pub fn for_theme(&self, theme: &str, name: &str) -> Option<&Asset> {
        self.themes
            .get(theme)
            .and_then(|assets| assets.get(name))
            .or_else(|| self.themes.get(DEFAULT_THEME).and_then(|assets| assets.get(name)))
    }
}

#[derive(Clone)]
pub struct WidgetArtifact {
    pub descriptor: WidgetDescriptor,
    pub module: Rc<dyn WidgetModule>,
    pub assets: WidgetAssets,
}

impl std::fmt::Debug for WidgetArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetArtifact")
            .field("descriptor", &self.descriptor)
            .field("assets", &self.assets)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThemeDescriptor {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ThemeArtifact {
    pub descriptor: ThemeDescriptor,
    pub assets: BTreeMap<String, Asset>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlDescriptor {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ControlArtifact {
    pub descriptor: ControlDescriptor,
    pub assets: BTreeMap<String, Asset>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Aliases {
    pub widgets: BTreeMap<String, usize>,
    pub themes: BTreeMap<String, usize>,
    pub controls: BTreeMap<String, usize>,
}

#[derive(Clone, Debug, Default)]
pub struct ArtifactBundle {
    pub aliases: Aliases,
    pub widgets: Vec<WidgetArtifact>,
    pub themes: Vec<ThemeArtifact>,
    pub controls: Vec<ControlArtifact>,
}

impl ArtifactBundle {
    /// Builds a bundle listing exactly one widget and the default theme.
    ///
    /// When `template` is given it is registered as the widget's HTML template for
    /// the default theme (`<kebab-name>.html`).
    pub fn single_widget(
        descriptor: WidgetDescriptor,
        module: Rc<dyn WidgetModule>,
        template: Option<&str>,
    ) -> Self {
        let mut assets = WidgetAssets::default();
        if let Some(template) = template {
            assets = assets.with_themed_asset(
                DEFAULT_THEME,
                format!("{}.html", descriptor.kebab_name()),
                Asset::content(template),
            );
        }

        let mut aliases = Aliases::default();
        aliases.widgets.insert(descriptor.name.clone(), 0);
        aliases.themes.insert("default".into(), 0);
        aliases.themes.insert(DEFAULT_THEME.into(), 0);

        Self {
            aliases,
            widgets: vec![WidgetArtifact { descriptor, module, assets }],
            themes: vec![ThemeArtifact {
                descriptor: ThemeDescriptor { name: DEFAULT_THEME.into() },
                assets: BTreeMap::new(),
            }],
            controls: Vec::new(),
        }
    }

    pub fn widget(&self, reference: &str) -> Option<&WidgetArtifact> {
        self.aliases.widgets.get(reference).and_then(|index| self.widgets.get(*index))
    }

    pub fn theme(&self, reference: &str) -> Option<&ThemeArtifact> {
        self.aliases.themes.get(reference).and_then(|index| self.themes.get(*index))
    }

    pub fn control(&self, reference: &str) -> Option<&ControlArtifact> {
        self.aliases.controls.get(reference).and_then(|index| self.controls.get(*index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{IntegrationKind, Technology};
    use crate::module::{NoopController, widget_module};
    use rstest::rstest;

    fn bundle() -> ArtifactBundle {
        let descriptor =
            WidgetDescriptor::new("SomeWidget", IntegrationKind::Widget, Technology::Plain);
        let module = widget_module(Vec::new(), |_| Ok(Box::new(NoopController)));
        ArtifactBundle::single_widget(descriptor, module, Some("<h1>hey</h1>"))
    }

    #[rstest]
    fn single_widget_resolves_through_aliases() {
        let bundle = bundle();
        let artifact = bundle.widget("SomeWidget").expect("widget listed");
        assert_eq!(artifact.descriptor.name, "SomeWidget");
        assert!(bundle.widget("OtherWidget").is_none());
        assert_eq!(bundle.theme("default").map(|t| t.descriptor.name.as_str()), Some(DEFAULT_THEME));
    }

    #[rstest]
    fn template_is_registered_for_default_theme() {
        let bundle = bundle();
        let artifact = bundle.widget("SomeWidget").expect("widget listed");
        let asset = artifact.assets.for_theme("custom.theme", "some-widget.html");
        assert_eq!(asset, Some(&Asset::content("<h1>hey</h1>")));
    }
}
