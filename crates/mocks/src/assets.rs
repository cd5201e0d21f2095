//! Assets mock backed by the artifact bundle of the session.
//!
//! Nothing is fetched: assets with inline content resolve to it, url-only assets
//! fail unless they are listed as known missing, in which case they resolve to
//! `None`.

use crate::spy::Spy;
use crate::{MockEnvironment, ResourcePattern, register_service_mock};
use futures::FutureExt;
use futures::future;
use serde_json::json;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use widgetbed_core::artifacts::{ArtifactBundle, Asset};
use widgetbed_core::error::ServiceError;
use widgetbed_core::services::{AssetFuture, Assets, Service, ServiceName, ServiceThunk};
use widgetbed_runtime::services::asset_content;

pub struct MockAssets {
    artifacts: Rc<ArtifactBundle>,
    widget: String,
    theme: String,
    known_missing: Vec<ResourcePattern>,
    overrides: RefCell<BTreeMap<String, Option<String>>>,
    pub asset: Spy,
    pub for_theme: Spy,
    pub url: Spy,
    pub url_for_theme: Spy,
}

impl MockAssets {
    pub fn new(
        artifacts: Rc<ArtifactBundle>,
        widget: impl Into<String>,
        theme: impl Into<String>,
        known_missing: Vec<ResourcePattern>,
    ) -> Self {
        Self {
            artifacts,
            widget: widget.into(),
            theme: theme.into(),
            known_missing,
            overrides: RefCell::new(BTreeMap::new()),
            asset: Spy::new("axAssets"),
            for_theme: Spy::new("axAssets.forTheme"),
            url: Spy::new("axAssets.url"),
            url_for_theme: Spy::new("axAssets.urlForTheme"),
        }
    }

    /// Makes `name` resolve to `content` in both the plain and the themed lookup.
    pub fn mock_asset(&self, name: impl Into<String>, content: Option<String>) {
        self.overrides.borrow_mut().insert(name.into(), content);
    }

    fn lookup(&self, name: &str, themed: bool) -> Option<Asset> {
        let artifact = self.artifacts.widget(&self.widget)?;
        let asset = if themed {
            artifact.assets.for_theme(&self.theme, name)
        } else {
            artifact.assets.plain(name)
        };
        asset.cloned()
    }

    fn is_known_missing(&self, resource: &str) -> bool {
        self.known_missing.iter().any(|pattern| pattern.matches(resource))
    }

    fn content(&self, name: &str, themed: bool) -> Result<Option<String>, ServiceError> {
        if let Some(content) = self.overrides.borrow().get(name) {
            return Ok(content.clone());
        }
        match asset_content(name, self.lookup(name, themed)) {
            Err(ServiceError::ResourceNotFound(resource)) if self.is_known_missing(&resource) => {
                tracing::debug!(asset = name, resource = %resource, "known missing asset");
                Ok(None)
            }
            Err(err) => {
                tracing::warn!(asset = name, error = %err, "asset not available without network");
                Err(err)
            }
            found => found,
        }
    }
}

impl Assets for MockAssets {
    fn asset(&self, name: &str) -> AssetFuture {
        self.asset.record(vec![json!(name)]);
        future::ready(self.content(name, false)).boxed_local()
    }

    fn for_theme(&self, name: &str) -> AssetFuture {
        self.for_theme.record(vec![json!(name)]);
        future::ready(self.content(name, true)).boxed_local()
    }

    fn url(&self, name: &str) -> AssetFuture {
        self.url.record(vec![json!(name)]);
        future::ready(Ok(self.lookup(name, false).and_then(|asset| asset.url))).boxed_local()
    }

    fn url_for_theme(&self, name: &str) -> AssetFuture {
        self.url_for_theme.record(vec![json!(name)]);
        future::ready(Ok(self.lookup(name, true).and_then(|asset| asset.url))).boxed_local()
    }
}

fn create_assets_mock(
    environment: &MockEnvironment,
    _default: ServiceThunk,
) -> Result<Service, ServiceError> {
    let context = &environment.context;
    Ok(Service::Assets(Rc::new(MockAssets::new(
        Rc::clone(&context.artifacts),
        context.descriptor.name.clone(),
        context.theme.clone(),
        environment.settings.known_missing_resources.clone(),
    ))))
}

register_service_mock!(ServiceName::Assets, create_assets_mock);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::artifacts;
    use futures::executor::block_on;
    use rstest::rstest;
    use widgetbed_core::artifacts::DEFAULT_THEME;

    fn mock_assets(known_missing: Vec<ResourcePattern>) -> MockAssets {
        MockAssets::new(Rc::new(artifacts()), "some-widget", DEFAULT_THEME, known_missing)
    }

    #[rstest]
    fn themed_template_resolves_from_artifacts() {
        let assets = mock_assets(Vec::new());
        let html = block_on(assets.for_theme("some-widget.html")).expect("available");
        assert_eq!(html.as_deref(), Some("<h1>hey</h1>"));
        assert!(assets.for_theme.was_called_with(&[json!("some-widget.html")]));
    }

    #[rstest]
    fn url_only_assets_fail_unless_known_missing() {
        let assets = mock_assets(Vec::new());
        let result = block_on(assets.asset("data.json"));
        assert_eq!(result, Err(ServiceError::ResourceNotFound("/assets/data.json".into())));

        let assets = mock_assets(vec![ResourcePattern::substring("/assets/")]);
        assert_eq!(block_on(assets.asset("data.json")), Ok(None));
        assert_eq!(block_on(assets.url("data.json")), Ok(Some("/assets/data.json".to_owned())));
    }

    #[rstest]
    fn mocked_assets_take_precedence() {
        let assets = mock_assets(Vec::new());
        assets.mock_asset("some-widget.html", Some("<p>mocked</p>".into()));
        let html = block_on(assets.for_theme("some-widget.html")).expect("available");
        assert_eq!(html.as_deref(), Some("<p>mocked</p>"));
    }

    #[rstest]
    fn unknown_assets_resolve_to_none() {
        let assets = mock_assets(Vec::new());
        assert_eq!(block_on(assets.asset("nothing.txt")), Ok(None));
    }
}
