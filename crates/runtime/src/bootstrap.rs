//! Runtime bootstrap for one anchor element.

use crate::adapters::AdapterRegistry;
use crate::bus::Bus;
use crate::error::BootstrapError;
use crate::loader::WidgetLoader;
use crate::services::ServiceDecorator;
use serde_json::{Map, Value};
use std::rc::Rc;
use widgetbed_core::adapter::{AdapterBootstrap, AdapterFactory, AdapterModule};
use widgetbed_core::artifacts::ArtifactBundle;
use widgetbed_core::descriptor::Technology;
use widgetbed_core::dom::Element;
use widgetbed_core::scheduler::Scheduler;

/// Theme used when none is configured.
pub const DEFAULT_THEME_NAME: &str = "default";

pub struct BootstrapOptions {
    /// Adapters in addition to the built-in ones; they win on equal technology.
    pub widget_adapters: Vec<Rc<dyn AdapterModule>>,
    /// Application configuration, read by dotted key through `axConfiguration`.
    pub configuration: Value,
    pub artifacts: Rc<ArtifactBundle>,
    pub scheduler: Rc<dyn Scheduler>,
    pub service_decorator: Option<Rc<dyn ServiceDecorator>>,
    pub theme: String,
}

impl BootstrapOptions {
    pub fn new(artifacts: ArtifactBundle, scheduler: Rc<dyn Scheduler>) -> Self {
        Self {
            widget_adapters: Vec::new(),
            configuration: Value::Object(Map::new()),
            artifacts: Rc::new(artifacts),
            scheduler,
            service_decorator: None,
            theme: DEFAULT_THEME_NAME.to_owned(),
        }
    }
}

/// What a bootstrapped runtime hands back.
pub struct RuntimeServices {
    pub global_event_bus: Bus,
    pub widget_loader: WidgetLoader,
    pub adapters: Rc<AdapterRegistry>,
    pub artifacts: Rc<ArtifactBundle>,
    /// Directory name of the active theme, e.g. `default.theme`.
    pub theme: String,
}

impl RuntimeServices {
    pub fn adapter_factory(&self, technology: &Technology) -> Option<Rc<dyn AdapterFactory>> {
        self.adapters.factory_for(technology)
    }
}

/// Bootstraps a runtime whose widgets render below `anchor`.
///
/// Fails if the theme is not listed or a listed widget has no adapter.
pub fn bootstrap(
    anchor: &Element,
    options: BootstrapOptions,
) -> Result<RuntimeServices, BootstrapError> {
    let theme = resolve_theme(&options.artifacts, &options.theme)?;

    let adapters = Rc::new(AdapterRegistry::bootstrap(
        &options.widget_adapters,
        &AdapterBootstrap { artifacts: Rc::clone(&options.artifacts), dom_root: anchor.clone() },
    ));
    for artifact in &options.artifacts.widgets {
        let technology = artifact.descriptor.technology();
        if adapters.factory_for(technology).is_none() {
            return Err(BootstrapError::UnknownTechnology(technology.clone()));
        }
    }

    let global_event_bus = Bus::new(options.scheduler);
    tracing::debug!(
        theme = %theme,
        widgets = options.artifacts.widgets.len(),
        adapters = adapters.technologies().count(),
        "runtime bootstrapped"
    );

    let widget_loader = WidgetLoader {
        artifacts: Rc::clone(&options.artifacts),
        adapters: Rc::clone(&adapters),
        configuration: Rc::new(options.configuration),
        global_event_bus: global_event_bus.clone(),
        decorator: options.service_decorator,
        theme: theme.clone(),
        anchor: anchor.clone(),
    };

    Ok(RuntimeServices {
        global_event_bus,
        widget_loader,
        adapters,
        artifacts: options.artifacts,
        theme,
    })
}

fn resolve_theme(artifacts: &ArtifactBundle, theme: &str) -> Result<String, BootstrapError> {
    if let Some(artifact) = artifacts.theme(theme) {
        return Ok(artifact.descriptor.name.clone());
    }
    if theme == DEFAULT_THEME_NAME {
        return Ok(widgetbed_core::artifacts::DEFAULT_THEME.to_owned());
    }
    Err(BootstrapError::UnknownTheme(theme.to_owned()))
}
