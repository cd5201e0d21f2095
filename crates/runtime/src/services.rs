//! Services the runtime provides to every widget, and the hook to replace them.

use crate::bus::{Bus, WidgetEventBus};
use futures::FutureExt;
use futures::future;
use json_dotpath::DotPaths;
use serde_json::Value;
use std::rc::{Rc, Weak};
use widgetbed_core::artifacts::{ArtifactBundle, Asset};
use widgetbed_core::descriptor::WidgetDescriptor;
use widgetbed_core::error::ServiceError;
use widgetbed_core::services::{
    AreaHelper, AssetFuture, Assets, Configuration, IdGenerator, Log, LogLevel, Service,
    ServiceMap, ServiceName, ServiceThunk, WidgetContext,
};

/// Area widgets are placed in when loaded outside of a page.
pub const DEFAULT_AREA: &str = "content";

/// Everything known about the widget while its services are being set up.
#[derive(Clone)]
pub struct ServiceContext {
    pub widget_id: String,
    pub descriptor: WidgetDescriptor,
    /// Validated feature configuration, defaults applied.
    pub features: Rc<Value>,
    pub configuration: Rc<Value>,
    pub artifacts: Rc<ArtifactBundle>,
    /// Theme directory name, e.g. `default.theme`.
    pub theme: String,
    pub global_event_bus: Bus,
    pub widget_event_bus: Rc<WidgetEventBus>,
    /// The map the services are registered in; lets thunks resolve their dependencies.
    pub services: Weak<ServiceMap>,
}

impl ServiceContext {
    /// Resolves another service of the same widget.
    pub fn service(&self, name: &ServiceName) -> Result<Service, ServiceError> {
        let services =
            self.services.upgrade().ok_or_else(|| ServiceError::Unavailable(name.clone()))?;
        services.get(name)
    }
}

/// Intercepts service construction, e.g. to hand out test doubles.
///
/// `decorate` is called once per service name when the map is built; the returned
/// thunk only runs if the widget actually requests the service.
pub trait ServiceDecorator {
    fn decorate(
        &self,
        name: &ServiceName,
        context: &ServiceContext,
        default: ServiceThunk,
    ) -> ServiceThunk;

    /// Whether a url-only resource is expected to be absent. Such resources load as
    /// `None` instead of failing.
    fn is_known_missing(&self, _resource: &str) -> bool {
        false
    }
}

pub(crate) fn populate(
    services: &ServiceMap,
    context: &ServiceContext,
    decorator: Option<&dyn ServiceDecorator>,
) {
    for name in ServiceName::KNOWN {
        let default = default_service(&name, context);
        let thunk = match decorator {
            Some(decorator) => decorator.decorate(&name, context, default),
            None => default,
        };
        services.insert_lazy(name, thunk);
    }
}

fn default_service(name: &ServiceName, context: &ServiceContext) -> ServiceThunk {
    let widget_id = context.widget_id.clone();
    let service_name = name.clone();
    let construct: Box<dyn FnOnce() -> Result<Service, ServiceError>> = match name {
        ServiceName::EventBus => {
            let bus = Rc::clone(&context.widget_event_bus);
            Box::new(move || Ok(Service::EventBus(bus)))
        }
        ServiceName::GlobalEventBus => {
            let bus = context.global_event_bus.clone();
            Box::new(move || Ok(Service::EventBus(Rc::new(bus))))
        }
        ServiceName::Context => {
            let context = context.clone();
            Box::new(move || {
                let event_bus = context.service(&ServiceName::EventBus)?.as_event_bus().ok_or_else(
                    || ServiceError::failed(ServiceName::Context, "axEventBus is not an event bus"),
                )?;
                Ok(Service::Context(Rc::new(WidgetContext {
                    widget_id: context.widget_id.clone(),
                    widget_name: context.descriptor.name.clone(),
                    area: DEFAULT_AREA.to_owned(),
                    features: Rc::clone(&context.features),
                    event_bus,
                })))
            })
        }
        ServiceName::Features => {
            let features = Rc::clone(&context.features);
            Box::new(move || Ok(Service::Features(features)))
        }
        ServiceName::Id => {
            let generator = WidgetIdGenerator { widget_id: widget_id.clone() };
            Box::new(move || Ok(Service::Id(Rc::new(generator))))
        }
        ServiceName::Log => {
            let log = TracingLog { widget_id: widget_id.clone() };
            Box::new(move || Ok(Service::Log(Rc::new(log))))
        }
        ServiceName::Configuration => {
            let configuration = JsonConfiguration::new(Rc::clone(&context.configuration));
            Box::new(move || Ok(Service::Configuration(Rc::new(configuration))))
        }
        ServiceName::Assets => {
            let assets = ArtifactAssets::new(context);
            Box::new(move || Ok(Service::Assets(Rc::new(assets))))
        }
        ServiceName::AreaHelper => {
            let helper = WidgetAreaHelper { widget_id: widget_id.clone() };
            Box::new(move || Ok(Service::AreaHelper(Rc::new(helper))))
        }
        other => {
            let other = other.clone();
            Box::new(move || Err(ServiceError::Unavailable(other)))
        }
    };
    Box::new(move || {
        tracing::debug!(service = %service_name, widget = %widget_id, "instantiating runtime service");
        construct()
    })
}

pub struct WidgetIdGenerator {
    widget_id: String,
}

impl IdGenerator for WidgetIdGenerator {
    fn id(&self, suffix: &str) -> String {
        format!("ax-{}-{suffix}", self.widget_id)
    }
}

/// Forwards widget log messages to `tracing`.
pub struct TracingLog {
    widget_id: String,
}

impl Log for TracingLog {
    fn log(&self, level: LogLevel, message: &str, args: &[Value]) {
        let text = format_message(message, args);
        let widget = self.widget_id.as_str();
        match level {
            LogLevel::Trace => tracing::trace!(widget, "{text}"),
            LogLevel::Debug => tracing::debug!(widget, "{text}"),
            LogLevel::Info => tracing::info!(widget, "{text}"),
            LogLevel::Warn => tracing::warn!(widget, "{text}"),
            LogLevel::Error => tracing::error!(widget, "{text}"),
        }
    }
}

/// Replaces `[0]`, `[1]`, ... placeholders with the rendered arguments.
pub fn format_message(message: &str, args: &[Value]) -> String {
    args.iter().enumerate().fold(message.to_owned(), |text, (index, arg)| {
        let rendered = match arg {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        text.replace(&format!("[{index}]"), &rendered)
    })
}

/// Application configuration read by dotted key.
pub struct JsonConfiguration {
    tree: Rc<Value>,
}

impl JsonConfiguration {
    pub fn new(tree: Rc<Value>) -> Self {
        Self { tree }
    }
}

impl Configuration for JsonConfiguration {
    fn get(&self, key: &str) -> Option<Value> {
        self.tree.dot_get::<Value>(key).ok().flatten()
    }
}

/// Serves widget assets straight from the artifact bundle.
pub struct ArtifactAssets {
    artifacts: Rc<ArtifactBundle>,
    widget: String,
    theme: String,
}

impl ArtifactAssets {
    pub fn new(context: &ServiceContext) -> Self {
        Self {
            artifacts: Rc::clone(&context.artifacts),
            widget: context.descriptor.name.clone(),
            theme: context.theme.clone(),
        }
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
}

/// Content of an asset; url-only assets cannot be fetched without network access.
pub fn asset_content(name: &str, asset: Option<Asset>) -> Result<Option<String>, ServiceError> {
    match asset {
        None => Ok(None),
        Some(Asset { content: Some(content), .. }) => Ok(Some(content)),
        Some(Asset { url: Some(url), .. }) => Err(ServiceError::ResourceNotFound(url)),
        Some(_) => Err(ServiceError::ResourceNotFound(name.to_owned())),
    }
}

impl Assets for ArtifactAssets {
    fn asset(&self, name: &str) -> AssetFuture {
        future::ready(asset_content(name, self.lookup(name, false))).boxed_local()
    }

    fn for_theme(&self, name: &str) -> AssetFuture {
        future::ready(asset_content(name, self.lookup(name, true))).boxed_local()
    }

    fn url(&self, name: &str) -> AssetFuture {
        future::ready(Ok(self.lookup(name, false).and_then(|asset| asset.url))).boxed_local()
    }

    fn url_for_theme(&self, name: &str) -> AssetFuture {
        future::ready(Ok(self.lookup(name, true).and_then(|asset| asset.url))).boxed_local()
    }
}

pub struct WidgetAreaHelper {
    widget_id: String,
}

impl AreaHelper for WidgetAreaHelper {
    fn full_name(&self, local_name: &str) -> String {
        format!("{}.{local_name}", self.widget_id)
    }

    fn local_name(&self, full_name: &str) -> String {
        full_name
            .strip_prefix(&self.widget_id)
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(full_name)
            .to_owned()
    }

    fn is_visible(&self, _full_name: &str) -> bool {
        true
    }
}
