//! Widget loading: from a widget reference to a controller and its template.

use crate::adapters::AdapterRegistry;
use crate::bus::{Bus, WidgetEventBus};
use crate::error::LoadError;
use crate::schema::FeatureSchema;
use crate::services::{ServiceContext, ServiceDecorator, asset_content, populate};
use futures::FutureExt;
use futures::future::{self, LocalBoxFuture};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::fmt::{Debug, Formatter};
use std::rc::Rc;
use widgetbed_core::adapter::{AdapterEnvironment, AdapterInstance};
use widgetbed_core::artifacts::{ArtifactBundle, Asset};
use widgetbed_core::dom::Element;
use widgetbed_core::error::ServiceError;
use widgetbed_core::services::ServiceMap;

/// Which widget to load, as it would appear in a page.
#[derive(Clone, Debug, PartialEq)]
pub struct WidgetReference {
    /// Instance id of the widget.
    pub id: String,
    /// Name of the widget in the artifact aliases.
    pub widget: String,
    pub features: Value,
}

pub type ServicesCallback = Box<dyn FnOnce(&Rc<ServiceMap>)>;

#[derive(Default)]
pub struct LoadOptions {
    /// Runs once the service map exists, before the controller is created.
    pub when_services_available: Option<ServicesCallback>,
}

pub type TemplateFuture = LocalBoxFuture<'static, Result<Option<String>, LoadError>>;
pub type InstanceFuture = LocalBoxFuture<'static, Result<Rc<dyn AdapterInstance>, LoadError>>;

/// Handle to a loaded widget.
pub struct LoadContext {
    pub widget_id: String,
    /// Resolves to the widget's HTML template, `None` for activities and widgets without one.
    pub template: TemplateFuture,
    pub adapter: InstanceFuture,
    pub services: Rc<ServiceMap>,
    pub destroy: DestroyHandle,
}

impl Debug for LoadContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadContext")
            .field("widget_id", &self.widget_id)
            .field("services", &self.services)
            .field("destroyed", &self.destroy.is_destroyed())
            .finish_non_exhaustive()
    }
}

type CleanupStep = Box<dyn FnOnce()>;

/// Idempotent teardown of a loaded widget. Clones share the same state.
#[derive(Clone, Default)]
pub struct DestroyHandle {
    steps: Rc<RefCell<Vec<CleanupStep>>>,
    destroyed: Rc<Cell<bool>>,
}

impl DestroyHandle {
    /// Adds a cleanup step. Steps run in reverse order of registration; a step
    /// added after destruction runs immediately.
    pub fn on_destroy(&self, step: impl FnOnce() + 'static) {
        if self.destroyed.get() {
            step();
        } else {
            self.steps.borrow_mut().push(Box::new(step));
        }
    }

    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        let steps = self.steps.take();
        for step in steps.into_iter().rev() {
            step();
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }
}

/// Loads widgets from the artifact bundle through their technology adapter.
pub struct WidgetLoader {
    pub(crate) artifacts: Rc<ArtifactBundle>,
    pub(crate) adapters: Rc<AdapterRegistry>,
    pub(crate) configuration: Rc<Value>,
    pub(crate) global_event_bus: Bus,
    pub(crate) decorator: Option<Rc<dyn ServiceDecorator>>,
    pub(crate) theme: String,
    pub(crate) anchor: Element,
}

impl WidgetLoader {
    pub fn load(
        &self,
        reference: WidgetReference,
        options: LoadOptions,
    ) -> LocalBoxFuture<'static, Result<LoadContext, LoadError>> {
        future::ready(self.load_now(reference, options)).boxed_local()
    }

    fn load_now(
        &self,
        reference: WidgetReference,
        options: LoadOptions,
    ) -> Result<LoadContext, LoadError> {
        let artifact = self
            .artifacts
            .widget(&reference.widget)
            .ok_or_else(|| LoadError::UnknownWidget(reference.widget.clone()))?;
        let descriptor = artifact.descriptor.clone();
        let factory = self
            .adapters
            .factory_for(descriptor.technology())
            .ok_or_else(|| LoadError::UnknownTechnology(descriptor.technology().clone()))?;

        let features = match &descriptor.features {
            Some(schema) => FeatureSchema::compile(schema, &descriptor.name)?
                .validate(&reference.features)?,
            None => reference.features.clone(),
        };

        tracing::info!(widget = %descriptor.name, id = %reference.id, "loading widget");

        let destroy = DestroyHandle::default();
        let widget_event_bus =
            Rc::new(WidgetEventBus::new(self.global_event_bus.clone(), reference.id.clone()));
        let bus = Rc::clone(&widget_event_bus);
        destroy.on_destroy(move || bus.release());

        let services = Rc::new(ServiceMap::new());
        let context = ServiceContext {
            widget_id: reference.id.clone(),
            descriptor: descriptor.clone(),
            features: Rc::new(features),
            configuration: Rc::clone(&self.configuration),
            artifacts: Rc::clone(&self.artifacts),
            theme: self.theme.clone(),
            global_event_bus: self.global_event_bus.clone(),
            widget_event_bus,
            services: Rc::downgrade(&services),
        };
        populate(&services, &context, self.decorator.as_deref());

        if let Some(callback) = options.when_services_available {
            callback(&services);
        }

        let environment = AdapterEnvironment {
            widget_name: descriptor.name.clone(),
            widget_id: reference.id.clone(),
            anchor: self.anchor.clone(),
            module: Rc::clone(&artifact.module),
            services: Rc::clone(&services),
        };
        // The instance is destroyed with the widget even if nobody awaited the adapter.
        let created = factory.create(environment).shared();
        let pending = created.clone();
        destroy.on_destroy(move || {
            if let Some(Ok(instance)) = pending.now_or_never() {
                instance.destroy();
            }
        });
        let adapter: InstanceFuture =
            created.map(|result| result.map_err(LoadError::from)).boxed_local();

        let template = if descriptor.is_activity() {
            future::ready(Ok(None)).boxed_local()
        } else {
            let name = format!("{}.html", descriptor.kebab_name());
            let asset = artifact.assets.for_theme(&self.theme, &name).cloned();
            future::ready(self.template_content(&descriptor.name, &name, asset)).boxed_local()
        };

        Ok(LoadContext { widget_id: reference.id, template, adapter, services, destroy })
    }

    fn template_content(
        &self,
        widget: &str,
        name: &str,
        asset: Option<Asset>,
    ) -> Result<Option<String>, LoadError> {
        match asset_content(name, asset) {
            Err(ServiceError::ResourceNotFound(resource))
                if self.decorator.as_ref().is_some_and(|hook| hook.is_known_missing(&resource)) =>
            {
                tracing::debug!(widget, resource = %resource, "template is known to be missing");
                Ok(None)
            }
            result => result.map_err(|err| LoadError::Template {
                widget: widget.to_owned(),
                message: err.to_string(),
            }),
        }
    }
}
