//! The widget under test and the session owning it.
//!
//! A [`TestSession`] is created by [`setup_for_widget`](crate::setup_for_widget)
//! and owns one anchor element, one runtime and one [`Widget`]. The widget moves
//! through [`WidgetState`]s as the test configures, loads, renders and finally
//! tears it down.

use crate::error::HarnessError;
use crate::event_bus::EventBusFacade;
use crate::features::FeatureConfiguration;
use crate::registry::ServiceMockRegistry;
use crate::reporter::FailureReporter;
use crate::scheduler::next_tick;
use crate::settings::HarnessSettings;
use crate::startup::{self, StartupOverrides};
use futures::future;
use serde_json::{Value, json};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt::{Debug, Formatter};
use std::rc::{Rc, Weak};
use widgetbed_core::adapter::{AdapterFactory, AdapterInstance};
use widgetbed_core::descriptor::WidgetDescriptor;
use widgetbed_core::dom::Element;
use widgetbed_core::event::EventBusExt;
use widgetbed_core::services::{Service, ServiceMap, ServiceName};
use widgetbed_runtime::{
    DestroyHandle, FeatureSchema, LoadOptions, ServicesCallback, WidgetLoader, WidgetReference,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WidgetState {
    Unconfigured,
    /// Features may be configured and service callbacks queued.
    Configuring,
    Loading,
    Loaded,
    Rendered,
    TornDown,
    /// Loading failed; only teardown remains.
    Failed,
}

pub(crate) struct WidgetParts {
    pub descriptor: WidgetDescriptor,
    pub loader: WidgetLoader,
    pub anchor: Element,
    pub view: Option<Rc<dyn AdapterFactory>>,
    pub reporter: Rc<dyn FailureReporter>,
    pub settings: HarnessSettings,
}

struct WidgetInner {
    parts: WidgetParts,
    state: Cell<WidgetState>,
    features: RefCell<FeatureConfiguration>,
    callbacks: RefCell<Vec<ServicesCallback>>,
    services: RefCell<Option<Rc<ServiceMap>>>,
    template: RefCell<Option<String>>,
    instance: RefCell<Option<Rc<dyn AdapterInstance>>>,
    destroy: RefCell<Option<DestroyHandle>>,
}

/// Handle to the widget under test. Clones refer to the same widget.
#[derive(Clone)]
pub struct Widget {
    inner: Rc<WidgetInner>,
}

impl Widget {
    pub(crate) fn new(parts: WidgetParts) -> Self {
        let widget = Self {
            inner: Rc::new(WidgetInner {
                parts,
                state: Cell::new(WidgetState::Unconfigured),
                features: RefCell::new(FeatureConfiguration::default()),
                callbacks: RefCell::new(Vec::new()),
                services: RefCell::new(None),
                template: RefCell::new(None),
                instance: RefCell::new(None),
                destroy: RefCell::new(None),
            }),
        };
        widget.set_state(WidgetState::Configuring);
        widget
    }

    pub fn state(&self) -> WidgetState {
        self.inner.state.get()
    }

    pub fn descriptor(&self) -> &WidgetDescriptor {
        &self.inner.parts.descriptor
    }

    /// The feature configuration as accumulated so far, before validation.
    pub fn features(&self) -> Value {
        self.inner.features.borrow().value().clone()
    }

    fn set_state(&self, state: WidgetState) {
        let previous = self.inner.state.replace(state);
        if previous != state {
            tracing::debug!(
                widget = %self.inner.parts.descriptor.name,
                from = ?previous,
                to = ?state,
                "widget state changed"
            );
        }
    }

    fn expect_configuring(&self, call: &'static str) -> Result<(), HarnessError> {
        match self.state() {
            WidgetState::Configuring => Ok(()),
            WidgetState::Unconfigured => {
                Err(HarnessError::precondition(call, "call `setup_for_widget` first"))
            }
            WidgetState::TornDown => Err(HarnessError::precondition(
                call,
                "the test session was torn down; call `setup_for_widget` first",
            )),
            WidgetState::Failed => {
                Err(HarnessError::precondition(call, "the widget failed to load"))
            }
            WidgetState::Loading | WidgetState::Loaded | WidgetState::Rendered => {
                Err(HarnessError::precondition(call, "the widget has already been loaded"))
            }
        }
    }

    /// Sets one feature at a dotted path.
    pub fn configure(&self, path: &str, value: Value) -> Result<(), HarnessError> {
        self.expect_configuring("configure")?;
        self.inner.features.borrow_mut().configure(path, value)
    }

    /// Replaces the whole feature configuration.
    pub fn configure_all(&self, features: Value) -> Result<(), HarnessError> {
        self.expect_configuring("configure_all")?;
        self.inner.features.borrow_mut().configure_all(features);
        Ok(())
    }

    /// Queues `callback` to run with the widget's service map once it exists,
    /// before the controller is created. Callbacks run in the order they were added.
    pub fn when_services_available(
        &self,
        callback: impl FnOnce(&Rc<ServiceMap>) + 'static,
    ) -> Result<(), HarnessError> {
        self.expect_configuring("when_services_available")?;
        self.inner.callbacks.borrow_mut().push(Box::new(callback));
        Ok(())
    }

    /// Validates the features and loads the widget through the runtime.
    ///
    /// Failures move the widget to [`WidgetState::Failed`] and are also handed to
    /// the session's failure reporter.
    pub async fn load(&self) -> Result<(), HarnessError> {
        match self.state() {
            WidgetState::Configuring => {}
            WidgetState::Loading | WidgetState::Loaded | WidgetState::Rendered => {
                tracing::warn!(widget = %self.descriptor().name, "widget loaded twice");
                return Err(HarnessError::AlreadyLoaded);
            }
            _ => return self.expect_configuring("load"),
        }

        self.set_state(WidgetState::Loading);
        match self.load_widget().await {
            Ok(()) => {
                self.set_state(WidgetState::Loaded);
                Ok(())
            }
            Err(err) => {
                self.set_state(WidgetState::Failed);
                self.inner.parts.reporter.report(&err);
                Err(err)
            }
        }
    }

    async fn load_widget(&self) -> Result<(), HarnessError> {
        let descriptor = &self.inner.parts.descriptor;
        let configured = self.features();
        let features = match &descriptor.features {
            Some(schema) => {
                FeatureSchema::compile(schema, &descriptor.name)?.validate(&configured)?
            }
            None => configured,
        };

        let reference = WidgetReference {
            id: self.inner.parts.settings.widget_id.clone(),
            widget: descriptor.name.clone(),
            features,
        };
        let widget = Rc::downgrade(&self.inner);
        let options = LoadOptions {
            when_services_available: Some(Box::new(move |services: &Rc<ServiceMap>| {
                if let Some(inner) = widget.upgrade() {
                    services_available(&inner, services);
                }
            })),
        };

        let context = self.inner.parts.loader.load(reference, options).await?;
        *self.inner.destroy.borrow_mut() = Some(context.destroy.clone());

        let (template, instance) = future::try_join(context.template, context.adapter).await?;
        *self.inner.template.borrow_mut() = template;
        *self.inner.instance.borrow_mut() = Some(instance);
        Ok(())
    }

    /// Attaches the widget's markup to the anchor and returns the widget's root
    /// element. Activities have no markup and yield `None`.
    ///
    /// Rendering again detaches the previous markup first.
    pub fn render(&self) -> Result<Option<Element>, HarnessError> {
        let reason = match self.state() {
            WidgetState::Loaded | WidgetState::Rendered => None,
            WidgetState::Unconfigured => Some("call `setup_for_widget` first"),
            WidgetState::Configuring => Some("call `load` first"),
            WidgetState::Loading => Some("`load` has not completed"),
            WidgetState::TornDown => Some("the test session was torn down"),
            WidgetState::Failed => Some("the widget failed to load"),
        };
        if let Some(reason) = reason {
            return Err(HarnessError::precondition("render", reason));
        }

        if self.descriptor().is_activity() {
            tracing::debug!(widget = %self.descriptor().name, "activities are not rendered");
            self.set_state(WidgetState::Rendered);
            return Ok(None);
        }

        let instance = self
            .inner
            .instance
            .borrow()
            .clone()
            .ok_or_else(|| HarnessError::precondition("render", "the widget has no adapter"))?;
        let template = self.inner.template.borrow().clone();
        let anchor = &self.inner.parts.anchor;
        if self.state() == WidgetState::Rendered {
            tracing::debug!(widget = %self.descriptor().name, "rendering widget again");
            instance.dom_detach();
        }
        instance.dom_attach_to(anchor, template.as_deref());
        if let Some(view) = &self.inner.parts.view {
            view.apply_view_changes();
        }
        self.set_state(WidgetState::Rendered);
        Ok(anchor.first_child())
    }

    /// The service map of the current load, once the runtime created it.
    pub fn services(&self) -> Option<Rc<ServiceMap>> {
        self.inner.services.borrow().clone()
    }

    /// Resolves one of the widget's injections, instantiating it if needed.
    pub fn service(&self, name: &ServiceName) -> Result<Service, HarnessError> {
        let services = self.services().ok_or_else(|| {
            HarnessError::precondition("service", "services exist once `load` has started")
        })?;
        Ok(services.get(name)?)
    }

    /// Resolves an injection and downcasts it to its concrete type, typically a mock.
    pub fn get<T: Any>(&self, name: &ServiceName) -> Result<Rc<T>, HarnessError> {
        self.service(name)?.downcast::<T>().ok_or_else(|| HarnessError::ServiceType {
            name: name.clone(),
            expected: std::any::type_name::<T>(),
        })
    }

    fn release(&self) {
        if let Some(destroy) = self.inner.destroy.borrow_mut().take() {
            destroy.destroy();
        }
        self.inner.callbacks.borrow_mut().clear();
        self.inner.parts.anchor.remove();
        self.set_state(WidgetState::TornDown);
    }
}

fn services_available(inner: &WidgetInner, services: &Rc<ServiceMap>) {
    *inner.services.borrow_mut() = Some(Rc::clone(services));
    let callbacks = inner.callbacks.take();
    tracing::debug!(
        widget = %inner.parts.descriptor.name,
        callbacks = callbacks.len(),
        "widget services available"
    );
    for callback in callbacks {
        callback(services);
    }
}

impl Debug for Widget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Widget")
            .field("name", &self.inner.parts.descriptor.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TearDownOptions {
    /// Publish `endLifecycleRequest.default` and flush before destroying the widget.
    pub publish_end_lifecycle_request: bool,
}

impl Default for TearDownOptions {
    fn default() -> Self {
        Self { publish_end_lifecycle_request: true }
    }
}

pub(crate) struct SessionParts {
    pub widget: Widget,
    pub event_bus: Rc<EventBusFacade>,
    pub registry: Rc<ServiceMockRegistry>,
    pub anchor: Element,
    pub reporter: Rc<dyn FailureReporter>,
}

struct SessionInner {
    parts: SessionParts,
    torn_down: Cell<bool>,
}

impl SessionInner {
    fn force_release(&self) {
        if self.torn_down.replace(true) {
            return;
        }
        tracing::debug!(widget = %self.parts.widget.descriptor().name, "releasing test session");
        self.parts.widget.release();
    }
}

thread_local! {
    static ACTIVE: RefCell<Weak<SessionInner>> = RefCell::new(Weak::new());
}

/// Releases a session of this thread that was never torn down.
pub(crate) fn release_active() {
    let stale = ACTIVE.with(|active| active.replace(Weak::new()).upgrade());
    if let Some(stale) = stale {
        tracing::warn!("previous test session was not torn down");
        stale.force_release();
    }
}

/// One widget test case.
///
/// Dropping the session without [`TestSession::tear_down`] destroys the widget
/// and detaches the anchor, but publishes nothing.
pub struct TestSession {
    inner: Rc<SessionInner>,
}

impl TestSession {
    pub(crate) fn new(parts: SessionParts) -> Self {
        let inner = Rc::new(SessionInner { parts, torn_down: Cell::new(false) });
        ACTIVE.with(|active| *active.borrow_mut() = Rc::downgrade(&inner));
        Self { inner }
    }

    pub fn widget(&self) -> &Widget {
        &self.inner.parts.widget
    }

    pub fn event_bus(&self) -> &Rc<EventBusFacade> {
        &self.inner.parts.event_bus
    }

    /// Element the widget renders into.
    pub fn anchor(&self) -> &Element {
        &self.inner.parts.anchor
    }

    pub fn reporter(&self) -> &Rc<dyn FailureReporter> {
        &self.inner.parts.reporter
    }

    /// Services that were replaced by a mock so far, in order of instantiation.
    pub fn instantiated_mocks(&self) -> Vec<ServiceName> {
        self.inner.parts.registry.instantiated()
    }

    pub fn is_torn_down(&self) -> bool {
        self.inner.torn_down.get()
    }

    /// Publishes the page startup events, flushing after every topic.
    pub fn trigger_startup_events(&self, overrides: &StartupOverrides) -> Result<(), HarnessError> {
        if self.is_torn_down() {
            return Err(HarnessError::precondition(
                "trigger_startup_events",
                "the test session was torn down",
            ));
        }
        startup::trigger_startup_events(&self.inner.parts.event_bus, overrides)
    }

    /// Ends the widget's lifecycle, destroys it and detaches the anchor.
    ///
    /// Calling it again does nothing. A failure while publishing the end of the
    /// lifecycle is returned after cleanup has completed.
    pub async fn tear_down(&self, options: TearDownOptions) -> Result<(), HarnessError> {
        if self.is_torn_down() {
            tracing::trace!("test session already torn down");
            return Ok(());
        }

        let mut result = Ok(());
        if options.publish_end_lifecycle_request {
            let event_bus = &self.inner.parts.event_bus;
            result = event_bus
                .emit("endLifecycleRequest.default", json!({ "lifecycleId": "default" }))
                .map_err(HarnessError::from)
                .and_then(|()| event_bus.flush().map(|_| ()));
        }
        next_tick().await;

        self.inner.force_release();
        tracing::debug!("test session torn down");
        result
    }
}

impl Drop for TestSession {
    fn drop(&mut self) {
        self.inner.force_release();
    }
}

impl Debug for TestSession {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestSession")
            .field("widget", self.widget())
            .field("torn_down", &self.is_torn_down())
            .finish_non_exhaustive()
    }
}
