//! Integration technology adapters.
//!
//! An adapter module is bootstrapped once per runtime and yields a factory; the
//! factory creates one adapter instance per widget, which owns the controller and
//! knows how to put the widget's markup into the document.

use crate::artifacts::ArtifactBundle;
use crate::descriptor::Technology;
use crate::dom::Element;
use crate::error::{AdapterError, ServiceError};
use crate::module::WidgetModule;
use crate::services::{Service, ServiceMap};
use futures::future::LocalBoxFuture;
use std::rc::Rc;

pub struct AdapterBootstrap {
    pub artifacts: Rc<ArtifactBundle>,
    /// Element the runtime renders into.
    pub dom_root: Element,
}

pub trait AdapterModule {
    fn technology(&self) -> Technology;
    fn bootstrap(&self, context: &AdapterBootstrap) -> Rc<dyn AdapterFactory>;
}

pub type AdapterFuture = LocalBoxFuture<'static, Result<Rc<dyn AdapterInstance>, AdapterError>>;

pub trait AdapterFactory {
    /// Instantiates the widget controller. Injections must be resolved from the
    /// environment's service map, never constructed by the adapter itself.
    fn create(&self, environment: AdapterEnvironment) -> AdapterFuture;

    /// Propagates pending model changes to the view. Called after rendering and
    /// after every delivery batch.
    fn apply_view_changes(&self) {}
}

pub trait AdapterInstance {
    /// Attaches the widget's markup to `container`. Without markup nothing is attached.
    fn dom_attach_to(&self, container: &Element, markup: Option<&str>);
    fn dom_detach(&self);
    fn destroy(&self);
}

/// What an adapter factory gets to create one widget.
#[derive(Clone)]
pub struct AdapterEnvironment {
    pub widget_name: String,
    pub widget_id: String,
    pub anchor: Element,
    pub module: Rc<dyn WidgetModule>,
    pub services: Rc<ServiceMap>,
}

impl AdapterEnvironment {
    /// Resolves the module's declared injections from the service map, in order.
    pub fn resolve_injections(&self) -> Result<Vec<Service>, ServiceError> {
        self.services.resolve_all(&self.module.injections())
    }
}

/// Inventory registration entry for built-in [`AdapterModule`]s.
pub struct AdapterRegistration {
    pub factory: fn() -> Rc<dyn AdapterModule>,
}

inventory::collect!(AdapterRegistration);

/// Instantiates every registered adapter module.
pub fn registered_adapters() -> impl Iterator<Item = Rc<dyn AdapterModule>> {
    inventory::iter::<AdapterRegistration>.into_iter().map(|entry| (entry.factory)())
}

/// Register an [`AdapterModule`] constructor.
#[macro_export]
macro_rules! register_widget_adapter {
    ($factory:expr) => {
        inventory::submit! {
            $crate::adapter::AdapterRegistration { factory: $factory }
        }
    };
}

pub use register_widget_adapter;
