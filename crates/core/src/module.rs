use crate::dom::Element;
use crate::error::WidgetError;
use crate::services::{Service, ServiceName};
use std::rc::Rc;

/// A running widget controller.
pub trait WidgetController {
    /// Called once the widget's markup has been attached to the document.
    fn on_dom_available(&self, _element: &Element) {}

    fn on_destroy(&self) {}
}

/// Entry point of a widget implementation.
pub trait WidgetModule {
    /// Services the controller requests, in the order `create` receives them.
    fn injections(&self) -> Vec<ServiceName>;

    fn create(&self, services: Vec<Service>) -> Result<Box<dyn WidgetController>, WidgetError>;
}

type ControllerFactory = dyn Fn(Vec<Service>) -> Result<Box<dyn WidgetController>, WidgetError>;

/// [`WidgetModule`] backed by a closure.
pub struct FnWidgetModule {
    injections: Vec<ServiceName>,
    factory: Box<ControllerFactory>,
}

impl WidgetModule for FnWidgetModule {
    fn injections(&self) -> Vec<ServiceName> {
        self.injections.clone()
    }

    fn create(&self, services: Vec<Service>) -> Result<Box<dyn WidgetController>, WidgetError> {
        (self.factory)(services)
    }
}

pub fn widget_module<F>(injections: Vec<ServiceName>, factory: F) -> Rc<dyn WidgetModule>
where
    F: Fn(Vec<Service>) -> Result<Box<dyn WidgetController>, WidgetError> + 'static,
{
    Rc::new(FnWidgetModule { injections, factory: Box::new(factory) })
}

/// Controller without behavior.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopController;

impl WidgetController for NoopController {}
