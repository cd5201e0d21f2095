use futures::FutureExt;
use futures::future;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;
use widgetbed_core::adapter::{
    AdapterBootstrap, AdapterEnvironment, AdapterFactory, AdapterFuture, AdapterInstance,
    AdapterModule, registered_adapters,
};
use widgetbed_core::descriptor::{Technology, kebab_case};
use widgetbed_core::dom::Element;
use widgetbed_core::error::AdapterError;
use widgetbed_core::module::WidgetController;
use widgetbed_core::register_widget_adapter;

/// Adapter factories by technology, bootstrapped once per runtime.
pub struct AdapterRegistry {
    factories: BTreeMap<Technology, Rc<dyn AdapterFactory>>,
}

impl AdapterRegistry {
    /// Bootstraps the registered built-in adapters followed by `supplied`; a supplied
    /// adapter replaces a built-in one for the same technology.
    pub fn bootstrap(supplied: &[Rc<dyn AdapterModule>], context: &AdapterBootstrap) -> Self {
        let mut factories = BTreeMap::new();
        for module in registered_adapters().chain(supplied.iter().cloned()) {
            let technology = module.technology();
            tracing::debug!(technology = %technology, "bootstrapping widget adapter");
            factories.insert(technology, module.bootstrap(context));
        }
        Self { factories }
    }

    pub fn factory_for(&self, technology: &Technology) -> Option<Rc<dyn AdapterFactory>> {
        self.factories.get(technology).cloned()
    }

    pub fn technologies(&self) -> impl Iterator<Item = &Technology> {
        self.factories.keys()
    }
}

/// Looks up a built-in adapter module by technology.
pub fn builtin_adapter(technology: &Technology) -> Option<Rc<dyn AdapterModule>> {
    registered_adapters().find(|module| &module.technology() == technology)
}

/// Adapter for widgets written against the plain DOM.
pub struct PlainAdapter;

impl AdapterModule for PlainAdapter {
    fn technology(&self) -> Technology {
        Technology::Plain
    }

    fn bootstrap(&self, _context: &AdapterBootstrap) -> Rc<dyn AdapterFactory> {
        Rc::new(PlainAdapterFactory)
    }
}

fn plain_adapter() -> Rc<dyn AdapterModule> {
    Rc::new(PlainAdapter)
}

register_widget_adapter!(plain_adapter);

struct PlainAdapterFactory;

impl AdapterFactory for PlainAdapterFactory {
    fn create(&self, environment: AdapterEnvironment) -> AdapterFuture {
        let created = environment
            .resolve_injections()
            .map_err(AdapterError::from)
            .and_then(|services| environment.module.create(services).map_err(AdapterError::from))
            .map(|controller| {
                let element = Element::new("div").with_id(&environment.widget_id);
                element.add_class(kebab_case(&environment.widget_name));
                tracing::debug!(widget = %environment.widget_id, "plain widget controller created");
                Rc::new(PlainAdapterInstance { controller, element, destroyed: Cell::new(false) })
                    as Rc<dyn AdapterInstance>
            });
        future::ready(created).boxed_local()
    }
}

struct PlainAdapterInstance {
    controller: Box<dyn WidgetController>,
    element: Element,
    destroyed: Cell<bool>,
}

impl AdapterInstance for PlainAdapterInstance {
    fn dom_attach_to(&self, container: &Element, markup: Option<&str>) {
        let Some(markup) = markup else {
            return;
        };
        self.element.set_inner_html(markup);
        container.append_child(&self.element);
        self.controller.on_dom_available(&self.element);
    }

    fn dom_detach(&self) {
        self.element.remove();
    }

    fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        self.controller.on_destroy();
        self.element.remove();
    }
}
