//! Installs the service mocks into the runtime's service map.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use widgetbed_core::error::ServiceError;
use widgetbed_core::services::{Service, ServiceName, ServiceThunk};
use widgetbed_mocks::{MockEnvironment, MockSettings, mock_factory};
use widgetbed_runtime::{ServiceContext, ServiceDecorator};

/// Per-session replacement for a registered mock factory.
pub type MockOverride = Rc<dyn Fn(&MockEnvironment, ServiceThunk) -> Result<Service, ServiceError>>;

/// Decorates every lazy service entry with its mock factory.
///
/// A factory only runs when the widget requests the service, and at most once
/// per load since the service map memoizes the result.
pub struct ServiceMockRegistry {
    settings: Rc<MockSettings>,
    overrides: BTreeMap<ServiceName, MockOverride>,
    instantiated: Rc<RefCell<Vec<ServiceName>>>,
}

impl ServiceMockRegistry {
    pub fn new(settings: MockSettings, overrides: BTreeMap<ServiceName, MockOverride>) -> Self {
        Self {
            settings: Rc::new(settings),
            overrides,
            instantiated: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Names of the mocks built so far, in order of construction.
    pub fn instantiated(&self) -> Vec<ServiceName> {
        self.instantiated.borrow().clone()
    }
}

impl ServiceDecorator for ServiceMockRegistry {
    fn decorate(
        &self,
        name: &ServiceName,
        context: &ServiceContext,
        default: ServiceThunk,
    ) -> ServiceThunk {
        let factory: MockOverride = if let Some(factory) = self.overrides.get(name) {
            Rc::clone(factory)
        } else if let Some(factory) = mock_factory(name) {
            Rc::new(factory)
        } else {
            return default;
        };

        let environment =
            MockEnvironment { context: context.clone(), settings: Rc::clone(&self.settings) };
        let instantiated = Rc::clone(&self.instantiated);
        let name = name.clone();
        Box::new(move || {
            tracing::debug!(
                service = %name,
                widget = %environment.context.widget_id,
                "creating mock"
            );
            let service = factory(&environment, default)?;
            instantiated.borrow_mut().push(name);
            Ok(service)
        })
    }

    fn is_known_missing(&self, resource: &str) -> bool {
        self.settings.known_missing_resources.iter().any(|pattern| pattern.matches(resource))
    }
}
