use crate::spy::Spy;
use crate::{MockEnvironment, register_service_mock};
use json_dotpath::DotPaths;
use serde_json::{Value, json};
use std::rc::Rc;
use widgetbed_core::error::ServiceError;
use widgetbed_core::services::{Configuration, Service, ServiceName, ServiceThunk};

/// Configuration mock over the tree given to the session setup.
pub struct MockConfiguration {
    tree: Rc<Value>,
    pub get: Spy,
}

impl MockConfiguration {
    pub fn new(tree: Rc<Value>) -> Self {
        Self { tree, get: Spy::new("axConfiguration.get") }
    }
}

impl Configuration for MockConfiguration {
    fn get(&self, key: &str) -> Option<Value> {
        self.get.record(vec![json!(key)]);
        self.tree.dot_get::<Value>(key).ok().flatten()
    }
}

fn create_configuration_mock(
    environment: &MockEnvironment,
    _default: ServiceThunk,
) -> Result<Service, ServiceError> {
    let configuration = MockConfiguration::new(Rc::clone(&environment.context.configuration));
    Ok(Service::Configuration(Rc::new(configuration)))
}

register_service_mock!(ServiceName::Configuration, create_configuration_mock);
