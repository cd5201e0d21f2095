use crate::spy::Spy;
use crate::{MockEnvironment, register_service_mock};
use serde_json::{Value, json};
use std::rc::Rc;
use widgetbed_core::error::ServiceError;
use widgetbed_core::services::{FlowService, IdGenerator, Service, ServiceName, ServiceThunk};

/// Origin of the URLs built by [`MockFlowService`].
pub const MOCK_BASE_URL: &str = "http://localhost/";

/// Flow service mock producing `<base>#/<target>/<param>/...` URLs.
pub struct MockFlowService {
    pub construct_absolute_url: Spy,
}

impl Default for MockFlowService {
    fn default() -> Self {
        Self { construct_absolute_url: Spy::new("axFlowService.constructAbsoluteUrl") }
    }
}

impl FlowService for MockFlowService {
    fn construct_absolute_url(&self, target: &str, parameters: &Value) -> String {
        self.construct_absolute_url.record(vec![json!(target), parameters.clone()]);
        let segments = parameters
            .as_object()
            .into_iter()
            .flat_map(|parameters| parameters.values())
            .map(|value| match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            });
        let head = format!("{MOCK_BASE_URL}#/{target}");
        std::iter::once(head).chain(segments).collect::<Vec<_>>().join("/")
    }
}

pub struct MockIdGenerator {
    widget_id: String,
    pub id: Spy,
}

impl MockIdGenerator {
    pub fn new(widget_id: impl Into<String>) -> Self {
        Self { widget_id: widget_id.into(), id: Spy::new("axId") }
    }
}

impl IdGenerator for MockIdGenerator {
    fn id(&self, suffix: &str) -> String {
        self.id.record(vec![json!(suffix)]);
        format!("ax-{}-{suffix}", self.widget_id)
    }
}

fn create_flow_service_mock(
    _environment: &MockEnvironment,
    _default: ServiceThunk,
) -> Result<Service, ServiceError> {
    Ok(Service::FlowService(Rc::new(MockFlowService::default())))
}

fn create_id_mock(
    environment: &MockEnvironment,
    _default: ServiceThunk,
) -> Result<Service, ServiceError> {
    Ok(Service::Id(Rc::new(MockIdGenerator::new(environment.context.widget_id.clone()))))
}

register_service_mock!(ServiceName::FlowService, create_flow_service_mock);
register_service_mock!(ServiceName::Id, create_id_mock);
