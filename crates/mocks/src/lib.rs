//! Mock implementations of the injectable widget services.
//!
//! Every mock registers a factory through [`register_service_mock!`]. The harness
//! looks factories up by service name and only calls them when the widget under
//! test requests the service. Each call produces a fresh instance.

mod assets;
mod configuration;
mod event_bus;
mod flow;
mod heartbeat;
mod i18n;
mod log;
mod spy;
mod storage;
mod visibility;

pub use assets::MockAssets;
pub use configuration::MockConfiguration;
pub use event_bus::SpiedEventBus;
pub use flow::{MOCK_BASE_URL, MockFlowService, MockIdGenerator};
pub use heartbeat::MockHeartbeat;
pub use i18n::{DEFAULT_LANGUAGE_TAG, DEFAULT_LOCALE, MockI18n};
pub use log::MockLog;
pub use spy::Spy;
pub use storage::{MockBackend, MockBackends, MockGlobalStorage, MockStorage, MockStorageApi};
pub use visibility::{MockAreaHelper, MockVisibility};

#[doc(hidden)]
pub use inventory;

use std::fmt::{Debug, Formatter};
use std::rc::Rc;
use widgetbed_core::error::ServiceError;
use widgetbed_core::services::{Service, ServiceName, ServiceThunk};
use widgetbed_runtime::ServiceContext;

/// Builds a mock for one service. `default` constructs the runtime's own
/// implementation, for mocks that wrap it instead of replacing it.
pub type MockFactory = fn(&MockEnvironment, ServiceThunk) -> Result<Service, ServiceError>;

/// Inventory registration entry for a service mock factory.
pub struct ServiceMockRegistration {
    pub name: ServiceName,
    pub factory: MockFactory,
}

inventory::collect!(ServiceMockRegistration);

pub fn registered_mocks() -> impl Iterator<Item = &'static ServiceMockRegistration> {
    inventory::iter::<ServiceMockRegistration>.into_iter()
}

/// Registered factory for `name`, if any.
pub fn mock_factory(name: &ServiceName) -> Option<MockFactory> {
    registered_mocks().find(|entry| &entry.name == name).map(|entry| entry.factory)
}

/// Register a [`MockFactory`] for a service name.
#[macro_export]
macro_rules! register_service_mock {
    ($name:expr, $factory:expr) => {
        $crate::inventory::submit! {
            $crate::ServiceMockRegistration { name: $name, factory: $factory }
        }
    };
}

/// Resource reference the mocks treat as missing without complaint.
#[derive(Clone)]
pub enum ResourcePattern {
    /// Matches references containing the text.
    Substring(String),
    Regex(fancy_regex::Regex),
}

impl ResourcePattern {
    pub fn substring(text: impl Into<String>) -> Self {
        Self::Substring(text.into())
    }

    pub fn regex(pattern: &str) -> Result<Self, fancy_regex::Error> {
        fancy_regex::Regex::new(pattern).map(Self::Regex)
    }

    pub fn matches(&self, resource: &str) -> bool {
        match self {
            Self::Substring(text) => resource.contains(text.as_str()),
            Self::Regex(regex) => regex.is_match(resource).unwrap_or_else(|err| {
                tracing::warn!(
                    pattern = regex.as_str(),
                    error = %err,
                    "resource pattern failed to match"
                );
                false
            }),
        }
    }
}

impl Debug for ResourcePattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Substring(text) => f.debug_tuple("Substring").field(text).finish(),
            Self::Regex(regex) => f.debug_tuple("Regex").field(&regex.as_str()).finish(),
        }
    }
}

/// Session-wide settings the mocks read.
#[derive(Clone, Debug, Default)]
pub struct MockSettings {
    pub known_missing_resources: Vec<ResourcePattern>,
}

/// What a mock factory gets to build its instance from.
#[derive(Clone)]
pub struct MockEnvironment {
    pub context: ServiceContext,
    pub settings: Rc<MockSettings>,
}

#[cfg(test)]
mod test_support;
