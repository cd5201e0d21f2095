use thiserror::Error;
use widgetbed_core::descriptor::Technology;
use widgetbed_core::error::{DeliveryError, EventBusError, ServiceError};
use widgetbed_core::services::ServiceName;
use widgetbed_runtime::{BootstrapError, LoadError, SchemaError, ValidationFailure};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HarnessError {
    #[error("cannot call `{call}`: {reason}")]
    Precondition { call: &'static str, reason: String },
    #[error("no {0} given, neither in the setup options nor in the fixtures")]
    MissingFixture(&'static str),
    #[error("adapter for '{adapter}' cannot load a widget using technology '{widget}'")]
    TechnologyMismatch { adapter: Technology, widget: Technology },
    #[error("no widget adapter for technology '{0}'")]
    UnknownTechnology(Technology),
    #[error("invalid feature path '{path}': {message}")]
    InvalidPath { path: String, message: String },
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    #[error("loading the widget failed: {0}")]
    Load(#[from] LoadError),
    #[error("the widget is already loaded")]
    AlreadyLoaded,
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("service '{name}' is not a {expected}")]
    ServiceType { name: ServiceName, expected: &'static str },
    #[error("event delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
    #[error(transparent)]
    EventBus(#[from] EventBusError),
    #[error("event delivery did not settle after {passes} flush passes")]
    RunawayFlush { passes: usize },
}

impl HarnessError {
    pub(crate) fn precondition(call: &'static str, reason: impl Into<String>) -> Self {
        Self::Precondition { call, reason: reason.into() }
    }
}
