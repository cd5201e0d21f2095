use crate::services::ServiceName;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("service '{0}' is not available")]
    Unavailable(ServiceName),
    #[error("service '{0}' depends on itself")]
    Cyclic(ServiceName),
    #[error("service '{name}' failed to initialize: {message}")]
    Failed { name: ServiceName, message: String },
    #[error("resource '{0}' could not be found")]
    ResourceNotFound(String),
}

impl ServiceError {
    pub fn failed(name: ServiceName, message: impl Into<String>) -> Self {
        Self::Failed { name, message: message.into() }
    }
}

/// Raised when a subscriber callback fails during event delivery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("delivery of '{event}' failed: {message}")]
pub struct DeliveryError {
    pub event: String,
    pub message: String,
}

impl DeliveryError {
    pub fn new(event: impl Into<String>, message: impl Into<String>) -> Self {
        Self { event: event.into(), message: message.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventBusError {
    #[error("invalid event topic '{0}'")]
    InvalidTopic(String),
    #[error("'{0}' is not a request event (expected '<verb>Request.<subject>')")]
    InvalidRequestTopic(String),
    #[error("request '{0}' was cancelled before all replies arrived")]
    Cancelled(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WidgetError {
    #[error("widget '{widget}' failed to initialize: {message}")]
    Initialization { widget: String, message: String },
    #[error(transparent)]
    Service(#[from] ServiceError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("adapter '{technology}' cannot create widget '{widget}': {message}")]
    Creation { technology: String, widget: String, message: String },
    #[error(transparent)]
    Widget(#[from] WidgetError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}
