use thiserror::Error;
use widgetbed_core::descriptor::Technology;
use widgetbed_core::{AdapterError, ServiceError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BootstrapError {
    #[error("no widget adapter registered for technology '{0}'")]
    UnknownTechnology(Technology),
    #[error("theme '{0}' is not part of the artifacts")]
    UnknownTheme(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("widget '{0}' is not part of the artifacts")]
    UnknownWidget(String),
    #[error("no widget adapter for technology '{0}'")]
    UnknownTechnology(Technology),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Validation(#[from] ValidationFailure),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error("template of widget '{widget}' could not be loaded: {message}")]
    Template { widget: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid feature schema of widget '{widget}': {message}")]
pub struct SchemaError {
    pub widget: String,
    pub message: String,
}

/// Feature configuration rejected by the widget's schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation of the feature configuration of widget '{widget}' failed: {}", .issues.join("; "))]
pub struct ValidationFailure {
    pub widget: String,
    pub issues: Vec<String>,
}
