mod adapters;
mod bootstrap;
mod bus;
pub mod error;
mod loader;
mod schema;
pub mod services;

pub use adapters::{AdapterRegistry, PlainAdapter, builtin_adapter};
pub use bootstrap::{BootstrapOptions, DEFAULT_THEME_NAME, RuntimeServices, bootstrap};
pub use bus::{Bus, WidgetEventBus};
pub use error::{BootstrapError, LoadError, SchemaError, ValidationFailure};
pub use loader::{
    DestroyHandle, InstanceFuture, LoadContext, LoadOptions, ServicesCallback, TemplateFuture,
    WidgetLoader, WidgetReference,
};
pub use schema::FeatureSchema;
pub use services::{DEFAULT_AREA, ServiceContext, ServiceDecorator};

#[cfg(test)]
mod test_support;
