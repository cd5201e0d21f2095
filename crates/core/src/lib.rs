pub mod adapter;
pub mod artifacts;
pub mod descriptor;
pub mod dom;
pub mod error;
pub mod event;
pub mod module;
pub mod scheduler;
pub mod services;

pub use artifacts::ArtifactBundle;
pub use descriptor::{IntegrationKind, Technology, WidgetDescriptor};
pub use dom::{Document, Element};
pub use error::{AdapterError, DeliveryError, DomError, EventBusError, ServiceError, WidgetError};
pub use event::{Event, EventBus, EventBusExt};
pub use scheduler::{Scheduler, Task};
pub use services::{Service, ServiceMap, ServiceName};
