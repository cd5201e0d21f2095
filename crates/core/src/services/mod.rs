//! Injectable services and the lazy map they are resolved from.

mod api;
mod context;
mod map;

pub use api::{
    AreaHelper, AssetFuture, Assets, Configuration, FlowService, GlobalStorage, Heartbeat,
    HeartbeatCallback, I18n, IdGenerator, Log, LogLevel, Storage, StorageApi, Visibility,
    VisibilityHandler,
};
pub use context::WidgetContext;
pub use map::{ServiceMap, ServiceThunk};

use crate::event::EventBus;
use serde_json::Value;
use std::any::Any;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

/// Name under which a widget requests a service.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServiceName {
    EventBus,
    GlobalEventBus,
    AreaHelper,
    Assets,
    Configuration,
    Context,
    Features,
    FlowService,
    GlobalStorage,
    Heartbeat,
    I18n,
    Id,
    Log,
    Storage,
    Visibility,
    Other(String),
}

impl ServiceName {
    /// Names of every service the runtime knows about.
    pub const KNOWN: [ServiceName; 15] = [
        ServiceName::EventBus,
        ServiceName::GlobalEventBus,
        ServiceName::AreaHelper,
        ServiceName::Assets,
        ServiceName::Configuration,
        ServiceName::Context,
        ServiceName::Features,
        ServiceName::FlowService,
        ServiceName::GlobalStorage,
        ServiceName::Heartbeat,
        ServiceName::I18n,
        ServiceName::Id,
        ServiceName::Log,
        ServiceName::Storage,
        ServiceName::Visibility,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            ServiceName::EventBus => "axEventBus",
            ServiceName::GlobalEventBus => "axGlobalEventBus",
            ServiceName::AreaHelper => "axAreaHelper",
            ServiceName::Assets => "axAssets",
            ServiceName::Configuration => "axConfiguration",
            ServiceName::Context => "axContext",
            ServiceName::Features => "axFeatures",
            ServiceName::FlowService => "axFlowService",
            ServiceName::GlobalStorage => "axGlobalStorage",
            ServiceName::Heartbeat => "axHeartbeat",
            ServiceName::I18n => "axI18n",
            ServiceName::Id => "axId",
            ServiceName::Log => "axLog",
            ServiceName::Storage => "axStorage",
            ServiceName::Visibility => "axVisibility",
            ServiceName::Other(name) => name,
        }
    }
}

impl From<&str> for ServiceName {
    fn from(value: &str) -> Self {
        ServiceName::KNOWN
            .into_iter()
            .find(|known| known.as_str() == value)
            .unwrap_or_else(|| ServiceName::Other(value.to_owned()))
    }
}

impl Display for ServiceName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upcast support so trait-object services can be downcast to their concrete type.
pub trait ServiceObject: Any {
    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: Any> ServiceObject for T {
    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// A resolved service instance.
#[derive(Clone)]
pub enum Service {
    EventBus(Rc<dyn EventBus>),
    AreaHelper(Rc<dyn AreaHelper>),
    Assets(Rc<dyn Assets>),
    Configuration(Rc<dyn Configuration>),
    Context(Rc<WidgetContext>),
    Features(Rc<Value>),
    FlowService(Rc<dyn FlowService>),
    GlobalStorage(Rc<dyn GlobalStorage>),
    Heartbeat(Rc<dyn Heartbeat>),
    I18n(Rc<dyn I18n>),
    Id(Rc<dyn IdGenerator>),
    Log(Rc<dyn Log>),
    Storage(Rc<dyn Storage>),
    Visibility(Rc<dyn Visibility>),
    Other(Rc<dyn Any>),
}

macro_rules! service_accessors {
    ($($fn_name:ident => $variant:ident: $ty:ty),* $(,)?) => {
        $(
            pub fn $fn_name(&self) -> Option<Rc<$ty>> {
                match self {
                    Service::$variant(inner) => Some(Rc::clone(inner)),
                    _ => None,
                }
            }
        )*
    };
}

impl Service {
    service_accessors! {
        as_event_bus => EventBus: dyn EventBus,
        as_area_helper => AreaHelper: dyn AreaHelper,
        as_assets => Assets: dyn Assets,
        as_configuration => Configuration: dyn Configuration,
        as_context => Context: WidgetContext,
        as_features => Features: Value,
        as_flow_service => FlowService: dyn FlowService,
        as_global_storage => GlobalStorage: dyn GlobalStorage,
        as_heartbeat => Heartbeat: dyn Heartbeat,
        as_i18n => I18n: dyn I18n,
        as_id => Id: dyn IdGenerator,
        as_log => Log: dyn Log,
        as_storage => Storage: dyn Storage,
        as_visibility => Visibility: dyn Visibility,
    }

    /// Upcasts the contained instance for downcasting to a concrete type.
    pub fn to_any(&self) -> Rc<dyn Any> {
        match self {
            Service::EventBus(inner) => ServiceObject::into_any_rc(Rc::clone(inner)),
            Service::AreaHelper(inner) => ServiceObject::into_any_rc(Rc::clone(inner)),
            Service::Assets(inner) => ServiceObject::into_any_rc(Rc::clone(inner)),
            Service::Configuration(inner) => ServiceObject::into_any_rc(Rc::clone(inner)),
            Service::Context(inner) => Rc::clone(inner) as Rc<dyn Any>,
            Service::Features(inner) => Rc::clone(inner) as Rc<dyn Any>,
            Service::FlowService(inner) => ServiceObject::into_any_rc(Rc::clone(inner)),
            Service::GlobalStorage(inner) => ServiceObject::into_any_rc(Rc::clone(inner)),
            Service::Heartbeat(inner) => ServiceObject::into_any_rc(Rc::clone(inner)),
            Service::I18n(inner) => ServiceObject::into_any_rc(Rc::clone(inner)),
            Service::Id(inner) => ServiceObject::into_any_rc(Rc::clone(inner)),
            Service::Log(inner) => ServiceObject::into_any_rc(Rc::clone(inner)),
            Service::Storage(inner) => ServiceObject::into_any_rc(Rc::clone(inner)),
            Service::Visibility(inner) => ServiceObject::into_any_rc(Rc::clone(inner)),
            Service::Other(inner) => Rc::clone(inner),
        }
    }

    /// Returns the concrete instance if it is a `T`.
    pub fn downcast<T: Any>(&self) -> Option<Rc<T>> {
        self.to_any().downcast::<T>().ok()
    }

    /// Short label of the variant, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Service::EventBus(_) => "event-bus",
            Service::AreaHelper(_) => "area-helper",
            Service::Assets(_) => "assets",
            Service::Configuration(_) => "configuration",
            Service::Context(_) => "context",
            Service::Features(_) => "features",
            Service::FlowService(_) => "flow-service",
            Service::GlobalStorage(_) => "global-storage",
            Service::Heartbeat(_) => "heartbeat",
            Service::I18n(_) => "i18n",
            Service::Id(_) => "id",
            Service::Log(_) => "log",
            Service::Storage(_) => "storage",
            Service::Visibility(_) => "visibility",
            Service::Other(_) => "other",
        }
    }
}

impl Debug for Service {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Service({})", self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    struct Recorder;

    impl Log for Recorder {
        fn log(&self, _level: LogLevel, _message: &str, _args: &[Value]) {}
    }

    #[rstest]
    #[case("axEventBus", ServiceName::EventBus)]
    #[case("axStorage", ServiceName::Storage)]
    #[case("myService", ServiceName::Other("myService".into()))]
    fn names_parse_from_injection_strings(#[case] raw: &str, #[case] expected: ServiceName) {
        let name = ServiceName::from(raw);
        assert_eq!(name, expected);
        assert_eq!(name.as_str(), raw);
    }

    #[rstest]
    fn services_downcast_to_concrete_types() {
        let log: Rc<dyn Log> = Rc::new(Recorder);
        let service = Service::Log(log);
        assert!(service.downcast::<Recorder>().is_some());
        assert!(service.as_log().is_some());
        assert!(service.as_storage().is_none());

        let features = Service::Features(Rc::new(json!({ "a": 1 })));
        assert_eq!(features.downcast::<Value>().as_deref(), Some(&json!({ "a": 1 })));
    }
}
