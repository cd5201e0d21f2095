use crate::scheduler::TickScheduler;
use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};
use widgetbed_core::artifacts::{ArtifactBundle, Asset, DEFAULT_THEME};
use widgetbed_core::descriptor::{IntegrationKind, Technology, WidgetDescriptor};
use widgetbed_core::dom::Element;
use widgetbed_core::error::WidgetError;
use widgetbed_core::event::{EventBus, EventBusExt};
use widgetbed_core::module::{WidgetController, widget_module};
use widgetbed_core::services::{Configuration, Log, Service, ServiceName, Storage, Visibility};
use widgetbed_runtime::{Bus, ServiceContext, WidgetEventBus};

/// Installs a test-writer subscriber once; honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub const SOME_WIDGET: &str = "SomeWidget";

pub const SOME_WIDGET_INJECTIONS: [ServiceName; 7] = [
    ServiceName::Features,
    ServiceName::EventBus,
    ServiceName::Storage,
    ServiceName::Log,
    ServiceName::Configuration,
    ServiceName::Assets,
    ServiceName::Visibility,
];

pub fn feature_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "someFeature": {
                "type": "object",
                "properties": {
                    "resource": { "type": "string", "default": "someResource" },
                    "value": { "type": "string" }
                }
            },
            "other": {
                "type": "object",
                "properties": {
                    "value": { "type": "string", "default": "the-default" }
                }
            }
        },
        "additionalProperties": false
    })
}

/// What the `SomeWidget` controller saw; clones share the record.
#[derive(Clone, Default)]
pub struct Observations {
    calls: Rc<RefCell<Vec<String>>>,
    features: Rc<RefCell<Option<Value>>>,
    observed: Rc<RefCell<BTreeMap<String, Value>>>,
}

impl Observations {
    pub fn record(&self, call: &str) {
        self.calls.borrow_mut().push(call.to_owned());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn features(&self) -> Option<Value> {
        self.features.borrow().clone()
    }

    pub fn observe(&self, key: &str, value: Value) {
        self.observed.borrow_mut().insert(key.to_owned(), value);
    }

    pub fn observed(&self, key: &str) -> Option<Value> {
        self.observed.borrow().get(key).cloned()
    }
}

fn injection<T: ?Sized>(
    services: &[Service],
    index: usize,
    pick: impl Fn(&Service) -> Option<Rc<T>>,
) -> Result<Rc<T>, WidgetError> {
    services.get(index).and_then(pick).ok_or_else(|| WidgetError::Initialization {
        widget: SOME_WIDGET.into(),
        message: format!("unexpected injection at position {index}"),
    })
}

/// Controller of `SomeWidget`.
///
/// It answers `beginLifecycleRequest` with `didReplace.<resource>` carrying the
/// session storage value of `myKey`, and `takeActionRequest.<action>` with
/// `willTakeAction` followed by `didTakeAction`.
struct SomeWidgetController {
    seen: Observations,
    _event_bus: Rc<dyn EventBus>,
}

impl SomeWidgetController {
    fn create(seen: &Observations, services: &[Service]) -> Result<Self, WidgetError> {
        let features = injection(services, 0, Service::as_features)?;
        let event_bus = injection(services, 1, Service::as_event_bus)?;
        let storage: Rc<dyn Storage> = injection(services, 2, Service::as_storage)?;
        let log: Rc<dyn Log> = injection(services, 3, Service::as_log)?;
        let configuration: Rc<dyn Configuration> =
            injection(services, 4, Service::as_configuration)?;
        injection(services, 5, Service::as_assets)?;
        let visibility: Rc<dyn Visibility> = injection(services, 6, Service::as_visibility)?;

        seen.record("create");
        *seen.features.borrow_mut() = Some((*features).clone());
        log.info("created [0]", &[json!(SOME_WIDGET)]);
        seen.observe("baseHref", configuration.get_or("baseHref", Value::Null));

        let stored = storage.session().get_item("myKey").unwrap_or(Value::Null);
        seen.observe("stored", stored.clone());

        let watcher = seen.clone();
        visibility.on_change(Rc::new(move |visible: bool| {
            watcher.observe("visible", json!(visible));
        }));

        let resource = features
            .pointer("/someFeature/resource")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        let bus = Rc::clone(&event_bus);
        event_bus.on("beginLifecycleRequest", move |_| {
            bus.emit(
                &format!("didReplace.{resource}"),
                json!({ "resource": resource, "data": stored }),
            )?;
            Ok(())
        });

        let bus = Rc::clone(&event_bus);
        event_bus.on("takeActionRequest", move |event| {
            let action = event.name.split_once('.').map(|(_, action)| action).unwrap_or_default();
            bus.emit(&format!("willTakeAction.{action}"), json!({ "action": action }))?;
            bus.emit(&format!("didTakeAction.{action}"), json!({ "action": action }))?;
            Ok(())
        });

        Ok(Self { seen: seen.clone(), _event_bus: event_bus })
    }
}

impl WidgetController for SomeWidgetController {
    fn on_dom_available(&self, _element: &Element) {
        self.seen.record("dom-available");
    }

    fn on_destroy(&self) {
        self.seen.record("destroy");
    }
}

/// `SomeWidget` with its template and a url-only `data.json` asset.
pub fn some_widget(
    kind: IntegrationKind,
    seen: &Observations,
) -> (WidgetDescriptor, ArtifactBundle) {
    let descriptor =
        WidgetDescriptor::new(SOME_WIDGET, kind, Technology::Plain).with_features(feature_schema());
    let seen = seen.clone();
    let module = widget_module(SOME_WIDGET_INJECTIONS.to_vec(), move |services| {
        SomeWidgetController::create(&seen, &services)
            .map(|controller| Box::new(controller) as Box<dyn WidgetController>)
    });
    let mut bundle =
        ArtifactBundle::single_widget(descriptor.clone(), module, Some("<h1>hey</h1>"));
    if let Some(widget) = bundle.widgets.first_mut() {
        widget.assets.plain.insert("data.json".into(), Asset::url("/assets/data.json"));
    }
    (descriptor, bundle)
}

/// Service context of `SomeWidget` outside of any load.
pub fn service_context() -> ServiceContext {
    let (descriptor, artifacts) = some_widget(IntegrationKind::Widget, &Observations::default());
    let bus = Bus::new(Rc::new(TickScheduler::default()));
    ServiceContext {
        widget_id: crate::WIDGET_ID.into(),
        descriptor,
        features: Rc::new(json!({})),
        configuration: Rc::new(json!({ "baseHref": "/" })),
        artifacts: Rc::new(artifacts),
        theme: DEFAULT_THEME.into(),
        global_event_bus: bus.clone(),
        widget_event_bus: Rc::new(WidgetEventBus::new(bus, crate::WIDGET_ID)),
        services: Weak::new(),
    }
}
