use crate::{MockEnvironment, MockSettings};
use futures::FutureExt;
use futures::future::{self, LocalBoxFuture};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use widgetbed_core::artifacts::{ArtifactBundle, Asset};
use widgetbed_core::descriptor::{IntegrationKind, Technology, WidgetDescriptor};
use widgetbed_core::error::EventBusError;
use widgetbed_core::event::{
    Event, EventBus, Inspector, InspectorId, PublishOptions, SubscribeOptions, Subscriber,
    SubscriptionId,
};
use widgetbed_core::module::{NoopController, widget_module};
use widgetbed_core::scheduler::{Scheduler, Task};
use widgetbed_runtime::{Bus, ServiceContext, WidgetEventBus};

/// Event bus that only remembers what was published and subscribed.
#[derive(Default)]
pub struct RecordingBus {
    published: RefCell<Vec<String>>,
    subscriptions: RefCell<Vec<String>>,
}

impl RecordingBus {
    pub fn published(&self) -> Vec<String> {
        self.published.borrow().clone()
    }

    pub fn subscriptions(&self) -> usize {
        self.subscriptions.borrow().len()
    }
}

impl EventBus for RecordingBus {
    fn subscribe(&self, pattern: &str, _: Subscriber, _: SubscribeOptions) -> SubscriptionId {
        let mut subscriptions = self.subscriptions.borrow_mut();
        subscriptions.push(pattern.to_owned());
        SubscriptionId(subscriptions.len() as u64)
    }

    fn unsubscribe(&self, _id: SubscriptionId) {}

    fn publish(&self, topic: &str, _: Value, _: PublishOptions) -> Result<(), EventBusError> {
        self.published.borrow_mut().push(topic.to_owned());
        Ok(())
    }

    fn publish_and_gather_replies(
        &self,
        topic: &str,
        _: Value,
        _: PublishOptions,
    ) -> LocalBoxFuture<'static, Result<Vec<Event>, EventBusError>> {
        self.published.borrow_mut().push(topic.to_owned());
        future::ready(Ok(Vec::new())).boxed_local()
    }

    fn add_inspector(&self, _inspector: Inspector) -> InspectorId {
        InspectorId(0)
    }

    fn remove_inspector(&self, _id: InspectorId) {}
}

struct DiscardingScheduler;

impl Scheduler for DiscardingScheduler {
    fn schedule(&self, _task: Task) {}
}

/// `some-widget` with its template and one url-only asset.
pub fn artifacts() -> ArtifactBundle {
    let descriptor = WidgetDescriptor::new("some-widget", IntegrationKind::Widget, Technology::Plain);
    let module = widget_module(Vec::new(), |_| Ok(Box::new(NoopController)));
    let mut bundle = ArtifactBundle::single_widget(descriptor, module, Some("<h1>hey</h1>"));
    if let Some(widget) = bundle.widgets.first_mut() {
        widget.assets.plain.insert("data.json".into(), Asset::url("/assets/data.json"));
    }
    bundle
}

pub fn environment() -> MockEnvironment {
    let artifacts = artifacts();
    let descriptor = artifacts.widgets[0].descriptor.clone();
    let bus = Bus::new(Rc::new(DiscardingScheduler));
    MockEnvironment {
        context: ServiceContext {
            widget_id: "testWidget".into(),
            descriptor,
            features: Rc::new(json!({})),
            configuration: Rc::new(json!({ "baseHref": "/" })),
            artifacts: Rc::new(artifacts),
            theme: widgetbed_core::artifacts::DEFAULT_THEME.into(),
            global_event_bus: bus.clone(),
            widget_event_bus: Rc::new(WidgetEventBus::new(bus, "testWidget")),
            services: Weak::new(),
        },
        settings: Rc::new(MockSettings::default()),
    }
}
