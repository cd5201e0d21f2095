use crate::spy::Spy;
use crate::{MockEnvironment, register_service_mock};
use futures::future::LocalBoxFuture;
use serde_json::{Value, json};
use std::rc::Rc;
use widgetbed_core::error::{EventBusError, ServiceError};
use widgetbed_core::event::{
    Event, EventBus, Inspector, InspectorId, PublishOptions, SubscribeOptions, Subscriber,
    SubscriptionId,
};
use widgetbed_core::services::{Service, ServiceName, ServiceThunk};

/// Event bus wrapper that records calls and forwards them to the real bus.
pub struct SpiedEventBus {
    inner: Rc<dyn EventBus>,
    pub subscribe: Spy,
    pub unsubscribe: Spy,
    pub publish: Spy,
    pub publish_and_gather_replies: Spy,
    pub add_inspector: Spy,
}

impl SpiedEventBus {
    pub fn new(inner: Rc<dyn EventBus>) -> Self {
        Self {
            inner,
            subscribe: Spy::new("axEventBus.subscribe"),
            unsubscribe: Spy::new("axEventBus.unsubscribe"),
            publish: Spy::new("axEventBus.publish"),
            publish_and_gather_replies: Spy::new("axEventBus.publishAndGatherReplies"),
            add_inspector: Spy::new("axEventBus.addInspector"),
        }
    }

    /// The wrapped bus.
    pub fn inner(&self) -> &Rc<dyn EventBus> {
        &self.inner
    }
}

fn publish_args(topic: &str, payload: &Value, options: &PublishOptions) -> Vec<Value> {
    vec![
        json!(topic),
        payload.clone(),
        json!({ "deliverToSender": options.deliver_to_sender }),
    ]
}

impl EventBus for SpiedEventBus {
    fn subscribe(
        &self,
        pattern: &str,
        subscriber: Subscriber,
        options: SubscribeOptions,
    ) -> SubscriptionId {
        self.subscribe.record(vec![json!(pattern), json!({ "subscriber": options.subscriber })]);
        self.inner.subscribe(pattern, subscriber, options)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.unsubscribe.record(vec![json!(id.0)]);
        self.inner.unsubscribe(id);
    }

    fn publish(
        &self,
        topic: &str,
        payload: Value,
        options: PublishOptions,
    ) -> Result<(), EventBusError> {
        self.publish.record(publish_args(topic, &payload, &options));
        self.inner.publish(topic, payload, options)
    }

    fn publish_and_gather_replies(
        &self,
        topic: &str,
        payload: Value,
        options: PublishOptions,
    ) -> LocalBoxFuture<'static, Result<Vec<Event>, EventBusError>> {
        self.publish_and_gather_replies.record(publish_args(topic, &payload, &options));
        self.inner.publish_and_gather_replies(topic, payload, options)
    }

    fn add_inspector(&self, inspector: Inspector) -> InspectorId {
        self.add_inspector.record(Vec::new());
        self.inner.add_inspector(inspector)
    }

    fn remove_inspector(&self, id: InspectorId) {
        self.inner.remove_inspector(id);
    }
}

fn create_event_bus_mock(
    _environment: &MockEnvironment,
    default: ServiceThunk,
) -> Result<Service, ServiceError> {
    let bus = default()?.as_event_bus().ok_or_else(|| {
        ServiceError::failed(ServiceName::EventBus, "runtime did not provide an event bus")
    })?;
    Ok(Service::EventBus(Rc::new(SpiedEventBus::new(bus))))
}

register_service_mock!(ServiceName::EventBus, create_event_bus_mock);
