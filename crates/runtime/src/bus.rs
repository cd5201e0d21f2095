//! Deferred publish/subscribe event bus.
//!
//! Publishing validates the topic and hands one delivery task per event to the
//! scheduler. Matching subscribers are looked up when the task runs, so a
//! subscription made after publishing but before delivery still receives the event.

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::{self, LocalBoxFuture};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use widgetbed_core::error::{DeliveryError, EventBusError};
use widgetbed_core::event::{
    DeliveryResult, Event, EventBus, EventMeta, Inspector, InspectorAction, InspectorId,
    InspectorItem, PublishOptions, SubscribeOptions, Subscriber, SubscriptionId, is_valid_topic,
    split_request_topic, topic_matches,
};
use widgetbed_core::scheduler::Scheduler;

struct Subscription {
    id: SubscriptionId,
    pattern: String,
    subscriber: Subscriber,
    name: Option<String>,
}

#[derive(Default)]
struct BusState {
    next_id: u64,
    next_cycle: u64,
    subscriptions: Vec<Subscription>,
    inspectors: Vec<(InspectorId, Inspector)>,
}

struct BusInner {
    scheduler: Rc<dyn Scheduler>,
    state: RefCell<BusState>,
}

impl BusInner {
    fn next_id(&self) -> u64 {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        state.next_id
    }

    fn inspectors(&self) -> Vec<Inspector> {
        self.state.borrow().inspectors.iter().map(|(_, inspector)| Rc::clone(inspector)).collect()
    }

    fn inspect(&self, item: &InspectorItem) {
        for inspector in self.inspectors() {
            inspector(item);
        }
    }

    fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.state.borrow().subscriptions.iter().any(|s| s.id == id)
    }

    fn remove_subscription(&self, id: SubscriptionId) {
        self.state.borrow_mut().subscriptions.retain(|s| s.id != id);
    }

    fn deliver(&self, event: &Event, options: &PublishOptions) -> Result<(), DeliveryError> {
        let targets: Vec<_> = self
            .state
            .borrow()
            .subscriptions
            .iter()
            .filter(|s| topic_matches(&s.pattern, &event.name))
            .filter(|s| {
                options.deliver_to_sender || s.name.is_none() || s.name != event.meta.sender
            })
            .map(|s| (s.id, s.name.clone(), Rc::clone(&s.subscriber)))
            .collect();

        tracing::trace!(event = %event.name, subscribers = targets.len(), "delivering event");

        let mut errors = Vec::new();
        for (id, name, subscriber) in targets {
            if !self.is_subscribed(id) {
                continue;
            }
            self.inspect(&InspectorItem {
                action: InspectorAction::Deliver,
                source: event.meta.sender.clone(),
                target: name,
                event_name: event.name.clone(),
                payload: Some(event.payload.clone()),
                cycle_id: Some(event.meta.cycle_id),
            });
            let delivered = event.clone();
            if let Err(err) = subscriber(&delivered) {
                errors.push(DeliveryError::new(&event.name, err.to_string()));
            }
        }

        let mut errors = errors.into_iter();
        match errors.next() {
            None => Ok(()),
            Some(first) => {
                for other in errors {
                    tracing::warn!(error = %other, "additional subscriber failure");
                }
                Err(first)
            }
        }
    }
}

/// The runtime's event bus. Cloning yields another handle to the same bus.
#[derive(Clone)]
pub struct Bus {
    inner: Rc<BusInner>,
}

impl Bus {
    pub fn new(scheduler: Rc<dyn Scheduler>) -> Self {
        Self { inner: Rc::new(BusInner { scheduler, state: RefCell::new(BusState::default()) }) }
    }

    pub fn subscription_count(&self) -> usize {
        self.inner.state.borrow().subscriptions.len()
    }

    /// Whether both handles refer to the same bus.
    pub fn same_bus(&self, other: &Bus) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn subscribe_as(
        &self,
        pattern: &str,
        subscriber: Subscriber,
        name: Option<String>,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.inner.next_id());
        self.inner.inspect(&InspectorItem {
            action: InspectorAction::Subscribe,
            source: name.clone(),
            target: None,
            event_name: pattern.to_owned(),
            payload: None,
            cycle_id: None,
        });
        self.inner.state.borrow_mut().subscriptions.push(Subscription {
            id,
            pattern: pattern.to_owned(),
            subscriber,
            name,
        });
        id
    }

    /// Publishes on behalf of `sender` and returns the cycle id of the event.
    pub(crate) fn publish_from(
        &self,
        sender: Option<&str>,
        topic: &str,
        payload: Value,
        options: PublishOptions,
    ) -> Result<u64, EventBusError> {
        if !is_valid_topic(topic) {
            return Err(EventBusError::InvalidTopic(topic.to_owned()));
        }

        let cycle_id = {
            let mut state = self.inner.state.borrow_mut();
            state.next_cycle += 1;
            state.next_cycle
        };
        let event = Event {
            name: topic.to_owned(),
            payload,
            meta: EventMeta { sender: sender.map(str::to_owned), cycle_id },
        };

        self.inner.inspect(&InspectorItem {
            action: InspectorAction::Publish,
            source: event.meta.sender.clone(),
            target: None,
            event_name: event.name.clone(),
            payload: Some(event.payload.clone()),
            cycle_id: Some(cycle_id),
        });
        tracing::debug!(event = %topic, cycle_id, sender = ?sender, "publish");

        let inner = Rc::downgrade(&self.inner);
        self.inner.scheduler.schedule(Box::new(move || match inner.upgrade() {
            Some(inner) => inner.deliver(&event, &options),
            None => Ok(()),
        }));
        Ok(cycle_id)
    }

    pub(crate) fn gather_from(
        &self,
        sender: Option<&str>,
        topic: &str,
        payload: Value,
        options: PublishOptions,
    ) -> LocalBoxFuture<'static, Result<Vec<Event>, EventBusError>> {
        let Some((verb, subject)) = split_request_topic(topic) else {
            return future::ready(Err(EventBusError::InvalidRequestTopic(topic.to_owned())))
                .boxed_local();
        };
        let (will_topic, did_topic) = reply_topics(verb, subject);
        let (done, receiver) = oneshot::channel();
        let gather = Rc::new(Gather {
            bus: Rc::downgrade(&self.inner),
            cycle_id: Cell::new(None),
            settled: Cell::new(false),
            will_senders: RefCell::new(Vec::new()),
            replies: RefCell::new(Vec::new()),
            subscriptions: RefCell::new(Vec::new()),
            done: RefCell::new(Some(done)),
        });

        let state = Rc::clone(&gather);
        let will = self.subscribe_as(
            &will_topic,
            Rc::new(move |event: &Event| -> DeliveryResult {
                state.will_senders.borrow_mut().push(event.meta.sender.clone());
                Ok(())
            }),
            None,
        );
        let state = Rc::clone(&gather);
        let did = self.subscribe_as(
            &did_topic,
            Rc::new(move |event: &Event| -> DeliveryResult {
                state.replies.borrow_mut().push(event.clone());
                state.try_finish();
                Ok(())
            }),
            None,
        );
        // Subscribed last, so it sees the request after every other subscriber did and
        // their synchronous `will` replies are already queued.
        let state = Rc::clone(&gather);
        let request = self.subscribe_as(
            topic,
            Rc::new(move |event: &Event| -> DeliveryResult {
                if state.cycle_id.get() != Some(event.meta.cycle_id) {
                    return Ok(());
                }
                if let Some(bus) = state.bus.upgrade() {
                    let state = Rc::clone(&state);
                    bus.scheduler.schedule(Box::new(move || {
                        state.settled.set(true);
                        state.try_finish();
                        Ok(())
                    }));
                }
                Ok(())
            }),
            None,
        );
        gather.subscriptions.borrow_mut().extend([will, did, request]);

        match self.publish_from(sender, topic, payload, options) {
            Ok(cycle_id) => gather.cycle_id.set(Some(cycle_id)),
            Err(err) => {
                gather.release();
                return future::ready(Err(err)).boxed_local();
            }
        }

        let request = topic.to_owned();
        async move { receiver.await.unwrap_or(Err(EventBusError::Cancelled(request))) }
            .boxed_local()
    }
}

impl EventBus for Bus {
    fn subscribe(
        &self,
        pattern: &str,
        subscriber: Subscriber,
        options: SubscribeOptions,
    ) -> SubscriptionId {
        self.subscribe_as(pattern, subscriber, options.subscriber)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.remove_subscription(id);
    }

    fn publish(
        &self,
        topic: &str,
        payload: Value,
        options: PublishOptions,
    ) -> Result<(), EventBusError> {
        self.publish_from(None, topic, payload, options).map(|_| ())
    }

    fn publish_and_gather_replies(
        &self,
        topic: &str,
        payload: Value,
        options: PublishOptions,
    ) -> LocalBoxFuture<'static, Result<Vec<Event>, EventBusError>> {
        self.gather_from(None, topic, payload, options)
    }

    fn add_inspector(&self, inspector: Inspector) -> InspectorId {
        let id = InspectorId(self.inner.next_id());
        self.inner.state.borrow_mut().inspectors.push((id, inspector));
        id
    }

    fn remove_inspector(&self, id: InspectorId) {
        self.inner.state.borrow_mut().inspectors.retain(|(existing, _)| *existing != id);
    }
}

type GatherResult = Result<Vec<Event>, EventBusError>;

/// Bookkeeping of one `publish_and_gather_replies` call.
struct Gather {
    bus: Weak<BusInner>,
    cycle_id: Cell<Option<u64>>,
    /// Set once the request has been delivered to all subscribers.
    settled: Cell<bool>,
    will_senders: RefCell<Vec<Option<String>>>,
    replies: RefCell<Vec<Event>>,
    subscriptions: RefCell<Vec<SubscriptionId>>,
    done: RefCell<Option<oneshot::Sender<GatherResult>>>,
}

impl Gather {
    fn is_complete(&self) -> bool {
        let replies = self.replies.borrow();
        self.will_senders
            .borrow()
            .iter()
            .all(|sender| replies.iter().any(|reply| &reply.meta.sender == sender))
    }

    fn try_finish(&self) {
        if !self.settled.get() || !self.is_complete() {
            return;
        }
        let Some(done) = self.done.borrow_mut().take() else {
            return;
        };
        self.release();
        let replies = self.replies.take();
        tracing::debug!(replies = replies.len(), "all replies gathered");
        let _ = done.send(Ok(replies));
    }

    fn release(&self) {
        let ids = self.subscriptions.take();
        if let Some(bus) = self.bus.upgrade() {
            for id in ids {
                bus.remove_subscription(id);
            }
        }
    }
}

fn reply_topics(verb: &str, subject: &str) -> (String, String) {
    let mut chars = verb.chars();
    let capitalized: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    };
    let suffix = if subject.is_empty() { String::new() } else { format!(".{subject}") };
    (format!("will{capitalized}{suffix}"), format!("did{capitalized}{suffix}"))
}

/// A bus handle scoped to one widget.
///
/// Events are published with the widget id as sender, and every subscription and
/// inspector made through the handle is dropped on [`WidgetEventBus::release`].
pub struct WidgetEventBus {
    bus: Bus,
    widget_id: String,
    subscriptions: RefCell<Vec<SubscriptionId>>,
    inspectors: RefCell<Vec<InspectorId>>,
}

impl WidgetEventBus {
    pub fn new(bus: Bus, widget_id: impl Into<String>) -> Self {
        Self {
            bus,
            widget_id: widget_id.into(),
            subscriptions: RefCell::new(Vec::new()),
            inspectors: RefCell::new(Vec::new()),
        }
    }

    pub fn widget_id(&self) -> &str {
        &self.widget_id
    }

    pub fn release(&self) {
        let subscriptions = self.subscriptions.take();
        let inspectors = self.inspectors.take();
        tracing::debug!(
            widget = %self.widget_id,
            subscriptions = subscriptions.len(),
            "releasing widget event bus"
        );
        for id in subscriptions {
            self.bus.unsubscribe(id);
        }
        for id in inspectors {
            self.bus.remove_inspector(id);
        }
    }
}

impl EventBus for WidgetEventBus {
    fn subscribe(
        &self,
        pattern: &str,
        subscriber: Subscriber,
        options: SubscribeOptions,
    ) -> SubscriptionId {
        let name = options.subscriber.unwrap_or_else(|| self.widget_id.clone());
        let id = self.bus.subscribe_as(pattern, subscriber, Some(name));
        self.subscriptions.borrow_mut().push(id);
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.borrow_mut().retain(|existing| *existing != id);
        self.bus.unsubscribe(id);
    }

    fn publish(
        &self,
        topic: &str,
        payload: Value,
        options: PublishOptions,
    ) -> Result<(), EventBusError> {
        self.bus.publish_from(Some(&self.widget_id), topic, payload, options).map(|_| ())
    }

    fn publish_and_gather_replies(
        &self,
        topic: &str,
        payload: Value,
        options: PublishOptions,
    ) -> LocalBoxFuture<'static, Result<Vec<Event>, EventBusError>> {
        self.bus.gather_from(Some(&self.widget_id), topic, payload, options)
    }

    fn add_inspector(&self, inspector: Inspector) -> InspectorId {
        let id = self.bus.add_inspector(inspector);
        self.inspectors.borrow_mut().push(id);
        id
    }

    fn remove_inspector(&self, id: InspectorId) {
        self.inspectors.borrow_mut().retain(|existing| *existing != id);
        self.bus.remove_inspector(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{QueueScheduler, scheduler};
    use rstest::rstest;
    use serde_json::json;
    use widgetbed_core::event::EventBusExt;

    fn recorder(bus: &dyn EventBus, pattern: &str) -> Rc<RefCell<Vec<Event>>> {
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&received);
        bus.on(pattern, move |event| {
            sink.borrow_mut().push(event.clone());
            Ok(())
        });
        received
    }

    #[rstest]
    fn publish_is_deferred_until_drained(scheduler: Rc<QueueScheduler>) {
        let bus = Bus::new(scheduler.clone());
        let received = recorder(&bus, "didSave");

        bus.emit("didSave.document", json!({ "id": 1 })).expect("valid topic");
        assert!(received.borrow().is_empty());

        scheduler.drain().expect("delivery");
        let received = received.borrow();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].name, "didSave.document");
        assert_eq!(received[0].payload, json!({ "id": 1 }));
    }

    #[rstest]
    fn invalid_topics_are_rejected(scheduler: Rc<QueueScheduler>) {
        let bus = Bus::new(scheduler.clone());
        let err = bus.emit("Not A Topic", json!({})).expect_err("invalid");
        assert_eq!(err, EventBusError::InvalidTopic("Not A Topic".into()));
        assert_eq!(scheduler.pending(), 0);
    }

    #[rstest]
    fn subscribers_receive_independent_payload_copies(scheduler: Rc<QueueScheduler>) {
        let bus = Bus::new(scheduler.clone());
        let first = recorder(&bus, "didChange");
        let second = recorder(&bus, "didChange.value");
        bus.emit("didChange.value", json!({ "v": [1, 2] })).expect("valid topic");
        scheduler.drain().expect("delivery");
        assert_eq!(first.borrow()[0].payload, second.borrow()[0].payload);
        assert_eq!(first.borrow()[0].meta.cycle_id, 1);
    }

    #[rstest]
    fn subscriber_failures_do_not_stop_delivery(scheduler: Rc<QueueScheduler>) {
        let bus = Bus::new(scheduler.clone());
        bus.on("didFail", |_| Err("first".into()));
        bus.on("didFail", |_| Err("second".into()));
        let received = recorder(&bus, "didFail");

        bus.emit("didFail", json!(null)).expect("valid topic");
        let err = scheduler.drain().expect_err("delivery failure");
        assert_eq!(err, DeliveryError::new("didFail", "first"));
        assert_eq!(received.borrow().len(), 1);
    }

    #[rstest]
    fn inspectors_see_publish_subscribe_and_deliver(scheduler: Rc<QueueScheduler>) {
        let bus = Bus::new(scheduler.clone());
        let items = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&items);
        let inspector = bus.add_inspector(Rc::new(move |item: &InspectorItem| {
            sink.borrow_mut().push(item.action);
        }));
        let _received = recorder(&bus, "didInspect");
        bus.emit("didInspect", json!({})).expect("valid topic");
        scheduler.drain().expect("delivery");
        bus.remove_inspector(inspector);
        bus.emit("didInspect", json!({})).expect("valid topic");
        scheduler.drain().expect("delivery");

        assert_eq!(
            *items.borrow(),
            [InspectorAction::Subscribe, InspectorAction::Publish, InspectorAction::Deliver]
        );
    }

    #[rstest]
    fn widget_bus_tags_sender_and_releases_subscriptions(scheduler: Rc<QueueScheduler>) {
        let bus = Bus::new(scheduler.clone());
        let widget = WidgetEventBus::new(bus.clone(), "testWidget");
        let own = recorder(&widget, "didPing");
        let global = recorder(&bus, "didPing");

        widget.emit("didPing", json!({})).expect("valid topic");
        scheduler.drain().expect("delivery");
        assert_eq!(global.borrow()[0].meta.sender.as_deref(), Some("testWidget"));
        assert_eq!(own.borrow().len(), 1);

        widget.release();
        assert_eq!(bus.subscription_count(), 1);
        bus.emit("didPing", json!({})).expect("valid topic");
        scheduler.drain().expect("delivery");
        assert_eq!(own.borrow().len(), 1);
        assert_eq!(global.borrow().len(), 2);
    }

    #[rstest]
    fn sender_can_opt_out_of_own_events(scheduler: Rc<QueueScheduler>) {
        let bus = Bus::new(scheduler.clone());
        let widget = WidgetEventBus::new(bus.clone(), "testWidget");
        let own = recorder(&widget, "didPing");
        widget
            .publish("didPing", json!({}), PublishOptions { deliver_to_sender: false })
            .expect("valid topic");
        scheduler.drain().expect("delivery");
        assert!(own.borrow().is_empty());
    }

    #[rstest]
    fn gather_resolves_without_replies_after_delivery(scheduler: Rc<QueueScheduler>) {
        let bus = Bus::new(scheduler.clone());
        let mut replies = bus.publish_and_gather_replies(
            "beginLifecycleRequest.default",
            json!({ "lifecycleId": "default" }),
            PublishOptions::default(),
        );
        assert!((&mut replies).now_or_never().is_none());
        scheduler.drain().expect("delivery");
        let replies = replies.now_or_never().expect("settled").expect("replies");
        assert!(replies.is_empty());
        assert_eq!(bus.subscription_count(), 0);
    }

    #[rstest]
    fn gather_waits_for_did_of_every_will(scheduler: Rc<QueueScheduler>) {
        let bus = Bus::new(scheduler.clone());
        let widget = Rc::new(WidgetEventBus::new(bus.clone(), "saver"));
        let responder = Rc::clone(&widget);
        widget.on("saveRequest.document", move |_| {
            responder.emit("willSave.document", json!({}))?;
            Ok(())
        });

        let mut replies =
            bus.publish_and_gather_replies("saveRequest.document", json!({}), PublishOptions::default());
        scheduler.drain().expect("delivery");
        assert!((&mut replies).now_or_never().is_none());

        widget.emit("didSave.document", json!({ "ok": true })).expect("valid topic");
        scheduler.drain().expect("delivery");
        let replies = replies.now_or_never().expect("settled").expect("replies");
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].meta.sender.as_deref(), Some("saver"));
    }

    #[rstest]
    fn gather_rejects_non_request_topics(scheduler: Rc<QueueScheduler>) {
        let bus = Bus::new(scheduler.clone());
        let result = bus
            .publish_and_gather_replies("didSave", json!({}), PublishOptions::default())
            .now_or_never()
            .expect("ready");
        assert_eq!(result, Err(EventBusError::InvalidRequestTopic("didSave".into())));
    }

    #[rstest]
    #[case("save", "document", "willSave.document", "didSave.document")]
    #[case("beginLifecycle", "", "willBeginLifecycle", "didBeginLifecycle")]
    fn reply_topics_capitalize_the_verb(
        #[case] verb: &str,
        #[case] subject: &str,
        #[case] will: &str,
        #[case] did: &str,
    ) {
        assert_eq!(reply_topics(verb, subject), (will.to_owned(), did.to_owned()));
    }
}
