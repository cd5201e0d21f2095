//! Event bus contract shared by the runtime, the mocks and the harness.

use crate::error::EventBusError;
use crate::services::ServiceObject;
use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::rc::Rc;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMeta {
    /// Id of the publishing widget, if the event was published through a widget bus.
    pub sender: Option<String>,
    /// Id of the publish cycle the event belongs to.
    pub cycle_id: u64,
}

/// An event as seen by subscribers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub payload: Value,
    pub meta: EventMeta,
}

pub type DeliveryResult = Result<(), Box<dyn std::error::Error>>;

/// Subscriber callback; a returned error is reported as a delivery failure.
pub type Subscriber = Rc<dyn Fn(&Event) -> DeliveryResult>;

pub type Inspector = Rc<dyn Fn(&InspectorItem)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InspectorId(pub u64);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Name reported to inspectors, typically the subscribing widget id.
    pub subscriber: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishOptions {
    /// Also deliver to subscribers registered by the sender itself.
    pub deliver_to_sender: bool,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self { deliver_to_sender: true }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InspectorAction {
    Publish,
    Subscribe,
    Deliver,
}

#[derive(Clone, Debug, PartialEq)]
pub struct InspectorItem {
    pub action: InspectorAction,
    pub source: Option<String>,
    pub target: Option<String>,
    pub event_name: String,
    pub payload: Option<Value>,
    pub cycle_id: Option<u64>,
}

/// Publish/subscribe messaging with deferred delivery.
///
/// Publishing never invokes subscribers synchronously: deliveries are handed to
/// the bus's scheduler and run when it drains.
pub trait EventBus: ServiceObject {
    fn subscribe(
        &self,
        pattern: &str,
        subscriber: Subscriber,
        options: SubscribeOptions,
    ) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId);

    fn publish(
        &self,
        topic: &str,
        payload: Value,
        options: PublishOptions,
    ) -> Result<(), EventBusError>;

    /// Publishes a request event and resolves once every `will*` reply has a
    /// matching `did*` reply.
    fn publish_and_gather_replies(
        &self,
        topic: &str,
        payload: Value,
        options: PublishOptions,
    ) -> LocalBoxFuture<'static, Result<Vec<Event>, EventBusError>>;

    fn add_inspector(&self, inspector: Inspector) -> InspectorId;

    fn remove_inspector(&self, id: InspectorId);
}

/// Shorthands for the common default-options calls.
pub trait EventBusExt: EventBus {
    fn on<F>(&self, pattern: &str, callback: F) -> SubscriptionId
    where
        F: Fn(&Event) -> DeliveryResult + 'static,
    {
        self.subscribe(pattern, Rc::new(callback), SubscribeOptions::default())
    }

    fn emit(&self, topic: &str, payload: Value) -> Result<(), EventBusError> {
        self.publish(topic, payload, PublishOptions::default())
    }
}

impl<T: EventBus + ?Sized> EventBusExt for T {}

/// Whether `name` is a syntactically valid event topic.
///
/// Topics are dot-separated; the first segment starts with a lowercase letter, every
/// segment is non-empty and holds ASCII alphanumerics, `-` or `_`.
pub fn is_valid_topic(name: &str) -> bool {
    let mut segments = name.split('.');
    let Some(first) = segments.next() else {
        return false;
    };
    if !first.starts_with(|c: char| c.is_ascii_lowercase()) {
        return false;
    }
    std::iter::once(first).chain(segments).all(|segment| {
        !segment.is_empty()
            && segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    })
}

/// Whether an event named `event` is delivered to a subscription for `pattern`.
///
/// A pattern matches the event itself and every event it is a dotted prefix of.
/// `*` matches any single segment, an empty pattern or `*` alone matches everything.
pub fn topic_matches(pattern: &str, event: &str) -> bool {
    if pattern.is_empty() || pattern == "*" {
        return true;
    }
    let mut event_segments = event.split('.');
    for expected in pattern.split('.') {
        match event_segments.next() {
            Some(actual) if expected == "*" || expected == actual => {}
            _ => return false,
        }
    }
    true
}

/// Splits a request topic (`<verb>Request.<subject>`) into `(verb, subject)`.
pub fn split_request_topic(topic: &str) -> Option<(&str, &str)> {
    let (head, subject) = topic.split_once('.').unwrap_or((topic, ""));
    let verb = head.strip_suffix("Request")?;
    if verb.is_empty() {
        return None;
    }
    Some((verb, subject))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("didChangeLocale.default", true)]
    #[case("didChangeAreaVisibility.content.true", true)]
    #[case("takeActionRequest.some-action_1", true)]
    #[case("", false)]
    #[case("DidSomething", false)]
    #[case("didSomething..x", false)]
    #[case("did something", false)]
    fn validates_topics(#[case] topic: &str, #[case] valid: bool) {
        assert_eq!(is_valid_topic(topic), valid);
    }

    #[rstest]
    #[case("didSave", "didSave.document", true)]
    #[case("didSave.document", "didSave.document", true)]
    #[case("didSave.*.x", "didSave.document.x", true)]
    #[case("didSave.other", "didSave.document", false)]
    #[case("didSave.document.x", "didSave.document", false)]
    #[case("", "anything.at.all", true)]
    #[case("*", "anything", true)]
    fn matches_prefix_subscriptions(
        #[case] pattern: &str,
        #[case] event: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(topic_matches(pattern, event), expected);
    }

    #[rstest]
    #[case("beginLifecycleRequest.default", Some(("beginLifecycle", "default")))]
    #[case("saveRequest", Some(("save", "")))]
    #[case("Request.x", None)]
    #[case("didSave.document", None)]
    fn splits_request_topics(#[case] topic: &str, #[case] expected: Option<(&str, &str)>) {
        assert_eq!(split_request_topic(topic), expected);
    }
}
