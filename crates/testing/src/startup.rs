//! Lifecycle events a page publishes when it starts, replayed for one widget.

use crate::error::HarnessError;
use crate::event_bus::EventBusFacade;
use serde_json::{Value, json};
use widgetbed_core::event::EventBusExt;

/// Topics in the order they are published.
pub const STARTUP_TOPICS: [&str; 4] =
    ["didChangeLocale", "beginLifecycleRequest", "didChangeAreaVisibility", "didNavigate"];

fn default_events(topic: &str) -> Vec<(String, Value)> {
    match topic {
        "didChangeLocale" => {
            vec![("default".into(), json!({ "locale": "default", "languageTag": "en" }))]
        }
        "beginLifecycleRequest" => vec![("default".into(), json!({ "lifecycleId": "default" }))],
        "didChangeAreaVisibility" => {
            vec![("content.true".into(), json!({ "area": "content", "visible": true }))]
        }
        "didNavigate" => vec![(
            "testing".into(),
            json!({ "place": "testing", "target": "_self", "data": {} }),
        )],
        _ => Vec::new(),
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Override {
    topic: String,
    suffix: String,
    payload: Option<Value>,
}

/// Changes to the default startup events.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StartupOverrides {
    entries: Vec<Override>,
}

impl StartupOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `payload` as `topic.suffix`, replacing a default event of that name.
    #[must_use]
    pub fn with(self, topic: &str, suffix: &str, payload: Value) -> Self {
        self.set(topic, suffix, Some(payload))
    }

    /// Drops `topic.suffix` from the sequence.
    #[must_use]
    pub fn suppress(self, topic: &str, suffix: &str) -> Self {
        self.set(topic, suffix, None)
    }

    fn set(mut self, topic: &str, suffix: &str, payload: Option<Value>) -> Self {
        if let Some(entry) =
            self.entries.iter_mut().find(|entry| entry.topic == topic && entry.suffix == suffix)
        {
            entry.payload = payload;
        } else {
            self.entries.push(Override { topic: topic.into(), suffix: suffix.into(), payload });
        }
        self
    }

    /// Default events of `topic` with the overrides applied, in publishing order.
    fn events_for(&self, topic: &str) -> Vec<(String, Value)> {
        let mut events: Vec<(String, Option<Value>)> = default_events(topic)
            .into_iter()
            .map(|(suffix, payload)| (suffix, Some(payload)))
            .collect();
        for entry in self.entries.iter().filter(|entry| entry.topic == topic) {
            match events.iter_mut().find(|(suffix, _)| *suffix == entry.suffix) {
                Some((_, payload)) => payload.clone_from(&entry.payload),
                None => events.push((entry.suffix.clone(), entry.payload.clone())),
            }
        }
        events
            .into_iter()
            .filter_map(|(suffix, payload)| payload.map(|payload| (suffix, payload)))
            .collect()
    }
}

/// Publishes the startup events topic by topic, flushing after each topic.
pub fn trigger_startup_events(
    event_bus: &EventBusFacade,
    overrides: &StartupOverrides,
) -> Result<(), HarnessError> {
    for entry in &overrides.entries {
        if !STARTUP_TOPICS.contains(&entry.topic.as_str()) {
            tracing::debug!(topic = %entry.topic, "ignoring override of unknown startup topic");
        }
    }

    for topic in STARTUP_TOPICS {
        for (suffix, payload) in overrides.events_for(topic) {
            let name = format!("{topic}.{suffix}");
            tracing::debug!(event = %name, "publishing startup event");
            event_bus.emit(&name, payload)?;
        }
        event_bus.flush()?;
    }
    Ok(())
}
