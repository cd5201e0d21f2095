//! Event bus handed to test code.
//!
//! Calls go to the runtime's global bus through a [`SpiedEventBus`], so tests can
//! assert on them. Deliveries stay queued in the [`TickScheduler`] until the test
//! calls [`EventBusFacade::flush`].

use crate::error::HarnessError;
use crate::reporter::FailureReporter;
use crate::scheduler::TickScheduler;
use futures::future::LocalBoxFuture;
use serde_json::Value;
use std::rc::Rc;
use widgetbed_core::adapter::AdapterFactory;
use widgetbed_core::error::EventBusError;
use widgetbed_core::event::{
    Event, EventBus, Inspector, InspectorId, PublishOptions, SubscribeOptions, Subscriber,
    SubscriptionId,
};
use widgetbed_mocks::SpiedEventBus;
use widgetbed_runtime::Bus;

pub struct EventBusFacade {
    bus: SpiedEventBus,
    scheduler: Rc<TickScheduler>,
    view: Option<Rc<dyn AdapterFactory>>,
    reporter: Rc<dyn FailureReporter>,
}

impl EventBusFacade {
    /// `view` receives `apply_view_changes` after every delivery batch.
    pub fn new(
        bus: Bus,
        scheduler: Rc<TickScheduler>,
        view: Option<Rc<dyn AdapterFactory>>,
        reporter: Rc<dyn FailureReporter>,
    ) -> Self {
        Self { bus: SpiedEventBus::new(Rc::new(bus)), scheduler, view, reporter }
    }

    /// Call records of the instrumented entry points.
    pub fn spies(&self) -> &SpiedEventBus {
        &self.bus
    }

    /// Number of deliveries waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.scheduler.pending()
    }

    /// Delivers every pending event, including events published by subscribers
    /// while flushing. Returns the number of deliveries run.
    pub fn flush(&self) -> Result<usize, HarnessError> {
        let view = self.view.clone();
        let result = self.scheduler.flush_with(|| {
            if let Some(view) = &view {
                view.apply_view_changes();
            }
        });
        if let Err(err) = &result {
            self.reporter.report(err);
        }
        result
    }
}

impl EventBus for EventBusFacade {
    fn subscribe(
        &self,
        pattern: &str,
        subscriber: Subscriber,
        options: SubscribeOptions,
    ) -> SubscriptionId {
        self.bus.subscribe(pattern, subscriber, options)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.bus.unsubscribe(id);
    }

    fn publish(
        &self,
        topic: &str,
        payload: Value,
        options: PublishOptions,
    ) -> Result<(), EventBusError> {
        self.bus.publish(topic, payload, options)
    }

    fn publish_and_gather_replies(
        &self,
        topic: &str,
        payload: Value,
        options: PublishOptions,
    ) -> LocalBoxFuture<'static, Result<Vec<Event>, EventBusError>> {
        self.bus.publish_and_gather_replies(topic, payload, options)
    }

    fn add_inspector(&self, inspector: Inspector) -> InspectorId {
        self.bus.add_inspector(inspector)
    }

    fn remove_inspector(&self, id: InspectorId) {
        self.bus.remove_inspector(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::RecordingReporter;
    use futures::FutureExt;
    use futures::future;
    use rstest::{fixture, rstest};
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use widgetbed_core::adapter::{AdapterEnvironment, AdapterFuture};
    use widgetbed_core::error::DeliveryError;
    use widgetbed_core::event::EventBusExt;

    struct Harness {
        facade: Rc<EventBusFacade>,
        reporter: RecordingReporter,
        view_updates: Rc<Cell<usize>>,
    }

    struct CountingView(Rc<Cell<usize>>);

    impl AdapterFactory for CountingView {
        fn create(&self, _environment: AdapterEnvironment) -> AdapterFuture {
            future::pending().boxed_local()
        }

        fn apply_view_changes(&self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[fixture]
    fn harness() -> Harness {
        let scheduler = Rc::new(TickScheduler::default());
        let reporter = RecordingReporter::default();
        let view_updates = Rc::new(Cell::new(0));
        let facade = Rc::new(EventBusFacade::new(
            Bus::new(scheduler.clone()),
            scheduler,
            Some(Rc::new(CountingView(Rc::clone(&view_updates)))),
            Rc::new(reporter.clone()),
        ));
        Harness { facade, reporter, view_updates }
    }

    #[rstest]
    fn empty_flush_does_nothing(harness: Harness) {
        assert_eq!(harness.facade.flush(), Ok(0));
        assert_eq!(harness.view_updates.get(), 0);
        assert!(harness.reporter.is_empty());
    }

    #[rstest]
    fn publish_is_recorded_and_delivered_on_flush(harness: Harness) {
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&received);
        harness.facade.on("didSave", move |event| {
            sink.borrow_mut().push(event.name.clone());
            Ok(())
        });

        harness.facade.emit("didSave.document", json!({ "resource": "document" })).expect("emit");
        assert!(received.borrow().is_empty());
        assert!(harness.facade.pending() > 0);
        assert!(harness.facade.spies().publish.was_called_with(&[
            json!("didSave.document"),
            json!({ "resource": "document" }),
            json!({ "deliverToSender": true }),
        ]));

        harness.facade.flush().expect("flush");
        assert_eq!(*received.borrow(), ["didSave.document"]);
        assert_eq!(harness.facade.spies().subscribe.call_count(), 1);
        assert!(harness.view_updates.get() > 0);
    }

    #[rstest]
    fn republished_events_arrive_within_one_flush(harness: Harness) {
        let received = Rc::new(RefCell::new(Vec::new()));
        let bus = Rc::clone(&harness.facade);
        harness.facade.on("takeActionRequest", move |_| {
            bus.emit("willTakeAction.x", json!({}))?;
            Ok(())
        });
        let sink = Rc::clone(&received);
        harness.facade.on("willTakeAction", move |event| {
            sink.borrow_mut().push(event.name.clone());
            Ok(())
        });

        harness.facade.emit("takeActionRequest.x", json!({})).expect("emit");
        harness.facade.flush().expect("flush");
        assert_eq!(*received.borrow(), ["willTakeAction.x"]);
        assert_eq!(harness.facade.pending(), 0);
    }

    #[rstest]
    fn delivery_errors_are_reported(harness: Harness) {
        harness.facade.on("didFail", |_| Err("subscriber broke".into()));
        harness.facade.emit("didFail", json!(null)).expect("emit");

        let err = harness.facade.flush().expect_err("delivery failure");
        assert!(matches!(
            &err,
            HarnessError::Delivery(DeliveryError { event, .. }) if event == "didFail"
        ));
        assert_eq!(harness.reporter.failures(), [err]);
    }
}
