use crate::spy::Spy;
use crate::{MockEnvironment, register_service_mock};
use std::cell::RefCell;
use std::rc::Rc;
use widgetbed_core::error::ServiceError;
use widgetbed_core::services::{Heartbeat, HeartbeatCallback, Service, ServiceName, ServiceThunk};

/// Heartbeat mock; beats only when the test calls [`MockHeartbeat::mock_beat`].
pub struct MockHeartbeat {
    before: RefCell<Vec<HeartbeatCallback>>,
    next: RefCell<Vec<HeartbeatCallback>>,
    after: RefCell<Vec<HeartbeatCallback>>,
    pub on_before_next: Spy,
    pub on_next: Spy,
    pub on_after_next: Spy,
}

impl Default for MockHeartbeat {
    fn default() -> Self {
        Self {
            before: RefCell::new(Vec::new()),
            next: RefCell::new(Vec::new()),
            after: RefCell::new(Vec::new()),
            on_before_next: Spy::new("axHeartbeat.onBeforeNext"),
            on_next: Spy::new("axHeartbeat.onNext"),
            on_after_next: Spy::new("axHeartbeat.onAfterNext"),
        }
    }
}

impl MockHeartbeat {
    /// Runs the queued callbacks: all "before" ones, then "next", then "after".
    /// Callbacks registered during the beat wait for the following one.
    pub fn mock_beat(&self) {
        let before = self.before.take();
        let next = self.next.take();
        let after = self.after.take();
        tracing::debug!(
            before = before.len(),
            next = next.len(),
            after = after.len(),
            "mock heartbeat"
        );
        for callback in before.into_iter().chain(next).chain(after) {
            callback();
        }
    }
}

impl Heartbeat for MockHeartbeat {
    fn on_before_next(&self, callback: HeartbeatCallback) {
        self.on_before_next.record(Vec::new());
        self.before.borrow_mut().push(callback);
    }

    fn on_next(&self, callback: HeartbeatCallback) {
        self.on_next.record(Vec::new());
        self.next.borrow_mut().push(callback);
    }

    fn on_after_next(&self, callback: HeartbeatCallback) {
        self.on_after_next.record(Vec::new());
        self.after.borrow_mut().push(callback);
    }
}

fn create_heartbeat_mock(
    _environment: &MockEnvironment,
    _default: ServiceThunk,
) -> Result<Service, ServiceError> {
    Ok(Service::Heartbeat(Rc::new(MockHeartbeat::default())))
}

register_service_mock!(ServiceName::Heartbeat, create_heartbeat_mock);

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn beat_runs_phases_in_order() {
        let heartbeat = Rc::new(MockHeartbeat::default());
        let order = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&order);
        heartbeat.on_after_next(Box::new(move || log.borrow_mut().push("after")));
        let log = Rc::clone(&order);
        heartbeat.on_next(Box::new(move || log.borrow_mut().push("next")));
        let log = Rc::clone(&order);
        let again = Rc::clone(&heartbeat);
        heartbeat.on_before_next(Box::new(move || {
            log.borrow_mut().push("before");
            let log = Rc::clone(&log);
            again.on_next(Box::new(move || log.borrow_mut().push("later")));
        }));

        heartbeat.mock_beat();
        assert_eq!(*order.borrow(), ["before", "next", "after"]);

        heartbeat.mock_beat();
        assert_eq!(*order.borrow(), ["before", "next", "after", "later"]);
        assert_eq!(heartbeat.on_next.call_count(), 2);
    }
}
