use crate::error::DeliveryError;

/// A unit of deferred work, typically the delivery of one event.
pub type Task = Box<dyn FnOnce() -> Result<(), DeliveryError>>;

/// Receives deferred work from the event bus.
///
/// Implementations must never run a task synchronously inside `schedule`.
pub trait Scheduler {
    fn schedule(&self, task: Task);
}
