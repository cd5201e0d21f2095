use crate::error::HarnessError;
use std::cell::RefCell;
use std::rc::Rc;

/// Receives failures of asynchronous harness operations.
pub trait FailureReporter {
    fn report(&self, error: &HarnessError);
}

/// Default reporter: keeps every failure and logs it.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    failures: Rc<RefCell<Vec<HarnessError>>>,
}

impl RecordingReporter {
    pub fn failures(&self) -> Vec<HarnessError> {
        self.failures.borrow().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.borrow().is_empty()
    }
}

impl FailureReporter for RecordingReporter {
    fn report(&self, error: &HarnessError) {
        tracing::error!(error = %error, "widget test failure");
        self.failures.borrow_mut().push(error.clone());
    }
}
