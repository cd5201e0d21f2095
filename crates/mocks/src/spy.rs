use serde_json::Value;
use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// Records the arguments of every call made to a mocked method.
///
/// Clones share the same record, so a test can keep a handle while the widget
/// holds the mock.
#[derive(Clone)]
pub struct Spy {
    name: Rc<str>,
    calls: Rc<RefCell<Vec<Vec<Value>>>>,
}

impl Spy {
    pub fn new(name: &str) -> Self {
        Self { name: Rc::from(name), calls: Rc::new(RefCell::new(Vec::new())) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn record(&self, args: Vec<Value>) {
        tracing::trace!(spy = %self.name, args = args.len(), "call recorded");
        self.calls.borrow_mut().push(args);
    }

    pub fn calls(&self) -> Vec<Vec<Value>> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn was_called(&self) -> bool {
        self.call_count() > 0
    }

    pub fn was_called_with(&self, args: &[Value]) -> bool {
        self.calls.borrow().iter().any(|call| call.as_slice() == args)
    }

    pub fn most_recent(&self) -> Option<Vec<Value>> {
        self.calls.borrow().last().cloned()
    }

    pub fn reset(&self) {
        self.calls.borrow_mut().clear();
    }
}

impl Debug for Spy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spy")
            .field("name", &self.name)
            .field("calls", &self.call_count())
            .finish()
    }
}
