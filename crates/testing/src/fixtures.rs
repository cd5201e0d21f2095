//! Per-thread defaults for [`setup_for_widget`](crate::setup_for_widget).
//!
//! A test module typically fills the fixtures once and then sets up every test
//! case with empty [`SetupOptions`](crate::SetupOptions).

use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use widgetbed_core::adapter::AdapterModule;
use widgetbed_core::artifacts::ArtifactBundle;
use widgetbed_core::descriptor::WidgetDescriptor;

#[derive(Default)]
pub struct Fixtures {
    pub descriptor: Option<WidgetDescriptor>,
    pub artifacts: Option<ArtifactBundle>,
    pub adapter: Option<Rc<dyn AdapterModule>>,
    pub configuration: Option<Value>,
}

thread_local! {
    static FIXTURES: RefCell<Fixtures> = RefCell::new(Fixtures::default());
}

/// Runs `f` with mutable access to this thread's fixtures.
pub fn with_fixtures<R>(f: impl FnOnce(&mut Fixtures) -> R) -> R {
    FIXTURES.with(|fixtures| f(&mut fixtures.borrow_mut()))
}

pub fn reset_fixtures() {
    with_fixtures(|fixtures| *fixtures = Fixtures::default());
}
