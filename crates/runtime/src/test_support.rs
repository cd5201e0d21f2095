use rstest::fixture;
use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use widgetbed_core::artifacts::{ArtifactBundle, Asset, DEFAULT_THEME};
use widgetbed_core::descriptor::{IntegrationKind, Technology, WidgetDescriptor};
use widgetbed_core::dom::Element;
use widgetbed_core::error::DeliveryError;
use widgetbed_core::module::{WidgetController, widget_module};
use widgetbed_core::scheduler::{Scheduler, Task};
use widgetbed_core::services::ServiceName;

/// Scheduler that queues tasks until the test drains it.
#[derive(Default)]
pub struct QueueScheduler {
    tasks: RefCell<VecDeque<Task>>,
}

impl QueueScheduler {
    /// Runs tasks, including ones scheduled while draining, until the queue is empty.
    pub fn drain(&self) -> Result<(), DeliveryError> {
        let mut first_error = None;
        loop {
            let Some(task) = self.tasks.borrow_mut().pop_front() else {
                break;
            };
            if let Err(err) = task() {
                if first_error.is_none() {
                    first_error = Some(err);
                } else {
                    tracing::warn!(error = %err, "additional delivery failure");
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }
}

impl Scheduler for QueueScheduler {
    fn schedule(&self, task: Task) {
        self.tasks.borrow_mut().push_back(task);
    }
}

/// rstest fixture: empty queue scheduler
#[fixture]
pub fn scheduler() -> Rc<QueueScheduler> {
    init_tracing();
    Rc::new(QueueScheduler::default())
}

/// Installs a test-writer subscriber once; honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Controller that records lifecycle calls; clones share the record.
#[derive(Clone, Default)]
pub struct RecordingController {
    calls: Rc<RefCell<Vec<String>>>,
    features: Rc<RefCell<Option<Value>>>,
}

impl RecordingController {
    pub fn record(&self, call: &str) {
        self.calls.borrow_mut().push(call.to_owned());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Feature configuration the controller was created with.
    pub fn features(&self) -> Option<Value> {
        self.features.borrow().clone()
    }
}

impl WidgetController for RecordingController {
    fn on_dom_available(&self, _element: &Element) {
        self.record("dom-available");
    }

    fn on_destroy(&self) {
        self.record("destroy");
    }
}

pub fn feature_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-04/schema#",
        "type": "object",
        "properties": {
            "someFeature": { "type": "string" },
            "other": {
                "type": "object",
                "properties": { "value": { "type": "string", "default": "the-default" } }
            }
        }
    })
}

/// Bundle with a single plain `SomeWidget` whose controller reports to `controller`.
pub fn widget_artifacts(kind: IntegrationKind, controller: &RecordingController) -> ArtifactBundle {
    let descriptor =
        WidgetDescriptor::new("SomeWidget", kind, Technology::Plain).with_features(feature_schema());
    let controller = controller.clone();
    let module = widget_module(vec![ServiceName::Features], move |services| {
        controller.record("create");
        let features = services.first().and_then(|service| service.as_features());
        *controller.features.borrow_mut() = features.map(|features| (*features).clone());
        Ok(Box::new(controller.clone()))
    });
    ArtifactBundle::single_widget(descriptor, module, Some("<h1>hey</h1>"))
}

/// Where the template of [`widget_artifacts`] lives once it is url-only.
pub const TEMPLATE_URL: &str = "/widgets/some-widget/default.theme/some-widget.html";

/// Replaces the inline template of `SomeWidget` by an asset that only has a url.
pub fn url_only_template(mut artifacts: ArtifactBundle) -> ArtifactBundle {
    for widget in &mut artifacts.widgets {
        widget
            .assets
            .themes
            .entry(DEFAULT_THEME.into())
            .or_default()
            .insert("some-widget.html".into(), Asset::url(TEMPLATE_URL));
    }
    artifacts
}
