//! Test harness for single widgets.
//!
//! [`setup_for_widget`] bootstraps an isolated runtime below a fresh anchor
//! element, with every injectable service replaced by the mock registered in
//! `widgetbed-mocks`. The returned [`TestSession`] configures, loads and renders
//! the widget, drives its event bus and tears everything down again.
//!
//! Event delivery never happens on its own: call
//! [`EventBusFacade::flush`] to deliver what was published.

pub mod error;
pub mod event_bus;
pub mod features;
pub mod fixtures;
pub mod lifecycle;
pub mod registry;
pub mod reporter;
pub mod scheduler;
pub mod settings;
pub mod startup;

pub use error::HarnessError;
pub use event_bus::EventBusFacade;
pub use fixtures::{Fixtures, reset_fixtures, with_fixtures};
pub use lifecycle::{TearDownOptions, TestSession, Widget, WidgetState};
pub use registry::{MockOverride, ServiceMockRegistry};
pub use reporter::{FailureReporter, RecordingReporter};
pub use settings::{HarnessSettings, SetupOptions, WIDGET_ID};
pub use startup::StartupOverrides;

use crate::lifecycle::{SessionParts, WidgetParts};
use crate::scheduler::TickScheduler;
use std::rc::Rc;
use widgetbed_core::descriptor::WidgetDescriptor;
use widgetbed_core::dom::{Document, Element};
use widgetbed_mocks::MockSettings;
use widgetbed_runtime::{BootstrapOptions, RuntimeServices, bootstrap, builtin_adapter};

/// Id of the element widgets are rendered into.
pub const ANCHOR_ID: &str = "widgetContainer";

/// Prepares a test case for one widget.
///
/// Options left unset are taken from this thread's [`Fixtures`]. A session of
/// this thread that was not torn down is released first.
pub fn setup_for_widget(options: SetupOptions) -> Result<TestSession, HarnessError> {
    lifecycle::release_active();
    remove_stale_anchors();

    let SetupOptions {
        descriptor,
        artifacts,
        adapter,
        configuration,
        known_missing_resources,
        mock_overrides,
        reporter,
        settings,
    } = options;
    let (descriptor, artifacts, adapter, configuration) = with_fixtures(|fixtures| {
        (
            descriptor.or_else(|| fixtures.descriptor.clone()),
            artifacts.or_else(|| fixtures.artifacts.clone()),
            adapter.or_else(|| fixtures.adapter.clone()),
            configuration.or_else(|| fixtures.configuration.clone()),
        )
    });
    let descriptor = descriptor.ok_or(HarnessError::MissingFixture("widget descriptor"))?;
    let artifacts = artifacts.ok_or(HarnessError::MissingFixture("artifact bundle"))?;

    let technology = descriptor.technology().clone();
    let mut widget_adapters = Vec::new();
    match adapter {
        Some(adapter) if adapter.technology() != technology => {
            return Err(HarnessError::TechnologyMismatch {
                adapter: adapter.technology(),
                widget: technology,
            });
        }
        Some(adapter) => widget_adapters.push(adapter),
        None if builtin_adapter(&technology).is_none() => {
            return Err(HarnessError::UnknownTechnology(technology));
        }
        None => {}
    }

    let reporter: Rc<dyn FailureReporter> =
        reporter.unwrap_or_else(|| Rc::new(RecordingReporter::default()));
    let scheduler = Rc::new(TickScheduler::new(settings.max_flush_passes));
    let registry = Rc::new(ServiceMockRegistry::new(
        MockSettings { known_missing_resources },
        mock_overrides,
    ));

    let mut bootstrap_options = BootstrapOptions::new(artifacts, scheduler.clone());
    bootstrap_options.widget_adapters = widget_adapters;
    if let Some(configuration) = configuration {
        bootstrap_options.configuration = configuration;
    }
    bootstrap_options.service_decorator = Some(registry.clone());
    bootstrap_options.theme = settings.theme.clone();

    let anchor = Element::new("div").with_id(ANCHOR_ID);
    Document::current().body().append_child(&anchor);
    let RuntimeServices { global_event_bus, widget_loader, adapters, .. } =
        match bootstrap(&anchor, bootstrap_options) {
            Ok(runtime) => runtime,
            Err(err) => {
                anchor.remove();
                return Err(err.into());
            }
        };

    let view = adapters.factory_for(&technology);
    let event_bus = Rc::new(event_bus::EventBusFacade::new(
        global_event_bus,
        scheduler,
        view.clone(),
        Rc::clone(&reporter),
    ));
    tracing::info!(
        widget = %descriptor.name,
        technology = %technology,
        id = %settings.widget_id,
        "widget test set up"
    );

    let widget = Widget::new(WidgetParts {
        descriptor,
        loader: widget_loader,
        anchor: anchor.clone(),
        view,
        reporter: Rc::clone(&reporter),
        settings,
    });
    Ok(TestSession::new(SessionParts { widget, event_bus, registry, anchor, reporter }))
}

/// Sets up a test case for `descriptor`.
#[deprecated(note = "use `setup_for_widget` with `SetupOptions::descriptor`")]
pub fn create_setup_for_widget(
    descriptor: WidgetDescriptor,
    options: SetupOptions,
) -> Result<TestSession, HarnessError> {
    tracing::warn!(
        widget = %descriptor.name,
        "create_setup_for_widget is deprecated, use setup_for_widget"
    );
    setup_for_widget(options.descriptor(descriptor))
}

fn remove_stale_anchors() {
    let document = Document::current();
    while let Some(stale) = document.query_selector(&format!("#{ANCHOR_ID}")) {
        tracing::debug!("removing stale widget anchor");
        stale.remove();
    }
}

#[cfg(test)]
mod test_support;
