//! Options for setting up a widget test.

use crate::registry::MockOverride;
use crate::reporter::FailureReporter;
use crate::scheduler::DEFAULT_MAX_FLUSH_PASSES;
use serde_json::Value;
use std::collections::BTreeMap;
use std::rc::Rc;
use widgetbed_core::adapter::AdapterModule;
use widgetbed_core::artifacts::ArtifactBundle;
use widgetbed_core::descriptor::WidgetDescriptor;
use widgetbed_core::services::ServiceName;
use widgetbed_mocks::ResourcePattern;
use widgetbed_runtime::DEFAULT_THEME_NAME;

/// Instance id every widget under test is loaded with.
pub const WIDGET_ID: &str = "testWidget";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HarnessSettings {
    pub widget_id: String,
    pub theme: String,
    /// Flush passes before a cascade of deliveries is considered endless.
    pub max_flush_passes: usize,
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            widget_id: WIDGET_ID.to_owned(),
            theme: DEFAULT_THEME_NAME.to_owned(),
            max_flush_passes: DEFAULT_MAX_FLUSH_PASSES,
        }
    }
}

/// What to load. Unset fields are taken from the thread's
/// [`Fixtures`](crate::fixtures::Fixtures).
#[derive(Default)]
pub struct SetupOptions {
    pub descriptor: Option<WidgetDescriptor>,
    pub artifacts: Option<ArtifactBundle>,
    /// Adapter for the widget's technology, replacing the built-in one.
    pub adapter: Option<Rc<dyn AdapterModule>>,
    /// Application configuration, read through `axConfiguration`.
    pub configuration: Option<Value>,
    pub known_missing_resources: Vec<ResourcePattern>,
    pub mock_overrides: BTreeMap<ServiceName, MockOverride>,
    /// Defaults to a [`RecordingReporter`](crate::reporter::RecordingReporter).
    pub reporter: Option<Rc<dyn FailureReporter>>,
    pub settings: HarnessSettings,
}

impl SetupOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn descriptor(mut self, descriptor: WidgetDescriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    #[must_use]
    pub fn artifacts(mut self, artifacts: ArtifactBundle) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    #[must_use]
    pub fn adapter(mut self, adapter: Rc<dyn AdapterModule>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    #[must_use]
    pub fn configuration(mut self, configuration: Value) -> Self {
        self.configuration = Some(configuration);
        self
    }

    #[must_use]
    pub fn known_missing_resource(mut self, pattern: ResourcePattern) -> Self {
        self.known_missing_resources.push(pattern);
        self
    }

    #[must_use]
    pub fn mock_override(mut self, name: ServiceName, factory: MockOverride) -> Self {
        self.mock_overrides.insert(name, factory);
        self
    }

    #[must_use]
    pub fn reporter(mut self, reporter: Rc<dyn FailureReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    #[must_use]
    pub fn settings(mut self, settings: HarnessSettings) -> Self {
        self.settings = settings;
        self
    }
}
