use crate::event::EventBus;
use serde_json::Value;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// The `axContext` injection: everything a controller needs to know about itself.
pub struct WidgetContext {
    pub widget_id: String,
    pub widget_name: String,
    pub area: String,
    pub features: Rc<Value>,
    pub event_bus: Rc<dyn EventBus>,
}

impl WidgetContext {
    /// Derives a document-unique id from the widget id.
    pub fn id(&self, suffix: &str) -> String {
        format!("ax-{}-{suffix}", self.widget_id)
    }
}

impl Debug for WidgetContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetContext")
            .field("widget_id", &self.widget_id)
            .field("widget_name", &self.widget_name)
            .field("area", &self.area)
            .field("features", &self.features)
            .finish_non_exhaustive()
    }
}
