use crate::spy::Spy;
use crate::{MockEnvironment, register_service_mock};
use serde_json::json;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use widgetbed_core::error::ServiceError;
use widgetbed_core::services::{
    AreaHelper, Service, ServiceName, ServiceThunk, Visibility, VisibilityHandler,
};

/// Visibility mock. Widgets start out visible; tests change that with
/// [`MockVisibility::mock_show`] and [`MockVisibility::mock_hide`].
pub struct MockVisibility {
    visible: Cell<bool>,
    show_handlers: RefCell<Vec<VisibilityHandler>>,
    hide_handlers: RefCell<Vec<VisibilityHandler>>,
    change_handlers: RefCell<Vec<VisibilityHandler>>,
    pub is_visible: Spy,
    pub on_show: Spy,
    pub on_hide: Spy,
    pub on_change: Spy,
}

impl Default for MockVisibility {
    fn default() -> Self {
        Self {
            visible: Cell::new(true),
            show_handlers: RefCell::new(Vec::new()),
            hide_handlers: RefCell::new(Vec::new()),
            change_handlers: RefCell::new(Vec::new()),
            is_visible: Spy::new("axVisibility.isVisible"),
            on_show: Spy::new("axVisibility.onShow"),
            on_hide: Spy::new("axVisibility.onHide"),
            on_change: Spy::new("axVisibility.onChange"),
        }
    }
}

impl MockVisibility {
    pub fn mock_show(&self) {
        self.mock_change(true);
    }

    pub fn mock_hide(&self) {
        self.mock_change(false);
    }

    /// Sets the visibility and notifies the handlers if it actually changed.
    pub fn mock_change(&self, visible: bool) {
        if self.visible.replace(visible) == visible {
            return;
        }
        let specific = if visible { &self.show_handlers } else { &self.hide_handlers };
        let handlers: Vec<_> = specific
            .borrow()
            .iter()
            .chain(self.change_handlers.borrow().iter())
            .cloned()
            .collect();
        tracing::debug!(visible, handlers = handlers.len(), "mock visibility change");
        for handler in handlers {
            handler(visible);
        }
    }
}

impl Visibility for MockVisibility {
    fn is_visible(&self) -> bool {
        self.is_visible.record(Vec::new());
        self.visible.get()
    }

    fn on_show(&self, handler: VisibilityHandler) {
        self.on_show.record(Vec::new());
        self.show_handlers.borrow_mut().push(handler);
    }

    fn on_hide(&self, handler: VisibilityHandler) {
        self.on_hide.record(Vec::new());
        self.hide_handlers.borrow_mut().push(handler);
    }

    fn on_change(&self, handler: VisibilityHandler) {
        self.on_change.record(Vec::new());
        self.change_handlers.borrow_mut().push(handler);
    }
}

/// Area helper mock; areas are visible unless a test says otherwise.
pub struct MockAreaHelper {
    widget_id: String,
    visibility: RefCell<BTreeMap<String, bool>>,
    pub full_name: Spy,
    pub local_name: Spy,
    pub is_visible: Spy,
}

impl MockAreaHelper {
    pub fn new(widget_id: impl Into<String>) -> Self {
        Self {
            widget_id: widget_id.into(),
            visibility: RefCell::new(BTreeMap::new()),
            full_name: Spy::new("axAreaHelper.fullName"),
            local_name: Spy::new("axAreaHelper.localName"),
            is_visible: Spy::new("axAreaHelper.isVisible"),
        }
    }

    pub fn mock_visibility(&self, full_name: impl Into<String>, visible: bool) {
        self.visibility.borrow_mut().insert(full_name.into(), visible);
    }
}

impl AreaHelper for MockAreaHelper {
    fn full_name(&self, local_name: &str) -> String {
        self.full_name.record(vec![json!(local_name)]);
        format!("{}.{local_name}", self.widget_id)
    }

    fn local_name(&self, full_name: &str) -> String {
        self.local_name.record(vec![json!(full_name)]);
        full_name
            .strip_prefix(&self.widget_id)
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(full_name)
            .to_owned()
    }

    fn is_visible(&self, full_name: &str) -> bool {
        self.is_visible.record(vec![json!(full_name)]);
        self.visibility.borrow().get(full_name).copied().unwrap_or(true)
    }
}

fn create_visibility_mock(
    _environment: &MockEnvironment,
    _default: ServiceThunk,
) -> Result<Service, ServiceError> {
    Ok(Service::Visibility(Rc::new(MockVisibility::default())))
}

fn create_area_helper_mock(
    environment: &MockEnvironment,
    _default: ServiceThunk,
) -> Result<Service, ServiceError> {
    Ok(Service::AreaHelper(Rc::new(MockAreaHelper::new(environment.context.widget_id.clone()))))
}

register_service_mock!(ServiceName::Visibility, create_visibility_mock);
register_service_mock!(ServiceName::AreaHelper, create_area_helper_mock);

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn handlers_fire_on_actual_changes_only() {
        let visibility = MockVisibility::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let on_hide = Rc::clone(&seen);
        let on_change = Rc::clone(&seen);
        visibility.on_hide(Rc::new(move |visible: bool| {
            on_hide.borrow_mut().push(("hide", visible));
        }));
        visibility.on_change(Rc::new(move |visible: bool| {
            on_change.borrow_mut().push(("change", visible));
        }));

        visibility.mock_show();
        visibility.mock_hide();
        visibility.mock_hide();

        assert_eq!(*seen.borrow(), [("hide", false), ("change", false)]);
        assert!(!visibility.is_visible());
        assert_eq!(visibility.on_change.call_count(), 1);
    }

    #[rstest]
    fn area_names_are_qualified_with_the_widget_id() {
        let helper = MockAreaHelper::new("testWidget");
        assert_eq!(helper.full_name("content"), "testWidget.content");
        assert_eq!(helper.local_name("testWidget.content"), "content");
        assert!(helper.is_visible("testWidget.content"));

        helper.mock_visibility("testWidget.content", false);
        assert!(!helper.is_visible("testWidget.content"));
        assert_eq!(helper.is_visible.call_count(), 2);
    }
}
