use crate::spy::Spy;
use crate::{MockEnvironment, register_service_mock};
use std::cell::RefCell;
use std::rc::Rc;
use widgetbed_core::error::ServiceError;
use widgetbed_core::services::{I18n, Service, ServiceName, ServiceThunk};

/// Locale the startup events announce.
pub const DEFAULT_LOCALE: &str = "default";
pub const DEFAULT_LANGUAGE_TAG: &str = "en";

pub struct MockI18n {
    locale: String,
    language_tag: RefCell<Option<String>>,
    pub language_tag_calls: Spy,
}

impl Default for MockI18n {
    fn default() -> Self {
        Self {
            locale: DEFAULT_LOCALE.to_owned(),
            language_tag: RefCell::new(Some(DEFAULT_LANGUAGE_TAG.to_owned())),
            language_tag_calls: Spy::new("axI18n.languageTag"),
        }
    }
}

impl MockI18n {
    pub fn mock_language_tag(&self, tag: Option<&str>) {
        *self.language_tag.borrow_mut() = tag.map(str::to_owned);
    }
}

impl I18n for MockI18n {
    fn locale(&self) -> String {
        self.locale.clone()
    }

    fn language_tag(&self) -> Option<String> {
        self.language_tag_calls.record(Vec::new());
        self.language_tag.borrow().clone()
    }
}

fn create_i18n_mock(
    _environment: &MockEnvironment,
    _default: ServiceThunk,
) -> Result<Service, ServiceError> {
    Ok(Service::I18n(Rc::new(MockI18n::default())))
}

register_service_mock!(ServiceName::I18n, create_i18n_mock);
