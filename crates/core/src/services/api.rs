use super::ServiceObject;
use crate::error::ServiceError;
use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::rc::Rc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Widget-facing logger. Messages may reference `args` through `[0]`, `[1]`, ... placeholders.
pub trait Log: ServiceObject {
    fn log(&self, level: LogLevel, message: &str, args: &[Value]);

    fn trace(&self, message: &str, args: &[Value]) {
        self.log(LogLevel::Trace, message, args);
    }

    fn debug(&self, message: &str, args: &[Value]) {
        self.log(LogLevel::Debug, message, args);
    }

    fn info(&self, message: &str, args: &[Value]) {
        self.log(LogLevel::Info, message, args);
    }

    fn warn(&self, message: &str, args: &[Value]) {
        self.log(LogLevel::Warn, message, args);
    }

    fn error(&self, message: &str, args: &[Value]) {
        self.log(LogLevel::Error, message, args);
    }
}

/// Key/value store with JSON values.
pub trait StorageApi: ServiceObject {
    fn get_item(&self, key: &str) -> Option<Value>;
    fn set_item(&self, key: &str, value: Value);
    fn remove_item(&self, key: &str);
}

/// Widget-scoped access to local and session storage.
pub trait Storage: ServiceObject {
    fn local(&self) -> Rc<dyn StorageApi>;
    fn session(&self) -> Rc<dyn StorageApi>;
}

/// Storage access for an arbitrary namespace.
pub trait GlobalStorage: ServiceObject {
    fn local_storage(&self, namespace: &str) -> Rc<dyn StorageApi>;
    fn session_storage(&self, namespace: &str) -> Rc<dyn StorageApi>;
}

/// Read access to the application configuration by dotted key.
pub trait Configuration: ServiceObject {
    fn get(&self, key: &str) -> Option<Value>;

    fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }
}

pub type AssetFuture = LocalBoxFuture<'static, Result<Option<String>, ServiceError>>;

/// Access to the widget's assets.
///
/// The `*_for_theme` variants look the asset up for the active theme first.
/// `Ok(None)` means the asset is not part of the widget.
pub trait Assets: ServiceObject {
    fn asset(&self, name: &str) -> AssetFuture;
    fn for_theme(&self, name: &str) -> AssetFuture;
    fn url(&self, name: &str) -> AssetFuture;
    fn url_for_theme(&self, name: &str) -> AssetFuture;
}

pub type VisibilityHandler = Rc<dyn Fn(bool)>;

pub trait Visibility: ServiceObject {
    fn is_visible(&self) -> bool;
    fn on_show(&self, handler: VisibilityHandler);
    fn on_hide(&self, handler: VisibilityHandler);
    fn on_change(&self, handler: VisibilityHandler);
}

pub trait I18n: ServiceObject {
    fn locale(&self) -> String;
    fn language_tag(&self) -> Option<String>;

    /// Picks the translation of an i18n value for the current language tag.
    ///
    /// Plain strings are returned as they are; objects are looked up by language tag,
    /// then by its primary subtag.
    fn localize(&self, value: &Value) -> Option<String> {
        match value {
            Value::String(text) => Some(text.clone()),
            Value::Object(translations) => {
                let tag = self.language_tag()?;
                let primary = tag.split(['-', '_']).next().unwrap_or(tag.as_str()).to_owned();
                translations
                    .get(&tag)
                    .or_else(|| translations.get(&primary))
                    .and_then(Value::as_str)
                    .map(str::to_owned)
            }
            _ => None,
        }
    }
}

pub trait FlowService: ServiceObject {
    fn construct_absolute_url(&self, target: &str, parameters: &Value) -> String;
}

/// Generates document-unique ids for a widget's DOM elements.
pub trait IdGenerator: ServiceObject {
    fn id(&self, suffix: &str) -> String;
}

pub type HeartbeatCallback = Box<dyn FnOnce()>;

pub trait Heartbeat: ServiceObject {
    fn on_before_next(&self, callback: HeartbeatCallback);
    fn on_next(&self, callback: HeartbeatCallback);
    fn on_after_next(&self, callback: HeartbeatCallback);
}

pub trait AreaHelper: ServiceObject {
    /// Qualifies a widget-local area name with the widget id.
    fn full_name(&self, local_name: &str) -> String;
    fn local_name(&self, full_name: &str) -> String;
    fn is_visible(&self, full_name: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    struct FixedI18n(Option<&'static str>);

    impl I18n for FixedI18n {
        fn locale(&self) -> String {
            "default".into()
        }

        fn language_tag(&self) -> Option<String> {
            self.0.map(str::to_owned)
        }
    }

    #[rstest]
    #[case(Some("de-DE"), json!({ "de-DE": "Hallo", "en": "Hello" }), Some("Hallo"))]
    #[case(Some("en-US"), json!({ "de": "Hallo", "en": "Hello" }), Some("Hello"))]
    #[case(Some("fr"), json!({ "de": "Hallo" }), None)]
    #[case(None, json!({ "de": "Hallo" }), None)]
    #[case(None, json!("plain"), Some("plain"))]
    fn localize_prefers_exact_tag(
        #[case] tag: Option<&'static str>,
        #[case] value: Value,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(FixedI18n(tag).localize(&value).as_deref(), expected);
    }
}
