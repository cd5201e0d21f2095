//! In-memory storage mocks.
//!
//! Values are kept as raw JSON strings in the mock backends, the way a browser
//! storage would hold them, so tests can seed or inspect the serialized form.

use crate::spy::Spy;
use crate::{MockEnvironment, register_service_mock};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use widgetbed_core::error::ServiceError;
use widgetbed_core::services::{
    GlobalStorage, Service, ServiceName, ServiceThunk, Storage, StorageApi,
};

/// Raw key to JSON-string map shared between a mock storage and the test.
#[derive(Clone, Debug, Default)]
pub struct MockBackend(Rc<RefCell<BTreeMap<String, String>>>);

impl MockBackend {
    pub fn get(&self, key: &str) -> Option<String> {
        self.0.borrow().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, raw: impl Into<String>) {
        self.0.borrow_mut().insert(key.into(), raw.into());
    }

    pub fn remove(&self, key: &str) {
        self.0.borrow_mut().remove(key);
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct MockBackends {
    pub local: MockBackend,
    pub session: MockBackend,
}

/// One storage area over a backend; keys are prefixed with the namespace, if any.
pub struct MockStorageApi {
    backend: MockBackend,
    prefix: String,
    pub get_item: Spy,
    pub set_item: Spy,
    pub remove_item: Spy,
}

impl MockStorageApi {
    fn new(backend: MockBackend, namespace: Option<&str>, label: &str) -> Self {
        Self {
            backend,
            prefix: namespace.map(|namespace| format!("{namespace}.")).unwrap_or_default(),
            get_item: Spy::new(&format!("{label}.getItem")),
            set_item: Spy::new(&format!("{label}.setItem")),
            remove_item: Spy::new(&format!("{label}.removeItem")),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }
}

impl StorageApi for MockStorageApi {
    fn get_item(&self, key: &str) -> Option<Value> {
        self.get_item.record(vec![json!(key)]);
        let raw = self.backend.get(&self.key(key))?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key, error = %err, "mock storage holds invalid JSON");
                None
            }
        }
    }

    fn set_item(&self, key: &str, value: Value) {
        self.set_item.record(vec![json!(key), value.clone()]);
        self.backend.set(self.key(key), value.to_string());
    }

    fn remove_item(&self, key: &str) {
        self.remove_item.record(vec![json!(key)]);
        self.backend.remove(&self.key(key));
    }
}

/// `axStorage` mock over fresh, empty backends.
pub struct MockStorage {
    pub mock_backends: MockBackends,
    local: Rc<MockStorageApi>,
    session: Rc<MockStorageApi>,
}

impl Default for MockStorage {
    fn default() -> Self {
        let mock_backends = MockBackends::default();
        Self {
            local: Rc::new(MockStorageApi::new(
                mock_backends.local.clone(),
                None,
                "axStorage.local",
            )),
            session: Rc::new(MockStorageApi::new(
                mock_backends.session.clone(),
                None,
                "axStorage.session",
            )),
            mock_backends,
        }
    }
}

impl MockStorage {
    pub fn local_mock(&self) -> &Rc<MockStorageApi> {
        &self.local
    }

    pub fn session_mock(&self) -> &Rc<MockStorageApi> {
        &self.session
    }
}

impl Storage for MockStorage {
    fn local(&self) -> Rc<dyn StorageApi> {
        self.local.clone()
    }

    fn session(&self) -> Rc<dyn StorageApi> {
        self.session.clone()
    }
}

/// `axGlobalStorage` mock. All namespaces share the backends, keys are
/// stored as `<namespace>.<key>`.
pub struct MockGlobalStorage {
    pub mock_backends: MockBackends,
    pub local_storage: Spy,
    pub session_storage: Spy,
}

impl MockGlobalStorage {
    pub fn new() -> Self {
        Self {
            mock_backends: MockBackends::default(),
            local_storage: Spy::new("axGlobalStorage.getLocalStorage"),
            session_storage: Spy::new("axGlobalStorage.getSessionStorage"),
        }
    }
}

impl Default for MockGlobalStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalStorage for MockGlobalStorage {
    fn local_storage(&self, namespace: &str) -> Rc<dyn StorageApi> {
        self.local_storage.record(vec![json!(namespace)]);
        Rc::new(MockStorageApi::new(
            self.mock_backends.local.clone(),
            Some(namespace),
            "axGlobalStorage.local",
        ))
    }

    fn session_storage(&self, namespace: &str) -> Rc<dyn StorageApi> {
        self.session_storage.record(vec![json!(namespace)]);
        Rc::new(MockStorageApi::new(
            self.mock_backends.session.clone(),
            Some(namespace),
            "axGlobalStorage.session",
        ))
    }
}

fn create_storage_mock(
    _environment: &MockEnvironment,
    _default: ServiceThunk,
) -> Result<Service, ServiceError> {
    Ok(Service::Storage(Rc::new(MockStorage::default())))
}

fn create_global_storage_mock(
    _environment: &MockEnvironment,
    _default: ServiceThunk,
) -> Result<Service, ServiceError> {
    Ok(Service::GlobalStorage(Rc::new(MockGlobalStorage::new())))
}

register_service_mock!(ServiceName::Storage, create_storage_mock);
register_service_mock!(ServiceName::GlobalStorage, create_global_storage_mock);

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn seeded_backends_are_parsed_on_read() {
        let storage = MockStorage::default();
        storage.mock_backends.session.set("test", r#""mockValue""#);

        assert_eq!(storage.session().get_item("test"), Some(json!("mockValue")));
        assert_eq!(storage.local().get_item("test"), None);
        assert!(storage.session_mock().get_item.was_called_with(&[json!("test")]));
    }

    #[rstest]
    fn writes_land_serialized_in_the_backend() {
        let storage = MockStorage::default();
        storage.local().set_item("settings", json!({ "open": true }));
        let raw = storage.mock_backends.local.get("settings");
        assert_eq!(raw.as_deref(), Some(r#"{"open":true}"#));

        storage.local().remove_item("settings");
        assert!(storage.mock_backends.local.is_empty());
    }

    #[rstest]
    fn invalid_raw_values_read_as_missing() {
        let storage = MockStorage::default();
        storage.mock_backends.local.set("broken", "{not json");
        assert_eq!(storage.local().get_item("broken"), None);
    }

    #[rstest]
    fn global_storage_prefixes_namespaces() {
        let storage = MockGlobalStorage::new();
        storage.session_storage("app").set_item("user", json!("anna"));
        assert_eq!(storage.mock_backends.session.keys(), ["app.user"]);
        assert_eq!(storage.session_storage("app").get_item("user"), Some(json!("anna")));
        assert_eq!(storage.session_storage("other").get_item("user"), None);
        assert_eq!(storage.session_storage.call_count(), 3);
    }
}
