use super::{Service, ServiceName};
use crate::error::ServiceError;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

/// Deferred constructor of a service instance.
pub type ServiceThunk = Box<dyn FnOnce() -> Result<Service, ServiceError>>;

enum Entry {
    Pending(ServiceThunk),
    Resolving,
    Ready(Service),
    Failed(ServiceError),
}

/// Services available to one widget instance, constructed on first request.
///
/// Every entry is resolved at most once; the result (instance or error) is
/// memoized. Thunks may request other services from the same map.
#[derive(Default)]
pub struct ServiceMap {
    entries: RefCell<BTreeMap<ServiceName, Entry>>,
}

impl ServiceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a lazily constructed service, replacing any previous entry.
    pub fn insert_lazy(&self, name: ServiceName, thunk: ServiceThunk) {
        self.entries.borrow_mut().insert(name, Entry::Pending(thunk));
    }

    /// Registers a ready instance, replacing any previous entry.
    pub fn insert(&self, name: ServiceName, service: Service) {
        self.entries.borrow_mut().insert(name, Entry::Ready(service));
    }

    pub fn contains(&self, name: &ServiceName) -> bool {
        self.entries.borrow().contains_key(name)
    }

    /// Whether the service has been constructed (successfully or not).
    pub fn is_resolved(&self, name: &ServiceName) -> bool {
        matches!(self.entries.borrow().get(name), Some(Entry::Ready(_) | Entry::Failed(_)))
    }

    pub fn names(&self) -> Vec<ServiceName> {
        self.entries.borrow().keys().cloned().collect()
    }

    /// Resolves a service, constructing it on first access.
    pub fn get(&self, name: &ServiceName) -> Result<Service, ServiceError> {
        let thunk = {
            let mut entries = self.entries.borrow_mut();
            match entries.remove(name) {
                None => return Err(ServiceError::Unavailable(name.clone())),
                Some(Entry::Ready(service)) => {
                    entries.insert(name.clone(), Entry::Ready(service.clone()));
                    return Ok(service);
                }
                Some(Entry::Failed(err)) => {
                    entries.insert(name.clone(), Entry::Failed(err.clone()));
                    return Err(err);
                }
                Some(Entry::Resolving) => {
                    entries.insert(name.clone(), Entry::Resolving);
                    return Err(ServiceError::Cyclic(name.clone()));
                }
                Some(Entry::Pending(thunk)) => {
                    entries.insert(name.clone(), Entry::Resolving);
                    thunk
                }
            }
        };

        let result = thunk();

        let mut entries = self.entries.borrow_mut();
        // An entry replaced while resolving wins over the constructed one.
        if let Some(entry) = entries.get_mut(name)
            && matches!(entry, Entry::Resolving)
        {
            *entry = match &result {
                Ok(service) => Entry::Ready(service.clone()),
                Err(err) => Entry::Failed(err.clone()),
            };
        }
        result
    }

    /// Resolves several services in order, failing on the first unavailable one.
    pub fn resolve_all(&self, names: &[ServiceName]) -> Result<Vec<Service>, ServiceError> {
        names.iter().map(|name| self.get(name)).collect()
    }
}

impl Debug for ServiceMap {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.borrow();
        let mut map = f.debug_map();
        for (name, entry) in entries.iter() {
            let state = match entry {
                Entry::Pending(_) => "pending",
                Entry::Resolving => "resolving",
                Entry::Ready(_) => "ready",
                Entry::Failed(_) => "failed",
            };
            map.entry(&name.as_str(), &state);
        }
        map.finish()
    }
}
