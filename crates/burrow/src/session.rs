//! Session-scoped state shared across commands.
//!
//! [`SessionStore`] holds [`Value`]s keyed by name for the lifetime of the
//! shell. [`ServiceRegistry`] holds long-lived dependencies (clients, pools,
//! caches) that commands look up by name and type.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::value::Value;

/// Key/value state that survives between commands.
#[derive(Debug, Default)]
pub struct SessionStore {
    data: RwLock<HashMap<String, Value>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.data.read().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.write().insert(key.into(), value.into());
    }

    /// Removes `key`, returning its previous value.
    pub fn delete(&self, key: &str) -> Option<Value> {
        self.data.write().remove(key)
    }

    /// Stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.data.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

type Service = Arc<dyn Any + Send + Sync>;

/// Named, type-erased service instances.
///
/// ```rust
/// use burrow::ServiceRegistry;
///
/// struct Inventory { hosts: Vec<String> }
///
/// let services = ServiceRegistry::new();
/// services.register("inventory", Inventory { hosts: vec!["web-1".into()] });
///
/// let inv = services.get::<Inventory>("inventory").unwrap();
/// assert_eq!(inv.hosts.len(), 1);
/// assert!(services.get::<String>("inventory").is_none());
/// ```
#[derive(Default)]
pub struct ServiceRegistry {
    data: RwLock<HashMap<String, Service>>,
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<String> = self.data.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("ServiceRegistry")
            .field("services", &names)
            .finish()
    }
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a service, replacing any previous one of the same name.
    pub fn register<T: Any + Send + Sync>(&self, name: impl Into<String>, service: T) {
        self.register_arc(name, Arc::new(service));
    }

    pub fn register_arc<T: Any + Send + Sync>(&self, name: impl Into<String>, service: Arc<T>) {
        self.data.write().insert(name.into(), service);
    }

    /// The service registered under `name`, if it has type `T`.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let service = self.data.read().get(name).cloned()?;
        service.downcast::<T>().ok()
    }

    /// Like [`get`](Self::get) but with a descriptive error for commands.
    pub fn require<T: Any + Send + Sync>(&self, name: &str) -> anyhow::Result<Arc<T>> {
        self.get::<T>(name).ok_or_else(|| {
            anyhow::anyhow!(
                "service {} missing or not of type {}",
                name,
                std::any::type_name::<T>()
            )
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.data.read().contains_key(name)
    }
}
