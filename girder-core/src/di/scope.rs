//! Resolution scopes (one per request, typically).

use super::container::downcast;
use super::{Container, ContractKey, Instance};
use crate::Result;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Instances of scoped services.
#[derive(Default)]
pub(crate) struct ScopeCache {
    instances: Mutex<HashMap<ContractKey, Instance>>,
}

impl ScopeCache {
    pub(crate) fn get(&self, key: &ContractKey) -> Option<Instance> {
        self.instances.lock().get(key).cloned()
    }

    /// Keep the first instance stored for `key` and return it.
    pub(crate) fn store(&self, key: &ContractKey, instance: Instance) -> Instance {
        self.instances
            .lock()
            .entry(key.clone())
            .or_insert(instance)
            .clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.instances.lock().len()
    }
}

struct ScopeInner {
    id: Uuid,
    container: Container,
    cache: ScopeCache,
}

/// A unit of work with its own scoped-service instances.
///
/// Singletons are still shared with the container; transients are still
/// built on every resolve.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    pub(crate) fn new(container: Container) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                id: Uuid::new_v4(),
                container,
                cache: ScopeCache::default(),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn container(&self) -> &Container {
        &self.inner.container
    }

    pub fn resolve(&self, key: &ContractKey) -> Result<Instance> {
        self.inner.container.resolve_in(&self.inner.cache, key)
    }

    pub fn get<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        let key = ContractKey::of::<T>();
        let instance = self.resolve(&key)?;
        downcast(&key, instance)
    }

    pub fn get_named<T: Any + Send + Sync>(&self, key: &ContractKey) -> Result<Arc<T>> {
        let instance = self.resolve(key)?;
        downcast(key, instance)
    }

    /// Number of scoped instances built in this scope so far.
    pub fn scoped_instances(&self) -> usize {
        self.inner.cache.len()
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("id", &self.inner.id)
            .field("scoped_instances", &self.inner.cache.len())
            .finish()
    }
}
