// Dependency injection container

use super::registry::Lookup;
use super::{
    Arguments, ContainerEvent, ContainerEventKind, ContainerObserver, ContractKey, Hooks,
    Instance, Lifetime, Producer, Scope, ScopeCache, ServiceDescriptor, ServiceRegistry,
};
use crate::{Error, Result};
use std::any::{Any, type_name};
use std::cell::RefCell;
use std::sync::Arc;
use tracing::{debug, trace};

struct Inner {
    registry: Arc<ServiceRegistry>,
    hooks: Arc<Hooks>,
    root_scope: ScopeCache,
}

/// The dependency injection container.
///
/// Cloning is cheap; clones share the registry, the observers and the root
/// scope.
#[derive(Clone)]
pub struct Container {
    inner: Arc<Inner>,
}

impl Container {
    pub fn new() -> Self {
        debug!("Creating new DI container");
        let hooks = Arc::new(Hooks::new());
        let registry = Arc::new(ServiceRegistry::with_hooks(hooks.clone()));
        Self::from_parts(registry, hooks)
    }

    /// Build a container around an existing registry, sharing its hooks.
    pub fn with_registry(registry: Arc<ServiceRegistry>) -> Self {
        let hooks = registry.hooks().clone();
        Self::from_parts(registry, hooks)
    }

    fn from_parts(registry: Arc<ServiceRegistry>, hooks: Arc<Hooks>) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                hooks,
                root_scope: ScopeCache::default(),
            }),
        }
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.inner.registry
    }

    pub fn hooks(&self) -> &Hooks {
        &self.inner.hooks
    }

    /// Attach an observer to this container's events.
    pub fn subscribe(&self, observer: Arc<dyn ContainerObserver>) {
        self.inner.hooks.subscribe(observer);
    }

    /// Resolve a contract. Scoped services live in the container's root scope.
    pub fn resolve(&self, key: &ContractKey) -> Result<Instance> {
        Resolver::new(self, &self.inner.root_scope).resolve(key)
    }

    /// Resolve the contract of type `T` and downcast it.
    pub fn get<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        Resolver::new(self, &self.inner.root_scope).get::<T>()
    }

    /// Resolve an explicitly named contract that holds a `T`.
    pub fn get_named<T: Any + Send + Sync>(&self, key: &ContractKey) -> Result<Arc<T>> {
        let instance = self.resolve(key)?;
        downcast(key, instance)
    }

    /// Like [`get`](Self::get), but `Ok(None)` when `T` is not registered.
    ///
    /// Failures while building a registered `T` are still returned as errors.
    pub fn try_get<T: Any + Send + Sync>(&self) -> Result<Option<Arc<T>>> {
        Resolver::new(self, &self.inner.root_scope).try_get::<T>()
    }

    /// Check if a contract is registered
    pub fn has<T: ?Sized + 'static>(&self) -> bool {
        self.inner.registry.contains(&ContractKey::of::<T>())
    }

    /// Open a new scope; scoped services resolved through it are shared
    /// within the scope only.
    pub fn create_scope(&self) -> Scope {
        Scope::new(self.clone())
    }

    pub(crate) fn resolve_in(&self, scope: &ScopeCache, key: &ContractKey) -> Result<Instance> {
        Resolver::new(self, scope).resolve(key)
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("registry", &self.inner.registry)
            .field("hooks", &self.inner.hooks)
            .finish()
    }
}

pub(crate) fn downcast<T: Any + Send + Sync>(key: &ContractKey, instance: Instance) -> Result<Arc<T>> {
    instance.downcast::<T>().map_err(|_| Error::TypeMismatch {
        contract: key.clone(),
        expected: type_name::<T>(),
    })
}

/// State of one top-level resolve call.
#[derive(Debug, Default)]
pub struct ResolutionContext {
    in_progress: Vec<ContractKey>,
    events: Vec<(ContainerEventKind, ContractKey)>,
}

impl ResolutionContext {
    /// Mark `key` as being built, failing if it already is.
    fn enter(&mut self, key: &ContractKey) -> Result<()> {
        if let Some(start) = self.in_progress.iter().position(|k| k == key) {
            let mut path = self.in_progress[start..].to_vec();
            path.push(key.clone());
            return Err(Error::CircularDependency { path });
        }
        self.in_progress.push(key.clone());
        Ok(())
    }

    fn leave(&mut self, key: &ContractKey) {
        if let Some(position) = self.in_progress.iter().rposition(|k| k == key) {
            self.in_progress.remove(position);
        }
    }

    fn record(&mut self, kind: ContainerEventKind, key: &ContractKey) {
        self.events.push((kind, key.clone()));
    }

    /// Contracts currently being built, outermost first.
    pub fn in_progress(&self) -> &[ContractKey] {
        &self.in_progress
    }

    /// Events fired so far during this resolve call.
    pub fn events(&self) -> &[(ContainerEventKind, ContractKey)] {
        &self.events
    }
}

/// The container bound to one resolve call.
///
/// Factories receive a `Resolver` so nested resolutions share the caller's
/// cycle detection and scope.
pub struct Resolver<'a> {
    container: &'a Container,
    scope: &'a ScopeCache,
    context: RefCell<ResolutionContext>,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(container: &'a Container, scope: &'a ScopeCache) -> Self {
        Self {
            container,
            scope,
            context: RefCell::new(ResolutionContext::default()),
        }
    }

    pub fn container(&self) -> &Container {
        self.container
    }

    /// Resolve a contract within this call.
    pub fn resolve(&self, key: &ContractKey) -> Result<Instance> {
        self.resolve_with_parent(key, None)
    }

    /// Resolve the contract of type `T` and downcast it.
    pub fn get<T: Any + Send + Sync>(&self) -> Result<Arc<T>> {
        let key = ContractKey::of::<T>();
        let instance = self.resolve(&key)?;
        downcast(&key, instance)
    }

    /// Resolve an explicitly named contract that holds a `T`.
    pub fn get_named<T: Any + Send + Sync>(&self, key: &ContractKey) -> Result<Arc<T>> {
        let instance = self.resolve(key)?;
        downcast(key, instance)
    }

    /// Resolve `T` if it is registered, `Ok(None)` otherwise.
    pub fn try_get<T: Any + Send + Sync>(&self) -> Result<Option<Arc<T>>> {
        let key = ContractKey::of::<T>();
        if !self.container.inner.registry.contains(&key) {
            return Ok(None);
        }
        self.get::<T>().map(Some)
    }

    /// Contracts currently being built, outermost first.
    pub fn in_progress(&self) -> Vec<ContractKey> {
        self.context.borrow().in_progress().to_vec()
    }

    /// Events fired so far during this resolve call.
    pub fn events(&self) -> Vec<(ContainerEventKind, ContractKey)> {
        self.context.borrow().events().to_vec()
    }

    fn fire(&self, event: ContainerEvent<'_>) {
        self.context.borrow_mut().record(event.kind(), event.key());
        self.container.inner.hooks.fire(event);
    }

    fn resolve_with_parent(
        &self,
        key: &ContractKey,
        parent: Option<&ContractKey>,
    ) -> Result<Instance> {
        trace!(contract = %key, "Attempting to resolve service");
        self.fire(ContainerEvent::ServiceRequested { key });

        let (canonical, descriptor) = match self.container.inner.registry.find(key) {
            Lookup::Found {
                canonical,
                descriptor,
            } => (canonical, descriptor),
            Lookup::UnknownAlias => {
                debug!(alias = %key, "Alias does not lead to a registered service");
                self.fire(ContainerEvent::UnknownAliasRequested { alias: key });
                return Err(unresolved(key, parent));
            }
            Lookup::Unknown => {
                debug!(contract = %key, "Service not found in container");
                self.fire(ContainerEvent::UnknownServiceRequested { key });
                return Err(unresolved(key, parent));
            }
        };

        if let Some(instance) = self.reuse(&canonical, &descriptor) {
            trace!(contract = %canonical, "Reusing cached instance");
            return Ok(instance);
        }

        self.context.borrow_mut().enter(&canonical)?;
        let produced = self.produce(&canonical, &descriptor);
        self.context.borrow_mut().leave(&canonical);
        let instance = produced?;

        let instance = match descriptor.lifetime() {
            Lifetime::Singleton => descriptor.cache(instance),
            Lifetime::Scoped => self.scope.store(&canonical, instance),
            Lifetime::Transient => instance,
        };

        debug!(
            contract = %canonical,
            lifetime = ?descriptor.lifetime(),
            "Service resolved successfully"
        );
        self.fire(ContainerEvent::ServiceResolved {
            key: &canonical,
            instance: &instance,
        });
        Ok(instance)
    }

    fn reuse(&self, key: &ContractKey, descriptor: &ServiceDescriptor) -> Option<Instance> {
        match descriptor.lifetime() {
            Lifetime::Singleton => descriptor.cached().cloned(),
            Lifetime::Scoped => self.scope.get(key),
            Lifetime::Transient => None,
        }
    }

    fn produce(&self, key: &ContractKey, descriptor: &ServiceDescriptor) -> Result<Instance> {
        match descriptor.producer() {
            Producer::Instance(instance) => Ok(instance.clone()),
            Producer::Factory(factory) => factory(self),
            Producer::Constructor(ctor) => {
                let mut values = Vec::with_capacity(ctor.parameters().len());
                for param in ctor.parameters() {
                    let registered = param
                        .contract_key()
                        .filter(|contract| self.container.inner.registry.contains(contract));

                    let value = match (param.contract_key(), registered, param.default_value()) {
                        (_, Some(contract), _) => self.resolve_with_parent(contract, Some(key))?,
                        (_, None, Some(default)) => default.clone(),
                        // Unregistered without a default: go through the lookup
                        // so the unknown-service hooks fire, then fail.
                        (Some(contract), None, None) => {
                            self.resolve_with_parent(contract, Some(key))?
                        }
                        (None, None, None) => {
                            return Err(unresolved(&ContractKey::named(param.name()), Some(key)));
                        }
                    };
                    values.push((param.name(), value));
                }
                trace!(
                    contract = %key,
                    type_name = ctor.type_name(),
                    arguments = values.len(),
                    "Invoking constructor"
                );
                ctor.build(Arguments::new(key.clone(), values))
            }
        }
    }
}

fn unresolved(key: &ContractKey, parent: Option<&ContractKey>) -> Error {
    Error::UnresolvedDependency {
        contract: key.clone(),
        required_by: parent.cloned(),
    }
}
