// Service registry: contract bindings and aliases

use super::{
    Constructor, ContainerEvent, ContractKey, FactoryFn, Hooks, Injectable, Instance, Lifetime,
    Producer, Resolver, ServiceDescriptor,
};
use crate::{Error, Result};
use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Default)]
struct Bindings {
    services: HashMap<ContractKey, Arc<ServiceDescriptor>>,
    aliases: HashMap<ContractKey, ContractKey>,
}

impl Bindings {
    /// Follow alias links from `key` to the key that is not itself an alias.
    fn canonical(&self, key: &ContractKey) -> (ContractKey, bool) {
        let mut current = key;
        let mut via_alias = false;
        // Chains are acyclic by construction; the bound is a safeguard.
        for _ in 0..=self.aliases.len() {
            match self.aliases.get(current) {
                Some(target) => {
                    current = target;
                    via_alias = true;
                }
                None => break,
            }
        }
        (current.clone(), via_alias)
    }
}

/// Outcome of looking a contract up, including the alias it went through.
#[derive(Debug, Clone)]
pub(crate) enum Lookup {
    Found {
        canonical: ContractKey,
        descriptor: Arc<ServiceDescriptor>,
    },
    UnknownAlias,
    Unknown,
}

/// Stores service descriptors and aliases.
///
/// The registry is safe to share: reads take a shared lock, registration
/// takes the exclusive lock. Descriptors are handed out as `Arc`s so no lock
/// is held while a service is being built.
pub struct ServiceRegistry {
    bindings: RwLock<Bindings>,
    hooks: Arc<Hooks>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::with_hooks(Arc::new(Hooks::new()))
    }

    /// Create a registry that reports to the given hooks.
    pub fn with_hooks(hooks: Arc<Hooks>) -> Self {
        Self {
            bindings: RwLock::new(Bindings::default()),
            hooks,
        }
    }

    pub fn hooks(&self) -> &Arc<Hooks> {
        &self.hooks
    }

    /// Register (or replace) a binding for `key`.
    pub fn register(
        &self,
        key: impl Into<ContractKey>,
        producer: Producer,
        lifetime: Lifetime,
    ) -> Result<()> {
        let key = key.into();
        key.validate()?;

        let replaced = {
            trace!(contract = %key, "Acquiring write lock for registration");
            let mut bindings = self.bindings.write();
            if bindings.aliases.contains_key(&key) {
                return Err(Error::Configuration(format!(
                    "cannot register '{}': the key is already an alias",
                    key
                )));
            }
            let descriptor = Arc::new(ServiceDescriptor::new(key.clone(), producer, lifetime));
            bindings.services.insert(key.clone(), descriptor).is_some()
        };

        debug!(
            contract = %key,
            lifetime = ?lifetime,
            replaced = replaced,
            "Service registered"
        );

        if replaced {
            self.hooks.fire(ContainerEvent::ServiceReplaced {
                key: &key,
                lifetime,
            });
        } else {
            self.hooks.fire(ContainerEvent::ServiceAdded {
                key: &key,
                lifetime,
            });
        }
        Ok(())
    }

    /// Register a type built from its declared constructor parameters.
    pub fn register_type<T: Injectable>(&self, lifetime: Lifetime) -> Result<()> {
        self.register(
            ContractKey::of::<T>(),
            Producer::Constructor(Constructor::of::<T>()),
            lifetime,
        )
    }

    /// Register a factory for `T`.
    pub fn register_factory<T, F>(&self, lifetime: Lifetime, factory: F) -> Result<()>
    where
        T: Any + Send + Sync,
        F: Fn(&Resolver<'_>) -> Result<T> + Send + Sync + 'static,
    {
        let factory: FactoryFn =
            Arc::new(move |resolver| factory(resolver).map(|value| Arc::new(value) as Instance));
        self.register(ContractKey::of::<T>(), Producer::Factory(factory), lifetime)
    }

    /// Register a pre-built instance of `T`.
    pub fn register_instance<T: Any + Send + Sync>(&self, instance: T) -> Result<()> {
        self.register(
            ContractKey::of::<T>(),
            Producer::Instance(Arc::new(instance)),
            Lifetime::Singleton,
        )
    }

    /// Register `T` as a singleton built from its constructor.
    pub fn singleton<T: Injectable>(&self) -> Result<()> {
        self.register_type::<T>(Lifetime::Singleton)
    }

    /// Register `T` as a transient built from its constructor.
    pub fn transient<T: Injectable>(&self) -> Result<()> {
        self.register_type::<T>(Lifetime::Transient)
    }

    /// Register `T` as a scoped service built from its constructor.
    pub fn scoped<T: Injectable>(&self) -> Result<()> {
        self.register_type::<T>(Lifetime::Scoped)
    }

    /// Make `alias` resolve to whatever `target` resolves to.
    pub fn alias(&self, alias: impl Into<ContractKey>, target: impl Into<ContractKey>) -> Result<()> {
        let alias = alias.into();
        let target = target.into();
        alias.validate()?;
        target.validate()?;

        {
            let mut bindings = self.bindings.write();

            if bindings.services.contains_key(&alias) {
                return Err(Error::Configuration(format!(
                    "cannot alias '{}': the key is already bound to a service",
                    alias
                )));
            }

            // Walk the existing chain from the target; reaching the alias
            // again means the new link would close a cycle.
            let mut chain = vec![alias.clone()];
            let mut current = Some(&target);
            while let Some(key) = current {
                chain.push(key.clone());
                if *key == alias {
                    let path = chain
                        .iter()
                        .map(ContractKey::as_str)
                        .collect::<Vec<_>>()
                        .join(" -> ");
                    return Err(Error::Configuration(format!(
                        "alias cycle detected: {}",
                        path
                    )));
                }
                current = bindings.aliases.get(key);
            }

            bindings.aliases.insert(alias.clone(), target.clone());
        }

        debug!(alias = %alias, target = %target, "Alias registered");
        self.hooks.fire(ContainerEvent::AliasAdded {
            alias: &alias,
            target: &target,
        });
        Ok(())
    }

    /// Remove one alias. Returns whether it existed.
    pub fn remove_alias(&self, alias: &ContractKey) -> bool {
        let removed = self.bindings.write().aliases.remove(alias);
        match removed {
            Some(target) => {
                debug!(alias = %alias, target = %target, "Alias removed");
                self.hooks.fire(ContainerEvent::AliasRemoved {
                    alias,
                    target: &target,
                });
                true
            }
            None => false,
        }
    }

    /// Remove a binding and every alias that leads to it.
    pub fn unregister(&self, key: &ContractKey) -> bool {
        let (removed, dropped_aliases) = {
            let mut bindings = self.bindings.write();
            let removed = bindings.services.remove(key).is_some();

            let dropped: Vec<ContractKey> = bindings
                .aliases
                .keys()
                .filter(|alias| bindings.canonical(alias).0 == *key)
                .cloned()
                .collect();

            let dropped_aliases: Vec<(ContractKey, ContractKey)> = dropped
                .into_iter()
                .filter_map(|alias| {
                    bindings
                        .aliases
                        .remove(&alias)
                        .map(|target| (alias, target))
                })
                .collect();

            (removed, dropped_aliases)
        };

        if removed {
            debug!(
                contract = %key,
                aliases_removed = dropped_aliases.len(),
                "Service unregistered"
            );
            self.hooks.fire(ContainerEvent::ServiceRemoved { key });
        }
        for (alias, target) in &dropped_aliases {
            self.hooks.fire(ContainerEvent::AliasRemoved { alias, target });
        }

        removed
    }

    /// Find the descriptor for `key`, following aliases.
    pub fn lookup(&self, key: &ContractKey) -> Option<Arc<ServiceDescriptor>> {
        match self.find(key) {
            Lookup::Found { descriptor, .. } => Some(descriptor),
            Lookup::UnknownAlias | Lookup::Unknown => None,
        }
    }

    pub(crate) fn find(&self, key: &ContractKey) -> Lookup {
        let bindings = self.bindings.read();
        let (canonical, via_alias) = bindings.canonical(key);
        match bindings.services.get(&canonical) {
            Some(descriptor) => Lookup::Found {
                canonical,
                descriptor: descriptor.clone(),
            },
            None if via_alias => Lookup::UnknownAlias,
            None => Lookup::Unknown,
        }
    }

    /// Whether `key` (or the target of an alias named `key`) is registered.
    pub fn contains(&self, key: &ContractKey) -> bool {
        self.lookup(key).is_some()
    }

    pub fn is_alias(&self, key: &ContractKey) -> bool {
        self.bindings.read().aliases.contains_key(key)
    }

    /// Number of registered services (aliases excluded).
    pub fn len(&self) -> usize {
        self.bindings.read().services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered contract keys, sorted.
    pub fn contracts(&self) -> Vec<ContractKey> {
        let mut keys: Vec<_> = self.bindings.read().services.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Registered aliases as `(alias, target)` pairs, sorted by alias.
    pub fn aliases(&self) -> Vec<(ContractKey, ContractKey)> {
        let mut pairs: Vec<_> = self
            .bindings
            .read()
            .aliases
            .iter()
            .map(|(alias, target)| (alias.clone(), target.clone()))
            .collect();
        pairs.sort();
        pairs
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bindings = self.bindings.read();
        f.debug_struct("ServiceRegistry")
            .field("services", &bindings.services.len())
            .field("aliases", &bindings.aliases.len())
            .finish()
    }
}
