//! Service descriptors: what the registry stores for each contract.

use super::ContractKey;
use super::container::Resolver;
use crate::{Error, Result};
use once_cell::sync::OnceCell;
use std::any::{Any, type_name};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// A resolved service value.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Factory producing a service, given access to the resolver for nested lookups.
pub type FactoryFn = Arc<dyn Fn(&Resolver<'_>) -> Result<Instance> + Send + Sync>;

type BuildFn = Arc<dyn Fn(Arguments) -> Result<Instance> + Send + Sync>;

/// Instance reuse policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifetime {
    /// One instance for the lifetime of the registry
    #[default]
    Singleton,
    /// A fresh instance on every resolution
    Transient,
    /// One instance per scope (typically one request)
    Scoped,
}

/// How a descriptor produces its instance.
#[derive(Clone)]
pub enum Producer {
    /// Build a concrete type from its declared constructor parameters
    Constructor(Constructor),
    /// Call a factory function
    Factory(FactoryFn),
    /// Hand out a pre-built instance
    Instance(Instance),
}

impl Producer {
    pub fn kind(&self) -> &'static str {
        match self {
            Producer::Constructor(_) => "constructor",
            Producer::Factory(_) => "factory",
            Producer::Instance(_) => "instance",
        }
    }
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Producer::Constructor(ctor) => f.debug_tuple("Constructor").field(ctor).finish(),
            Producer::Factory(_) => f.write_str("Factory(..)"),
            Producer::Instance(_) => f.write_str("Instance(..)"),
        }
    }
}

/// A registered service binding.
pub struct ServiceDescriptor {
    key: ContractKey,
    lifetime: Lifetime,
    producer: Producer,
    cached: OnceCell<Instance>,
}

impl ServiceDescriptor {
    pub fn new(key: ContractKey, producer: Producer, lifetime: Lifetime) -> Self {
        Self {
            key,
            lifetime,
            producer,
            cached: OnceCell::new(),
        }
    }

    pub fn key(&self) -> &ContractKey {
        &self.key
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn producer(&self) -> &Producer {
        &self.producer
    }

    /// The cached singleton, if it has been built.
    pub fn cached(&self) -> Option<&Instance> {
        self.cached.get()
    }

    /// Store a freshly built singleton.
    ///
    /// When another thread got there first, its instance is returned and
    /// `instance` is discarded.
    pub(crate) fn cache(&self, instance: Instance) -> Instance {
        self.cached.get_or_init(|| instance).clone()
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("key", &self.key)
            .field("lifetime", &self.lifetime)
            .field("producer", &self.producer)
            .field("cached", &self.cached.get().is_some())
            .finish()
    }
}

// ========== Constructor metadata ==========

/// One declared constructor parameter.
#[derive(Clone)]
pub struct Parameter {
    name: &'static str,
    contract: Option<ContractKey>,
    default: Option<Instance>,
}

impl Parameter {
    /// A parameter satisfied by resolving the contract of type `T`.
    pub fn of<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self::contract(name, ContractKey::of::<T>())
    }

    /// A parameter satisfied by resolving an explicit contract.
    pub fn contract(name: &'static str, contract: impl Into<ContractKey>) -> Self {
        Self {
            name,
            contract: Some(contract.into()),
            default: None,
        }
    }

    /// A plain value parameter that always takes its declared default.
    pub fn value<T: Any + Send + Sync>(name: &'static str, default: T) -> Self {
        Self {
            name,
            contract: None,
            default: Some(Arc::new(default)),
        }
    }

    /// Fall back to `default` when the contract is not registered.
    pub fn with_default<T: Any + Send + Sync>(mut self, default: T) -> Self {
        self.default = Some(Arc::new(default));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn contract_key(&self) -> Option<&ContractKey> {
        self.contract.as_ref()
    }

    pub fn default_value(&self) -> Option<&Instance> {
        self.default.as_ref()
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("contract", &self.contract)
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

/// Types the container can build from their declared constructor parameters.
///
/// ```
/// use girder_core::di::{Arguments, Injectable, Parameter};
/// use girder_core::Result;
/// use std::sync::Arc;
///
/// struct Database;
///
/// struct UserRepository {
///     db: Arc<Database>,
///     page_size: usize,
/// }
///
/// impl Injectable for UserRepository {
///     fn parameters() -> Vec<Parameter> {
///         vec![
///             Parameter::of::<Database>("db"),
///             Parameter::value("page_size", 50usize),
///         ]
///     }
///
///     fn construct(mut args: Arguments) -> Result<Self> {
///         Ok(Self {
///             db: args.next()?,
///             page_size: args.next_value()?,
///         })
///     }
/// }
/// ```
pub trait Injectable: Send + Sync + Sized + 'static {
    /// Constructor parameters, in declaration order.
    fn parameters() -> Vec<Parameter>;

    /// Build the value from the resolved arguments.
    fn construct(args: Arguments) -> Result<Self>;
}

/// Constructor metadata for a concrete type.
#[derive(Clone)]
pub struct Constructor {
    type_name: &'static str,
    parameters: Vec<Parameter>,
    build: BuildFn,
}

impl Constructor {
    pub fn of<T: Injectable>() -> Self {
        Self {
            type_name: type_name::<T>(),
            parameters: T::parameters(),
            build: Arc::new(|args| T::construct(args).map(|value| Arc::new(value) as Instance)),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub(crate) fn build(&self, args: Arguments) -> Result<Instance> {
        (self.build)(args)
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("type_name", &self.type_name)
            .field("parameters", &self.parameters)
            .finish()
    }
}

/// Resolved constructor arguments, consumed in declaration order.
pub struct Arguments {
    owner: ContractKey,
    values: VecDeque<(&'static str, Instance)>,
}

impl Arguments {
    pub(crate) fn new(owner: ContractKey, values: Vec<(&'static str, Instance)>) -> Self {
        Self {
            owner,
            values: values.into(),
        }
    }

    /// Take the next argument as a shared service.
    pub fn next<T: Any + Send + Sync>(&mut self) -> Result<Arc<T>> {
        let (name, value) = self.values.pop_front().ok_or_else(|| {
            Error::Internal(format!(
                "constructor for {} consumed more arguments than it declared",
                self.owner
            ))
        })?;
        self.downcast(name, value)
    }

    /// Take the next argument as an owned value (cloned out of the container).
    pub fn next_value<T: Any + Send + Sync + Clone>(&mut self) -> Result<T> {
        self.next::<T>().map(|value| (*value).clone())
    }

    /// Look an argument up by parameter name without consuming it.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>> {
        let value = self
            .values
            .iter()
            .find(|(param, _)| *param == name)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| {
                Error::Internal(format!(
                    "constructor for {} has no parameter named '{}'",
                    self.owner, name
                ))
            })?;
        self.downcast(name, value)
    }

    pub fn remaining(&self) -> usize {
        self.values.len()
    }

    fn downcast<T: Any + Send + Sync>(&self, name: &str, value: Instance) -> Result<Arc<T>> {
        value.downcast::<T>().map_err(|_| Error::TypeMismatch {
            contract: ContractKey::named(format!("{}.{}", self.owner, name)),
            expected: type_name::<T>(),
        })
    }
}
