//! Dependency injection.
//!
//! A [`ServiceRegistry`] stores bindings from [`ContractKey`]s to producers;
//! a [`Container`] resolves them, building constructor graphs on demand and
//! reusing instances according to each binding's [`Lifetime`].
//!
//! ```
//! use girder_core::di::{Container, Lifetime};
//! use std::sync::Arc;
//!
//! struct Config { greeting: String }
//! struct Greeter { config: Arc<Config> }
//!
//! let container = Container::new();
//! container
//!     .registry()
//!     .register_instance(Config { greeting: "hello".into() })
//!     .unwrap();
//! container
//!     .registry()
//!     .register_factory(Lifetime::Transient, |r| Ok(Greeter { config: r.get::<Config>()? }))
//!     .unwrap();
//!
//! let greeter = container.get::<Greeter>().unwrap();
//! assert_eq!(greeter.config.greeting, "hello");
//! ```

mod container;
mod descriptor;
mod hooks;
mod key;
mod registry;
mod scope;

pub use container::{Container, ResolutionContext, Resolver};
pub use descriptor::{
    Arguments, Constructor, FactoryFn, Injectable, Instance, Lifetime, Parameter, Producer,
    ServiceDescriptor,
};
pub use hooks::{ContainerEvent, ContainerEventKind, ContainerObserver, Hooks, ObserverError};
pub use key::ContractKey;
pub use registry::ServiceRegistry;
pub use scope::Scope;

pub(crate) use scope::ScopeCache;
