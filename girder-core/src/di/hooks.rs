//! Container lifecycle hooks.
//!
//! Observers subscribe to a container's [`Hooks`] and are called
//! synchronously, in subscription order, for every [`ContainerEvent`].
//! A failing or panicking observer is logged and skipped; it never affects
//! the registration or resolution that fired the event.

use super::{ContractKey, Instance, Lifetime};
use parking_lot::RwLock;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use tracing::{error, trace, warn};

/// Error type returned by observers.
pub type ObserverError = Box<dyn std::error::Error + Send + Sync>;

/// Something that happened inside the container.
#[derive(Clone, Copy)]
pub enum ContainerEvent<'a> {
    ServiceAdded {
        key: &'a ContractKey,
        lifetime: Lifetime,
    },
    ServiceReplaced {
        key: &'a ContractKey,
        lifetime: Lifetime,
    },
    ServiceRemoved {
        key: &'a ContractKey,
    },
    ServiceRequested {
        key: &'a ContractKey,
    },
    ServiceResolved {
        key: &'a ContractKey,
        instance: &'a Instance,
    },
    UnknownServiceRequested {
        key: &'a ContractKey,
    },
    AliasAdded {
        alias: &'a ContractKey,
        target: &'a ContractKey,
    },
    AliasRemoved {
        alias: &'a ContractKey,
        target: &'a ContractKey,
    },
    UnknownAliasRequested {
        alias: &'a ContractKey,
    },
}

/// Discriminant of a [`ContainerEvent`], for filtering and recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerEventKind {
    ServiceAdded,
    ServiceReplaced,
    ServiceRemoved,
    ServiceRequested,
    ServiceResolved,
    UnknownServiceRequested,
    AliasAdded,
    AliasRemoved,
    UnknownAliasRequested,
}

impl ContainerEvent<'_> {
    pub fn kind(&self) -> ContainerEventKind {
        match self {
            ContainerEvent::ServiceAdded { .. } => ContainerEventKind::ServiceAdded,
            ContainerEvent::ServiceReplaced { .. } => ContainerEventKind::ServiceReplaced,
            ContainerEvent::ServiceRemoved { .. } => ContainerEventKind::ServiceRemoved,
            ContainerEvent::ServiceRequested { .. } => ContainerEventKind::ServiceRequested,
            ContainerEvent::ServiceResolved { .. } => ContainerEventKind::ServiceResolved,
            ContainerEvent::UnknownServiceRequested { .. } => {
                ContainerEventKind::UnknownServiceRequested
            }
            ContainerEvent::AliasAdded { .. } => ContainerEventKind::AliasAdded,
            ContainerEvent::AliasRemoved { .. } => ContainerEventKind::AliasRemoved,
            ContainerEvent::UnknownAliasRequested { .. } => {
                ContainerEventKind::UnknownAliasRequested
            }
        }
    }

    /// The contract (or alias) the event is about.
    pub fn key(&self) -> &ContractKey {
        match self {
            ContainerEvent::ServiceAdded { key, .. }
            | ContainerEvent::ServiceReplaced { key, .. }
            | ContainerEvent::ServiceRemoved { key }
            | ContainerEvent::ServiceRequested { key }
            | ContainerEvent::ServiceResolved { key, .. }
            | ContainerEvent::UnknownServiceRequested { key } => key,
            ContainerEvent::AliasAdded { alias, .. }
            | ContainerEvent::AliasRemoved { alias, .. }
            | ContainerEvent::UnknownAliasRequested { alias } => alias,
        }
    }
}

impl fmt::Debug for ContainerEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self.kind(), self.key())
    }
}

/// Receives container events.
pub trait ContainerObserver: Send + Sync {
    fn on_event(&self, event: &ContainerEvent<'_>) -> Result<(), ObserverError>;
}

/// Adapter turning a closure into an observer for one event kind.
struct FnObserver<F> {
    kind: Option<ContainerEventKind>,
    f: F,
}

impl<F> ContainerObserver for FnObserver<F>
where
    F: Fn(&ContainerEvent<'_>) -> Result<(), ObserverError> + Send + Sync,
{
    fn on_event(&self, event: &ContainerEvent<'_>) -> Result<(), ObserverError> {
        match self.kind {
            Some(kind) if kind != event.kind() => Ok(()),
            _ => (self.f)(event),
        }
    }
}

/// Ordered list of observers owned by one container.
#[derive(Default)]
pub struct Hooks {
    observers: RwLock<Vec<Arc<dyn ContainerObserver>>>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe an observer to every event.
    pub fn subscribe(&self, observer: Arc<dyn ContainerObserver>) {
        self.observers.write().push(observer);
    }

    /// Subscribe a closure to a single event kind.
    pub fn on<F>(&self, kind: ContainerEventKind, f: F)
    where
        F: Fn(&ContainerEvent<'_>) -> Result<(), ObserverError> + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(FnObserver {
            kind: Some(kind),
            f,
        }));
    }

    /// Subscribe a closure to every event.
    pub fn on_any<F>(&self, f: F)
    where
        F: Fn(&ContainerEvent<'_>) -> Result<(), ObserverError> + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(FnObserver { kind: None, f }));
    }

    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    /// Deliver an event to every observer.
    pub fn fire(&self, event: ContainerEvent<'_>) {
        // Snapshot so observers may subscribe or resolve without deadlocking.
        let observers = self.observers.read().clone();
        if observers.is_empty() {
            return;
        }

        trace!(event = ?event, observers = observers.len(), "Firing container event");

        for (index, observer) in observers.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| observer.on_event(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(
                        event = ?event,
                        observer_index = index,
                        error = %e,
                        "Container observer failed; continuing"
                    );
                }
                Err(_) => {
                    error!(
                        event = ?event,
                        observer_index = index,
                        "Container observer panicked; continuing"
                    );
                }
            }
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("observers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_observers_called_in_subscription_order() {
        let hooks = Hooks::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for id in 0..3 {
            let seen = seen.clone();
            hooks.on_any(move |_| {
                seen.lock().push(id);
                Ok(())
            });
        }

        let key = ContractKey::named("app.svc");
        hooks.fire(ContainerEvent::ServiceRequested { key: &key });

        assert_eq!(*seen.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_failing_observer_is_swallowed() {
        let hooks = Hooks::new();
        let reached = Arc::new(Mutex::new(false));

        hooks.on_any(|_| Err("observer broke".into()));
        hooks.on_any(|_| panic!("observer exploded"));
        let flag = reached.clone();
        hooks.on_any(move |_| {
            *flag.lock() = true;
            Ok(())
        });

        let key = ContractKey::named("app.svc");
        hooks.fire(ContainerEvent::ServiceRemoved { key: &key });

        assert!(*reached.lock());
    }

    #[test]
    fn test_kind_filter() {
        let hooks = Hooks::new();
        let count = Arc::new(Mutex::new(0));
        let counter = count.clone();
        hooks.on(ContainerEventKind::AliasAdded, move |_| {
            *counter.lock() += 1;
            Ok(())
        });

        let a = ContractKey::named("a");
        let b = ContractKey::named("b");
        hooks.fire(ContainerEvent::ServiceRequested { key: &a });
        hooks.fire(ContainerEvent::AliasAdded {
            alias: &a,
            target: &b,
        });

        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_event_key_and_kind() {
        let alias = ContractKey::named("logger");
        let target = ContractKey::named("app.Logger");
        let event = ContainerEvent::AliasRemoved {
            alias: &alias,
            target: &target,
        };
        assert_eq!(event.kind(), ContainerEventKind::AliasRemoved);
        assert_eq!(event.key(), &alias);
    }
}
