// Container observer that records events for later assertions

use girder_core::di::{ContainerEvent, ContainerEventKind, ContainerObserver, ObserverError};
use girder_core::{Container, ContractKey};
use parking_lot::Mutex;
use std::sync::Arc;

/// Records every container event it receives, in order.
///
/// ```
/// use girder_core::Container;
/// use girder_core::di::ContainerEventKind;
/// use girder_testing::RecordingObserver;
///
/// let container = Container::new();
/// let recorder = RecordingObserver::attach(&container);
///
/// container.registry().register_instance(7u8).unwrap();
/// container.get::<u8>().unwrap();
///
/// assert_eq!(
///     recorder.kinds(),
///     vec![
///         ContainerEventKind::ServiceAdded,
///         ContainerEventKind::ServiceRequested,
///         ContainerEventKind::ServiceResolved,
///     ]
/// );
/// ```
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<(ContainerEventKind, ContractKey)>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a recorder and subscribe it to `container`.
    pub fn attach(container: &Container) -> Arc<Self> {
        let recorder = Arc::new(Self::new());
        container.subscribe(recorder.clone());
        recorder
    }

    pub fn events(&self) -> Vec<(ContainerEventKind, ContractKey)> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<ContainerEventKind> {
        self.events.lock().iter().map(|(kind, _)| *kind).collect()
    }

    pub fn count(&self, kind: ContainerEventKind) -> usize {
        self.events.lock().iter().filter(|(k, _)| *k == kind).count()
    }

    /// Events concerning one contract, in order.
    pub fn for_contract(&self, key: &ContractKey) -> Vec<ContainerEventKind> {
        self.events
            .lock()
            .iter()
            .filter(|(_, k)| k == key)
            .map(|(kind, _)| *kind)
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl ContainerObserver for RecordingObserver {
    fn on_event(&self, event: &ContainerEvent<'_>) -> Result<(), ObserverError> {
        self.events.lock().push((event.kind(), event.key().clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_unknown_and_removed() {
        let container = Container::new();
        let recorder = RecordingObserver::attach(&container);

        assert!(container.get::<u16>().is_err());
        container.registry().register_instance(1u16).unwrap();
        container.registry().unregister(&ContractKey::of::<u16>());

        let key = ContractKey::of::<u16>();
        assert_eq!(
            recorder.for_contract(&key),
            vec![
                ContainerEventKind::ServiceRequested,
                ContainerEventKind::UnknownServiceRequested,
                ContainerEventKind::ServiceAdded,
                ContainerEventKind::ServiceRemoved,
            ]
        );
        assert_eq!(recorder.count(ContainerEventKind::ServiceAdded), 1);

        recorder.clear();
        assert!(recorder.events().is_empty());
    }
}
