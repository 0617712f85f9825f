use crate::messaging::{EventBus, EventKind, Notification, ServerEvent};
use parking_lot::RwLock;
use std::sync::Arc;

/// Receives read/remove acknowledgements so the server side can stay in
/// sync with local notification state. Injected at construction; tests
/// substitute a recording double.
pub trait NotificationBackend: Send + Sync {
    fn mark_notification_read(&self, id: &str);
    fn remove_notification(&self, id: &str);
}

/// Backend that acknowledges nothing. Used when the consumer only wants
/// local notification state.
pub struct NoopNotificationBackend;

impl NotificationBackend for NoopNotificationBackend {
    fn mark_notification_read(&self, _id: &str) {}
    fn remove_notification(&self, _id: &str) {}
}

/// Ordered collection of notifications reduced from `notification.created`
/// events. Records are only mutated through the read/remove operations;
/// persistent notifications survive bulk "remove read" sweeps.
pub struct NotificationStore {
    records: RwLock<Vec<Notification>>,
    backend: Arc<dyn NotificationBackend>,
}

impl NotificationStore {
    pub fn new(backend: Arc<dyn NotificationBackend>) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            backend,
        }
    }

    /// Wire this store to the bus as the `notification.created` reducer.
    pub fn attach(store: &Arc<Self>, bus: &Arc<EventBus>) {
        let reducer = Arc::clone(store);
        bus.on(
            EventKind::NotificationCreated,
            Arc::new(move |event| {
                if let ServerEvent::NotificationCreated(notification) = event {
                    reducer.apply(notification.clone());
                }
            }),
        );
    }

    /// Append a notification. Redeliveries of an id already present are
    /// dropped so reconnect replays do not duplicate records.
    pub fn apply(&self, notification: Notification) {
        let mut records = self.records.write();
        if records.iter().any(|r| r.id == notification.id) {
            tracing::debug!("ignoring duplicate notification {}", notification.id);
            return;
        }
        records.push(notification);
    }

    pub fn list(&self) -> Vec<Notification> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn unread_count(&self) -> usize {
        self.records.read().iter().filter(|r| !r.read).count()
    }

    pub fn has_unread(&self) -> bool {
        self.unread_count() > 0
    }

    /// Mark one notification read, acknowledging through the backend when
    /// the record actually transitions. Returns whether the id was found.
    pub fn mark_read(&self, id: &str) -> bool {
        let newly_read = {
            let mut records = self.records.write();
            match records.iter_mut().find(|r| r.id == id) {
                Some(record) if !record.read => {
                    record.read = true;
                    true
                }
                Some(_) => return true,
                None => return false,
            }
        };
        if newly_read {
            self.backend.mark_notification_read(id);
        }
        true
    }

    /// Remove one notification regardless of its flags.
    pub fn remove(&self, id: &str) -> bool {
        let removed = {
            let mut records = self.records.write();
            let before = records.len();
            records.retain(|r| r.id != id);
            records.len() < before
        };
        if removed {
            self.backend.remove_notification(id);
        }
        removed
    }

    /// Mark every unread notification read, acknowledging each through the
    /// backend once, in record order.
    pub fn mark_all_read(&self) {
        let ids: Vec<String> = {
            let mut records = self.records.write();
            records
                .iter_mut()
                .filter(|r| !r.read)
                .map(|r| {
                    r.read = true;
                    r.id.clone()
                })
                .collect()
        };
        for id in &ids {
            self.backend.mark_notification_read(id);
        }
    }

    /// Remove every read, non-persistent notification, acknowledging each
    /// removal through the backend once, in record order.
    pub fn remove_all_read(&self) {
        let ids: Vec<String> = {
            let mut records = self.records.write();
            let mut removed = Vec::new();
            records.retain(|r| {
                if r.read && !r.persistent {
                    removed.push(r.id.clone());
                    false
                } else {
                    true
                }
            });
            removed
        };
        for id in &ids {
            self.backend.remove_notification(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::NotificationKind;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub(crate) struct RecordingBackend {
        pub marked: Mutex<Vec<String>>,
        pub removed: Mutex<Vec<String>>,
    }

    impl NotificationBackend for RecordingBackend {
        fn mark_notification_read(&self, id: &str) {
            self.marked.lock().push(id.to_string());
        }

        fn remove_notification(&self, id: &str) {
            self.removed.lock().push(id.to_string());
        }
    }

    fn notification(id: &str, read: bool, persistent: bool) -> Notification {
        Notification {
            id: id.to_string(),
            kind: NotificationKind::Info,
            title: "title".to_string(),
            message: "message".to_string(),
            timestamp: 1712000000000,
            read,
            persistent,
        }
    }

    fn store_with_backend() -> (NotificationStore, Arc<RecordingBackend>) {
        let backend = Arc::new(RecordingBackend::default());
        let store = NotificationStore::new(Arc::clone(&backend) as Arc<dyn NotificationBackend>);
        (store, backend)
    }

    #[test]
    fn test_unread_count_tracks_read_flags() {
        let (store, backend) = store_with_backend();
        store.apply(notification("a", false, false));
        store.apply(notification("b", false, false));
        store.apply(notification("c", true, false));

        assert_eq!(store.unread_count(), 2);
        assert!(store.has_unread());

        store.mark_all_read();

        assert_eq!(store.unread_count(), 0);
        assert!(!store.has_unread());
        // One backend call per previously-unread record, in record order
        assert_eq!(*backend.marked.lock(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_remove_all_read_spares_persistent() {
        let (store, backend) = store_with_backend();
        store.apply(notification("a", true, false));
        store.apply(notification("b", true, true));
        store.apply(notification("c", false, false));

        store.remove_all_read();

        let remaining: Vec<String> = store.list().into_iter().map(|n| n.id).collect();
        assert_eq!(remaining, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(*backend.removed.lock(), vec!["a".to_string()]);
    }

    #[test]
    fn test_mark_read_acknowledges_once() {
        let (store, backend) = store_with_backend();
        store.apply(notification("a", false, false));

        assert!(store.mark_read("a"));
        assert!(store.mark_read("a"));
        assert!(!store.mark_read("missing"));

        assert_eq!(*backend.marked.lock(), vec!["a".to_string()]);
    }

    #[test]
    fn test_remove_ignores_flags() {
        let (store, backend) = store_with_backend();
        store.apply(notification("a", false, true));

        assert!(store.remove("a"));
        assert!(!store.remove("a"));
        assert!(store.is_empty());
        assert_eq!(*backend.removed.lock(), vec!["a".to_string()]);
    }

    #[test]
    fn test_duplicate_ids_are_dropped() {
        let (store, _backend) = store_with_backend();
        store.apply(notification("a", false, false));
        store.apply(notification("a", true, true));

        assert_eq!(store.len(), 1);
        assert!(!store.list()[0].read);
    }
}
