use super::event::{EventKind, ServerEvent};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};

/// A registered event callback. Identity is the `Arc` allocation, so the
/// same handler can be removed again with [`EventBus::off`].
pub type EventHandler = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

/// Per-event-kind listener registry with ordered dispatch.
///
/// Handlers for one event are invoked in registration order. A panicking
/// handler is isolated and logged; it never prevents delivery to the
/// handlers registered after it. Registering while disconnected is fine,
/// dispatch simply does not happen until frames arrive.
pub struct EventBus {
    handlers: RwLock<HashMap<EventKind, Vec<EventHandler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a handler for an event kind.
    ///
    /// A handler registers at most once per event; returns `false` if this
    /// exact handler was already registered for `kind`.
    pub fn on(&self, kind: EventKind, handler: EventHandler) -> bool {
        let mut map = self.handlers.write();
        let list = map.entry(kind).or_default();
        if list.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            tracing::debug!("handler already registered for {}", kind);
            return false;
        }
        list.push(handler);
        true
    }

    /// Remove a handler by identity. Returns `false` if it was not registered.
    pub fn off(&self, kind: EventKind, handler: &EventHandler) -> bool {
        let mut map = self.handlers.write();
        let Some(list) = map.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|h| !Arc::ptr_eq(h, handler));
        let removed = list.len() < before;
        if list.is_empty() {
            map.remove(&kind);
        }
        removed
    }

    /// Register a handler and get back a [`Subscription`] whose
    /// `unsubscribe()` removes it again.
    pub fn subscribe(self: &Arc<Self>, kind: EventKind, handler: EventHandler) -> Subscription {
        self.on(kind, Arc::clone(&handler));
        Subscription {
            bus: Arc::downgrade(self),
            kind,
            handler,
        }
    }

    /// Fan an event out to every handler registered for its kind.
    pub fn dispatch(&self, event: &ServerEvent) {
        let kind = event.kind();
        let handlers: Vec<EventHandler> = self
            .handlers
            .read()
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        for handler in handlers {
            if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!("event handler for {} panicked: {}", kind, reason);
            }
        }
    }

    /// Total number of registered handlers across all event kinds.
    pub fn handler_count(&self) -> usize {
        self.handlers.read().values().map(Vec::len).sum()
    }

    /// Number of event kinds with at least one handler.
    pub fn subscription_count(&self) -> usize {
        self.handlers.read().len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle returned by [`EventBus::subscribe`]; unsubscribing is idempotent.
pub struct Subscription {
    bus: Weak<EventBus>,
    kind: EventKind,
    handler: EventHandler,
}

impl Subscription {
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn unsubscribe(&self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.off(self.kind, &self.handler);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::event::PongEvent;
    use parking_lot::Mutex;

    fn pong() -> ServerEvent {
        ServerEvent::Pong(PongEvent { r#ref: None })
    }

    #[test]
    fn test_dispatch_order_is_registration_order() {
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let seen = Arc::clone(&seen);
            bus.on(EventKind::Pong, Arc::new(move |_| seen.lock().push(i)));
        }

        bus.dispatch(&pong());
        assert_eq!(*seen.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn test_panicking_handler_does_not_stop_dispatch() {
        let bus = Arc::new(EventBus::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        {
            let seen = Arc::clone(&seen);
            bus.on(EventKind::Pong, Arc::new(move |_| seen.lock().push(1)));
        }
        bus.on(
            EventKind::Pong,
            Arc::new(|_| panic!("handler blew up")),
        );
        {
            let seen = Arc::clone(&seen);
            bus.on(EventKind::Pong, Arc::new(move |_| seen.lock().push(3)));
        }

        bus.dispatch(&pong());
        assert_eq!(*seen.lock(), vec![1, 3]);

        // Registry is intact afterwards
        bus.dispatch(&pong());
        assert_eq!(*seen.lock(), vec![1, 3, 1, 3]);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let bus = Arc::new(EventBus::new());
        let handler: EventHandler = Arc::new(|_| {});

        assert!(bus.on(EventKind::Pong, Arc::clone(&handler)));
        assert!(!bus.on(EventKind::Pong, Arc::clone(&handler)));
        assert_eq!(bus.handler_count(), 1);

        // Same handler may listen to a different event
        assert!(bus.on(EventKind::UploadError, handler));
        assert_eq!(bus.handler_count(), 2);
        assert_eq!(bus.subscription_count(), 2);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let bus = Arc::new(EventBus::new());
        let count = Arc::new(Mutex::new(0));

        let sub = {
            let count = Arc::clone(&count);
            bus.subscribe(
                EventKind::Pong,
                Arc::new(move |_| *count.lock() += 1),
            )
        };

        assert_eq!(sub.kind(), EventKind::Pong);

        bus.dispatch(&pong());
        sub.unsubscribe();
        sub.unsubscribe();
        bus.dispatch(&pong());

        assert_eq!(*count.lock(), 1);
        assert_eq!(bus.handler_count(), 0);
        assert_eq!(bus.subscription_count(), 0);
    }

    #[test]
    fn test_off_removes_by_identity() {
        let bus = Arc::new(EventBus::new());
        let a: EventHandler = Arc::new(|_| {});
        let b: EventHandler = Arc::new(|_| {});

        bus.on(EventKind::Pong, Arc::clone(&a));
        bus.on(EventKind::Pong, Arc::clone(&b));

        assert!(bus.off(EventKind::Pong, &a));
        assert!(!bus.off(EventKind::Pong, &a));
        assert_eq!(bus.handler_count(), 1);
    }
}
