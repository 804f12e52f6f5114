//! Synchronous event bus with channel subscriptions

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use super::event::{RegistryEvent, RegistryEventKind};
use crate::logging::Logger;

/// Callback registered for one event kind
pub type EventHandler = Arc<dyn Fn(&RegistryEvent) + Send + Sync>;

/// Handle returned by `add_event_listener`, used to unregister
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Pub/sub hub for registry events
///
/// Two delivery paths:
/// - listeners: called synchronously, in registration order, inside `emit`
/// - subscribers: receive every event on an unbounded channel and drain it
///   on their own schedule
pub struct EventBus {
    listeners: RwLock<HashMap<RegistryEventKind, Vec<(ListenerId, EventHandler)>>>,
    subscribers: Mutex<Vec<UnboundedSender<RegistryEvent>>>,
    next_id: AtomicU64,
    logger: Arc<dyn Logger>,
}

impl EventBus {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            logger,
        }
    }

    /// Register a handler for one event kind
    pub fn add_event_listener<F>(&self, kind: RegistryEventKind, handler: F) -> ListenerId
    where
        F: Fn(&RegistryEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Unregister a handler. Returns `false` if it was not registered.
    pub fn remove_event_listener(&self, kind: RegistryEventKind, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let Some(handlers) = listeners.get_mut(&kind) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        before != handlers.len()
    }

    /// Receive every event from now on over a channel
    pub fn subscribe(&self) -> UnboundedReceiver<RegistryEvent> {
        let (tx, rx) = unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Number of listeners registered for a kind
    pub fn listener_count(&self, kind: RegistryEventKind) -> usize {
        self.listeners.read().get(&kind).map_or(0, Vec::len)
    }

    /// Deliver an event to listeners, then to subscribers.
    ///
    /// Handlers run against a snapshot, so a handler may add or remove
    /// listeners. A panicking handler is logged and skipped.
    pub fn emit(&self, event: RegistryEvent) {
        let kind = event.kind();
        let handlers: Vec<EventHandler> = self
            .listeners
            .read()
            .get(&kind)
            .map(|hs| hs.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                self.logger.error(&format!(
                    "[EventBus] Listener for {} panicked on {}",
                    kind,
                    event.server_name()
                ));
            }
        }

        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Drop every listener and close every subscription
    pub fn clear(&self) {
        self.listeners.write().clear();
        self.subscribers.lock().clear();
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listener_kinds", &self.listeners.read().len())
            .field("subscribers", &self.subscribers.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoOpLogger;
    use crate::types::ServerStatus;

    fn bus() -> EventBus {
        EventBus::new(Arc::new(NoOpLogger))
    }

    fn stopped(name: &str) -> RegistryEvent {
        RegistryEvent::ServerStopped { server_name: name.to_string() }
    }

    #[test]
    fn test_listeners_run_in_registration_order() {
        let bus = bus();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            bus.add_event_listener(RegistryEventKind::ServerStopped, move |_| seen.lock().push(tag));
        }

        bus.emit(stopped("fs"));
        assert_eq!(*seen.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_only_matching_kind_is_delivered() {
        let bus = bus();
        let hits = Arc::new(AtomicU64::new(0));
        let h = Arc::clone(&hits);
        bus.add_event_listener(RegistryEventKind::ServerAdded, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(stopped("fs"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let bus = bus();
        let seen = Arc::new(Mutex::new(Vec::new()));

        bus.add_event_listener(RegistryEventKind::ServerStopped, |_| panic!("listener bug"));
        let s = Arc::clone(&seen);
        bus.add_event_listener(RegistryEventKind::ServerStopped, move |e| {
            s.lock().push(e.server_name().to_string())
        });

        bus.emit(stopped("fs"));
        bus.emit(stopped("git"));
        assert_eq!(*seen.lock(), vec!["fs", "git"]);
    }

    #[test]
    fn test_remove_listener() {
        let bus = bus();
        let hits = Arc::new(AtomicU64::new(0));
        let h = Arc::clone(&hits);
        let id = bus.add_event_listener(RegistryEventKind::ServerStopped, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(stopped("fs"));
        assert!(bus.remove_event_listener(RegistryEventKind::ServerStopped, id));
        assert!(!bus.remove_event_listener(RegistryEventKind::ServerStopped, id));
        bus.emit(stopped("fs"));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count(RegistryEventKind::ServerStopped), 0);
    }

    #[test]
    fn test_listener_may_register_during_dispatch() {
        let bus = Arc::new(bus());
        let inner = Arc::clone(&bus);
        bus.add_event_listener(RegistryEventKind::ServerStopped, move |_| {
            inner.add_event_listener(RegistryEventKind::ServerStopped, |_| {});
        });

        bus.emit(stopped("fs"));
        assert_eq!(bus.listener_count(RegistryEventKind::ServerStopped), 2);
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let bus = bus();
        let mut rx = bus.subscribe();

        bus.emit(RegistryEvent::status("fs", ServerStatus::Starting, None));
        bus.emit(RegistryEvent::status("fs", ServerStatus::Running, None));
        bus.emit(stopped("fs"));

        assert_eq!(rx.recv().await.unwrap().kind(), RegistryEventKind::ServerStatusChanged);
        assert!(matches!(
            rx.recv().await.unwrap(),
            RegistryEvent::ServerStatusChanged { status: ServerStatus::Running, .. }
        ));
        assert_eq!(rx.recv().await.unwrap().kind(), RegistryEventKind::ServerStopped);
    }

    #[tokio::test]
    async fn test_clear_closes_subscriptions() {
        let bus = bus();
        let mut rx = bus.subscribe();
        bus.add_event_listener(RegistryEventKind::ServerStopped, |_| {});

        bus.clear();
        assert_eq!(bus.listener_count(RegistryEventKind::ServerStopped), 0);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let bus = bus();
        drop(bus.subscribe());
        bus.emit(stopped("fs"));
        assert_eq!(bus.subscribers.lock().len(), 0);
    }
}
