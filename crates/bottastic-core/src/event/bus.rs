//! Publish/subscribe bus for `MeshEvent`.
//!
//! Transports publish from their own threads and expect the call to return
//! promptly. Listeners run inline on the publisher's thread, in subscription
//! order, so they must only do bookkeeping and hand real work elsewhere. A
//! panicking listener is logged and skipped; it never unwinds into the
//! transport.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use bottastic_types::event::MeshEvent;
use tracing::error;

type Listener = Arc<dyn Fn(&MeshEvent) + Send + Sync>;

/// Handle returned by [`NotificationBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Multi-listener bus for transport notifications.
///
/// Cloning the bus shares the listener list, allowing transports and the
/// registry wiring to hold their own handles.
#[derive(Clone, Default)]
pub struct NotificationBus {
    listeners: Arc<RwLock<Vec<(SubscriptionId, Listener)>>>,
    next_id: Arc<AtomicU64>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener for all future events.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&MeshEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns `true` if it was subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(sub, _)| *sub != id);
        listeners.len() != before
    }

    /// Deliver an event to every current listener.
    ///
    /// Returns the number of listeners that handled it without panicking.
    /// With no listeners the event is silently dropped.
    pub fn publish(&self, event: &MeshEvent) -> usize {
        // Snapshot so listeners may subscribe/unsubscribe while we iterate.
        let snapshot: Vec<(SubscriptionId, Listener)> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut delivered = 0;
        for (id, listener) in snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(()) => delivered += 1,
                Err(_) => error!(subscription = id.0, "notification listener panicked"),
            }
        }
        delivered
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl std::fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBus")
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bottastic_types::event::ConnectionId;
    use std::sync::Mutex;

    fn sample_event() -> MeshEvent {
        MeshEvent::ConnectionEstablished {
            connection: ConnectionId::new(),
        }
    }

    #[test]
    fn publish_reaches_every_listener_in_order() {
        let bus = NotificationBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = Arc::clone(&seen);
            bus.subscribe(move |_| seen.lock().unwrap().push(tag));
        }

        assert_eq!(bus.publish(&sample_event()), 2);
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn publish_with_no_listeners_does_not_panic() {
        let bus = NotificationBus::new();
        assert_eq!(bus.publish(&sample_event()), 0);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = NotificationBus::new();
        let id = bus.subscribe(|_| {});
        assert_eq!(bus.listener_count(), 1);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.publish(&sample_event()), 0);
    }

    #[test]
    fn panicking_listener_is_isolated() {
        let bus = NotificationBus::new();
        let reached = Arc::new(Mutex::new(false));

        bus.subscribe(|_| panic!("listener bug"));
        let flag = Arc::clone(&reached);
        bus.subscribe(move |_| *flag.lock().unwrap() = true);

        assert_eq!(bus.publish(&sample_event()), 1);
        assert!(*reached.lock().unwrap());
    }

    #[test]
    fn clone_shares_listeners() {
        let bus = NotificationBus::new();
        let bus2 = bus.clone();
        bus.subscribe(|_| {});

        assert_eq!(bus2.publish(&sample_event()), 1);
    }

    #[test]
    fn publish_from_foreign_thread() {
        let bus = NotificationBus::new();
        let seen = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&seen);
        bus.subscribe(move |_| *counter.lock().unwrap() += 1);

        let publisher = bus.clone();
        std::thread::spawn(move || publisher.publish(&sample_event()))
            .join()
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn debug_impl() {
        let bus = NotificationBus::new();
        let debug = format!("{bus:?}");
        assert!(debug.contains("NotificationBus"));
        assert!(debug.contains("listener_count"));
    }
}
