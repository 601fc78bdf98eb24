//! Routes transport events to the bot bound to each connection.
//!
//! The registry holds the live bots and the connections that signalled
//! readiness before any of their bots had a running scheduler. Both sets sit
//! behind one mutex; every decision about a connection event is made while
//! holding it, so a connection is never both pending and routed.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bottastic_types::error::RuntimeError;
use bottastic_types::event::{ConnectionId, MeshEvent};
use bottastic_types::packet::MeshPacket;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::event::{NotificationBus, SubscriptionId};
use crate::runtime::BotState;
use crate::runtime::entry::BotEntry;

#[derive(Default)]
struct RegistryState {
    /// Registration order; the first match wins.
    bots: Vec<Arc<BotEntry>>,
    pending: HashSet<ConnectionId>,
}

/// Table of live bots, keyed by the connection they are bound to.
///
/// Created once at startup and shared by cloning. Independent registries do
/// not see each other's bots.
#[derive(Clone, Default)]
pub struct DispatchRegistry {
    inner: Arc<Mutex<RegistryState>>,
}

impl DispatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe this registry to a notification bus.
    pub fn attach(&self, bus: &NotificationBus) -> SubscriptionId {
        let registry = self.clone();
        bus.subscribe(move |event| registry.dispatch(event))
    }

    /// Route one transport event.
    pub fn dispatch(&self, event: &MeshEvent) {
        match event {
            MeshEvent::ConnectionEstablished { connection } => {
                self.on_connection_established(*connection)
            }
            MeshEvent::PacketReceived { packet, connection } => {
                self.on_packet_received(packet, *connection)
            }
        }
    }

    /// Start the connect sequence of the first running bot on `connection`,
    /// or remember the connection until a bot's scheduler claims it.
    pub fn on_connection_established(&self, connection: ConnectionId) {
        let mut state = self.lock();
        let running = state
            .bots
            .iter()
            .find(|bot| bot.connection.id() == connection && bot.scheduler_started())
            .cloned();

        match running {
            Some(bot) => {
                drop(state);
                debug!(bot = %bot.name, %connection, "routing connection event");
                if let Err(err) = bot.notify_connected() {
                    error!(bot = %bot.name, %connection, "failed to route connection event: {err}");
                }
            }
            None => {
                debug!(%connection, "no running bot for connection; deferring");
                state.pending.insert(connection);
            }
        }
    }

    /// Hand a packet to the first bot bound to `connection`.
    ///
    /// Packets for connections with no bot are dropped.
    pub fn on_packet_received(&self, packet: &MeshPacket, connection: ConnectionId) {
        let bot = self
            .lock()
            .bots
            .iter()
            .find(|bot| bot.connection.id() == connection)
            .cloned();

        match bot {
            Some(bot) => bot.deliver_packet(packet),
            None => debug!(%connection, from = %packet.from, "no bot for packet; dropping"),
        }
    }

    pub fn is_pending(&self, connection: ConnectionId) -> bool {
        self.lock().pending.contains(&connection)
    }

    pub fn registered_count(&self) -> usize {
        self.lock().bots.len()
    }

    pub(crate) fn register(&self, entry: Arc<BotEntry>) {
        let mut state = self.lock();
        if state.bots.iter().any(|bot| bot.id == entry.id) {
            warn!(bot = %entry.name, "bot already registered");
            return;
        }
        entry.advance(BotState::Registered);
        debug!(bot = %entry.name, connection = %entry.connection.id(), "bot registered");
        state.bots.push(entry);
    }

    /// Remove a bot. Returns `true` if it was registered.
    pub(crate) fn deregister(&self, id: Uuid) -> bool {
        let mut state = self.lock();
        let Some(index) = state.bots.iter().position(|bot| bot.id == id) else {
            return false;
        };
        let entry = state.bots.remove(index);
        let connection = entry.connection.id();
        if !state.bots.iter().any(|bot| bot.connection.id() == connection) {
            state.pending.remove(&connection);
        }
        true
    }

    /// Mark a bot's scheduler as running.
    ///
    /// Returns `true` when its connection was pending, in which case the
    /// caller runs the connect sequence itself.
    pub(crate) fn claim_scheduler(&self, entry: &Arc<BotEntry>) -> Result<bool, RuntimeError> {
        let mut state = self.lock();
        if !state.bots.iter().any(|bot| Arc::ptr_eq(bot, entry)) {
            return Err(RuntimeError::Closed);
        }
        if !entry.mark_scheduler_started() {
            return Err(RuntimeError::AlreadyRunning);
        }
        entry.advance(BotState::AwaitingConnection);
        Ok(state.pending.remove(&entry.connection.id()))
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for DispatchRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("DispatchRegistry")
            .field("bots", &state.bots.len())
            .field("pending", &state.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::WorkerPool;
    use crate::runtime::EchoFlags;
    use crate::testing::RecordingTransport;
    use crate::transport::{Connection, MeshTransport};
    use bottastic_types::node::NodeNum;

    fn entry(transport: &Arc<RecordingTransport>) -> Arc<BotEntry> {
        let (entry, _rx) = BotEntry::new(
            "test".into(),
            Connection::from(Arc::clone(transport)),
            EchoFlags::default(),
            WorkerPool::new(1),
        );
        entry
    }

    #[test]
    fn register_sets_state_and_counts() {
        let registry = DispatchRegistry::new();
        let transport = Arc::new(RecordingTransport::new(NodeNum(1)));
        let bot = entry(&transport);

        registry.register(Arc::clone(&bot));
        registry.register(Arc::clone(&bot));

        assert_eq!(registry.registered_count(), 1);
        assert_eq!(bot.state(), BotState::Registered);
        assert!(registry.deregister(bot.id));
        assert!(!registry.deregister(bot.id));
    }

    #[test]
    fn early_connection_is_pending_until_claimed() {
        let registry = DispatchRegistry::new();
        let transport = Arc::new(RecordingTransport::new(NodeNum(1)));
        let bot = entry(&transport);
        registry.register(Arc::clone(&bot));

        registry.on_connection_established(transport.connection_id());
        assert!(registry.is_pending(transport.connection_id()));

        assert!(registry.claim_scheduler(&bot).unwrap());
        assert!(!registry.is_pending(transport.connection_id()));
        assert_eq!(bot.state(), BotState::AwaitingConnection);
    }

    #[test]
    fn claim_without_pending_connection() {
        let registry = DispatchRegistry::new();
        let transport = Arc::new(RecordingTransport::new(NodeNum(1)));
        let bot = entry(&transport);
        registry.register(Arc::clone(&bot));

        assert!(!registry.claim_scheduler(&bot).unwrap());
        assert!(matches!(
            registry.claim_scheduler(&bot),
            Err(RuntimeError::AlreadyRunning)
        ));
    }

    #[test]
    fn connection_with_running_scheduler_is_never_pending() {
        let registry = DispatchRegistry::new();
        let transport = Arc::new(RecordingTransport::new(NodeNum(1)));
        let bot = entry(&transport);
        registry.register(Arc::clone(&bot));
        registry.claim_scheduler(&bot).unwrap();

        registry.on_connection_established(transport.connection_id());
        assert!(!registry.is_pending(transport.connection_id()));
    }

    #[test]
    fn unregistered_bot_cannot_claim_scheduler() {
        let registry = DispatchRegistry::new();
        let transport = Arc::new(RecordingTransport::new(NodeNum(1)));
        let bot = entry(&transport);

        assert!(matches!(
            registry.claim_scheduler(&bot),
            Err(RuntimeError::Closed)
        ));
    }

    #[test]
    fn registries_are_independent() {
        let a = DispatchRegistry::new();
        let b = DispatchRegistry::new();
        let transport = Arc::new(RecordingTransport::new(NodeNum(1)));
        a.register(entry(&transport));

        b.on_connection_established(transport.connection_id());
        assert_eq!(a.registered_count(), 1);
        assert_eq!(b.registered_count(), 0);
        assert!(b.is_pending(transport.connection_id()));
        assert!(!a.is_pending(transport.connection_id()));
    }

    #[test]
    fn deregistering_last_bot_clears_pending_connection() {
        let registry = DispatchRegistry::new();
        let transport = Arc::new(RecordingTransport::new(NodeNum(1)));
        let bot = entry(&transport);
        registry.register(Arc::clone(&bot));
        registry.on_connection_established(transport.connection_id());

        registry.deregister(bot.id);
        assert!(!registry.is_pending(transport.connection_id()));
    }

    #[test]
    fn packets_for_unknown_connection_are_dropped() {
        let registry = DispatchRegistry::new();
        registry.on_packet_received(
            &MeshPacket::text(NodeNum(2), NodeNum::BROADCAST, "hi"),
            ConnectionId::new(),
        );
        assert_eq!(registry.registered_count(), 0);
    }

    #[test]
    fn attach_routes_bus_events() {
        let registry = DispatchRegistry::new();
        let bus = NotificationBus::new();
        let transport = Arc::new(RecordingTransport::new(NodeNum(1)));
        registry.register(entry(&transport));

        let sub = registry.attach(&bus);
        let delivered = bus.publish(&MeshEvent::ConnectionEstablished {
            connection: transport.connection_id(),
        });

        assert_eq!(delivered, 1);
        assert!(registry.is_pending(transport.connection_id()));
        assert!(bus.unsubscribe(sub));
    }
}
