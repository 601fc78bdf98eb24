//! Connection identity and the events a transport raises.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::packet::MeshPacket;

/// Identity of one attachment to the mesh transport.
///
/// Events are tagged with the id of the connection that produced them; the
/// dispatch registry matches bots to events by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Allocate a fresh, time-sortable connection id.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Notification raised by a transport on its own thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeshEvent {
    /// The connection finished its handshake and can be queried.
    ConnectionEstablished { connection: ConnectionId },
    /// A packet arrived on the connection.
    PacketReceived {
        packet: MeshPacket,
        connection: ConnectionId,
    },
}

impl MeshEvent {
    /// The connection this event originated from.
    pub fn connection(&self) -> ConnectionId {
        match self {
            Self::ConnectionEstablished { connection } => *connection,
            Self::PacketReceived { connection, .. } => *connection,
        }
    }
}
