//! In-process simulated mesh.
//!
//! A [`SimMesh`] is a shared medium that any number of [`SimRadio`]s attach
//! to. Every radio sees the same node directory. Transmissions and connect
//! notifications are carried by a dedicated "air" thread, so events reach
//! each radio's [`NotificationBus`] from a thread the runtime does not own,
//! the same way a device transport would raise them.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bottastic_core::event::NotificationBus;
use bottastic_core::transport::MeshTransport;
use bottastic_types::error::TransportError;
use bottastic_types::event::{ConnectionId, MeshEvent};
use bottastic_types::node::{Destination, NodeNum, NodeRecord, PublicKey, UserInfo};
use bottastic_types::packet::{MeshPacket, PacketKind, PortNum};
use bottastic_types::send::{ResponseCallback, SendOptions};
use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, error, trace};

/// A node taking part in the simulation.
#[derive(Debug, Clone)]
pub struct SimNode {
    pub num: NodeNum,
    pub long_name: String,
    pub short_name: String,
    pub public_key: Option<Vec<u8>>,
}

impl SimNode {
    pub fn new(num: NodeNum, long_name: impl Into<String>) -> Self {
        let long_name = long_name.into();
        let short_name = long_name.chars().take(4).collect();
        Self {
            num,
            long_name,
            short_name,
            public_key: None,
        }
    }

    pub fn with_public_key(mut self, key: Vec<u8>) -> Self {
        self.public_key = Some(key);
        self
    }

    fn record(&self) -> NodeRecord {
        let mut record = NodeRecord::new(
            self.num,
            Some(UserInfo {
                id: self.num.to_node_id(),
                long_name: self.long_name.clone(),
                short_name: self.short_name.clone(),
                public_key: self.public_key.as_ref().map(|key| STANDARD.encode(key)),
            }),
        );
        record.last_heard = Some(Utc::now());
        record
    }
}

enum AirFrame {
    Connected(NodeNum),
    Transmit {
        packet: MeshPacket,
        encrypted_for: Option<PublicKey>,
        on_response: Option<ResponseCallback>,
    },
}

#[derive(Clone)]
struct RadioSlot {
    connection: ConnectionId,
    bus: NotificationBus,
    key: Option<Vec<u8>>,
}

#[derive(Default)]
struct Medium {
    radios: DashMap<NodeNum, RadioSlot>,
    directory: DashMap<NodeNum, NodeRecord>,
}

/// Handle to a simulated mesh. Clones share the same medium.
#[derive(Clone)]
pub struct SimMesh {
    medium: Arc<Medium>,
    air: mpsc::Sender<AirFrame>,
}

impl SimMesh {
    /// Create an empty mesh and start its air thread.
    ///
    /// The thread exits once the mesh and every radio on it are dropped.
    pub fn new() -> std::io::Result<Self> {
        let medium = Arc::new(Medium::default());
        let (air, frames) = mpsc::channel();
        let carrier = Arc::clone(&medium);
        thread::Builder::new()
            .name("bottastic-sim-air".into())
            .spawn(move || run_air(carrier, frames))?;
        Ok(Self { medium, air })
    }

    /// Put `node` on the air, raising its events on `bus`.
    pub fn attach(&self, node: SimNode, bus: &NotificationBus) -> Arc<SimRadio> {
        let connection = ConnectionId::new();
        self.add_node(&node);
        self.medium.radios.insert(
            node.num,
            RadioSlot {
                connection,
                bus: bus.clone(),
                key: node.public_key.clone(),
            },
        );
        debug!(node = %node.num, %connection, "radio attached to simulated mesh");
        Arc::new(SimRadio {
            num: node.num,
            connection,
            mesh: self.clone(),
        })
    }

    /// Add a directory entry for a node that is heard but has no radio here.
    pub fn add_node(&self, node: &SimNode) {
        self.medium.directory.insert(node.num, node.record());
    }

    /// Put a raw packet on the air, as if some node had sent it.
    pub fn inject(&self, packet: MeshPacket) -> Result<(), TransportError> {
        self.transmit(AirFrame::Transmit {
            packet,
            encrypted_for: None,
            on_response: None,
        })
    }

    /// Directory snapshot, ordered by node number.
    pub fn nodes(&self) -> Vec<NodeRecord> {
        let mut nodes: Vec<NodeRecord> = self
            .medium
            .directory
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        nodes.sort_by_key(|record| record.num);
        nodes
    }

    fn transmit(&self, frame: AirFrame) -> Result<(), TransportError> {
        self.air.send(frame).map_err(|_| TransportError::Closed)
    }
}

impl std::fmt::Debug for SimMesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimMesh")
            .field("radios", &self.medium.radios.len())
            .field("nodes", &self.medium.directory.len())
            .finish()
    }
}

/// One node's attachment to a [`SimMesh`].
pub struct SimRadio {
    num: NodeNum,
    connection: ConnectionId,
    mesh: SimMesh,
}

impl SimRadio {
    pub fn num(&self) -> NodeNum {
        self.num
    }

    /// Raise the connection-established event from the air thread.
    pub fn connect(&self) -> Result<(), TransportError> {
        self.ensure_attached()?;
        self.mesh.transmit(AirFrame::Connected(self.num))
    }

    fn ensure_attached(&self) -> Result<(), TransportError> {
        match self.mesh.medium.radios.get(&self.num) {
            Some(slot) if slot.connection == self.connection => Ok(()),
            _ => Err(TransportError::Closed),
        }
    }
}

impl MeshTransport for SimRadio {
    fn connection_id(&self) -> ConnectionId {
        self.connection
    }

    fn send_data(
        &self,
        payload: Vec<u8>,
        destination: Destination,
        options: SendOptions,
    ) -> Result<(), TransportError> {
        self.ensure_attached()?;
        let encrypted_for = match (options.pki_encrypted, options.public_key) {
            (true, Some(key)) => Some(key),
            (true, None) => {
                return Err(TransportError::Rejected(
                    "PKI send without a public key".into(),
                ));
            }
            (false, _) => None,
        };

        let mut packet = MeshPacket::new(
            self.num,
            destination.num(),
            PacketKind::decode(options.port, payload),
        );
        packet.from_id = Some(self.num.to_node_id());

        // Only ask the air thread for an ack when the sender wants one.
        let on_response = options.on_response.filter(|_| options.want_ack);
        self.mesh.transmit(AirFrame::Transmit {
            packet,
            encrypted_for,
            on_response,
        })
    }

    fn my_node_info(&self) -> Result<NodeRecord, TransportError> {
        self.ensure_attached()?;
        self.mesh
            .medium
            .directory
            .get(&self.num)
            .map(|record| record.value().clone())
            .ok_or(TransportError::NotConnected)
    }

    fn my_user(&self) -> Result<UserInfo, TransportError> {
        self.my_node_info()?
            .user
            .ok_or(TransportError::NotConnected)
    }

    fn node(&self, num: NodeNum) -> Option<NodeRecord> {
        self.mesh
            .medium
            .directory
            .get(&num)
            .map(|record| record.value().clone())
    }

    fn close(&self) -> Result<(), TransportError> {
        let removed = self
            .mesh
            .medium
            .radios
            .remove_if(&self.num, |_, slot| slot.connection == self.connection);
        if removed.is_some() {
            debug!(node = %self.num, "radio detached from simulated mesh");
        }
        Ok(())
    }
}

fn run_air(medium: Arc<Medium>, frames: mpsc::Receiver<AirFrame>) {
    while let Ok(frame) = frames.recv() {
        match frame {
            AirFrame::Connected(num) => {
                let slot = medium.radios.get(&num).map(|slot| slot.value().clone());
                if let Some(slot) = slot {
                    slot.bus.publish(&MeshEvent::ConnectionEstablished {
                        connection: slot.connection,
                    });
                }
            }
            AirFrame::Transmit {
                packet,
                encrypted_for,
                on_response,
            } => deliver(&medium, packet, encrypted_for, on_response),
        }
    }
    debug!("simulated mesh air thread stopped");
}

fn deliver(
    medium: &Medium,
    packet: MeshPacket,
    encrypted_for: Option<PublicKey>,
    on_response: Option<ResponseCallback>,
) {
    if let Some(mut sender) = medium.directory.get_mut(&packet.from) {
        sender.last_heard = Some(packet.rx_time);
    }

    // Snapshot receivers so no map shard is locked while listeners run.
    let receivers: Vec<(NodeNum, RadioSlot)> = medium
        .radios
        .iter()
        .filter(|slot| {
            let num = *slot.key();
            num != packet.from && (packet.to.is_broadcast() || num == packet.to)
        })
        .map(|slot| (*slot.key(), slot.value().clone()))
        .collect();

    trace!(from = %packet.from, to = %packet.to, receivers = receivers.len(), "delivering packet");

    for (_, slot) in &receivers {
        let mut copy = packet.clone();
        if let Some(key) = &encrypted_for {
            if slot.key.as_deref() != Some(key.as_bytes()) {
                copy.kind = PacketKind::Encrypted;
            }
        }
        slot.bus.publish(&MeshEvent::PacketReceived {
            packet: copy,
            connection: slot.connection,
        });
    }

    let Some(callback) = on_response else {
        return;
    };
    let Some((acker, _)) = receivers.first() else {
        debug!(to = %packet.to, "no receiver for packet; no ack");
        return;
    };
    let ack = MeshPacket::new(
        *acker,
        packet.from,
        PacketKind::Data {
            port: PortNum::Routing,
            payload: Vec::new(),
        },
    );
    if panic::catch_unwind(AssertUnwindSafe(|| callback(ack))).is_err() {
        error!(from = %packet.from, "response callback panicked");
    }
}
