//! Capability interface to the mesh transport.
//!
//! The runtime only consumes a transport through [`MeshTransport`]. Every
//! method is blocking; the runtime always calls the non-trivial ones through
//! the [`crate::bridge::WorkerPool`].

use std::fmt;
use std::sync::Arc;

use bottastic_types::error::TransportError;
use bottastic_types::event::ConnectionId;
use bottastic_types::node::{Destination, NodeNum, NodeRecord, UserInfo};
use bottastic_types::send::SendOptions;

/// Blocking interface to one attachment to the mesh.
///
/// Implementations raise their connection and packet events on a
/// [`crate::event::NotificationBus`], tagged with [`MeshTransport::connection_id`].
pub trait MeshTransport: Send + Sync + 'static {
    /// Identity used to tag this connection's events.
    fn connection_id(&self) -> ConnectionId;

    /// Queue a payload for transmission. Returns once the transport accepted
    /// it; `options.on_response` may fire later from the transport's thread.
    fn send_data(
        &self,
        payload: Vec<u8>,
        destination: Destination,
        options: SendOptions,
    ) -> Result<(), TransportError>;

    /// Directory entry for the locally attached node.
    fn my_node_info(&self) -> Result<NodeRecord, TransportError>;

    /// User record of the locally attached node.
    fn my_user(&self) -> Result<UserInfo, TransportError>;

    /// Live directory lookup. `None` when the node has not been heard yet.
    fn node(&self, num: NodeNum) -> Option<NodeRecord>;

    /// Release the connection.
    fn close(&self) -> Result<(), TransportError>;
}

/// Shared handle to a transport.
///
/// Several bots may hold the same connection. Two handles are equal when
/// they refer to the same connection id.
#[derive(Clone)]
pub struct Connection {
    id: ConnectionId,
    transport: Arc<dyn MeshTransport>,
}

impl Connection {
    pub fn new(transport: Arc<dyn MeshTransport>) -> Self {
        Self {
            id: transport.connection_id(),
            transport,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn transport(&self) -> &Arc<dyn MeshTransport> {
        &self.transport
    }
}

impl<T: MeshTransport> From<Arc<T>> for Connection {
    fn from(transport: Arc<T>) -> Self {
        Self::new(transport)
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Connection {}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").field("id", &self.id).finish()
    }
}
