//! The bot's handle on its connection, identity, and lifecycle.

use std::sync::Arc;

use bottastic_types::error::{RuntimeError, SendError};
use bottastic_types::node::NodeNum;
use tracing::info;
use uuid::Uuid;

use super::entry::BotEntry;
use super::state::{BotState, EchoFlags, SelfIdentity};
use crate::bridge::WorkerPool;
use crate::delivery::{self, TextMessage};
use crate::node::Node;
use crate::registry::DispatchRegistry;
use crate::transport::Connection;

/// Cheap, clonable handle passed to every bot hook.
///
/// Also returned by [`crate::runtime::BotRuntime::handle`] so code outside
/// the bot can watch its state or close it.
#[derive(Clone)]
pub struct BotContext {
    pub(crate) entry: Arc<BotEntry>,
    pub(crate) registry: DispatchRegistry,
}

impl BotContext {
    pub fn bot_id(&self) -> Uuid {
        self.entry.id
    }

    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn connection(&self) -> &Connection {
        &self.entry.connection
    }

    pub fn echo(&self) -> EchoFlags {
        self.entry.echo
    }

    pub fn state(&self) -> BotState {
        self.entry.state()
    }

    /// `true` once `on_initialized` has finished.
    pub fn is_ready(&self) -> bool {
        self.entry.is_ready()
    }

    /// Own node and user records; `None` until the connection is up.
    pub fn identity(&self) -> Option<&SelfIdentity> {
        self.entry.identity()
    }

    pub fn my_node_num(&self) -> Option<NodeNum> {
        self.identity().map(|identity| identity.node.num)
    }

    /// Handle for any node on this bot's connection.
    pub fn node(&self, num: NodeNum) -> Node {
        Node::new(self.clone(), num)
    }

    /// Broadcast a text message to the whole mesh.
    ///
    /// Broadcasts are never PKI-encrypted. With `want_response`, the
    /// transport is asked for an ack and delivery is echoed when both echo
    /// flags are on.
    pub async fn send(&self, text: &str, want_response: bool) -> Result<(), SendError> {
        delivery::send_text(
            self.connection(),
            self.pool(),
            self.echo(),
            TextMessage::broadcast(text, want_response),
        )
        .await
    }

    /// Deregister the bot, stop its scheduler, and close the connection.
    ///
    /// Closing twice is a no-op. Other bots sharing the connection lose it
    /// too.
    pub async fn close(&self) -> Result<(), RuntimeError> {
        if self.entry.advance(BotState::Closed) == BotState::Closed {
            return Ok(());
        }
        self.registry.deregister(self.entry.id);
        self.entry.shutdown.cancel();

        let transport = Arc::clone(self.connection().transport());
        self.pool()
            .run_transport::<_, _, RuntimeError>(move || transport.close())
            .await?;
        info!(bot = %self.name(), connection = %self.connection().id(), "bot closed");
        Ok(())
    }

    pub(crate) fn pool(&self) -> &WorkerPool {
        &self.entry.pool
    }
}

impl std::fmt::Debug for BotContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotContext")
            .field("bot", &self.entry.name)
            .field("connection", &self.entry.connection.id())
            .field("state", &self.state())
            .finish()
    }
}
