//! Registry-side record of one bot.
//!
//! A `BotEntry` is shared between the dispatch registry (notification
//! domain) and the bot's own scheduler. Everything the notification domain
//! touches is lock-free or behind a short-lived mutex; real work is queued
//! on the bot's mailbox.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use bottastic_types::error::RuntimeError;
use bottastic_types::node::NodeNum;
use bottastic_types::packet::MeshPacket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::route::{Route, classify};
use super::state::{BotState, EchoFlags, SelfIdentity};
use crate::bridge::WorkerPool;
use crate::delivery::ECHO_TARGET;
use crate::transport::Connection;

/// Work handed from the notification domain to a bot's scheduler.
#[derive(Debug)]
pub(crate) enum BotCommand {
    /// Run the connect sequence.
    Connect,
    /// Dispatch a text message to a handler.
    Message {
        route: Route,
        from: NodeNum,
        text: String,
    },
}

pub(crate) struct BotEntry {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) connection: Connection,
    pub(crate) echo: EchoFlags,
    pub(crate) pool: WorkerPool,
    pub(crate) shutdown: CancellationToken,
    mailbox: mpsc::UnboundedSender<BotCommand>,
    scheduler_started: AtomicBool,
    connect_claimed: AtomicBool,
    ready: AtomicBool,
    identity: OnceLock<SelfIdentity>,
    state: Mutex<BotState>,
}

impl BotEntry {
    pub(crate) fn new(
        name: String,
        connection: Connection,
        echo: EchoFlags,
        pool: WorkerPool,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<BotCommand>) {
        let (mailbox, rx) = mpsc::unbounded_channel();
        let entry = Arc::new(Self {
            id: Uuid::now_v7(),
            name,
            connection,
            echo,
            pool,
            shutdown: CancellationToken::new(),
            mailbox,
            scheduler_started: AtomicBool::new(false),
            connect_claimed: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            identity: OnceLock::new(),
            state: Mutex::new(BotState::Constructed),
        });
        (entry, rx)
    }

    pub(crate) fn state(&self) -> BotState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `next` unless the bot is already closed. Returns the previous
    /// state.
    pub(crate) fn advance(&self, next: BotState) -> BotState {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = *state;
        if previous != BotState::Closed {
            *state = next;
        }
        previous
    }

    pub(crate) fn scheduler_started(&self) -> bool {
        self.scheduler_started.load(Ordering::Acquire)
    }

    /// Mark the scheduler as running. Returns `false` if it already was.
    ///
    /// Only called by the registry while it holds its lock.
    pub(crate) fn mark_scheduler_started(&self) -> bool {
        !self.scheduler_started.swap(true, Ordering::AcqRel)
    }

    /// Claim the one-shot connect sequence.
    pub(crate) fn try_claim_connect(&self) -> bool {
        !self.connect_claimed.swap(true, Ordering::AcqRel)
    }

    /// Give the connect claim back after a failed attempt so a later
    /// connection event can retry.
    pub(crate) fn release_connect(&self) {
        self.connect_claimed.store(false, Ordering::Release);
    }

    pub(crate) fn set_identity(&self, identity: SelfIdentity) {
        if self.identity.set(identity).is_err() {
            debug!(bot = %self.name, "self identity already set");
        }
    }

    pub(crate) fn identity(&self) -> Option<&SelfIdentity> {
        self.identity.get()
    }

    pub(crate) fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
        self.advance(BotState::Ready);
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Queue the connect sequence on the bot's scheduler.
    pub(crate) fn notify_connected(&self) -> Result<(), RuntimeError> {
        if !self.scheduler_started() {
            return Err(RuntimeError::SchedulerNotReady);
        }
        self.mailbox
            .send(BotCommand::Connect)
            .map_err(|_| RuntimeError::Closed)
    }

    /// Filter, classify, and queue an inbound packet.
    ///
    /// Runs in the notification domain. Packets that are not this bot's
    /// concern are dropped without error.
    pub(crate) fn deliver_packet(&self, packet: &MeshPacket) {
        if !self.scheduler_started() {
            debug!(bot = %self.name, "dropping packet: scheduler not started");
            return;
        }
        let Some(identity) = self.is_ready().then(|| self.identity()).flatten() else {
            debug!(bot = %self.name, "dropping packet: bot not initialized");
            return;
        };
        let Some(text) = packet.text_payload() else {
            debug!(bot = %self.name, from = %packet.from, "dropping non-text packet");
            return;
        };
        let Some(route) = classify(packet.to, identity.node.num) else {
            debug!(bot = %self.name, to = %packet.to, "dropping packet for another node");
            return;
        };

        if self.echo.received {
            match route {
                Route::Broadcast => {
                    info!(target: ECHO_TARGET, "Message from {}: {}", packet.sender_label(), text)
                }
                Route::Direct => {
                    info!(target: ECHO_TARGET, "Direct message from {}: {}", packet.sender_label(), text)
                }
            }
        }

        let command = BotCommand::Message {
            route,
            from: packet.from,
            text: text.to_owned(),
        };
        if self.mailbox.send(command).is_err() {
            debug!(bot = %self.name, "dropping packet: scheduler stopped");
        }
    }
}

impl std::fmt::Debug for BotEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotEntry")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("connection", &self.connection.id())
            .field("state", &self.state())
            .finish()
    }
}
