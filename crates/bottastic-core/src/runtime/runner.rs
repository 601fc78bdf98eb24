//! `BotRuntime`: the long-lived task that owns one bot's scheduler.
//!
//! The registry only ever pushes commands onto the bot's mailbox; this task
//! drains it. Every bot gets its own OS thread running a current-thread
//! runtime and a `LocalSet`. The connect sequence runs inline (so nothing is
//! routed while it is in progress) and each message handler is spawned onto
//! that `LocalSet`, in arrival order. One bot's hooks therefore never run on
//! more than one thread, whatever runtime started it.

use std::sync::Arc;
use std::thread;

use bottastic_types::config::RuntimeConfig;
use bottastic_types::error::RuntimeError;
use bottastic_types::node::NodeNum;
use tokio::sync::{mpsc, oneshot};
use tokio::task::LocalSet;
use tracing::{Instrument, debug, error, info, info_span};

use super::bot::Bot;
use super::context::BotContext;
use super::entry::{BotCommand, BotEntry};
use super::route::Route;
use super::state::{BotState, EchoFlags, SelfIdentity};
use crate::bridge::WorkerPool;
use crate::registry::DispatchRegistry;
use crate::transport::Connection;

/// Construction options for a [`BotRuntime`].
#[derive(Debug, Clone, Default)]
pub struct BotOptions {
    pub echo: EchoFlags,
    /// Worker pool for blocking calls; the shared pool when `None`.
    pub pool: Option<WorkerPool>,
    /// Log name; [`Bot::name`] when `None`.
    pub name: Option<String>,
}

impl BotOptions {
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            echo: EchoFlags::from(config),
            ..Self::default()
        }
    }

    pub fn with_echo(mut self, echo: EchoFlags) -> Self {
        self.echo = echo;
        self
    }

    pub fn with_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A bot bound to a connection and registered for dispatch.
///
/// Constructing the runtime registers it; [`BotRuntime::run`] starts its
/// scheduler. Keep a [`BotRuntime::handle`] to close it from outside.
pub struct BotRuntime<B: Bot> {
    bot: Arc<B>,
    ctx: BotContext,
    mailbox: mpsc::UnboundedReceiver<BotCommand>,
}

impl<B: Bot> BotRuntime<B> {
    pub fn new(
        bot: B,
        connection: Connection,
        registry: &DispatchRegistry,
        options: BotOptions,
    ) -> Self {
        let name = options.name.unwrap_or_else(|| bot.name().to_string());
        let pool = options.pool.unwrap_or_else(WorkerPool::shared);
        let (entry, mailbox) = BotEntry::new(name, connection, options.echo, pool);
        registry.register(Arc::clone(&entry));

        Self {
            bot: Arc::new(bot),
            ctx: BotContext {
                entry,
                registry: registry.clone(),
            },
            mailbox,
        }
    }

    pub fn handle(&self) -> BotContext {
        self.ctx.clone()
    }

    pub fn bot(&self) -> &Arc<B> {
        &self.bot
    }

    /// Run the bot until it is closed.
    ///
    /// The scheduler runs on a dedicated thread (see
    /// [`BotRuntime::spawn_dedicated`]); this future only waits for it, so it
    /// can be spawned on any runtime. If the connection came up before this
    /// call, the connect sequence runs immediately.
    pub async fn run(self) -> Result<(), RuntimeError> {
        let (done, finished) = oneshot::channel();
        thread::Builder::new()
            .name(format!("bot-{}", self.ctx.name()))
            .spawn(move || {
                let _ = done.send(self.run_forever());
            })?;
        // A dropped sender means the scheduler thread panicked.
        finished.await.map_err(|_| RuntimeError::Closed)?
    }

    /// Run the bot on a fresh single-threaded scheduler, blocking the
    /// calling thread until the bot is closed.
    ///
    /// Must not be called from inside an async context.
    pub fn run_forever(self) -> Result<(), RuntimeError> {
        let scheduler = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        LocalSet::new().block_on(&scheduler, self.drive())
    }

    /// [`BotRuntime::run_forever`] on a dedicated OS thread.
    pub fn spawn_dedicated(self) -> std::io::Result<thread::JoinHandle<Result<(), RuntimeError>>> {
        thread::Builder::new()
            .name(format!("bot-{}", self.ctx.name()))
            .spawn(move || self.run_forever())
    }

    /// The scheduler loop. Must be polled inside a `LocalSet`.
    async fn drive(self) -> Result<(), RuntimeError> {
        let Self {
            bot,
            ctx,
            mut mailbox,
        } = self;

        let claimed_pending = ctx.registry.claim_scheduler(&ctx.entry)?;
        let span = info_span!("bot", bot = %ctx.name(), connection = %ctx.connection().id());

        async move {
            info!(pending_connection = claimed_pending, "bot scheduler started");
            if claimed_pending {
                connect(&bot, &ctx).await;
            }

            loop {
                tokio::select! {
                    biased;
                    () = ctx.entry.shutdown.cancelled() => break,
                    command = mailbox.recv() => match command {
                        Some(BotCommand::Connect) => connect(&bot, &ctx).await,
                        Some(BotCommand::Message { route, from, text }) => {
                            spawn_handler(&bot, &ctx, route, from, text);
                        }
                        None => break,
                    },
                }
            }

            info!("bot scheduler stopped");
            Ok::<(), RuntimeError>(())
        }
        .instrument(span)
        .await
    }
}

/// Fetch self-identity, then run `on_initialized`, then open the bot for
/// routing. Runs at most once successfully per bot.
async fn connect<B: Bot>(bot: &Arc<B>, ctx: &BotContext) {
    let entry = &ctx.entry;
    if !entry.try_claim_connect() {
        debug!("connect sequence already ran; ignoring");
        return;
    }

    let identity = match fetch_identity(ctx).await {
        Ok(identity) => identity,
        Err(err) => {
            error!("failed to fetch own node info: {err}");
            entry.release_connect();
            return;
        }
    };
    info!(node = %identity.node.num, user = %identity.user.id, "connected to mesh");
    entry.set_identity(identity);

    if let Err(err) = bot.on_initialized(ctx).await {
        error!("on_initialized failed: {err:#}");
    }

    entry.mark_ready();
    if entry.state() == BotState::Ready {
        info!("bot ready");
    }
}

async fn fetch_identity(ctx: &BotContext) -> Result<SelfIdentity, RuntimeError> {
    let transport = Arc::clone(ctx.connection().transport());
    let node = {
        let transport = Arc::clone(&transport);
        ctx.pool()
            .run_transport::<_, _, RuntimeError>(move || transport.my_node_info())
            .await?
    };
    let user = ctx
        .pool()
        .run_transport::<_, _, RuntimeError>(move || transport.my_user())
        .await?;
    Ok(SelfIdentity { node, user })
}

fn spawn_handler<B: Bot>(bot: &Arc<B>, ctx: &BotContext, route: Route, from: NodeNum, text: String) {
    let bot = Arc::clone(bot);
    let ctx = ctx.clone();
    tokio::task::spawn_local(
        async move {
            let node = ctx.node(from);
            let result = match route {
                Route::Broadcast => bot.handle_broadcast_message(&ctx, node, text).await,
                Route::Direct => bot.handle_direct_message(&ctx, node, text).await,
            };
            if let Err(err) = result {
                error!(?route, %from, "message handler failed: {err:#}");
            }
        }
        .in_current_span(),
    );
}
