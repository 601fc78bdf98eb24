//! Extension trait implemented by concrete bots.

use std::future::Future;

use super::context::BotContext;
use crate::node::Node;

/// A mesh bot.
///
/// Every hook has a no-op default, so a bot overrides only what it needs.
/// Hooks run on the bot's own single-threaded scheduler; message handlers
/// for one bot start in the order their packets arrived. An `Err` from a hook is logged and
/// does not stop the bot.
///
/// ```ignore
/// struct Echo;
///
/// impl Bot for Echo {
///     async fn handle_direct_message(
///         &self,
///         _ctx: &BotContext,
///         from: Node,
///         text: String,
///     ) -> anyhow::Result<()> {
///         from.send(&text, true, false).await?;
///         Ok(())
///     }
/// }
/// ```
pub trait Bot: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Called once, after the bot's own node and user records are known and
    /// before any message is routed to it.
    fn on_initialized(&self, ctx: &BotContext) -> impl Future<Output = anyhow::Result<()>> + Send {
        let _ = ctx;
        async { Ok(()) }
    }

    /// A text message sent to every node.
    fn handle_broadcast_message(
        &self,
        ctx: &BotContext,
        from: Node,
        text: String,
    ) -> impl Future<Output = anyhow::Result<()>> + Send {
        let _ = (ctx, from, text);
        async { Ok(()) }
    }

    /// A text message addressed to this bot's node.
    fn handle_direct_message(
        &self,
        ctx: &BotContext,
        from: Node,
        text: String,
    ) -> impl Future<Output = anyhow::Result<()>> + Send {
        let _ = (ctx, from, text);
        async { Ok(()) }
    }
}
