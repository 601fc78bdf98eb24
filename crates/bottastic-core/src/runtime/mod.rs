//! Per-bot runtime: extension trait, scheduler task, and the context handed
//! to handlers.
//!
//! - `bot` -- `Bot` trait with default no-op hooks
//! - `runner` -- `BotRuntime`, the long-lived task that owns a bot's scheduler
//! - `context` -- `BotContext`, the bot's view of its connection and identity
//! - `route` -- pure broadcast/direct classification of inbound packets
//! - `state` -- lifecycle state, echo flags, and cached self-identity

mod bot;
mod context;
pub(crate) mod entry;
mod route;
mod runner;
mod state;

pub use bot::Bot;
pub use context::BotContext;
pub use route::{Route, classify};
pub use runner::{BotOptions, BotRuntime};
pub use state::{BotState, EchoFlags, SelfIdentity};
