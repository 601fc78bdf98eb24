//! Bot dispatch runtime for Bottastic.
//!
//! Bridges a blocking, callback-driven mesh transport into per-bot
//! cooperative schedulers. A shared [`event::NotificationBus`] carries
//! connection and packet events from the transport's thread to the
//! [`registry::DispatchRegistry`], which hands each event to the bot bound to
//! that connection. Bots implement [`runtime::Bot`] and send through
//! [`runtime::BotContext`] and [`node::Node`]; every blocking transport call
//! runs on the [`bridge::WorkerPool`].
//!
//! This crate depends only on `bottastic-types` -- never on a concrete
//! transport.

pub mod bridge;
pub mod delivery;
pub mod event;
pub mod node;
pub mod registry;
pub mod runtime;
pub mod transport;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use bridge::WorkerPool;
pub use event::NotificationBus;
pub use node::Node;
pub use registry::DispatchRegistry;
pub use runtime::{Bot, BotContext, BotOptions, BotRuntime, BotState, EchoFlags};
pub use transport::{Connection, MeshTransport};
