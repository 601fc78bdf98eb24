//! Built-in bot catalog for runtime lookup by name.

use std::collections::BTreeMap;

use bottastic_core::{Bot, BotContext, BotOptions, BotRuntime, Connection, DispatchRegistry};
use bottastic_types::error::RuntimeError;
use tokio::task::JoinHandle;

use crate::bots::PingPongBot;

/// A bot whose scheduler is running on its own thread.
///
/// `task` lives on the caller's runtime and resolves once the bot stops.
pub struct LaunchedBot {
    pub handle: BotContext,
    pub task: JoinHandle<Result<(), RuntimeError>>,
}

type LaunchFn = fn(Connection, &DispatchRegistry, BotOptions) -> LaunchedBot;

pub struct CatalogEntry {
    pub name: &'static str,
    pub description: &'static str,
    launch: LaunchFn,
}

impl CatalogEntry {
    /// Register the bot on `connection` and start its scheduler.
    pub fn launch(
        &self,
        connection: Connection,
        registry: &DispatchRegistry,
        options: BotOptions,
    ) -> LaunchedBot {
        (self.launch)(connection, registry, options.with_name(self.name))
    }
}

fn launch<B: Bot + Default>(
    connection: Connection,
    registry: &DispatchRegistry,
    options: BotOptions,
) -> LaunchedBot {
    let runtime = BotRuntime::new(B::default(), connection, registry, options);
    let handle = runtime.handle();
    let task = tokio::spawn(runtime.run());
    LaunchedBot { handle, task }
}

/// Bots selectable by name, indexed case-insensitively.
pub struct BotCatalog {
    entries: BTreeMap<String, CatalogEntry>,
}

impl BotCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// The bots shipped with this binary.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register(CatalogEntry {
            name: "ping-pong",
            description: "Answers \"ping\" with \"pong!\", by broadcast or encrypted direct reply",
            launch: launch::<PingPongBot>,
        });
        catalog
    }

    /// Register a bot. An entry with the same name is replaced.
    pub fn register(&mut self, entry: CatalogEntry) {
        self.entries.insert(entry.name.to_ascii_lowercase(), entry);
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.get(&name.to_ascii_lowercase())
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries().map(|entry| entry.name).collect()
    }
}

impl Default for BotCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use bottastic_core::testing::RecordingTransport;
    use bottastic_core::{BotState, WorkerPool};
    use bottastic_types::node::NodeNum;

    #[test]
    fn lookup_is_case_insensitive() {
        let catalog = BotCatalog::builtin();
        assert!(catalog.get("ping-pong").is_some());
        assert!(catalog.get("Ping-Pong").is_some());
        assert!(catalog.get("nope").is_none());
        assert_eq!(catalog.names(), vec!["ping-pong"]);
    }

    #[tokio::test]
    async fn launch_registers_and_starts_bot() {
        let catalog = BotCatalog::builtin();
        let registry = DispatchRegistry::new();
        let transport = Arc::new(RecordingTransport::new(NodeNum(1)));

        let launched = catalog.get("ping-pong").unwrap().launch(
            Connection::from(transport),
            &registry,
            BotOptions::default().with_pool(WorkerPool::new(1)),
        );
        assert_eq!(launched.handle.name(), "ping-pong");
        assert_eq!(registry.registered_count(), 1);

        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            while launched.handle.state() != BotState::AwaitingConnection {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        launched.handle.close().await.unwrap();
        launched.task.await.unwrap().unwrap();
        assert_eq!(launched.handle.state(), BotState::Closed);
    }
}
