//! `bottastic run`: start one bot and keep it running until stopped.

use anyhow::{Context, Result, bail};
use console::style;

use bottastic_core::{BotOptions, Connection, DispatchRegistry, EchoFlags, NotificationBus, WorkerPool};
use bottastic_infra::config::{load_runtime_config, resolve_worker_threads};
use bottastic_infra::data_dir::resolve_data_dir;
use bottastic_infra::sim::{SimMesh, SimNode};
use bottastic_types::node::NodeNum;

use super::RunArgs;
use super::console::Console;
use crate::catalog::BotCatalog;

/// Node number the bot's simulated radio uses.
const SIM_BOT_NODE: NodeNum = NodeNum(0xb075_0001);
/// Node number of the stdin console on the simulated mesh.
const SIM_CONSOLE_NODE: NodeNum = NodeNum(0xc0de_0001);
/// Fixed key so the bot can answer the console with encrypted direct messages.
const SIM_CONSOLE_KEY: [u8; 32] = [0x42; 32];

pub async fn run(args: RunArgs) -> Result<()> {
    let catalog = BotCatalog::builtin();
    let Some(entry) = catalog.get(&args.bot) else {
        bail!(
            "unknown bot '{}'; available: {}",
            args.bot,
            catalog.names().join(", ")
        );
    };

    if let Some(target) = args.connection.host.as_ref().or(args.connection.port.as_ref()) {
        bail!("cannot connect to '{target}': no device transport is built in; use --simulate");
    }

    let data_dir = resolve_data_dir();
    let config = load_runtime_config(&data_dir).await;
    let workers = resolve_worker_threads(&config, args.workers);
    if !WorkerPool::configure_shared(workers) {
        tracing::warn!("shared worker pool already initialized; ignoring --workers");
    }
    let echo = EchoFlags::new(
        args.echo_sent || config.echo_sent,
        args.echo_received || config.echo_received,
    );
    tracing::debug!(data_dir = %data_dir.display(), workers, ?echo, "runtime configured");

    let mesh = SimMesh::new().context("failed to start simulated mesh")?;
    let registry = DispatchRegistry::new();
    let bot_bus = NotificationBus::new();
    registry.attach(&bot_bus);
    let console_bus = NotificationBus::new();
    Console::print_incoming(&console_bus);

    let bot_radio = mesh.attach(SimNode::new(SIM_BOT_NODE, "Bottastic"), &bot_bus);
    let console_radio = mesh.attach(
        SimNode::new(SIM_CONSOLE_NODE, "Console").with_public_key(SIM_CONSOLE_KEY.to_vec()),
        &console_bus,
    );

    let launched = entry.launch(
        Connection::from(std::sync::Arc::clone(&bot_radio)),
        &registry,
        BotOptions::default().with_echo(echo),
    );
    bot_radio.connect().context("simulated radio failed to connect")?;

    println!();
    println!(
        "  {} Running {} on a simulated mesh as {}",
        style("📡").bold(),
        style(entry.name).cyan(),
        style(SIM_BOT_NODE).bold()
    );

    let console = Console {
        mesh: mesh.clone(),
        radio: console_radio,
        bot: SIM_BOT_NODE,
        bot_key: None,
    };
    let console_stopped = console.spawn().context("failed to start console")?;

    let mut task = launched.task;
    tokio::select! {
        result = &mut task => {
            return match result {
                Ok(result) => result.context("bot stopped"),
                Err(err) => Err(err).context("bot task failed"),
            };
        }
        _ = tokio::signal::ctrl_c() => {
            println!("  Bot stopped by user");
        }
        _ = console_stopped => {}
    }

    launched.handle.close().await.context("failed to close bot")?;
    task.await.context("bot task failed")??;
    Ok(())
}
