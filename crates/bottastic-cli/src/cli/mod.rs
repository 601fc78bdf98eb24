//! CLI command definitions for the `bottastic` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod console;
pub mod list;
pub mod run;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Run bots on a mesh radio network.
#[derive(Parser)]
#[command(name = "bottastic", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a bot from the built-in catalog.
    Run(RunArgs),

    /// List the bots that can be run.
    #[command(alias = "ls")]
    List,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Bot name (see `bottastic list`).
    pub bot: String,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Log every message the bot sends.
    #[arg(long)]
    pub echo_sent: bool,

    /// Log every text message routed to the bot.
    #[arg(long)]
    pub echo_received: bool,

    /// Threads for blocking transport calls (overrides config.toml).
    #[arg(long, env = "BOTTASTIC_WORKERS")]
    pub workers: Option<usize>,
}

/// How to reach the mesh. Exactly one is required.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct ConnectionArgs {
    /// Connect to a device over TCP.
    #[arg(long)]
    pub host: Option<String>,

    /// Connect to a device over a serial port (e.g. /dev/ttyUSB0).
    #[arg(long)]
    pub port: Option<String>,

    /// Run on an in-process simulated mesh driven from stdin.
    #[arg(long)]
    pub simulate: bool,
}
