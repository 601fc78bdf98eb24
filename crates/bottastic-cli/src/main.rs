//! Bottastic CLI entry point.
//!
//! Binary name: `bottastic`
//!
//! Parses CLI arguments, sets up tracing, then dispatches to the command
//! handler.

mod bots;
mod catalog;
mod cli;

use clap::Parser;
use clap_complete::generate;

use bottastic_core::delivery::ECHO_TARGET;
use catalog::BotCatalog;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Echo lines stay visible at every verbosity except --quiet.
    let filter = match cli.verbose {
        0 if cli.quiet => "error".to_string(),
        0 => format!("warn,{ECHO_TARGET}=info"),
        1 => "info,bottastic=debug".to_string(),
        _ => "trace".to_string(),
    };
    bottastic_observe::tracing_setup::init_tracing(&filter, cli.otel)
        .map_err(|err| anyhow::anyhow!("failed to initialize tracing: {err}"))?;

    let result = match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            generate(shell, &mut cmd, "bottastic", &mut std::io::stdout());
            Ok(())
        }
        Commands::List => {
            cli::list::list_bots(&BotCatalog::builtin());
            Ok(())
        }
        Commands::Run(args) => cli::run::run(args).await,
    };

    bottastic_observe::tracing_setup::shutdown_tracing();
    result
}
