//! ChatRelay command-line entry point.
//!
//! Binary name: `relay`
//!
//! Parses CLI arguments, sets up tracing, then dispatches to the command
//! handler. `relay run` serves the configured agents until interrupted.

mod builtins;
mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use chatrelay_observe::tracing_setup::{init_tracing, shutdown_tracing};
use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,chatrelay_core=debug",
        _ => "trace",
    };
    init_tracing(filter, cli.otel).map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "relay", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::new(cli.config.clone());

    let result = match cli.command {
        Commands::Run => cli::run::run(&state, cli.quiet).await,
        Commands::Check => cli::check::check(&state, cli.json).await,
        Commands::Match { rules, message, me } => {
            cli::match_rule::match_message(&rules, &message, me, cli.json).await
        }
        Commands::Split {
            text,
            min,
            max,
            chars,
        } => cli::split::split(text, min, max, chars, cli.json).await,
        Commands::Completions { .. } => unreachable!("handled above"),
    };

    shutdown_tracing();
    result
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
