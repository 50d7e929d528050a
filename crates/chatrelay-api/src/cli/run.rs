//! `relay run`: serve every configured agent until interrupted.

use chatrelay_core::event::EventBus;
use chatrelay_core::registry::PluginRegistry;
use chatrelay_core::relay::Relay;
use chatrelay_types::config::RelayConfig;
use chatrelay_types::event::RelayEvent;
use console::style;
use tokio::sync::broadcast::error::RecvError;

use crate::builtins::register_builtins;
use crate::state::AppState;

/// Build the plugin registry and relay for `config`.
pub fn build_relay(config: &RelayConfig, bus: EventBus) -> anyhow::Result<Relay> {
    let mut registry = PluginRegistry::new();
    register_builtins(&mut registry)?;
    registry.instantiate(config)?;
    let relay = Relay::from_config(config, &registry, bus)?;
    Ok(relay)
}

pub async fn run(state: &AppState, quiet: bool) -> anyhow::Result<()> {
    let config = state.load_config().await?;
    if config.agents.is_empty() {
        anyhow::bail!(
            "no agents configured in {} (see `relay check`)",
            state.config_path.display()
        );
    }

    let bus = EventBus::default();
    let relay = build_relay(&config, bus.clone())?;
    tokio::spawn(log_events(bus));

    let cancel = relay.cancel_token();
    tokio::spawn(async move {
        crate::shutdown_signal().await;
        tracing::info!("shutdown requested");
        cancel.cancel();
    });

    if !quiet {
        eprintln!(
            "  {} {} agent(s) running, Ctrl+C to stop",
            style("▶").green().bold(),
            relay.agents().len()
        );
    }
    relay.run().await;
    Ok(())
}

/// Mirror lifecycle events into the log.
async fn log_events(bus: EventBus) {
    let mut events = bus.subscribe();
    loop {
        match events.recv().await {
            Ok(RelayEvent::QuestionDropped { agent, key, reason }) => {
                tracing::info!(%agent, conversation = %key, "question dropped: {reason}");
            }
            Ok(RelayEvent::DeliveryFailed {
                agent, key, error, ..
            }) => {
                tracing::warn!(%agent, conversation = %key, "delivery failed: {error}");
            }
            Ok(event) => tracing::debug!(?event, "relay event"),
            Err(RecvError::Lagged(missed)) => tracing::debug!(missed, "event log lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}
